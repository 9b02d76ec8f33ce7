use image::RgbImage;

use crate::detection::Detection;
use crate::errors::{FreshscanError, Result};
use crate::traits::{Detector, InferenceParams};

/// Mock detector returning a fixed detection list, for exercising the
/// pipeline without a weight artifact.
#[derive(Debug, Clone)]
pub struct MockDetector {
    pub detections: Vec<Detection>,
    pub labels: Vec<String>,
}

impl MockDetector {
    pub fn new(detections: Vec<Detection>, labels: Vec<String>) -> Self {
        Self { detections, labels }
    }
}

impl Detector for MockDetector {
    fn detect(&self, _image: &RgbImage, _params: &InferenceParams) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }

    fn label_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Mock detector whose every invocation fails, for exercising the
/// inference-failure path.
#[derive(Debug, Clone, Copy)]
pub struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&self, _image: &RgbImage, _params: &InferenceParams) -> Result<Vec<Detection>> {
        Err(FreshscanError::Inference {
            operation: "mock inference".to_string(),
            source: Box::new(std::io::Error::other("simulated detector fault")),
        })
    }

    fn label_name(&self, _class_id: usize) -> Option<&str> {
        None
    }
}

/// Detector with the full freshness label table and no detections.
pub fn create_mock_detector() -> MockDetector {
    MockDetector::new(Vec::new(), freshness_labels())
}

/// The raw label vocabulary of the production model, for tests.
pub fn freshness_labels() -> Vec<String> {
    [
        "Fresh Apple",
        "Stale Apple",
        "Fresh Banana",
        "Stale Banana",
        "Fresh Orange",
        "Stale Orange",
        "Fresh Tomato",
        "Stale Tomato",
        "Fresh Capsicum",
        "Stale Capsicum",
        "Fresh Bitter Gourd",
        "Stale Bitter Gourd",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
