use image::RgbImage;

use crate::detection::Detection;
use crate::errors::Result;

/// Inference-time parameters, fixed per deployment.
///
/// `image_size` must equal the preprocessing bound: the detector letterboxes
/// to this square resolution, and a mismatch between preprocessing size and
/// inference size changes accuracy without raising an error.
#[derive(Debug, Clone, Copy)]
pub struct InferenceParams {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub image_size: u32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            image_size: 1024,
        }
    }
}

/// The visual detection capability consumed by the pipeline.
///
/// A single operation: given an RGB pixel buffer and fixed parameters, return
/// zero or more detections in source-image coordinates. The concrete engine
/// stays substitutable — the real ONNX detector and the test mocks implement
/// the same seam, and nothing downstream knows which one it is talking to.
pub trait Detector: Send + Sync {
    /// Run detection on an already-bounded RGB image.
    ///
    /// Returned order carries no meaning; selection happens downstream.
    fn detect(&self, image: &RgbImage, params: &InferenceParams) -> Result<Vec<Detection>>;

    /// Raw label name for a class id, per the detector's fixed label table.
    fn label_name(&self, class_id: usize) -> Option<&str>;
}
