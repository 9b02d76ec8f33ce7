use serde::Serialize;

/// One raw detector output: label id, confidence in [0, 1] and a bounding
/// box in source-image pixel space as `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// The unit returned to the caller: canonical class name, confidence as a
/// percentage rounded to two decimals, and the bounding box (empty for the
/// "Not Detected" sentinel).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub class: String,
    pub confidence: f32,
    pub bbox: Vec<f32>,
}

impl PredictionResult {
    pub const NOT_DETECTED: &'static str = "Not Detected";

    /// Build a result from a selected detection and its canonical name.
    pub fn from_detection(class: &str, detection: &Detection) -> Self {
        Self {
            class: class.to_string(),
            confidence: round2(detection.confidence * 100.0),
            bbox: detection.bbox.to_vec(),
        }
    }

    /// Sentinel for images where nothing was detected.
    pub fn not_detected() -> Self {
        Self {
            class: Self::NOT_DETECTED.to_string(),
            confidence: 0.0,
            bbox: Vec::new(),
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Reduce a multi-detection result to one canonical answer: maximum
/// confidence, ties broken by first encountered in input order.
///
/// The system always reports a single best guess per image even though the
/// underlying detector is multi-object; this is a deliberate simplification.
/// Strict `>` makes the first of equally confident detections win.
pub fn select_best(detections: &[Detection]) -> Option<&Detection> {
    let mut best: Option<&Detection> = None;
    for detection in detections {
        match best {
            Some(current) if detection.confidence > current.confidence => {
                best = Some(detection);
            }
            None => best = Some(detection),
            _ => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(class_id: usize, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: [0.0, 0.0, 10.0, 10.0],
        }
    }

    #[test]
    fn test_select_best_picks_max_confidence() {
        let detections = vec![detection(0, 0.63), detection(1, 0.81)];
        let best = select_best(&detections).unwrap();
        assert_eq!(best.class_id, 1);
        assert_eq!(best.confidence, 0.81);
    }

    #[test]
    fn test_select_best_tie_goes_to_first() {
        let detections = vec![detection(3, 0.5), detection(7, 0.5)];
        assert_eq!(select_best(&detections).unwrap().class_id, 3);
    }

    #[test]
    fn test_select_best_empty_is_none() {
        assert!(select_best(&[]).is_none());
    }

    #[test]
    fn test_select_best_is_deterministic() {
        let detections = vec![detection(0, 0.2), detection(1, 0.9), detection(2, 0.9)];
        let first = select_best(&detections).cloned();
        for _ in 0..10 {
            assert_eq!(select_best(&detections).cloned(), first);
        }
    }

    #[test]
    fn test_prediction_confidence_is_rounded_percentage() {
        let result = PredictionResult::from_detection("Fresh Apple", &detection(0, 0.81456));
        assert_eq!(result.confidence, 81.46);
        assert_eq!(result.bbox, vec![0.0, 0.0, 10.0, 10.0]);
    }

    #[test]
    fn test_prediction_confidence_stays_in_range() {
        for raw in [0.0, 0.004, 0.5, 0.999, 1.0] {
            let result = PredictionResult::from_detection("Fresh Apple", &detection(0, raw));
            assert!((0.0..=100.0).contains(&result.confidence));
        }
    }

    #[test]
    fn test_not_detected_sentinel() {
        let sentinel = PredictionResult::not_detected();
        assert_eq!(sentinel.class, "Not Detected");
        assert_eq!(sentinel.confidence, 0.0);
        assert!(sentinel.bbox.is_empty());
    }
}
