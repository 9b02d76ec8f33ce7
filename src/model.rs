use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::SessionBuilder, Session};
use ort::value::TensorRef;
use parking_lot::Mutex;

use crate::detection::Detection;
use crate::errors::{FreshscanError, Result};
use crate::traits::{Detector, InferenceParams};

/// Letterbox padding color, the YOLO training-time convention.
const PAD_COLOR: Rgb<u8> = Rgb([114, 114, 114]);

/// YOLO detector backed by an ONNX Runtime session.
///
/// The session runs on CPU with a fixed, small intra-op thread budget so a
/// slow inference never contends for every core. After construction the
/// detector is read-only shared state; the mutex exists only because the
/// session's `run` takes `&mut self`.
pub struct YoloDetector {
    session: Mutex<Session>,
    labels: Vec<String>,
}

impl YoloDetector {
    /// Load the weight artifact and its sidecar names file.
    ///
    /// Construction is expensive (seconds); callers are expected to go
    /// through the registry so it happens at most once per process.
    pub fn new(model_path: &Path, names_path: &Path, intra_threads: usize) -> Result<Self> {
        let labels = load_label_table(names_path)?;

        let session = SessionBuilder::new()
            .map_err(|e| FreshscanError::Inference {
                operation: "session builder initialization".to_string(),
                source: Box::new(e),
            })?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| FreshscanError::Inference {
                operation: "execution provider configuration".to_string(),
                source: Box::new(e),
            })?
            .with_intra_threads(intra_threads)
            .map_err(|e| FreshscanError::Inference {
                operation: "thread budget configuration".to_string(),
                source: Box::new(e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| FreshscanError::Inference {
                operation: format!("model file loading: {}", model_path.display()),
                source: Box::new(e),
            })?;

        Ok(Self {
            session: Mutex::new(session),
            labels,
        })
    }

    fn run_session(&self, tensor: &Array4<f32>) -> Result<Array3<f32>> {
        let mut session = self.session.lock();
        let outputs = session.run(
            ort::inputs!["images" => TensorRef::from_array_view(tensor)?],
        )?;
        Ok(outputs["output0"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?
            .to_owned())
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &RgbImage, params: &InferenceParams) -> Result<Vec<Detection>> {
        let (padded, placement) = letterbox(image, params.image_size);

        let tensor = padded
            .as_ndarray3()
            .slice_move(s![NewAxis, .., .., ..])
            .map(|v| f32::from(*v) / 255.0);

        let output = self.run_session(&tensor)?;

        let candidates = decode_output(
            output.view(),
            params.confidence_threshold,
            &placement,
            image.dimensions(),
        );
        Ok(non_maximum_suppression(candidates, params.iou_threshold))
    }

    fn label_name(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }
}

/// Load the fixed label-id → raw-label-name table (one name per line).
fn load_label_table(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(|e| FreshscanError::FileSystem {
        path: path.to_path_buf(),
        operation: "open names file".to_string(),
        source: e,
    })?;

    let labels = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| FreshscanError::FileSystem {
            path: path.to_path_buf(),
            operation: "read names file".to_string(),
            source: e,
        })?
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if labels.is_empty() {
        return Err(FreshscanError::FileSystem {
            path: path.to_path_buf(),
            operation: "read names file".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "names file is empty"),
        });
    }

    Ok(labels)
}

/// Where the source image landed inside the square inference canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub scale: f32,
    pub x_offset: u32,
    pub y_offset: u32,
}

/// Resize into a centered square canvas of side `size`, preserving aspect
/// ratio and padding the rest. Unlike the preprocessing bound this may scale
/// up: the inference resolution is fixed, so small crops are enlarged the
/// same way the detector saw them during training.
pub(crate) fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Placement) {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = imageops::resize(image, new_width, new_height, FilterType::Lanczos3);

    let x_offset = (size - new_width) / 2;
    let y_offset = (size - new_height) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, PAD_COLOR);
    imageops::overlay(&mut canvas, &resized, i64::from(x_offset), i64::from(y_offset));

    (
        canvas,
        Placement {
            scale,
            x_offset,
            y_offset,
        },
    )
}

/// Decode the raw YOLO output tensor of shape `(1, 4 + classes, anchors)`.
///
/// Each anchor column holds a box as (cx, cy, w, h) in canvas pixels followed
/// by per-class scores. Anchors below the confidence threshold are dropped;
/// surviving boxes are mapped back through the letterbox placement into
/// source-image coordinates and clamped to the image bounds.
pub(crate) fn decode_output(
    output: ArrayView3<f32>,
    confidence_threshold: f32,
    placement: &Placement,
    source_dimensions: (u32, u32),
) -> Vec<Detection> {
    let predictions = output.index_axis(Axis(0), 0);
    let rows = predictions.shape()[0];
    if rows <= 4 {
        return Vec::new();
    }
    let num_classes = rows - 4;
    let (source_width, source_height) = source_dimensions;

    let mut detections = Vec::new();
    for anchor in predictions.axis_iter(Axis(1)) {
        let mut class_id = 0;
        let mut confidence = f32::NEG_INFINITY;
        for (idx, &score) in anchor.iter().skip(4).take(num_classes).enumerate() {
            if score > confidence {
                class_id = idx;
                confidence = score;
            }
        }
        if confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);

        // Canvas coordinates -> source coordinates.
        let x1 = (cx - w / 2.0 - placement.x_offset as f32) / placement.scale;
        let y1 = (cy - h / 2.0 - placement.y_offset as f32) / placement.scale;
        let x2 = (cx + w / 2.0 - placement.x_offset as f32) / placement.scale;
        let y2 = (cy + h / 2.0 - placement.y_offset as f32) / placement.scale;

        detections.push(Detection {
            class_id,
            confidence,
            bbox: [
                x1.clamp(0.0, source_width as f32),
                y1.clamp(0.0, source_height as f32),
                x2.clamp(0.0, source_width as f32),
                y2.clamp(0.0, source_height as f32),
            ],
        });
    }

    detections
}

/// Intersection over union of two xyxy boxes.
pub(crate) fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_x1 = a[0].max(b[0]);
    let inter_y1 = a[1].max(b[1]);
    let inter_x2 = a[2].min(b[2]);
    let inter_y2 = a[3].min(b[3]);

    let inter_area = (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union_area = area_a + area_b - inter_area;

    if union_area <= 0.0 {
        0.0
    } else {
        inter_area / union_area
    }
}

/// Per-class non-maximum suppression: within each class, keep the highest
/// confidence box and drop those overlapping it beyond the IoU threshold.
pub(crate) fn non_maximum_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id
                && compute_iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_is_square_with_centered_content() {
        let image = RgbImage::new(200, 100);
        let (canvas, placement) = letterbox(&image, 640);
        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(placement.scale, 3.2);
        assert_eq!(placement.x_offset, 0);
        assert_eq!(placement.y_offset, 160);
    }

    #[test]
    fn test_letterbox_square_input_has_no_padding() {
        let image = RgbImage::new(100, 100);
        let (canvas, placement) = letterbox(&image, 640);
        assert_eq!(canvas.dimensions(), (640, 640));
        assert_eq!(placement.x_offset, 0);
        assert_eq!(placement.y_offset, 0);
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_eq!(compute_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [20.0, 20.0, 30.0, 30.0];
        assert_eq!(compute_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 0.0, 15.0, 10.0];
        let iou = compute_iou(&a, &b);
        assert!((iou - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_same_class_overlap() {
        let detections = vec![
            Detection {
                class_id: 0,
                confidence: 0.9,
                bbox: [0.0, 0.0, 10.0, 10.0],
            },
            Detection {
                class_id: 0,
                confidence: 0.6,
                bbox: [1.0, 1.0, 11.0, 11.0],
            },
        ];
        let kept = non_maximum_suppression(detections, 0.45);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_overlap_across_classes() {
        let detections = vec![
            Detection {
                class_id: 0,
                confidence: 0.9,
                bbox: [0.0, 0.0, 10.0, 10.0],
            },
            Detection {
                class_id: 1,
                confidence: 0.8,
                bbox: [0.0, 0.0, 10.0, 10.0],
            },
        ];
        let kept = non_maximum_suppression(detections, 0.45);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_decode_output_filters_and_maps_coordinates() {
        // One anchor above the threshold, one below, two classes.
        // Canvas is 640 with no offsets and scale 2.0 (320x320 source).
        let mut output = Array3::<f32>::zeros((1, 6, 2));
        output[[0, 0, 0]] = 320.0; // cx
        output[[0, 1, 0]] = 320.0; // cy
        output[[0, 2, 0]] = 200.0; // w
        output[[0, 3, 0]] = 100.0; // h
        output[[0, 4, 0]] = 0.1;
        output[[0, 5, 0]] = 0.9;

        output[[0, 4, 1]] = 0.2;
        output[[0, 5, 1]] = 0.1;

        let placement = Placement {
            scale: 2.0,
            x_offset: 0,
            y_offset: 0,
        };
        let detections = decode_output(output.view(), 0.25, &placement, (320, 320));

        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.class_id, 1);
        assert_eq!(detection.confidence, 0.9);
        assert_eq!(detection.bbox, [110.0, 135.0, 210.0, 185.0]);
    }

    #[test]
    fn test_decode_output_clamps_to_source_bounds() {
        let mut output = Array3::<f32>::zeros((1, 6, 1));
        output[[0, 0, 0]] = 0.0;
        output[[0, 1, 0]] = 0.0;
        output[[0, 2, 0]] = 100.0;
        output[[0, 3, 0]] = 100.0;
        output[[0, 4, 0]] = 0.8;

        let placement = Placement {
            scale: 1.0,
            x_offset: 0,
            y_offset: 0,
        };
        let detections = decode_output(output.view(), 0.25, &placement, (640, 640));
        assert_eq!(detections[0].bbox[0], 0.0);
        assert_eq!(detections[0].bbox[1], 0.0);
    }

    #[test]
    fn test_load_label_table_missing_file() {
        let err = load_label_table(Path::new("/nonexistent/best.names")).unwrap_err();
        assert!(matches!(err, FreshscanError::FileSystem { .. }));
    }

    #[test]
    fn test_load_label_table_skips_blank_lines() -> Result<()> {
        use std::io::Write;
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("best.names");
        let mut file = File::create(&path)?;
        writeln!(file, "Fresh Apple\n\nStale Apple\n")?;

        let labels = load_label_table(&path)?;
        assert_eq!(labels, vec!["Fresh Apple", "Stale Apple"]);
        Ok(())
    }
}
