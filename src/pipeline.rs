use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::config::Config;
use crate::detection::{select_best, PredictionResult};
use crate::errors::{FreshscanError, Result};
use crate::preprocess;
use crate::registry::ModelRegistry;
use crate::render::{Annotation, Renderer};
use crate::taxonomy;
use crate::traits::InferenceParams;

/// One user-submitted file, as received from the hosting boundary.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The uniform response shape returned to the caller. No error ever crosses
/// this boundary as anything but `{"success": false, "error": ...}`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    Success {
        success: bool,
        image_url: String,
        predictions: Vec<PredictionResult>,
    },
    Failure {
        success: bool,
        error: String,
    },
}

impl Envelope {
    pub fn success(image_url: String, predictions: Vec<PredictionResult>) -> Self {
        Self::Success {
            success: true,
            image_url,
            predictions,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            success: false,
            error: error.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Temporary on-disk copy of the uploaded bytes, owned by exactly one
/// request.
///
/// Removal rides on `Drop`, so it runs on every exit path: normal return,
/// any failure, any unexpected panic while the guard is live. A removal
/// failure is logged and swallowed; it must never mask the primary result.
pub struct RequestArtifact {
    path: PathBuf,
}

impl RequestArtifact {
    /// Persist the upload under a collision-free name: a random token joined
    /// with the sanitized original filename.
    pub fn persist(upload_dir: &Path, filename: &str, bytes: &[u8]) -> Result<Self> {
        fs::create_dir_all(upload_dir).map_err(|e| FreshscanError::FileSystem {
            path: upload_dir.to_path_buf(),
            operation: "create upload directory".to_string(),
            source: e,
        })?;

        let name = format!("{}_{}", Uuid::new_v4().simple(), sanitize_filename(filename));
        let path = upload_dir.join(name);
        fs::write(&path, bytes).map_err(|e| FreshscanError::FileSystem {
            path: path.clone(),
            operation: "persist upload artifact".to_string(),
            source: e,
        })?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RequestArtifact {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove upload artifact");
            }
        }
    }
}

/// Strip path components and anything outside `[A-Za-z0-9._-]` from an
/// untrusted filename before it touches the filesystem.
fn sanitize_filename(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c| c == '.' || c == '_').is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

/// Orchestrates one upload end to end: validation, artifact handling, the
/// preprocess → infer → select → normalize → render chain, and the uniform
/// response envelope.
pub struct RequestPipeline {
    config: Config,
    registry: ModelRegistry,
    renderer: Renderer,
}

impl RequestPipeline {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_registry(config, ModelRegistry::new())
    }

    /// Pipeline over an existing registry. Tests preload the registry with a
    /// mock detector; production passes a fresh one.
    pub fn with_registry(config: Config, registry: ModelRegistry) -> Result<Self> {
        let mut renderer = Renderer::new(config.render_mode, config.jpeg_quality);
        if let Some(font_path) = &config.font_path {
            renderer = renderer.with_font(font_path)?;
        }

        Ok(Self {
            config,
            registry,
            renderer,
        })
    }

    /// Handle one upload. Every failure kind is recovered here into the
    /// failure envelope; nothing propagates past this boundary.
    pub fn handle(&self, upload: &Upload) -> Envelope {
        match self.process(upload) {
            Ok((image_url, predictions)) => Envelope::success(image_url, predictions),
            Err(e) => {
                warn!(filename = %upload.filename, error = %e, "classification request failed");
                Envelope::failure(e.to_string())
            }
        }
    }

    fn process(&self, upload: &Upload) -> Result<(String, Vec<PredictionResult>)> {
        self.validate(upload)?;

        // Model availability is settled before any artifact exists, so an
        // unavailable model never attempts decode or inference and leaves
        // nothing behind on disk.
        let detector = self
            .registry
            .acquire(&self.config)
            .ok_or(FreshscanError::ModelUnavailable)?;

        let artifact =
            RequestArtifact::persist(&self.config.upload_dir, &upload.filename, &upload.bytes)?;

        let bytes = fs::read(artifact.path()).map_err(|e| FreshscanError::FileSystem {
            path: artifact.path().to_path_buf(),
            operation: "read upload artifact".to_string(),
            source: e,
        })?;

        let image = preprocess::decode_image(&bytes)?;
        let image = preprocess::bound_dimensions(image, self.config.max_image_size);

        let params = InferenceParams {
            confidence_threshold: self.config.confidence_threshold,
            iou_threshold: self.config.iou_threshold,
            image_size: self.config.max_image_size,
        };
        let detections = detector.detect(&image, &params)?;

        let (predictions, annotation) = match select_best(&detections) {
            Some(detection) => {
                let raw_label = detector.label_name(detection.class_id).ok_or_else(|| {
                    FreshscanError::UnknownLabel {
                        label: format!("class id {}", detection.class_id),
                    }
                })?;
                let entry = taxonomy::canonicalize(raw_label)?;

                let annotation = Annotation {
                    label: entry.display_name,
                    confidence: detection.confidence,
                    bbox: detection.bbox,
                };
                let prediction = PredictionResult::from_detection(entry.display_name, detection);
                (vec![prediction], Some(annotation))
            }
            None => (vec![PredictionResult::not_detected()], None),
        };

        let image_url = self.renderer.render(&image, annotation.as_ref())?;

        Ok((image_url, predictions))
        // `artifact` drops here; on every `?` above it has already dropped.
    }

    fn validate(&self, upload: &Upload) -> Result<()> {
        if upload.filename.is_empty() {
            return Err(FreshscanError::InvalidUpload {
                reason: "no file selected".to_string(),
            });
        }
        if !Config::is_allowed_extension(&upload.filename) {
            return Err(FreshscanError::InvalidUpload {
                reason: "unsupported file format".to_string(),
            });
        }
        if upload.bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(FreshscanError::InvalidUpload {
                reason: "file exceeds the upload size limit".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename_keeps_safe_characters() {
        assert_eq!(sanitize_filename("apple-01.jpg"), "apple-01.jpg");
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
    }

    #[test]
    fn test_sanitize_filename_strips_path_components() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("/tmp/x.jpg"), "x.jpg");
    }

    #[test]
    fn test_sanitize_filename_falls_back_on_empty() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("..."), "upload");
    }

    #[test]
    fn test_artifact_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = {
            let artifact = RequestArtifact::persist(dir.path(), "apple.jpg", b"bytes").unwrap();
            assert!(artifact.path().exists());
            artifact.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_artifact_names_never_collide() {
        let dir = TempDir::new().unwrap();
        let a = RequestArtifact::persist(dir.path(), "apple.jpg", b"one").unwrap();
        let b = RequestArtifact::persist(dir.path(), "apple.jpg", b"two").unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().exists() && b.path().exists());
    }

    #[test]
    fn test_success_envelope_json_shape() {
        let envelope = Envelope::success(
            "data:image/jpeg;base64,abc".to_string(),
            vec![PredictionResult::not_detected()],
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["image_url"], "data:image/jpeg;base64,abc");
        assert_eq!(json["predictions"][0]["class"], "Not Detected");
        assert_eq!(json["predictions"][0]["confidence"], 0.0);
    }

    #[test]
    fn test_failure_envelope_json_shape() {
        let envelope = Envelope::failure("unsupported file format");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "unsupported file format");
        assert!(json.get("predictions").is_none());
    }
}
