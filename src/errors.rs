use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the freshness classification pipeline.
///
/// # Why structured errors
///
/// Every failure the request lifecycle can recover from is a distinct variant
/// carrying its own context (the failing operation, the underlying cause).
/// The pipeline boundary folds all of them into a uniform failure envelope,
/// so the variants exist for logging and for tests, not for callers to parse
/// strings. Expected failures (bad upload, bad decode) travel as values; only
/// truly unexpected faults panic.
#[derive(Error, Debug)]
pub enum FreshscanError {
    /// The detector never became ready. Recorded once at load time; every
    /// request after that sees this variant without touching the weights.
    #[error("detection model is not available")]
    ModelUnavailable,

    #[error("invalid upload: {reason}")]
    InvalidUpload { reason: String },

    #[error("image decoding failed: {operation}")]
    Decode {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("inference failed: {operation}")]
    Inference {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("output encoding failed: {operation}")]
    Encode {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The detector produced a label the canonical taxonomy does not know.
    /// This is loud on purpose: a renamed or misspelled model class must be
    /// caught, not displayed to users untranslated.
    #[error("detector label {label:?} has no canonical taxonomy entry")]
    UnknownLabel { label: String },

    #[error("filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FreshscanError>;

/// Convert image crate errors to decode errors.
///
/// Code that knows which operation failed should construct `Decode` directly;
/// this conversion is the fallback for `?` at the boundary.
impl From<image::ImageError> for FreshscanError {
    fn from(err: image::ImageError) -> Self {
        Self::Decode {
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ONNX Runtime errors to inference errors.
impl From<ort::Error> for FreshscanError {
    fn from(err: ort::Error) -> Self {
        Self::Inference {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert ndarray shape errors to inference errors.
///
/// # Why the inference category
///
/// Shape errors only occur while building or decoding tensors, which is part
/// of model invocation, so they are categorized as inference failures rather
/// than getting a separate tensor error type. This keeps the hierarchy flat
/// and aligned with the failure kinds the envelope reports.
impl From<ndarray::ShapeError> for FreshscanError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Inference {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Some I/O errors occur without specific path context. Code that has context
/// should construct `FileSystem` directly with the actual path and operation.
impl From<std::io::Error> for FreshscanError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}
