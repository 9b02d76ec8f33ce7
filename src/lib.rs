pub mod config;
pub mod detection;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod preprocess;
pub mod registry;
pub mod render;
pub mod taxonomy;
pub mod traits;

pub mod mocks;

pub use config::Config;
pub use detection::{select_best, Detection, PredictionResult};
pub use errors::{FreshscanError, Result};
pub use model::YoloDetector;
pub use pipeline::{Envelope, RequestPipeline, Upload};
pub use registry::ModelRegistry;
pub use render::{RenderMode, Renderer};
pub use traits::{Detector, InferenceParams};
