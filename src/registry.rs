use std::sync::{Arc, OnceLock};

use tracing::{error, info};

use crate::config::Config;
use crate::errors::Result;
use crate::model::YoloDetector;
use crate::traits::Detector;

/// Process-wide lazily-initialized holder of the detector instance.
///
/// The first caller performs the expensive load; concurrent callers block on
/// the `OnceLock` until it finishes and then observe its result, so the load
/// happens exactly once regardless of timing. A failed load is recorded
/// permanently: once unavailable, the registry stays unavailable until the
/// process restarts. It never raises to the caller.
pub struct ModelRegistry {
    slot: OnceLock<Option<Arc<dyn Detector>>>,
}

impl ModelRegistry {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Registry already holding a detector. Used by tests to inject mocks
    /// behind the same acquisition path production code uses.
    pub fn preloaded(detector: Arc<dyn Detector>) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(Some(detector));
        Self { slot }
    }

    /// Acquire the shared detector, loading it on first call.
    ///
    /// `None` means permanent unavailability; the cause was logged once at
    /// load time and callers map it to the model-unavailable failure kind.
    pub fn acquire(&self, config: &Config) -> Option<Arc<dyn Detector>> {
        self.acquire_with(|| {
            let detector = YoloDetector::new(
                &config.model_path,
                &config.names_path,
                config.intra_threads,
            )?;
            Ok(Arc::new(detector) as Arc<dyn Detector>)
        })
    }

    /// Acquisition with an explicit loader, the seam the unit tests use to
    /// observe that loading happens at most once.
    pub fn acquire_with<F>(&self, load: F) -> Option<Arc<dyn Detector>>
    where
        F: FnOnce() -> Result<Arc<dyn Detector>>,
    {
        self.slot
            .get_or_init(|| match load() {
                Ok(detector) => {
                    info!("detection model loaded");
                    Some(detector)
                }
                Err(e) => {
                    error!(error = %e, "detection model failed to load; unavailable for process lifetime");
                    None
                }
            })
            .clone()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
