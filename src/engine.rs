use crate::config::OcrSettings;
use crate::error::OcrError;
use image::GrayImage;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// OCR processing result
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub text: String,
    /// Mean confidence in 0.0-1.0 when the engine reports one
    pub confidence: Option<f32>,
}

/// Trait that all OCR engines must implement
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize a prepared single-channel bitmap.
    ///
    /// Settings arrive with every call; implementations must not keep per-call
    /// state between invocations.
    fn recognize(&self, image: &GrayImage, settings: &OcrSettings) -> Result<OcrResult, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}

/// Bounds every recognition call of the wrapped engine.
///
/// The call runs on a worker thread; when the deadline passes the caller gets
/// `OcrError::Timeout` and the worker's eventual result is discarded. Each
/// worker holds a permit from the shared `workers` semaphore until the engine
/// call returns, so timed-out calls still count against the limit. With no
/// permit left the call fails with `OcrError::Unavailable`.
pub struct TimedEngine {
    inner: Arc<dyn OcrEngine>,
    timeout: Duration,
    workers: Arc<Semaphore>,
}

impl TimedEngine {
    pub fn new(inner: Arc<dyn OcrEngine>, timeout: Duration, workers: Arc<Semaphore>) -> Self {
        Self {
            inner,
            timeout,
            workers,
        }
    }
}

impl OcrEngine for TimedEngine {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }

    fn recognize(&self, image: &GrayImage, settings: &OcrSettings) -> Result<OcrResult, OcrError> {
        let permit = Arc::clone(&self.workers).try_acquire_owned().map_err(|_| {
            tracing::warn!("No free OCR worker for engine '{}'", self.inner.name());
            OcrError::Unavailable("all OCR workers are busy".to_string())
        })?;

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let image = image.clone();
        let settings = settings.clone();

        std::thread::Builder::new()
            .name(format!("ocr-{}", inner.name()))
            .spawn(move || {
                let _permit = permit;
                let _ = tx.send(inner.recognize(&image, &settings));
            })
            .map_err(|e| OcrError::Unavailable(format!("Failed to spawn OCR worker: {}", e)))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "OCR engine '{}' exceeded {}ms",
                    self.inner.name(),
                    self.timeout.as_millis()
                );
                Err(OcrError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(OcrError::ProcessingError(
                "OCR worker exited without a result".to_string(),
            )),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        self.inner.supported_languages()
    }
}
