//! Debug artifact sinks
//!
//! The scanner hands intermediate images to a sink. Writing them is best effort:
//! a failing sink never changes the scan result.

use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

pub trait DebugSink: Send + Sync {
    /// Whether `emit` does anything; lets callers skip building the image
    fn enabled(&self) -> bool {
        true
    }

    fn emit(&self, stage: &str, image: &DynamicImage);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn enabled(&self) -> bool {
        false
    }

    fn emit(&self, _stage: &str, _image: &DynamicImage) {}
}

/// Writes `<dir>/<stage>.png` per stage
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// One subdirectory per request, so concurrent scans never share files
    pub fn for_request(root: &Path, request_id: &str) -> Self {
        Self {
            dir: root.join(request_id),
        }
    }

    fn write(&self, stage: &str, image: &DynamicImage) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", stage));
        image.save_with_format(&path, ImageFormat::Png)?;
        Ok(())
    }
}

impl DebugSink for DirectorySink {
    fn emit(&self, stage: &str, image: &DynamicImage) {
        match self.write(stage, image) {
            Ok(()) => tracing::debug!("Saved debug image {} to {:?}", stage, self.dir),
            Err(e) => tracing::debug!("Skipping debug image {}: {}", stage, e),
        }
    }
}
