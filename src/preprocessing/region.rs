//! Source image decoding and MRZ region extraction
//!
//! A TD3 passport carries its MRZ in a band of fixed relative height along the
//! bottom edge. The extractor takes that band across the full width. No rotation
//! or perspective correction happens here; capture guidelines keep the photo
//! roughly axis-aligned.

use crate::error::Rejection;
use image::{DynamicImage, GenericImageView};

/// Decoded upload. Never mutated; every transform produces a new image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
}

impl SourceImage {
    /// Decode PNG/JPEG (or any format the `image` crate recognizes) from memory
    pub fn decode(bytes: &[u8]) -> Result<Self, Rejection> {
        let image = image::load_from_memory(bytes).map_err(|e| {
            tracing::debug!("Image decode failed: {}", e);
            Rejection::UnsupportedImage
        })?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(image: DynamicImage) -> Self {
        Self { image }
    }
}

/// Read-only rectangular view into a [`SourceImage`]
#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    source: &'a SourceImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Region<'_> {
    pub fn offset(&self) -> (u32, u32) {
        (self.x, self.y)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copy the covered pixels out, keeping the source color model
    pub fn to_image(&self) -> DynamicImage {
        self.source
            .as_dynamic()
            .crop_imm(self.x, self.y, self.width, self.height)
    }
}

/// Bottom band of `round(height * fraction)` rows across the full width
pub fn extract(image: &SourceImage, fraction: f64) -> Region<'_> {
    let (width, height) = image.as_dynamic().dimensions();
    let mrz_height = ((height as f64 * fraction).round() as u32).min(height);

    Region {
        source: image,
        x: 0,
        y: height - mrz_height,
        width,
        height: mrz_height,
    }
}
