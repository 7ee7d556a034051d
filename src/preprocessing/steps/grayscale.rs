use image::{DynamicImage, GrayImage};

/// Convert to a single luminance channel.
/// Luma8 input passes through unchanged; color input uses luminance-weighted channels.
pub fn apply(image: DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}
