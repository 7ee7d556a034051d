use crate::config::NormalizeParams;
use image::{GrayImage, Luma};
use imageproc::map::map_colors;

/// Linear intensity rescale `out = clamp(in * gain + bias, 0, 255)`.
///
/// With the default gain of 3 and bias of -250 everything below ~84 goes black
/// and everything above ~168 goes white, which flattens paper texture around
/// the OCR-B strokes without a separate threshold step.
pub fn apply(image: &GrayImage, params: &NormalizeParams) -> GrayImage {
    map_colors(image, |Luma([value])| Luma([rescale(value, params.gain, params.bias)]))
}

fn rescale(value: u8, gain: f32, bias: f32) -> u8 {
    (value as f32 * gain + bias).round().clamp(0.0, 255.0) as u8
}
