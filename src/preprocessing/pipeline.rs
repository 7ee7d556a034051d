use crate::config::NormalizeParams;
use image::GrayImage;
use std::time::Instant;

use super::region::Region;
use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Grayscale, contrast-stretched and upscaled MRZ crop ready for OCR.
///
/// Dimensions are exactly `scale` times the source region in both axes.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    image: GrayImage,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

impl NormalizedImage {
    pub fn image(&self) -> &GrayImage {
        &self.image
    }
}

/// Turns an MRZ region into an OCR-friendly bitmap: grayscale, contrast, resize
pub struct Normalizer {
    params: NormalizeParams,
}

impl Normalizer {
    pub fn new(params: NormalizeParams) -> Self {
        Self { params }
    }

    pub fn normalize(&self, region: &Region<'_>) -> NormalizedImage {
        let start = Instant::now();
        let mut steps_timing = Vec::new();
        let params = self.params;
        let scale = params.scale.max(1);

        let gray = self.run_step("grayscale", region, &mut steps_timing, |region| {
            steps::grayscale::apply(region.to_image())
        });
        let stretched = self.run_step("contrast", gray, &mut steps_timing, |gray| {
            steps::contrast::apply(&gray, &params)
        });
        let image = self.run_step("resize", stretched, &mut steps_timing, |img| {
            steps::resize::apply(&img, scale)
        });

        tracing::debug!(
            "Normalized {}x{} region to {}x{} in {}ms",
            region.width(),
            region.height(),
            image.width(),
            image.height(),
            start.elapsed().as_millis()
        );

        NormalizedImage {
            image,
            steps: steps_timing,
        }
    }

    fn run_step<T, F>(
        &self,
        name: &str,
        input: T,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> GrayImage
    where
        F: FnOnce(T) -> GrayImage,
    {
        let step_start = Instant::now();
        let result = step_fn(input);
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        result
    }
}
