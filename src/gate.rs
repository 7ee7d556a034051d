//! Quality gates
//!
//! Independent checks run between pipeline stages. A failed gate ends the scan;
//! none of them is retried, a new capture is required.

use crate::config::GateThresholds;
use crate::error::{RecognitionQualityError, Rejection};
use crate::preprocessing::{Region, SourceImage};

/// Reject photos too small for the MRZ crop to hold legible glyphs
pub fn check_resolution(image: &SourceImage, thresholds: &GateThresholds) -> Result<(), Rejection> {
    let (width, height) = (image.width(), image.height());
    if width < thresholds.min_resolution || height < thresholds.min_resolution {
        return Err(Rejection::ResolutionTooLow { width, height });
    }
    Ok(())
}

/// Reject crops too short to contain two MRZ lines
pub fn check_crop(region: &Region<'_>, thresholds: &GateThresholds) -> Result<(), Rejection> {
    if region.height() < thresholds.min_crop_height {
        return Err(Rejection::MrzAreaTooSmall {
            height: region.height(),
        });
    }
    Ok(())
}

/// Whitespace-collapsed OCR output must be long enough and contain the name separator
pub fn check_text_shape(
    text: &str,
    thresholds: &GateThresholds,
) -> Result<(), RecognitionQualityError> {
    let len = text.chars().count();
    if len < thresholds.min_text_len {
        return Err(RecognitionQualityError::TooShort {
            expected: thresholds.min_text_len,
            actual: len,
        });
    }
    if !text.contains(thresholds.name_separator.as_str()) {
        return Err(RecognitionQualityError::MissingSeparator(
            thresholds.name_separator.clone(),
        ));
    }
    Ok(())
}

/// Drop every whitespace character; MRZ lines are concatenated into one stream
pub fn collapse_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::region;
    use image::{DynamicImage, GrayImage};

    fn source(width: u32, height: u32) -> SourceImage {
        SourceImage::from(DynamicImage::ImageLuma8(GrayImage::new(width, height)))
    }

    #[test]
    fn test_resolution_gate() {
        let thresholds = GateThresholds::default();

        assert!(check_resolution(&source(600, 600), &thresholds).is_ok());
        assert_eq!(
            check_resolution(&source(599, 1200), &thresholds),
            Err(Rejection::ResolutionTooLow {
                width: 599,
                height: 1200
            })
        );
        assert!(check_resolution(&source(1200, 599), &thresholds).is_err());
    }

    #[test]
    fn test_crop_gate_boundary() {
        let thresholds = GateThresholds::default();

        // fraction 1.0 makes the region exactly as tall as the source
        let short = source(600, 119);
        let short_region = region::extract(&short, 1.0);
        assert_eq!(short_region.height(), 119);
        assert_eq!(
            check_crop(&short_region, &thresholds),
            Err(Rejection::MrzAreaTooSmall { height: 119 })
        );

        let exact = source(600, 120);
        assert!(check_crop(&region::extract(&exact, 1.0), &thresholds).is_ok());
    }

    #[test]
    fn test_crop_gate_on_default_fraction() {
        let thresholds = GateThresholds::default();
        // round(660 * 0.18) = 119, round(667 * 0.18) = 120
        let low = source(800, 660);
        let ok = source(800, 667);
        assert!(check_crop(&region::extract(&low, 0.18), &thresholds).is_err());
        assert!(check_crop(&region::extract(&ok, 0.18), &thresholds).is_ok());
    }

    #[test]
    fn test_short_text_is_unusable() {
        let thresholds = GateThresholds::default();
        let text = format!("P<UTOSMITH<<JOHN{}", "<".repeat(63));
        assert_eq!(text.len(), 79);

        assert_eq!(
            check_text_shape(&text, &thresholds),
            Err(RecognitionQualityError::TooShort {
                expected: 80,
                actual: 79
            })
        );
    }

    #[test]
    fn test_text_without_separator_is_unusable() {
        let thresholds = GateThresholds::default();
        let text = "PA".repeat(42) + "X";
        assert_eq!(text.len(), 85);

        assert_eq!(
            check_text_shape(&text, &thresholds),
            Err(RecognitionQualityError::MissingSeparator("<<".to_string()))
        );
    }

    #[test]
    fn test_full_length_text_with_separator_passes() {
        let thresholds = GateThresholds::default();
        let text = format!("P<UTOSMITH<<JOHN{}", "A".repeat(72));
        assert_eq!(text.len(), 88);
        assert!(check_text_shape(&text, &thresholds).is_ok());
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace(" P<UTO\nSMITH <<\r\n\tJOHN "), "P<UTOSMITH<<JOHN");
        assert_eq!(collapse_whitespace(""), "");
    }
}
