//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine, the one to use for MRZ work: it accepts a
//! character whitelist, a page segmentation mode and a font-specific model
//! ("ocrb"). Uses tesseract-static crate for static linking (no system dependencies).
//! Traineddata comes from `--tessdata-path` or is downloaded on first use.

use crate::config::{Config, OcrSettings};
use crate::engine::{OcrEngine, OcrResult};
use crate::error::OcrError;
use image::GrayImage;
use std::path::Path;
use tesseract_static::tesseract::{OcrEngineMode, Tesseract};

/// Tesseract OCR Engine
pub struct LeptessEngine {
    /// Path to tessdata directory
    tessdata_path: String,
}

impl LeptessEngine {
    /// Create a new Tesseract-based OCR engine for the configured MRZ language
    pub fn new(config: &Config) -> Result<Self, OcrError> {
        let language = &config.ocr.language;
        let tessdata_path = match &config.tessdata_path {
            Some(dir) => existing_tessdata(Path::new(dir), language)?,
            None => ensure_tessdata_available(language, &config.tessdata_url)?,
        };

        // Validate that tessdata is accessible by doing a test initialization
        let test_tess = Tesseract::new_with_oem(
            Some(&tessdata_path),
            Some(language),
            engine_mode(config.ocr.engine_mode),
        )
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(test_tess);

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            language
        );

        Ok(Self { tessdata_path })
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - OCR-B model, MRZ whitelist, single-column segmentation"
    }

    fn recognize(&self, image: &GrayImage, settings: &OcrSettings) -> Result<OcrResult, OcrError> {
        let (width, height) = image.dimensions();

        // Convert to BMP in memory (BMP is always supported by leptonica)
        let mut bmp_data = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Processing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        // A fresh instance per call keeps settings from leaking between requests
        let mut tess = Tesseract::new_with_oem(
            Some(&self.tessdata_path),
            Some(&settings.language),
            engine_mode(settings.engine_mode),
        )
        .map_err(|e| OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e)))?;

        tess = tess
            .set_variable("tessedit_char_whitelist", &settings.char_whitelist)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to set whitelist: {}", e)))?;

        tess = tess
            .set_variable("tessedit_pageseg_mode", &settings.page_seg_mode.to_string())
            .map_err(|e| {
                OcrError::ProcessingError(format!("Failed to set page segmentation mode: {}", e))
            })?;

        tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            OcrError::ProcessingError(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        tess = tess
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;

        // Get confidence score (0-100 scale, convert to 0.0-1.0)
        let confidence = tess.mean_text_conf() as f32 / 100.0;

        Ok(OcrResult {
            text,
            confidence: Some(confidence),
        })
    }

    fn supported_languages(&self) -> Vec<String> {
        vec!["ocrb".to_string(), "eng".to_string()]
    }
}

// ============================================================================
// Tessdata helpers
// ============================================================================

/// Use a caller-provided tessdata directory, which must already hold the model
fn existing_tessdata(dir: &Path, language: &str) -> Result<String, OcrError> {
    let traineddata = dir.join(traineddata_file(language));
    if !traineddata.exists() {
        return Err(OcrError::InitializationError(format!(
            "Missing {:?}; install the '{}' traineddata or unset TESSDATA_PREFIX",
            traineddata, language
        )));
    }
    path_string(dir)
}

/// Ensure tessdata is available, downloading if needed
fn ensure_tessdata_available(language: &str, base_url: &str) -> Result<String, OcrError> {
    let cache_dir = super::cache_dir().join("tessdata");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create tessdata directory: {}", e))
    })?;

    let traineddata_path = cache_dir.join(traineddata_file(language));

    if !traineddata_path.exists() {
        let url = tessdata_url(base_url, language);
        tracing::info!(
            "Downloading tessdata for '{}' from {} (this may take a moment)...",
            language,
            url
        );
        super::download_file(&url, &traineddata_path)?;
        tracing::info!("Downloaded tessdata to {:?}", traineddata_path);
    } else {
        tracing::info!("Using cached tessdata from {:?}", cache_dir);
    }

    // Tesseract expects the directory, not the file
    path_string(&cache_dir)
}

/// Engine mode is fixed at init time, so it cannot go through `set_variable`
fn engine_mode(mode: u8) -> OcrEngineMode {
    match mode {
        0 => OcrEngineMode::TesseractOnly,
        1 => OcrEngineMode::LstmOnly,
        2 => OcrEngineMode::TesseractLstmCombined,
        _ => OcrEngineMode::Default,
    }
}

fn traineddata_file(language: &str) -> String {
    format!("{}.traineddata", language)
}

fn tessdata_url(base_url: &str, language: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), traineddata_file(language))
}

fn path_string(path: &Path) -> Result<String, OcrError> {
    path.to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}
