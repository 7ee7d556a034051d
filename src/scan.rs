//! MRZ scan orchestration
//!
//! decode -> resolution gate -> crop -> crop gate -> normalize -> OCR ->
//! text-shape gate -> parse. The first failing stage decides the outcome.

use crate::config::{OcrSettings, PipelineConfig};
use crate::engine::OcrEngine;
use crate::error::Rejection;
use crate::gate;
use crate::mrz::{self, MrzRecord};
use crate::preprocessing::{region, Normalizer, SourceImage};
use crate::sink::{DebugSink, NoopSink};
use image::DynamicImage;

/// The only value a scan produces
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Fully decoded MRZ
    Ok(MrzRecord),
    /// OCR ran but its output does not look like an MRZ
    Warning { raw_text: String, message: String },
    /// Scan stopped before usable text existed
    Rejected(Rejection),
}

impl Diagnostic {
    pub fn is_ok(&self) -> bool {
        matches!(self, Diagnostic::Ok(_))
    }
}

/// Runs one scan per call. Holds only borrowed, read-only collaborators, so a
/// scanner can be built per request and nothing carries over between scans.
pub struct MrzScanner<'a> {
    config: &'a PipelineConfig,
    settings: &'a OcrSettings,
    engine: &'a dyn OcrEngine,
    sink: &'a dyn DebugSink,
}

impl<'a> MrzScanner<'a> {
    pub fn new(config: &'a PipelineConfig, settings: &'a OcrSettings, engine: &'a dyn OcrEngine) -> Self {
        Self {
            config,
            settings,
            engine,
            sink: &NoopSink,
        }
    }

    pub fn with_sink(mut self, sink: &'a dyn DebugSink) -> Self {
        self.sink = sink;
        self
    }

    /// Scan encoded upload bytes (PNG, JPEG, ...)
    pub fn scan_bytes(&self, bytes: &[u8]) -> Diagnostic {
        match SourceImage::decode(bytes) {
            Ok(image) => self.scan_image(&image),
            Err(rejection) => {
                tracing::warn!("Rejected upload of {} bytes: {}", bytes.len(), rejection);
                Diagnostic::Rejected(rejection)
            }
        }
    }

    pub fn scan_image(&self, image: &SourceImage) -> Diagnostic {
        match self.run(image) {
            Ok(record) => Diagnostic::Ok(record),
            Err(diagnostic) => diagnostic,
        }
    }

    fn run(&self, image: &SourceImage) -> Result<MrzRecord, Diagnostic> {
        let gates = &self.config.gates;
        tracing::info!("Original size: {}x{}", image.width(), image.height());

        gate::check_resolution(image, gates).map_err(reject)?;
        self.emit("01_original", || image.as_dynamic().clone());

        let region = region::extract(image, self.config.crop_fraction);
        tracing::info!(
            "MRZ crop size: {}x{} at {:?}",
            region.width(),
            region.height(),
            region.offset()
        );
        self.emit("02_mrz_crop", || region.to_image());

        gate::check_crop(&region, gates).map_err(reject)?;

        let normalized = Normalizer::new(self.config.normalize).normalize(&region);
        for step in &normalized.steps {
            tracing::debug!("Preprocessing step {} took {}ms", step.name, step.time_ms);
        }
        self.emit("03_mrz_processed", || {
            DynamicImage::ImageLuma8(normalized.image().clone())
        });

        let ocr = self
            .engine
            .recognize(normalized.image(), self.settings)
            .map_err(|e| {
                tracing::error!("OCR engine '{}' failed: {}", self.engine.name(), e);
                reject(Rejection::from(e))
            })?;

        let raw_text = gate::collapse_whitespace(&ocr.text);
        tracing::debug!("OCR raw text ({} chars): {}", raw_text.len(), raw_text);

        if let Err(issue) = gate::check_text_shape(&raw_text, gates) {
            tracing::warn!("{}", issue);
            return Err(Diagnostic::Warning {
                raw_text,
                message: issue.to_string(),
            });
        }

        let record = mrz::parse(&raw_text).map_err(|e| reject(Rejection::from(e)))?;
        tracing::info!(
            "Parsed MRZ: type={} country={} number={} confidence={:?}",
            record.document_type(),
            record.issuing_country(),
            record.passport_number(),
            ocr.confidence
        );
        for (name, value) in record.fields() {
            tracing::debug!("  {}: {}", name, value);
        }
        Ok(record)
    }

    fn emit<F>(&self, stage: &str, image: F)
    where
        F: FnOnce() -> DynamicImage,
    {
        if self.sink.enabled() {
            self.sink.emit(stage, &image());
        }
    }
}

fn reject(rejection: Rejection) -> Diagnostic {
    tracing::warn!("Scan rejected: {}", rejection);
    Diagnostic::Rejected(rejection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OcrResult;
    use crate::error::{OcrError, ParseError};
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MRZ: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\nL898902C36UTO7408122F1204159ZE184226B<<<<<10\n";

    struct StubEngine {
        reply: Result<String, fn() -> OcrError>,
        calls: AtomicUsize,
        seen: Mutex<Option<(u32, u32)>>,
    }

    impl StubEngine {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(None),
            }
        }

        fn failing(err: fn() -> OcrError) -> Self {
            Self {
                reply: Err(err),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(None),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OcrEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn description(&self) -> &'static str {
            "returns canned text"
        }

        fn recognize(&self, image: &GrayImage, _: &OcrSettings) -> Result<OcrResult, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(image.dimensions());
            match &self.reply {
                Ok(text) => Ok(OcrResult {
                    text: text.clone(),
                    confidence: Some(0.9),
                }),
                Err(make) => Err(make()),
            }
        }

        fn supported_languages(&self) -> Vec<String> {
            vec!["ocrb".to_string()]
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        stages: Mutex<Vec<(String, u32, u32)>>,
    }

    impl DebugSink for RecordingSink {
        fn emit(&self, stage: &str, image: &DynamicImage) {
            self.stages
                .lock()
                .unwrap()
                .push((stage.to_string(), image.width(), image.height()));
        }
    }

    fn photo(width: u32, height: u32) -> SourceImage {
        SourceImage::from(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            width,
            height,
            Luma([200]),
        )))
    }

    fn scan(engine: &StubEngine, image: &SourceImage) -> Diagnostic {
        let config = PipelineConfig::default();
        let settings = OcrSettings::default();
        MrzScanner::new(&config, &settings, engine).scan_image(image)
    }

    #[test]
    fn test_successful_scan() {
        let engine = StubEngine::replying(MRZ);
        let diagnostic = scan(&engine, &photo(1000, 800));

        let record = match diagnostic {
            Diagnostic::Ok(record) => record,
            other => panic!("expected Ok, got {:?}", other),
        };
        assert_eq!(record.last_name(), "ERIKSSON");
        assert_eq!(record.first_name(), "ANNA MARIA");
        assert_eq!(record.raw_text().len(), 88);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_engine_sees_scaled_crop() {
        let engine = StubEngine::replying(MRZ);
        scan(&engine, &photo(1000, 800));

        // round(800 * 0.18) = 144 rows, upscaled 3x
        assert_eq!(*engine.seen.lock().unwrap(), Some((3000, 432)));
    }

    #[test]
    fn test_low_resolution_rejected_before_ocr() {
        for (w, h) in [(599, 1000), (1000, 599), (10, 10)] {
            let engine = StubEngine::replying(MRZ);
            let sink = RecordingSink::default();
            let config = PipelineConfig::default();
            let settings = OcrSettings::default();
            let diagnostic = MrzScanner::new(&config, &settings, &engine)
                .with_sink(&sink)
                .scan_image(&photo(w, h));

            assert_eq!(
                diagnostic,
                Diagnostic::Rejected(Rejection::ResolutionTooLow {
                    width: w,
                    height: h
                })
            );
            assert_eq!(engine.calls(), 0);
            assert!(sink.stages.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_small_crop_rejected_before_ocr() {
        let engine = StubEngine::replying(MRZ);
        // round(660 * 0.18) = 119
        let diagnostic = scan(&engine, &photo(1000, 660));

        assert_eq!(
            diagnostic,
            Diagnostic::Rejected(Rejection::MrzAreaTooSmall { height: 119 })
        );
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn test_short_text_returns_warning_with_raw_text() {
        let engine = StubEngine::replying("P<UTO ERIKSSON<<ANNA\n");
        let diagnostic = scan(&engine, &photo(1000, 800));

        match diagnostic {
            Diagnostic::Warning { raw_text, message } => {
                assert_eq!(raw_text, "P<UTOERIKSSON<<ANNA");
                assert!(message.starts_with("MRZ not detected clearly"));
            }
            other => panic!("expected Warning, got {:?}", other),
        }
    }

    #[test]
    fn test_text_without_separator_returns_warning() {
        let engine = StubEngine::replying(&"A".repeat(90));
        let diagnostic = scan(&engine, &photo(1000, 800));
        assert!(matches!(diagnostic, Diagnostic::Warning { .. }));
    }

    #[test]
    fn test_text_between_gate_and_parse_length_is_rejected() {
        let text = format!("{}{}", &MRZ[..45], "<".repeat(40));
        let engine = StubEngine::replying(&text);
        let diagnostic = scan(&engine, &photo(1000, 800));

        assert_eq!(
            diagnostic,
            Diagnostic::Rejected(Rejection::Malformed(ParseError::TooShort {
                expected: 88,
                actual: 84
            }))
        );
    }

    #[test]
    fn test_engine_timeout_maps_to_rejection() {
        let engine = StubEngine::failing(|| OcrError::Timeout(std::time::Duration::from_secs(1)));
        let diagnostic = scan(&engine, &photo(1000, 800));

        assert_eq!(diagnostic, Diagnostic::Rejected(Rejection::OcrTimeout));
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_engine_failure_maps_to_engine_rejection() {
        let engine = StubEngine::failing(|| OcrError::Unavailable("no tessdata".to_string()));
        let diagnostic = scan(&engine, &photo(1000, 800));

        let rejection = match diagnostic {
            Diagnostic::Rejected(rejection) => rejection,
            other => panic!("expected rejection, got {:?}", other),
        };
        assert_eq!(rejection.category(), crate::error::RejectionCategory::Engine);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let engine = StubEngine::replying(MRZ);
        let config = PipelineConfig::default();
        let settings = OcrSettings::default();
        let diagnostic = MrzScanner::new(&config, &settings, &engine).scan_bytes(b"\x89PNG garbage");

        assert_eq!(diagnostic, Diagnostic::Rejected(Rejection::UnsupportedImage));
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn test_sink_receives_each_stage() {
        let engine = StubEngine::replying(MRZ);
        let sink = RecordingSink::default();
        let config = PipelineConfig::default();
        let settings = OcrSettings::default();
        let diagnostic = MrzScanner::new(&config, &settings, &engine)
            .with_sink(&sink)
            .scan_image(&photo(1000, 800));

        assert!(diagnostic.is_ok());
        assert_eq!(
            *sink.stages.lock().unwrap(),
            vec![
                ("01_original".to_string(), 1000, 800),
                ("02_mrz_crop".to_string(), 1000, 144),
                ("03_mrz_processed".to_string(), 3000, 432),
            ]
        );
    }
}
