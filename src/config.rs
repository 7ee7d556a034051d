use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Characters the MRZ alphabet is made of: A-Z, 0-9 and the `<` filler
pub const MRZ_CHAR_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789<";

/// Tesseract page segmentation mode 4: a single column of text of variable sizes
pub const PSM_SINGLE_COLUMN: u8 = 4;

/// Tesseract engine mode 1: LSTM recognizer only
pub const OEM_LSTM_ONLY: u8 = 1;

#[derive(Parser, Debug, Clone)]
#[command(name = "mrz-scan-server")]
#[command(about = "Extracts passport MRZ data from uploaded photos")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "MRZ_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MRZ_PORT", default_value = "9292")]
    pub port: u16,

    /// Maximum upload size in bytes (default: 20MB)
    #[arg(long, env = "MRZ_MAX_FILE_SIZE", default_value = "20971520")]
    pub max_file_size: usize,

    /// OCR engine used when the request does not name one (e.g., "ocrs", "leptess")
    #[arg(long, env = "MRZ_ENGINE")]
    pub engine: Option<String>,

    /// Tesseract language model; "ocrb" is trained on the MRZ font
    #[arg(long, env = "MRZ_OCR_LANGUAGE", default_value = "ocrb")]
    pub ocr_language: String,

    /// Path to tessdata directory (uses TESSDATA_PREFIX env var if not set)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<String>,

    /// Base URL traineddata files are downloaded from when not cached
    #[arg(
        long,
        env = "MRZ_TESSDATA_URL",
        default_value = "https://github.com/Shreeshrii/tessdata_ocrb/raw/master"
    )]
    pub tessdata_url: String,

    /// Upper bound for a single OCR call, in milliseconds
    #[arg(long, env = "MRZ_OCR_TIMEOUT_MS", default_value = "15000")]
    pub ocr_timeout_ms: u64,

    /// Maximum number of OCR calls running at once, timed-out ones included
    #[arg(long, env = "MRZ_MAX_OCR_WORKERS", default_value = "4", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_ocr_workers: u32,

    /// Directory for per-request debug images (disabled when unset)
    #[arg(long, env = "MRZ_DEBUG_DIR")]
    pub debug_dir: Option<PathBuf>,

    /// Contrast gain applied to the grayscale MRZ crop
    #[arg(long, env = "MRZ_GAIN", default_value = "3.0")]
    pub gain: f32,

    /// Contrast bias applied after the gain
    #[arg(long, env = "MRZ_BIAS", default_value = "-250.0", allow_hyphen_values = true)]
    pub bias: f32,

    /// Integer upscale factor applied before OCR
    #[arg(long, env = "MRZ_SCALE", default_value = "3", value_parser = clap::value_parser!(u32).range(1..=8))]
    pub scale: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub default_engine: Option<String>,
    pub tessdata_path: Option<String>,
    pub tessdata_url: String,
    pub ocr_timeout: Duration,
    pub max_ocr_workers: usize,
    pub debug_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
    pub ocr: OcrSettings,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            default_engine: args.engine,
            tessdata_path: args.tessdata_path,
            tessdata_url: args.tessdata_url,
            ocr_timeout: Duration::from_millis(args.ocr_timeout_ms),
            max_ocr_workers: args.max_ocr_workers as usize,
            debug_dir: args.debug_dir,
            pipeline: PipelineConfig {
                normalize: NormalizeParams {
                    gain: args.gain,
                    bias: args.bias,
                    scale: args.scale,
                },
                ..PipelineConfig::default()
            },
            ocr: OcrSettings {
                language: args.ocr_language,
                ..OcrSettings::default()
            },
        }
    }
}

/// Immutable per-run settings for the crop, gates and normalization.
///
/// One value is shared read-only by every request; nothing in a run mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineConfig {
    /// Share of the document height, measured from the bottom edge, holding the MRZ
    pub crop_fraction: f64,
    pub gates: GateThresholds,
    pub normalize: NormalizeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_fraction: 0.18,
            gates: GateThresholds::default(),
            normalize: NormalizeParams::default(),
        }
    }
}

/// Thresholds for the three quality gates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateThresholds {
    /// Minimum width and height of the uploaded photo
    pub min_resolution: u32,
    /// Minimum height of the MRZ crop
    pub min_crop_height: u32,
    /// Minimum length of the whitespace-free OCR text
    pub min_text_len: usize,
    /// Filler sequence separating surname from given names
    pub name_separator: String,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_resolution: 600,
            min_crop_height: 120,
            min_text_len: 80,
            name_separator: "<<".to_string(),
        }
    }
}

/// Linear intensity rescale `out = clamp(in * gain + bias)` followed by an integer upscale
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizeParams {
    pub gain: f32,
    pub bias: f32,
    pub scale: u32,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            gain: 3.0,
            bias: -250.0,
            scale: 3,
        }
    }
}

/// Recognition settings handed to the engine with every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrSettings {
    pub language: String,
    pub char_whitelist: String,
    pub page_seg_mode: u8,
    pub engine_mode: u8,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: "ocrb".to_string(),
            char_whitelist: MRZ_CHAR_WHITELIST.to_string(),
            page_seg_mode: PSM_SINGLE_COLUMN,
            engine_mode: OEM_LSTM_ONLY,
        }
    }
}
