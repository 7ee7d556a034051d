use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Failures of the OCR engine itself, as opposed to the photo it was given
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("OCR did not finish within {0:?}")]
    Timeout(Duration),

    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),
}

/// Fixed-width text that cannot be sliced into TD3 fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected at least {expected} characters, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("unexpected byte 0x{byte:02x} at offset {offset}")]
    InvalidByte { offset: usize, byte: u8 },
}

/// OCR output that does not look like an MRZ. Carried back to the caller as a warning.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionQualityError {
    #[error("MRZ not detected clearly: recognized {actual} characters, need at least {expected}")]
    TooShort { expected: usize, actual: usize },

    #[error("MRZ not detected clearly: name separator \"{0}\" not found")]
    MissingSeparator(String),
}

/// Where a rejection originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionCategory {
    /// The upload itself is unusable; a new capture is needed
    Input,
    /// The recognized text passed the shape check but could not be sliced
    Parse,
    /// Infrastructure fault; retaking the photo will not help
    Engine,
}

/// Terminal outcome of a scan that produced no usable text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("unsupported or corrupt image")]
    UnsupportedImage,

    #[error("resolution too low")]
    ResolutionTooLow { width: u32, height: u32 },

    #[error("MRZ area too small")]
    MrzAreaTooSmall { height: u32 },

    #[error("malformed MRZ text: {0}")]
    Malformed(ParseError),

    #[error("ocr timeout")]
    OcrTimeout,

    #[error("ocr engine failure: {0}")]
    Engine(String),
}

impl Rejection {
    pub fn category(&self) -> RejectionCategory {
        match self {
            Rejection::UnsupportedImage
            | Rejection::ResolutionTooLow { .. }
            | Rejection::MrzAreaTooSmall { .. } => RejectionCategory::Input,
            Rejection::Malformed(_) => RejectionCategory::Parse,
            Rejection::OcrTimeout | Rejection::Engine(_) => RejectionCategory::Engine,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::UnsupportedImage => "UNSUPPORTED_IMAGE",
            Rejection::ResolutionTooLow { .. } => "RESOLUTION_TOO_LOW",
            Rejection::MrzAreaTooSmall { .. } => "MRZ_AREA_TOO_SMALL",
            Rejection::Malformed(_) => "MALFORMED_MRZ",
            Rejection::OcrTimeout => "OCR_TIMEOUT",
            Rejection::Engine(_) => "ENGINE_ERROR",
        }
    }

    /// What the user should do next
    pub fn hint(&self) -> &'static str {
        match self {
            Rejection::UnsupportedImage => "Upload a PNG or JPEG photo of the passport.",
            Rejection::ResolutionTooLow { .. } => "Please upload a clearer photo.",
            Rejection::MrzAreaTooSmall { .. } => "Retake photo with full bottom visible.",
            Rejection::Malformed(_) => "Retake photo with the whole MRZ in frame.",
            Rejection::OcrTimeout | Rejection::Engine(_) => {
                "The text recognizer is unavailable. Please try again later."
            }
        }
    }
}

impl From<OcrError> for Rejection {
    fn from(err: OcrError) -> Self {
        match err {
            OcrError::Timeout(_) => Rejection::OcrTimeout,
            other => Rejection::Engine(other.to_string()),
        }
    }
}

impl From<ParseError> for Rejection {
    fn from(err: ParseError) -> Self {
        Rejection::Malformed(err)
    }
}

/// Request-level failures raised before a scan can start
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Image too large: exceeds {max} bytes")]
    ImageTooLarge { max: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown OCR engine: {0}")]
    UnknownEngine(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Same `rejected` shape as a pipeline rejection, without a hint
#[derive(Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
    pub code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            ServerError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ServerError::UnknownEngine(_) => (StatusCode::NOT_FOUND, "UNKNOWN_ENGINE"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            status: "rejected",
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_ocr_timeout() {
        let rejection = Rejection::from(OcrError::Timeout(Duration::from_secs(1)));
        assert_eq!(rejection, Rejection::OcrTimeout);
        assert_eq!(rejection.to_string(), "ocr timeout");
        assert_eq!(rejection.category(), RejectionCategory::Engine);
    }

    #[test]
    fn test_engine_failures_are_not_input_errors() {
        let rejection = Rejection::from(OcrError::ProcessingError("boom".to_string()));
        assert_eq!(rejection.category(), RejectionCategory::Engine);
        assert!(rejection.to_string().contains("boom"));
    }

    #[test]
    fn test_input_rejection_messages() {
        assert_eq!(
            Rejection::ResolutionTooLow {
                width: 10,
                height: 10
            }
            .to_string(),
            "resolution too low"
        );
        assert_eq!(
            Rejection::MrzAreaTooSmall { height: 119 }.to_string(),
            "MRZ area too small"
        );
        assert_eq!(
            Rejection::UnsupportedImage.to_string(),
            "unsupported or corrupt image"
        );
    }

    #[test]
    fn test_server_error_status_codes() {
        let response = ServerError::MissingFile.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ServerError::ImageTooLarge { max: 1 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_image_too_large_reports_only_the_limit() {
        assert_eq!(
            ServerError::ImageTooLarge { max: 1048576 }.to_string(),
            "Image too large: exceeds 1048576 bytes"
        );
    }
}
