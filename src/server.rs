use crate::config::{Config, GateThresholds, OcrSettings};
use crate::engine::{OcrEngine, TimedEngine};
use crate::engines::{EngineInfo, EngineRegistry};
use crate::error::{Rejection, RejectionCategory, ServerError};
use crate::mrz::MrzRecord;
use crate::scan::{Diagnostic, MrzScanner};
use crate::sink::{DebugSink, DirectorySink, NoopSink};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engines: Arc<EngineRegistry>,
    pub config: Arc<Config>,
    /// In-flight OCR calls across all requests and engines
    ocr_workers: Arc<Semaphore>,
    requests: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config, engines: EngineRegistry) -> Self {
        Self {
            engines: Arc::new(engines),
            ocr_workers: Arc::new(Semaphore::new(config.max_ocr_workers.max(1))),
            config: Arc::new(config),
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Unique per process; names the debug subdirectory of a request
    fn next_request_id(&self) -> String {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{:06}", std::process::id(), n)
    }
}

/// Scan response, discriminated by `status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: &'static str,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub record: Option<MrzRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<RejectionCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
    pub engine: String,
    pub processing_time_ms: u64,
}

impl ScanResponse {
    fn from_diagnostic(diagnostic: Diagnostic, engine: String, processing_time_ms: u64) -> Self {
        let mut response = Self {
            status: "ok",
            record: None,
            raw_text: None,
            warning: None,
            error: None,
            code: None,
            category: None,
            hint: None,
            engine,
            processing_time_ms,
        };

        match diagnostic {
            // rawText comes with the flattened record
            Diagnostic::Ok(record) => response.record = Some(record),
            Diagnostic::Warning { raw_text, message } => {
                response.status = "warning";
                response.raw_text = Some(raw_text);
                response.warning = Some(message);
            }
            Diagnostic::Rejected(rejection) => {
                response.status = "rejected";
                response.error = Some(rejection.to_string());
                response.code = Some(rejection.code());
                response.category = Some(rejection.category());
                response.hint = Some(rejection.hint());
            }
        }

        response
    }

    fn status_code(&self) -> StatusCode {
        match self.category {
            None => StatusCode::OK,
            Some(RejectionCategory::Input) => StatusCode::BAD_REQUEST,
            Some(RejectionCategory::Parse) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(RejectionCategory::Engine) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub default_engine: String,
    pub available_engines: Vec<EngineInfo>,
    pub max_file_size_bytes: usize,
    pub ocr_timeout_ms: u64,
    pub ocr: OcrSettings,
    pub gates: GateThresholds,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .route("/api/scan/document", post(handle_scan))
        .route("/api/scan/document/:engine", post(handle_scan_with_engine))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                // Leave room for the multipart framing around the file itself
                .layer(DefaultBodyLimit::max(max_file_size.saturating_add(64 * 1024))),
        )
        .with_state(state)
}

/// Serve on an already bound listener
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let engines = EngineRegistry::new(&config)?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        "Engines available: {:?} (default: {})",
        engines.list(),
        engines.default_name()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    serve(listener, AppState::new(config, engines)).await
}

/// Scan with the default engine
async fn handle_scan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let engine = state
        .engines
        .default_engine()
        .ok_or_else(|| ServerError::Internal("No default engine".to_string()))?;
    scan_upload(state, engine, multipart).await
}

/// Scan with an engine named in the path
async fn handle_scan_with_engine(
    State(state): State<AppState>,
    Path(name): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServerError> {
    let engine = state
        .engines
        .get(&name)
        .ok_or(ServerError::UnknownEngine(name))?;
    scan_upload(state, engine, multipart).await
}

async fn scan_upload(
    state: AppState,
    engine: Arc<dyn OcrEngine>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ScanResponse>), ServerError> {
    let start = Instant::now();
    let data = read_upload(multipart, state.config.max_file_size).await?;

    let request_id = state.next_request_id();
    let engine_name = engine.name().to_string();
    let config = Arc::clone(&state.config);
    let workers = Arc::clone(&state.ocr_workers);

    let diagnostic = tokio::task::spawn_blocking(move || {
        let timed = TimedEngine::new(engine, config.ocr_timeout, workers);
        let sink: Box<dyn DebugSink> = match &config.debug_dir {
            Some(root) => Box::new(DirectorySink::for_request(root, &request_id)),
            None => Box::new(NoopSink),
        };

        MrzScanner::new(&config.pipeline, &config.ocr, &timed)
            .with_sink(sink.as_ref())
            .scan_bytes(&data)
    })
    .await
    .map_err(|e| ServerError::Internal(format!("Scan task failed: {}", e)))?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    log_outcome(&diagnostic, &engine_name, processing_time_ms);

    let response = ScanResponse::from_diagnostic(diagnostic, engine_name, processing_time_ms);
    Ok((response.status_code(), Json(response)))
}

/// Pull the `file` field out of the form, ignoring everything else
async fn read_upload(mut multipart: Multipart, max_file_size: usize) -> Result<Bytes, ServerError> {
    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size, "Failed to parse multipart"))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_file_size, "Failed to read file data"))?;

        tracing::info!("Received file {} ({} bytes)", file_name, data.len());
        file_data = Some(data);
    }

    let data = file_data.ok_or(ServerError::MissingFile)?;

    if data.len() > max_file_size {
        tracing::warn!("Upload of {} bytes exceeds {} bytes", data.len(), max_file_size);
        return Err(ServerError::ImageTooLarge { max: max_file_size });
    }

    Ok(data)
}

/// The body limit layer cuts the stream off mid-read, so the real size is unknown
fn multipart_error(err: MultipartError, max_file_size: usize, context: &str) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        tracing::warn!("Upload cut off at the {} byte body limit", max_file_size);
        ServerError::ImageTooLarge { max: max_file_size }
    } else {
        ServerError::InvalidRequest(format!("{}: {}", context, err))
    }
}

fn log_outcome(diagnostic: &Diagnostic, engine: &str, processing_time_ms: u64) {
    match diagnostic {
        Diagnostic::Ok(record) => tracing::info!(
            "MRZ decoded by {} in {}ms: {} {} {}",
            engine,
            processing_time_ms,
            record.document_type(),
            record.issuing_country(),
            record.passport_number()
        ),
        Diagnostic::Warning { message, .. } => {
            tracing::warn!("Scan by {} finished with warning in {}ms: {}", engine, processing_time_ms, message)
        }
        Diagnostic::Rejected(rejection) => log_rejection(rejection, engine, processing_time_ms),
    }
}

fn log_rejection(rejection: &Rejection, engine: &str, processing_time_ms: u64) {
    tracing::warn!(
        "Scan by {} rejected in {}ms: {} ({})",
        engine,
        processing_time_ms,
        rejection,
        rejection.code()
    );
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_engine: state.engines.default_name().to_string(),
        available_engines: state.engines.info(),
        max_file_size_bytes: state.config.max_file_size,
        ocr_timeout_ms: state.config.ocr_timeout.as_millis() as u64,
        ocr: state.config.ocr.clone(),
        gates: state.config.pipeline.gates.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    #[test]
    fn test_rejection_status_codes() {
        let cases = [
            (Rejection::UnsupportedImage, StatusCode::BAD_REQUEST),
            (
                Rejection::Malformed(ParseError::TooShort {
                    expected: 88,
                    actual: 82,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (Rejection::OcrTimeout, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (rejection, expected) in cases {
            let response =
                ScanResponse::from_diagnostic(Diagnostic::Rejected(rejection), "stub".to_string(), 1);
            assert_eq!(response.status, "rejected");
            assert_eq!(response.status_code(), expected);
        }
    }

    #[test]
    fn test_warning_is_ok_status() {
        let response = ScanResponse::from_diagnostic(
            Diagnostic::Warning {
                raw_text: "HELLO".to_string(),
                message: "MRZ not detected clearly".to_string(),
            },
            "stub".to_string(),
            3,
        );
        assert_eq!(response.status_code(), StatusCode::OK);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "warning");
        assert_eq!(json["rawText"], "HELLO");
        assert_eq!(json["processingTimeMs"], 3);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_ok_response_flattens_record() {
        let text = format!("P<UTOERIKSSON<<ANNA<MARIA{}", "<".repeat(19))
            + "L898902C36UTO7408122F1204159ZE184226B<<<<<10";
        let record = crate::mrz::parse(&text).unwrap();
        let response = ScanResponse::from_diagnostic(Diagnostic::Ok(record), "stub".to_string(), 5);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["lastName"], "ERIKSSON");
        assert_eq!(json["passportNumber"], "L898902C3");
        assert_eq!(json["rawText"], text);
        assert_eq!(json["engine"], "stub");
    }
}
