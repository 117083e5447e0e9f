//! HTTP front end for the intake pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/upload` | Multipart upload; the config file goes in the `file` field |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Any other method on `/upload` gets `405 Method Not Allowed` from the router.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "unsupported_dialect", "message": "unsupported XML type: ..." } }
//! ```
//!
//! `payload_too_large` is `413`; the other input failures (`missing_file`,
//! `unsupported_dialect`, `malformed_config`, `missing_hostname`,
//! `invalid_hostname`, `bad_request`) are `400`; `directory_create_failed`,
//! `write_failed` and `internal` are `500`. The uploaded bytes are never
//! echoed back.
//!
//! # Uploading from a firewall
//!
//! ```bash
//! curl -F "file=@/conf/config.xml" http://backup.example:80/upload
//! ```

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        ConnectInfo, DefaultBodyLimit, Multipart, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use anyhow::Context;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{ErrorKind, IntakeError};
use crate::models::{Dialect, UploadRequest};
use crate::pipeline::IntakePipeline;
use crate::size_guard::SizeGuard;

/// Room for multipart boundaries and part headers on top of the file limit.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<IntakePipeline>,
    /// Name of the multipart field carrying the file.
    field: Arc<str>,
}

/// Builds the router with all routes and layers, without binding a socket.
///
/// The upload handler needs the peer address, so serve the router with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(config: &Config) -> Router {
    let pipeline = IntakePipeline::new(config.max_upload_bytes(), config.storage.root.clone());
    let body_limit = config
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD);

    let state = AppState {
        pipeline: Arc::new(pipeline),
        field: Arc::from(config.upload.field.as_str()),
    };

    Router::new()
        .route("/upload", post(handle_upload))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the backup server.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = build_router(config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!(bind = %config.server.bind, "backup server started");
    tracing::info!(
        max_mb = config.upload.max_mb,
        max_bytes = config.max_upload_bytes(),
        root = %config.storage.root.display(),
        "upload limits"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"malformed_config"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::DirectoryCreateFailed | ErrorKind::WriteFailed => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::MissingFile
        | ErrorKind::UnsupportedDialect
        | ErrorKind::MalformedConfig
        | ErrorKind::MissingHostname
        | ErrorKind::InvalidHostname => StatusCode::BAD_REQUEST,
    }
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        let kind = err.kind();
        AppError {
            status: status_for(kind),
            code: kind.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Multipart failures are client errors, except when the body limit tripped.
fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            code: ErrorKind::PayloadTooLarge.code().to_string(),
            message: err.body_text(),
        }
    } else {
        bad_request(format!("malformed multipart body: {}", err.body_text()))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    status: String,
    message: String,
    client: String,
    hostname: String,
    dialect: Dialect,
    path: String,
}

/// Handler for `POST /upload`.
///
/// Reads the file field with the size limit enforced chunk by chunk, then
/// hands the bytes to the pipeline on the blocking pool.
async fn handle_upload(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let client = client_address(&headers, peer);

    let request = match read_upload(&state, &client, multipart).await {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(client = %client, code = %err.code, error = %err.message, "upload rejected");
            return Err(err);
        }
    };

    let pipeline = state.pipeline.clone();
    let receipt = tokio::task::spawn_blocking(move || pipeline.submit(&request))
        .await
        .map_err(|e| {
            tracing::error!(client = %client, error = %e, "intake task failed");
            internal(format!("intake task failed: {}", e))
        })??;

    Ok(Json(UploadResponse {
        status: "ok".to_string(),
        message: "Backup sent successfully".to_string(),
        client: receipt.client,
        hostname: receipt.record.hostname,
        dialect: receipt.dialect,
        path: receipt.record.path.display().to_string(),
    }))
}

async fn read_upload(
    state: &AppState,
    client: &str,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadRequest, AppError> {
    let multipart =
        multipart.map_err(|e| bad_request(format!("expected multipart/form-data: {}", e.body_text())))?;
    let guard = state.pipeline.size_guard();
    let (payload, declared) = read_file_field(multipart, &state.field, guard).await?;

    let mut request = UploadRequest::new(client, payload);
    if let Some(size) = declared {
        request = request.with_declared_size(size);
    }
    Ok(request)
}

/// Streams the first field named `field_name` into memory, failing as soon
/// as it grows past the guard's limit. Also returns the part's own
/// `Content-Length`, when the client sent one.
async fn read_file_field(
    mut multipart: Multipart,
    field_name: &str,
    guard: SizeGuard,
) -> Result<(Vec<u8>, Option<u64>), AppError> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let declared = field
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        if let Some(size) = declared {
            guard.check(size)?;
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            guard.check((data.len() + chunk.len()) as u64)?;
            data.extend_from_slice(&chunk);
        }
        return Ok((data, declared));
    }

    Err(IntakeError::MissingFile(field_name.to_string()).into())
}

/// First `X-Forwarded-For` hop when present, else the TCP peer's IP.
/// Only ever used for attribution in logs and responses.
fn client_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
