//! HTTP Endpoints

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{ErrorKind, NarrateError};
use crate::models::TtsForm;
use crate::server::state::AppState;

const OUTPUT_FILENAME: &str = "speech.wav";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.narrator.config().server.max_upload_bytes;

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/engines", get(list_engines))
        .route("/api/tts", post(narrate))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Failure of a request handler
#[derive(Debug)]
pub enum ApiError {
    Narrate(NarrateError),
    Upload(MultipartError),
}

impl From<NarrateError> for ApiError {
    fn from(err: NarrateError) -> Self {
        ApiError::Narrate(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::BackendConstruction => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Synthesis | ErrorKind::Concatenation | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Narrate(err) => (status_for(err.kind()), err.to_string()),
            ApiError::Upload(err) => (err.status(), err.body_text()),
        };

        if status.is_server_error() {
            error!("Request failed ({}): {}", status, detail);
        } else {
            warn!("Request rejected ({}): {}", status, detail);
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Engine usability, constructing engines on demand
async fn list_engines(State(state): State<AppState>) -> Json<serde_json::Value> {
    let engines = state.narrator.engine_statuses().await;
    Json(json!({ "engines": engines }))
}

/// Narrate the submitted text into a WAV attachment
async fn narrate(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let request = form.into_request(&state.narrator.config().defaults)?;

    let audio = state.narrator.narrate(request).await?;
    info!(
        "Serving {} ({:.2}s, {} fragment(s))",
        OUTPUT_FILENAME,
        audio.duration().as_secs_f64(),
        audio.fragment_count()
    );
    let bytes = audio.into_bytes().await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", OUTPUT_FILENAME),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn read_form(mut multipart: Multipart) -> Result<TtsForm, ApiError> {
    let mut form = TtsForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "reference" {
            form.reference = Some(field.bytes().await?);
            continue;
        }

        let slot = match name.as_str() {
            "text" => &mut form.text,
            "language" => &mut form.language,
            "engine" => &mut form.engine,
            "seed" => &mut form.seed,
            "speed" => &mut form.speed,
            "max_chars" => &mut form.max_chars,
            "pause_ms" => &mut form.pause_ms,
            "split_strategy" => &mut form.split_strategy,
            "transcript" => &mut form.transcript,
            "consent" => &mut form.consent,
            other => {
                debug!("Ignoring unknown form field '{}'", other);
                continue;
            }
        };
        *slot = Some(field.text().await?);
    }

    Ok(form)
}
