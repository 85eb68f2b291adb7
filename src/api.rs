//! HTTP control API for the studio.
//!
//! Local-only axum server so other tools can request speech, stop playback
//! and replay history. Listens on 127.0.0.1 (port 8768 by default).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gemini::SynthesisError;
use crate::history::HistoryEntry;
use crate::studio::{Studio, StudioError};
use crate::voice::{Gender, Voice};

#[derive(Clone)]
pub struct ApiState {
    pub studio: Arc<Studio>,
    pub default_voice: Voice,
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct SpeakRequest {
    text: String,
    #[serde(default)]
    voice: Option<Voice>,
}

#[derive(Serialize)]
struct StatusResponse {
    playing: bool,
    generating: bool,
    history_len: usize,
}

#[derive(Serialize)]
struct VoiceInfo {
    id: Voice,
    description: &'static str,
    gender: Gender,
}

#[derive(Serialize)]
struct SimpleResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    code: u16,
}

/// Studio errors rendered as JSON with a matching status code.
pub struct ApiError(StudioError);

impl From<StudioError> for ApiError {
    fn from(err: StudioError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            StudioError::EmptyText | StudioError::TextTooLong { .. } | StudioError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            StudioError::Busy => StatusCode::CONFLICT,
            StudioError::UnknownEntry(_) => StatusCode::NOT_FOUND,
            StudioError::Playback(_) | StudioError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StudioError::Synthesis(e) => match e {
                SynthesisError::ContentBlocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SynthesisError::ServerBusy { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SynthesisError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                SynthesisError::AuthFailed { .. } => StatusCode::UNAUTHORIZED,
                SynthesisError::Unknown { .. } => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("API error: {}", self.0);
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/voices", get(handle_voices))
        .route("/speak", post(handle_speak))
        .route("/stop", post(handle_stop))
        .route("/history", get(handle_history))
        .route("/history/{id}/play", post(handle_replay))
        .with_state(state)
}

/// Serve the API until Ctrl-C.
pub async fn serve(state: ApiState, port: u16) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Studio API listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Shutting down studio API");
        })
        .await
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        playing: state.studio.is_playing(),
        generating: state.studio.is_generating(),
        history_len: state.studio.history().len(),
    })
}

async fn handle_voices() -> Json<Vec<VoiceInfo>> {
    Json(
        Voice::ALL
            .into_iter()
            .map(|v| VoiceInfo {
                id: v,
                description: v.description(),
                gender: v.gender(),
            })
            .collect(),
    )
}

async fn handle_speak(
    State(state): State<ApiState>,
    Json(req): Json<SpeakRequest>,
) -> Result<Json<HistoryEntry>, ApiError> {
    let voice = req.voice.unwrap_or(state.default_voice);
    let entry = state.studio.generate(&req.text, voice).await?;
    Ok(Json(entry))
}

async fn handle_stop(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.studio.stop();
    Json(SimpleResponse {
        status: "stopped",
        id: None,
    })
}

async fn handle_history(State(state): State<ApiState>) -> Json<Vec<HistoryEntry>> {
    Json(state.studio.history())
}

async fn handle_replay(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<SimpleResponse>, ApiError> {
    state.studio.replay(&id)?;
    Ok(Json(SimpleResponse {
        status: "playing",
        id: Some(id),
    }))
}
