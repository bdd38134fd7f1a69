use super::state::AppState;
use crate::client::VoiceConfig;
use crate::session::{SessionSnapshot, TranscriptSegment};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub session_id: String,
    pub status: String,
    pub message: String,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct VoiceConfigRequest {
    pub voice_name: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/start
/// Toggle streaming on
pub async fn start_session(State(state): State<AppState>) -> impl IntoResponse {
    if state.session.is_streaming() {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "session is already streaming".to_string(),
            }),
        )
            .into_response();
    }

    match state.session.start().await {
        Ok(()) => {
            let snapshot = state.session.snapshot();
            info!("session started via control API");
            (
                StatusCode::OK,
                Json(ToggleResponse {
                    session_id: snapshot.session_id.clone(),
                    status: "streaming".to_string(),
                    message: "session started".to_string(),
                    snapshot,
                }),
            )
                .into_response()
        }
        Err(e) => {
            error!("failed to start session: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("failed to start session: {e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/stop
/// Toggle streaming off
pub async fn stop_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.stop().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(ToggleResponse {
                session_id: snapshot.session_id.clone(),
                status: "stopped".to_string(),
                message: "session stopped".to_string(),
                snapshot,
            }),
        )
            .into_response(),
        Err(e) => {
            error!("failed to stop session: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("failed to stop session: {e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.snapshot())).into_response()
}

/// GET /session/transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    let transcript: Vec<TranscriptSegment> = state.session.transcript();
    (StatusCode::OK, Json(transcript)).into_response()
}

/// PUT /session/voice
/// Commit a staged voice configuration. Refused while connected: changing a
/// live session requires the explicit live-update route.
pub async fn set_voice(
    State(state): State<AppState>,
    Json(req): Json<VoiceConfigRequest>,
) -> impl IntoResponse {
    let voice = VoiceConfig {
        voice_name: req.voice_name,
        model: req.model,
    };

    match state.session.set_voice_config(voice) {
        Ok(()) => (StatusCode::OK, Json(state.session.snapshot())).into_response(),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("{e:#}"),
            }),
        )
            .into_response(),
    }
}

/// PUT /session/voice/live
/// Explicit in-place reconfiguration of a connected session
pub async fn set_voice_live(
    State(state): State<AppState>,
    Json(req): Json<VoiceConfigRequest>,
) -> impl IntoResponse {
    let voice = VoiceConfig {
        voice_name: req.voice_name,
        model: req.model,
    };

    match state.session.update_voice_live(voice).await {
        Ok(()) => (StatusCode::OK, Json(state.session.snapshot())).into_response(),
        Err(e) => {
            error!("live voice update failed: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("{e:#}"),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
