//! HTTP control API
//!
//! The presentation layer's entry point into the orchestrator:
//! - POST /session/start - toggle streaming on
//! - POST /session/stop - toggle streaming off
//! - GET /session/status - read-only session snapshot
//! - GET /session/transcript - accumulated transcription
//! - PUT /session/voice - commit staged voice configuration (409 while connected)
//! - PUT /session/voice/live - explicit in-place reconfiguration
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
