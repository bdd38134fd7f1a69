//! Streaming session orchestration
//!
//! This module provides the `Session` abstraction that manages:
//! - Camera/microphone acquisition and the combined media stream
//! - The fixed-rate audio context and processing-unit lifecycle
//! - Periodic frame sampling and outbound chunk forwarding
//! - Realtime client events (readiness, playback, levels, transcription)
//! - Voice reconfiguration and ordered teardown

mod config;
mod session;
mod snapshot;

pub use config::{RecordingSettings, SessionConfig};
pub use session::Session;
pub use snapshot::{ConnectionStatus, SessionSnapshot, TranscriptSegment};
