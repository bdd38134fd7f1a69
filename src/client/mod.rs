//! Realtime session client contract
//!
//! The socket protocol to the remote conversational service is an external
//! collaborator: this module defines the interface the orchestrator consumes
//! (construction with event callbacks and a voice configuration, connect /
//! disconnect, outbound media chunks, and in-place voice reconfiguration)
//! without reimplementing the wire protocol. A loopback implementation is
//! provided for tests and local development.

pub mod loopback;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use loopback::{LoopbackClient, LoopbackFactory};

/// Voice configuration: immutable value object, replaced whole on change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub voice_name: String,
    pub model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_name: "default".to_string(),
            model: "default".to_string(),
        }
    }
}

/// Media kind of an outbound chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMime {
    ImageJpeg,
    AudioPcm,
}

impl MediaMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaMime::ImageJpeg => "image/jpeg",
            MediaMime::AudioPcm => "audio/pcm",
        }
    }
}

pub type TranscriptionHandler = Arc<dyn Fn(String) + Send + Sync>;
pub type SetupHandler = Arc<dyn Fn() + Send + Sync>;
pub type PlaybackHandler = Arc<dyn Fn(bool) + Send + Sync>;
pub type LevelHandler = Arc<dyn Fn(u8) + Send + Sync>;

/// The five callbacks a client is constructed with.
///
/// `on_transcription` is the orchestrator's own handler (transcript
/// accumulation); `transcription_consumer` is the externally supplied one.
/// A client invokes both for each transcription event.
#[derive(Clone)]
pub struct ClientHooks {
    pub on_transcription: TranscriptionHandler,
    pub on_setup_complete: SetupHandler,
    /// true while remote synthesized audio is playing back
    pub on_playback_state: PlaybackHandler,
    /// Remote output amplitude, 0-100
    pub on_output_level: LevelHandler,
    pub transcription_consumer: TranscriptionHandler,
}

/// Realtime session client: manages the socket to the remote service
#[async_trait::async_trait]
pub trait RealtimeClient: Send + Sync {
    /// Begin the handshake. Readiness arrives later via `on_setup_complete`.
    async fn connect(&self) -> Result<()>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self) -> Result<()>;

    /// Forward one base64-encoded media chunk
    async fn send_media_chunk(&self, payload: &str, mime: MediaMime) -> Result<()>;

    /// In-place voice reconfiguration of an established connection
    async fn update_voice_config(&self, config: &VoiceConfig) -> Result<()>;
}

/// Constructs one client per session
pub trait RealtimeClientFactory: Send + Sync {
    fn create(&self, hooks: ClientHooks, config: VoiceConfig) -> Result<Arc<dyn RealtimeClient>>;
}
