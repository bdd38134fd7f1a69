use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of the realtime session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Read-only view of a session for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub status: ConnectionStatus,
    /// Streaming toggle is on
    pub streaming: bool,
    /// Socket handshake complete
    pub connected: bool,
    /// Remote synthesized audio is currently playing back
    pub speaking: bool,
    /// Audio processing unit installed and delivering frames
    pub audio_ready: bool,
    /// Local input amplitude, 0-100
    pub input_level: u8,
    /// Remote output amplitude, 0-100
    pub output_level: u8,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub transcript_segments: usize,
}

/// One received transcription fragment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ConnectionStatus::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
    }
}
