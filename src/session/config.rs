use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::FramerConfig;
use crate::capture::DeviceConstraints;
use crate::client::VoiceConfig;

/// Configuration for a streaming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Media constraints passed to the capture backend
    pub constraints: DeviceConstraints,

    /// Audio context rate; the whole audio path is pinned to this (16 kHz)
    pub context_sample_rate: u32,

    /// Audio processing unit configuration
    pub framer: FramerConfig,

    /// Frame sampling cadence (1 second)
    pub frame_interval: Duration,

    /// JPEG quality for sampled frames
    pub jpeg_quality: u8,

    /// Initial voice configuration
    pub voice: VoiceConfig,

    /// Optional local recording of the outbound audio
    pub recording: Option<RecordingSettings>,
}

/// Local chunk-recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    pub chunk_duration: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            constraints: DeviceConstraints::default(),
            context_sample_rate: 16000,
            framer: FramerConfig::default(),
            frame_interval: Duration::from_secs(1),
            jpeg_quality: 70,
            voice: VoiceConfig::default(),
            recording: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pins_16khz() {
        let config = SessionConfig::default();

        assert_eq!(config.context_sample_rate, 16000);
        assert_eq!(config.framer.target_sample_rate, 16000);
        assert_eq!(config.framer.target_channels, 1);
        assert_eq!(config.frame_interval, Duration::from_secs(1));
        assert!(config.recording.is_none());
    }
}
