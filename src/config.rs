use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub realtime: RealtimeConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    /// Capture source: "synthetic", "device", or "file"
    pub source: String,
    /// Input device name filter (device source)
    pub device: Option<String>,
    /// WAV file replayed as the microphone (file source)
    pub audio_path: Option<String>,
    /// Still image replayed as the camera (file source)
    pub image_path: Option<String>,
    /// Request a camera track
    pub video: bool,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeConfig {
    pub voice_name: String,
    pub model: String,
    /// Frame sampling cadence in seconds
    pub frame_interval_secs: u64,
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub output_dir: String,
    pub chunk_duration_secs: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "colloquy")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 3100i64)?
            .set_default("capture.source", "synthetic")?
            .set_default("capture.video", true)?
            .set_default("capture.sample_rate", 16000i64)?
            .set_default("capture.channels", 1i64)?
            .set_default("realtime.voice_name", "default")?
            .set_default("realtime.model", "default")?
            .set_default("realtime.frame_interval_secs", 1i64)?
            .set_default("realtime.jpeg_quality", 70i64)?
            .set_default("recording.enabled", false)?
            .set_default("recording.output_dir", "recordings")?
            .set_default("recording.chunk_duration_secs", 300i64)?
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = Config::load("config/does-not-exist").unwrap();

        assert_eq!(config.service.name, "colloquy");
        assert_eq!(config.service.http.port, 3100);
        assert_eq!(config.capture.source, "synthetic");
        assert_eq!(config.capture.sample_rate, 16000);
        assert_eq!(config.realtime.frame_interval_secs, 1);
        assert!(!config.recording.enabled);
    }
}
