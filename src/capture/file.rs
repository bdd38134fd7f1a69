// File capture backend: replays a WAV file as the microphone and an optional
// still image as the camera feed. Intended for development and batch testing
// against recorded input.

use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{CaptureBackend, DeviceConstraints};
use super::tracks::{
    AudioFrame, CameraTrack, MediaTrack, MediaTracks, MicrophoneTrack, TrackKind, VideoFrame,
};

const AUDIO_FRAME_MS: u64 = 100;
const VIDEO_FRAME_MS: u64 = 500;

pub struct FileBackend {
    audio_path: PathBuf,
    image_path: Option<PathBuf>,
}

impl FileBackend {
    pub fn new(audio_path: PathBuf, image_path: Option<PathBuf>) -> Self {
        Self {
            audio_path,
            image_path,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileBackend {
    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<MediaTracks> {
        if !constraints.audio {
            bail!("file capture requires an audio track");
        }

        let reader = WavReader::open(&self.audio_path)
            .with_context(|| format!("failed to open WAV file {}", self.audio_path.display()))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read audio samples")?;

        if samples.is_empty() {
            bail!("WAV file {} contains no samples", self.audio_path.display());
        }

        info!(
            "file capture source: {} ({}Hz, {} channels, {} samples)",
            self.audio_path.display(),
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        // Resolve the camera source up front so a bad video configuration
        // fails before any producer task is running
        let still_image = if constraints.video {
            let image_path = match &self.image_path {
                Some(path) => path.clone(),
                None => bail!("video requested but no camera image configured"),
            };
            let image = image::open(&image_path)
                .with_context(|| format!("failed to open camera image {}", image_path.display()))?
                .to_rgb8();
            Some(image)
        } else {
            None
        };

        let mut bundle = MediaTracks::default();

        // Microphone: loop the file contents in 100ms frames
        {
            let track = MediaTrack::new(TrackKind::Microphone);
            let live = track.liveness();
            let (tx, rx) = mpsc::channel(32);

            let sample_rate = spec.sample_rate;
            let channels = spec.channels;
            let frame_len =
                (sample_rate as u64 * AUDIO_FRAME_MS / 1000) as usize * channels as usize;

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(AUDIO_FRAME_MS));
                let mut cursor = 0usize;
                let mut elapsed_ms: u64 = 0;

                loop {
                    ticker.tick().await;
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    let mut chunk = Vec::with_capacity(frame_len);
                    while chunk.len() < frame_len {
                        let take = (frame_len - chunk.len()).min(samples.len() - cursor);
                        chunk.extend_from_slice(&samples[cursor..cursor + take]);
                        cursor = (cursor + take) % samples.len();
                    }

                    let frame = AudioFrame {
                        samples: chunk,
                        sample_rate,
                        channels,
                        timestamp_ms: elapsed_ms,
                    };
                    elapsed_ms += AUDIO_FRAME_MS;

                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
            });

            bundle.microphone = Some(MicrophoneTrack {
                track,
                samples: Some(rx),
            });
        }

        if let Some(image) = still_image {
            let (width, height) = image.dimensions();
            let pixels = image.into_raw();

            let track = MediaTrack::new(TrackKind::Camera);
            let live = track.liveness();
            let (tx, rx) = mpsc::channel(8);

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(VIDEO_FRAME_MS));
                let mut elapsed_ms: u64 = 0;

                loop {
                    ticker.tick().await;
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    let frame = VideoFrame::new(width, height, pixels.clone(), elapsed_ms);
                    elapsed_ms += VIDEO_FRAME_MS;

                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
            });

            bundle.camera = Some(CameraTrack {
                track,
                frames: Some(rx),
            });
        }

        Ok(bundle)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_test_wav(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..1600i32 {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[tokio::test]
    async fn test_file_backend_replays_wav() {
        let dir = TempDir::new().unwrap();
        let wav = write_test_wav(&dir, "mic.wav");

        let backend = FileBackend::new(wav, None);
        let constraints = DeviceConstraints {
            video: false,
            ..DeviceConstraints::default()
        };

        let mut tracks = backend.acquire(&constraints).await.unwrap();
        let mut mic = tracks.microphone.take().unwrap();
        let frame = mic.samples.as_mut().unwrap().recv().await.unwrap();

        assert_eq!(frame.sample_rate, 16000);
        assert_eq!(frame.channels, 1);
        // 100ms at 16kHz mono
        assert_eq!(frame.samples.len(), 1600);

        mic.track.stop();
    }

    #[tokio::test]
    async fn test_video_without_image_fails() {
        let dir = TempDir::new().unwrap();
        let wav = write_test_wav(&dir, "mic.wav");

        let backend = FileBackend::new(wav, None);
        let result = backend.acquire(&DeviceConstraints::default()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_missing_wav_fails() {
        let backend = FileBackend::new(PathBuf::from("/nonexistent/mic.wav"), None);
        let constraints = DeviceConstraints {
            video: false,
            ..DeviceConstraints::default()
        };

        assert!(backend.acquire(&constraints).await.is_err());
    }
}
