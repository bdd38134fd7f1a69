// Synthetic capture backend: a generated sine tone stands in for the
// microphone and a moving gradient pattern for the camera. Used by tests and
// local development where no real devices are present.

use anyhow::{bail, Result};
use std::f32::consts::PI;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::{CaptureBackend, DeviceConstraints};
use super::tracks::{
    AudioFrame, CameraTrack, MediaTrack, MediaTracks, MicrophoneTrack, TrackKind, VideoFrame,
};

/// Audio delivered in 100ms frames, video at 5 fps
const AUDIO_FRAME_MS: u64 = 100;
const VIDEO_FRAME_MS: u64 = 200;

pub struct SyntheticBackend {
    /// Native rate the fake microphone produces at (resampled downstream)
    pub sample_rate: u32,
    pub channels: u16,
    /// Tone frequency in Hz
    pub tone_hz: f32,
    /// Tone amplitude, 0.0..=1.0
    pub amplitude: f32,
    pub video_width: u32,
    pub video_height: u32,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            tone_hz: 440.0,
            amplitude: 0.3,
            video_width: 64,
            video_height: 48,
        }
    }
}

impl SyntheticBackend {
    /// Backend producing already-target-format audio (handy in tests that
    /// count samples)
    pub fn mono_16k() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<MediaTracks> {
        if !constraints.audio && !constraints.video {
            bail!("at least one media kind must be requested");
        }

        let mut bundle = MediaTracks::default();

        if constraints.audio {
            let track = MediaTrack::new(TrackKind::Microphone);
            let live = track.liveness();
            let (tx, rx) = mpsc::channel(32);

            let sample_rate = self.sample_rate;
            let channels = self.channels;
            let tone_hz = self.tone_hz;
            let amplitude = self.amplitude;

            tokio::spawn(async move {
                let samples_per_frame = (sample_rate as u64 * AUDIO_FRAME_MS / 1000) as usize;
                let mut ticker = tokio::time::interval(Duration::from_millis(AUDIO_FRAME_MS));
                let mut elapsed_ms: u64 = 0;
                let mut phase: f32 = 0.0;
                let step = 2.0 * PI * tone_hz / sample_rate as f32;

                loop {
                    ticker.tick().await;
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    let mut samples = Vec::with_capacity(samples_per_frame * channels as usize);
                    for _ in 0..samples_per_frame {
                        let value = (phase.sin() * amplitude * i16::MAX as f32) as i16;
                        phase += step;
                        if phase > 2.0 * PI {
                            phase -= 2.0 * PI;
                        }
                        for _ in 0..channels {
                            samples.push(value);
                        }
                    }

                    let frame = AudioFrame {
                        samples,
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

        if constraints.video {
            let track = MediaTrack::new(TrackKind::Camera);
            let live = track.liveness();
            let (tx, rx) = mpsc::channel(8);

            let width = self.video_width;
            let height = self.video_height;

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(VIDEO_FRAME_MS));
                let mut elapsed_ms: u64 = 0;
                let mut shift: u32 = 0;

                loop {
                    ticker.tick().await;
                    if !live.load(Ordering::SeqCst) {
                        break;
                    }

                    let frame = VideoFrame::new(
                        width,
                        height,
                        gradient_pixels(width, height, shift),
                        elapsed_ms,
                    );
                    elapsed_ms += VIDEO_FRAME_MS;
                    shift = shift.wrapping_add(4);

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

        info!(
            "synthetic capture acquired (audio={}, video={})",
            constraints.audio, constraints.video
        );

        Ok(bundle)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Horizontal gradient shifted per frame so successive captures differ
fn gradient_pixels(width: u32, height: u32, shift: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (((x + shift % width.max(1)) % width.max(1)) * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            pixels.push(r);
            pixels.push(g);
            pixels.push(128);
        }
    }
    pixels
}
