// Audio framer: the background processing unit that turns raw microphone
// input into fixed-size 16kHz mono PCM frames plus a running amplitude
// level, delivered push-style over a channel.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::context::{AudioContext, ContextState};
use crate::capture::AudioFrame;

/// Framer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramerConfig {
    /// Samples per delivered PCM frame
    pub frame_samples: usize,
    /// Output sample rate (input is decimated down to this)
    pub target_sample_rate: u32,
    /// Output channel count (1 = mono)
    pub target_channels: u16,
    /// Delivery channel capacity
    pub channel_capacity: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            frame_samples: 2048,
            target_sample_rate: 16000,
            target_channels: 1,
            channel_capacity: 32,
        }
    }
}

/// One delivered processing-unit message: a raw PCM byte frame and the
/// amplitude level (0-100) measured over it
#[derive(Debug, Clone)]
pub struct FramerMessage {
    /// Little-endian i16 PCM bytes, `frame_samples * 2` long
    pub pcm: Vec<u8>,
    /// Peak amplitude, 0-100
    pub level: u8,
}

/// Installed audio processing unit.
///
/// `install` is the asynchronous module-load step: it validates the context,
/// takes ownership of the microphone sample stream, and starts the framing
/// worker. `teardown` disconnects the unit; frames stop immediately.
pub struct AudioFramer {
    worker: JoinHandle<()>,
}

impl AudioFramer {
    pub async fn install(
        context: &AudioContext,
        source: mpsc::Receiver<AudioFrame>,
        config: FramerConfig,
    ) -> Result<(Self, mpsc::Receiver<FramerMessage>)> {
        if context.state() != ContextState::Running {
            bail!(
                "audio module installation requires a running context (state: {:?})",
                context.state()
            );
        }
        if config.frame_samples == 0 {
            bail!("frame size must be non-zero");
        }
        if context.sample_rate() != config.target_sample_rate {
            bail!(
                "context rate {} does not match framer target {}",
                context.sample_rate(),
                config.target_sample_rate
            );
        }

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let worker = tokio::spawn(frame_worker(source, tx, config.clone()));

        debug!(
            "audio framer installed ({} samples/frame @ {} Hz)",
            config.frame_samples, config.target_sample_rate
        );

        Ok((Self { worker }, rx))
    }

    /// Disconnect the processing unit
    pub fn teardown(self) {
        self.worker.abort();
        debug!("audio framer torn down");
    }
}

async fn frame_worker(
    mut source: mpsc::Receiver<AudioFrame>,
    tx: mpsc::Sender<FramerMessage>,
    config: FramerConfig,
) {
    let mut pending: Vec<i16> = Vec::with_capacity(config.frame_samples * 2);

    while let Some(frame) = source.recv().await {
        let frame = conform(frame, config.target_sample_rate, config.target_channels);
        pending.extend_from_slice(&frame.samples);

        while pending.len() >= config.frame_samples {
            let chunk: Vec<i16> = pending.drain(..config.frame_samples).collect();
            let level = amplitude_level(&chunk);
            let pcm: Vec<u8> = chunk.iter().flat_map(|s| s.to_le_bytes()).collect();

            if tx.send(FramerMessage { pcm, level }).await.is_err() {
                // Receiver gone: unit was disconnected
                return;
            }
        }
    }
    // Source closed; a partial trailing frame is dropped rather than padded
}

/// Bring a raw frame to the target rate and channel count
fn conform(frame: AudioFrame, target_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.sample_rate != target_rate {
        processed = decimate(processed, target_rate);
    }

    if processed.channels != target_channels && target_channels == 1 {
        processed = to_mono(processed);
    }

    processed
}

/// Downsample by decimation: take every Nth sample. Upsampling is not
/// supported; frames already at or below the target rate pass through.
fn decimate(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if frame.sample_rate == target_rate {
        return frame;
    }

    let ratio = frame.sample_rate / target_rate;
    if ratio <= 1 {
        return frame;
    }

    let channels = frame.channels as usize;
    let decimated: Vec<i16> = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio as usize)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples: decimated,
        sample_rate: target_rate,
        channels: frame.channels,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Collapse interleaved stereo to mono by summing channels with clipping
fn to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels == 1 {
        return frame;
    }

    if frame.channels != 2 {
        // Only stereo collapse is supported; pass other layouts through
        return frame;
    }

    let mut mono = Vec::with_capacity(frame.samples.len() / 2);
    for pair in frame.samples.chunks_exact(2) {
        let sum = pair[0] as i32 + pair[1] as i32;
        mono.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    AudioFrame {
        samples: mono,
        sample_rate: frame.sample_rate,
        channels: 1,
        timestamp_ms: frame.timestamp_ms,
    }
}

/// Peak amplitude mapped to 0-100
pub fn amplitude_level(samples: &[i16]) -> u8 {
    let peak = samples
        .iter()
        .map(|s| (*s as i32).unsigned_abs())
        .max()
        .unwrap_or(0);

    ((peak as f32 / i16::MAX as f32) * 100.0).round().min(100.0) as u8
}

/// Decode a little-endian PCM byte frame back to samples (used by the local
/// chunk recorder)
pub fn pcm_to_samples(pcm: &[u8]) -> Result<Vec<i16>> {
    if pcm.len() % 2 != 0 {
        bail!("PCM byte buffer has odd length {}", pcm.len());
    }
    pcm.chunks_exact(2)
        .map(|pair| {
            Ok(i16::from_le_bytes(
                pair.try_into().context("malformed PCM pair")?,
            ))
        })
        .collect()
}
