// Microphone capture via cpal.
//
// The cpal stream handle is not Send, so it lives on a dedicated thread that
// holds it until the track's liveness flag clears. Build/play failures are
// reported back to `acquire` through a one-shot channel so the caller sees
// them as an acquisition error rather than a log line.
//
// This backend has no camera device support: requesting video fails the
// acquisition the same way any unavailable device would.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::backend::{CaptureBackend, DeviceConstraints};
use super::tracks::{AudioFrame, MediaTrack, MediaTracks, MicrophoneTrack, TrackKind};

pub struct DeviceBackend {
    /// Substring match against the input device name; default device if None
    device: Option<String>,
}

impl DeviceBackend {
    pub fn new(device: Option<String>) -> Self {
        Self { device }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for DeviceBackend {
    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<MediaTracks> {
        if constraints.video {
            bail!("no camera device is available on this capture backend");
        }
        if !constraints.audio {
            bail!("device capture requires an audio track");
        }

        let track = MediaTrack::new(TrackKind::Microphone);
        let live = track.liveness();
        let (tx, rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        let device_name = self.device.clone();
        let target_rate = constraints.sample_rate;

        std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let outcome = run_capture_stream(device_name, target_rate, tx, &live, ready_tx);
                if let Err(e) = outcome {
                    error!("microphone capture thread failed: {:#}", e);
                }
            })
            .context("failed to spawn microphone capture thread")?;

        // Wait for the stream to come up (or fail) without blocking the runtime
        let build_result = tokio::task::spawn_blocking(move || {
            ready_rx.recv_timeout(Duration::from_secs(5))
        })
        .await
        .context("capture readiness wait was cancelled")?;

        match build_result {
            Ok(Ok(())) => {}
            Ok(Err(message)) => {
                track.stop();
                return Err(anyhow!(message)).context("failed to open microphone device");
            }
            Err(_) => {
                track.stop();
                bail!("timed out waiting for the microphone device to start");
            }
        }

        Ok(MediaTracks {
            camera: None,
            microphone: Some(MicrophoneTrack {
                track,
                samples: Some(rx),
            }),
        })
    }

    fn name(&self) -> &str {
        "device"
    }
}

/// Runs on the dedicated capture thread; owns the cpal stream for its lifetime
fn run_capture_stream(
    device_name: Option<String>,
    target_rate: u32,
    tx: mpsc::Sender<AudioFrame>,
    live: &std::sync::atomic::AtomicBool,
    ready_tx: std::sync::mpsc::Sender<Result<(), String>>,
) -> Result<()> {
    let built = build_stream(device_name, target_rate, tx);

    let stream = match built {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(format!("{e:#}")));
            return Err(e);
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.to_string()));
        return Err(e).context("failed to start input stream");
    }

    let _ = ready_tx.send(Ok(()));

    while live.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
    info!("microphone capture stream closed");
    Ok(())
}

fn build_stream(
    device_name: Option<String>,
    target_rate: u32,
    tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = match &device_name {
        Some(name) => host
            .input_devices()
            .context("failed to enumerate input devices")?
            .find(|d| d.name().map(|n| n.contains(name)).unwrap_or(false))
            .with_context(|| format!("no input device matching '{name}'"))?,
        None => host
            .default_input_device()
            .context("no default input device")?,
    };

    let label = device.name().unwrap_or_else(|_| "unknown".to_string());

    // Prefer the target rate; fall back to whatever the device supports
    // (the framer resamples downstream)
    let mut selected = None;
    for cfg in device
        .supported_input_configs()
        .context("failed to query input configurations")?
    {
        let target = SampleRate(target_rate);
        if cfg.min_sample_rate() <= target && target <= cfg.max_sample_rate() {
            selected = Some(cfg.with_sample_rate(target));
            break;
        }
        if selected.is_none() {
            selected = Some(cfg.with_max_sample_rate());
        }
    }
    let supported = selected.context("no usable input configuration found")?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    info!(
        "using input device '{}' ({} channels @ {} Hz)",
        label, channels, sample_rate
    );

    let config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let started = Instant::now();

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();

                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                };

                // Realtime thread: never block, drop on overflow
                if tx.try_send(frame).is_err() {
                    warn!("audio buffer overflow - dropping samples");
                }
            },
            move |err| {
                error!("audio stream error: {}", err);
            },
            None,
        )
        .context("failed to build input stream")?;

    Ok(stream)
}
