// Local chunked recording of the outbound microphone audio. Frames delivered
// by the framer are appended to fixed-duration WAV chunks on disk, rotating
// as each chunk fills. Runs as a tee off the streaming path and never blocks
// it.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::framer::{pcm_to_samples, FramerMessage};

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Duration of each chunk before rotating files
    pub chunk_duration: Duration,
    /// Output directory for chunk files
    pub output_dir: PathBuf,
    /// Session ID used in chunk filenames
    pub session_id: String,
    /// Recorded sample rate (matches the framer output)
    pub sample_rate: u32,
    pub channels: u16,
}

/// Metadata for one finished chunk
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    pub index: usize,
    pub path: PathBuf,
    /// Stream position at which the chunk starts, in milliseconds
    pub start_ms: u64,
    pub end_ms: u64,
    pub sample_count: usize,
}

/// Chunked WAV recorder
pub struct ChunkRecorder {
    config: RecorderConfig,
    current: Option<ChunkWriter>,
    next_index: usize,
    /// Total samples written, across all chunks
    samples_written: u64,
}

impl ChunkRecorder {
    pub fn new(config: RecorderConfig) -> Result<Self> {
        fs::create_dir_all(&config.output_dir).context("failed to create recording directory")?;

        info!(
            "chunk recorder initialized: {} ({}s chunks)",
            config.session_id,
            config.chunk_duration.as_secs()
        );

        Ok(Self {
            config,
            current: None,
            next_index: 0,
            samples_written: 0,
        })
    }

    /// Consume framer messages until the channel closes, returning the
    /// metadata of every chunk written
    pub async fn run(mut self, mut rx: mpsc::Receiver<FramerMessage>) -> Result<Vec<ChunkInfo>> {
        let mut chunks = Vec::new();

        while let Some(message) = rx.recv().await {
            let samples = match pcm_to_samples(&message.pcm) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("skipping malformed PCM frame: {e:#}");
                    continue;
                }
            };

            if self.needs_rotation() {
                if let Some(writer) = self.current.take() {
                    chunks.push(writer.finish()?);
                }
                self.current = Some(self.open_chunk()?);
            }

            if let Some(writer) = &mut self.current {
                writer.append(&samples)?;
            }
            self.samples_written += samples.len() as u64;
        }

        if let Some(writer) = self.current.take() {
            chunks.push(writer.finish()?);
        }

        info!("recording complete: {} chunks saved", chunks.len());

        Ok(chunks)
    }

    fn position_ms(&self) -> u64 {
        self.samples_written * 1000 / (self.config.sample_rate as u64 * self.config.channels as u64)
    }

    fn needs_rotation(&self) -> bool {
        match &self.current {
            None => true,
            Some(writer) => {
                let elapsed = self.position_ms().saturating_sub(writer.info.start_ms);
                elapsed >= self.config.chunk_duration.as_millis() as u64
            }
        }
    }

    fn open_chunk(&mut self) -> Result<ChunkWriter> {
        let path = self.config.output_dir.join(format!(
            "{}-chunk-{:03}.wav",
            self.config.session_id, self.next_index
        ));

        let writer = ChunkWriter::create(
            path,
            self.next_index,
            self.position_ms(),
            self.config.sample_rate,
            self.config.channels,
        )?;

        self.next_index += 1;
        Ok(writer)
    }
}

struct ChunkWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    info: ChunkInfo,
    sample_rate: u32,
    channels: u16,
}

impl ChunkWriter {
    fn create(
        path: PathBuf,
        index: usize,
        start_ms: u64,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("failed to create WAV file {}", path.display()))?;

        Ok(Self {
            writer: Some(writer),
            info: ChunkInfo {
                index,
                path,
                start_ms,
                end_ms: start_ms,
                sample_count: 0,
            },
            sample_rate,
            channels,
        })
    }

    fn append(&mut self, samples: &[i16]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .context("failed to write sample")?;
            }
            self.info.sample_count += samples.len();
            self.info.end_ms = self.info.start_ms
                + self.info.sample_count as u64 * 1000
                    / (self.sample_rate as u64 * self.channels as u64);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ChunkInfo> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("failed to finalize WAV file")?;
        }
        info!(
            "chunk {} complete: {:.1}s - {:.1}s ({} samples)",
            self.info.index,
            self.info.start_ms as f64 / 1000.0,
            self.info.end_ms as f64 / 1000.0,
            self.info.sample_count
        );
        Ok(self.info.clone())
    }
}

impl Drop for ChunkWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
