// Integration tests for local chunked recording: framer messages are split
// into fixed-duration WAV chunks on disk.

use anyhow::Result;
use colloquy::audio::{ChunkRecorder, FramerMessage, RecorderConfig};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn pcm_message(samples: &[i16]) -> FramerMessage {
    FramerMessage {
        pcm: samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
        level: 0,
    }
}

fn recorder_config(dir: &TempDir, session_id: &str, chunk_secs: u64) -> RecorderConfig {
    RecorderConfig {
        chunk_duration: Duration::from_secs(chunk_secs),
        output_dir: dir.path().to_path_buf(),
        session_id: session_id.to_string(),
        sample_rate: 16000,
        channels: 1,
    }
}

#[tokio::test]
async fn test_recording_creates_single_chunk() -> Result<()> {
    let dir = TempDir::new()?;
    let recorder = ChunkRecorder::new(recorder_config(&dir, "single", 10))?;

    let (tx, rx) = mpsc::channel(100);
    let handle = tokio::spawn(recorder.run(rx));

    // 5 seconds of audio in 100ms frames (16kHz mono)
    let frame = vec![0i16; 1600];
    for _ in 0..50 {
        tx.send(pcm_message(&frame)).await?;
    }
    drop(tx);

    let chunks = handle.await??;

    assert_eq!(chunks.len(), 1, "5s of audio fits one 10s chunk");
    let chunk = &chunks[0];
    assert_eq!(chunk.index, 0);
    assert_eq!(chunk.start_ms, 0);
    assert_eq!(chunk.end_ms, 5000);
    assert_eq!(chunk.sample_count, 1600 * 50);

    assert!(chunk.path.exists());
    assert!(chunk
        .path
        .to_string_lossy()
        .contains("single-chunk-000.wav"));
    assert!(fs::metadata(&chunk.path)?.len() > 0);

    Ok(())
}

#[tokio::test]
async fn test_recording_rotates_chunks() -> Result<()> {
    let dir = TempDir::new()?;
    let recorder = ChunkRecorder::new(recorder_config(&dir, "rotating", 2))?;

    let (tx, rx) = mpsc::channel(100);
    let handle = tokio::spawn(recorder.run(rx));

    // 5 seconds of audio with 2s chunks -> [0-2s], [2-4s], [4-5s]
    let frame = vec![100i16; 1600];
    for _ in 0..50 {
        tx.send(pcm_message(&frame)).await?;
    }
    drop(tx);

    let chunks = handle.await??;

    assert_eq!(chunks.len(), 3);

    assert_eq!(chunks[0].start_ms, 0);
    assert_eq!(chunks[0].end_ms, 2000);
    assert_eq!(chunks[1].start_ms, 2000);
    assert_eq!(chunks[1].end_ms, 4000);
    assert_eq!(chunks[2].start_ms, 4000);
    assert_eq!(chunks[2].end_ms, 5000);

    for chunk in &chunks {
        assert!(chunk.path.exists(), "chunk {} file missing", chunk.index);
    }

    Ok(())
}

#[tokio::test]
async fn test_recording_empty_input_writes_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let recorder = ChunkRecorder::new(recorder_config(&dir, "empty", 5))?;

    let (tx, rx) = mpsc::channel::<FramerMessage>(4);
    drop(tx);

    let chunks = recorder.run(rx).await?;

    assert!(chunks.is_empty());
    assert_eq!(fs::read_dir(dir.path())?.count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_recording_skips_malformed_frames() -> Result<()> {
    let dir = TempDir::new()?;
    let recorder = ChunkRecorder::new(recorder_config(&dir, "malformed", 10))?;

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(recorder.run(rx));

    // Odd byte count cannot decode to i16 samples; it is skipped
    tx.send(FramerMessage {
        pcm: vec![1, 2, 3],
        level: 0,
    })
    .await?;
    tx.send(pcm_message(&vec![7i16; 1600])).await?;
    drop(tx);

    let chunks = handle.await??;

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].sample_count, 1600);

    Ok(())
}

#[tokio::test]
async fn test_recorded_wav_round_trips() -> Result<()> {
    let dir = TempDir::new()?;
    let recorder = ChunkRecorder::new(recorder_config(&dir, "roundtrip", 10))?;

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(recorder.run(rx));

    let samples: Vec<i16> = (0..1600).map(|i| (i % 255) as i16).collect();
    tx.send(pcm_message(&samples)).await?;
    drop(tx);

    let chunks = handle.await??;
    assert_eq!(chunks.len(), 1);

    let reader = hound::WavReader::open(&chunks[0].path)?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);

    let read_back: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(read_back, samples);

    Ok(())
}
