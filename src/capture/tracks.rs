use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// One raw RGB8 frame from the camera
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixel data, `width * height * 3` bytes
    pub pixels: Vec<u8>,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, timestamp_ms: u64) -> Self {
        Self {
            width,
            height,
            pixels,
            timestamp_ms,
        }
    }
}

/// Media track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Camera,
    Microphone,
}

/// A live media track handle.
///
/// The producer side (a capture backend task or thread) checks the shared
/// liveness flag and winds down once the track is stopped. Stopping is
/// idempotent; dropping the handle stops the track as a guard.
#[derive(Debug)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Shared liveness flag for the producer side
    pub fn liveness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.live)
    }

    /// Stop the track. The producer observes the flag and stops delivering.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!("stopped {:?} track {}", self.kind, self.id);
        }
    }
}

impl Drop for MediaTrack {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Camera track: handle plus the frame stream it produces
#[derive(Debug)]
pub struct CameraTrack {
    pub track: MediaTrack,
    pub frames: Option<mpsc::Receiver<VideoFrame>>,
}

/// Microphone track: handle plus the sample stream it produces
#[derive(Debug)]
pub struct MicrophoneTrack {
    pub track: MediaTrack,
    pub samples: Option<mpsc::Receiver<AudioFrame>>,
}

/// Ownership bundle for the camera + microphone tracks of one session.
///
/// Exclusively owned by the session; never shared beyond it. All tracks are
/// stopped on session end, and again on drop as a guard.
#[derive(Debug, Default)]
pub struct MediaTracks {
    pub camera: Option<CameraTrack>,
    pub microphone: Option<MicrophoneTrack>,
}

impl MediaTracks {
    /// Stop every track in the bundle (idempotent)
    pub fn stop_all(&self) {
        if let Some(camera) = &self.camera {
            camera.track.stop();
        }
        if let Some(microphone) = &self.microphone {
            microphone.track.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_stop_is_idempotent() {
        let track = MediaTrack::new(TrackKind::Microphone);
        assert!(track.is_live());

        track.stop();
        assert!(!track.is_live());

        track.stop();
        assert!(!track.is_live());
    }

    #[test]
    fn test_stop_all_stops_both_tracks() {
        let camera = CameraTrack {
            track: MediaTrack::new(TrackKind::Camera),
            frames: None,
        };
        let microphone = MicrophoneTrack {
            track: MediaTrack::new(TrackKind::Microphone),
            samples: None,
        };

        let bundle = MediaTracks {
            camera: Some(camera),
            microphone: Some(microphone),
        };

        bundle.stop_all();

        assert!(!bundle.camera.as_ref().unwrap().track.is_live());
        assert!(!bundle.microphone.as_ref().unwrap().track.is_live());
    }

    #[test]
    fn test_liveness_flag_shared_with_producer() {
        let track = MediaTrack::new(TrackKind::Camera);
        let producer_view = track.liveness();

        assert!(producer_view.load(Ordering::SeqCst));
        track.stop();
        assert!(!producer_view.load(Ordering::SeqCst));
    }
}
