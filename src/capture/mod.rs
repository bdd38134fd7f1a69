//! Capture device adapter
//!
//! Owns access to the camera and microphone: the `CaptureBackend` trait is
//! the permission boundary, `MediaTracks` the exclusively-owned track bundle,
//! and `CombinedStream` the merged per-session media stream.

pub mod backend;
pub mod device;
pub mod file;
pub mod stream;
pub mod synthetic;
pub mod tracks;

pub use backend::{CaptureBackend, CaptureBackendFactory, CaptureSource, DeviceConstraints};
pub use stream::CombinedStream;
pub use synthetic::SyntheticBackend;
pub use tracks::{
    AudioFrame, CameraTrack, MediaTrack, MediaTracks, MicrophoneTrack, TrackKind, VideoFrame,
};
