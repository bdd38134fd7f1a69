pub mod audio;
pub mod capture;
pub mod client;
pub mod config;
pub mod http;
pub mod session;
pub mod video;

pub use audio::{AudioContext, AudioFramer, ContextState, FramerConfig, FramerMessage};
pub use capture::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureSource, CombinedStream,
    DeviceConstraints, MediaTracks, SyntheticBackend, VideoFrame,
};
pub use client::{
    ClientHooks, LoopbackFactory, MediaMime, RealtimeClient, RealtimeClientFactory, VoiceConfig,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{
    ConnectionStatus, RecordingSettings, Session, SessionConfig, SessionSnapshot, TranscriptSegment,
};
pub use video::{FrameSampler, VideoFeed};
