//! Audio pipeline
//!
//! The fixed-rate `AudioContext`, the `AudioFramer` processing unit that
//! produces PCM frames and amplitude levels, and the optional local chunk
//! recorder.

pub mod context;
pub mod framer;
pub mod recorder;

pub use context::{AudioContext, ContextState};
pub use framer::{amplitude_level, AudioFramer, FramerConfig, FramerMessage};
pub use recorder::{ChunkInfo, ChunkRecorder, RecorderConfig};
