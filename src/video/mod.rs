//! Frame sampling
//!
//! `VideoFeed` holds the most recent camera frame; `FrameSampler` rasterizes
//! and JPEG-encodes it once per capture tick.

pub mod feed;
pub mod sampler;

pub use feed::VideoFeed;
pub use sampler::{FrameSampler, RasterSurface};
