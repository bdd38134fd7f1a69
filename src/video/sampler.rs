// Frame sampler: once per tick, rasterize the current video frame into an
// off-screen surface and encode it as JPEG for the outbound chunk sender.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use tracing::trace;

use super::feed::VideoFeed;
use crate::capture::VideoFrame;

/// Off-screen RGB8 raster surface, resized to the live video dimensions
/// before each draw
pub struct RasterSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.pixels = vec![0u8; (width as usize) * (height as usize) * 3];
        }
    }

    /// Copy the frame into the surface, clipped to the surface dimensions
    pub fn draw(&mut self, frame: &VideoFrame) {
        let len = self.pixels.len().min(frame.pixels.len());
        self.pixels[..len].copy_from_slice(&frame.pixels[..len]);
    }

    /// Encode the surface as JPEG at the given quality.
    ///
    /// A degenerate (zero-dimension) surface encodes to an empty payload;
    /// whether that is worth sending is the chunk consumer's concern.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder
            .encode(
                &self.pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .context("JPEG encoding failed")?;

        Ok(buffer.into_inner())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Default for RasterSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic frame sampler
pub struct FrameSampler {
    surface: RasterSurface,
    quality: u8,
}

impl FrameSampler {
    pub fn new(quality: u8) -> Self {
        Self {
            surface: RasterSurface::new(),
            quality,
        }
    }

    /// One sampling tick: resize to the live dimensions, draw the current
    /// frame, encode. An empty feed still goes through the draw call and
    /// yields a degenerate payload.
    pub fn capture(&mut self, feed: &VideoFeed) -> Result<Vec<u8>> {
        let frame = feed.current();
        let (width, height) = frame
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));

        self.surface.resize(width, height);
        if let Some(frame) = &frame {
            self.surface.draw(frame);
        }

        let encoded = self.surface.encode_jpeg(self.quality)?;
        trace!(
            "sampled frame {}x{} -> {} bytes",
            width,
            height,
            encoded.len()
        );
        Ok(encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(width: u32, height: u32) -> VideoFrame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            pixels.push((i % 256) as u8);
            pixels.push(64);
            pixels.push(192);
        }
        VideoFrame::new(width, height, pixels, 0)
    }

    #[test]
    fn test_capture_encodes_jpeg() {
        let feed = VideoFeed::new();
        feed.publish(test_frame(32, 24));

        let mut sampler = FrameSampler::new(70);
        let payload = sampler.capture(&feed).unwrap();

        assert!(!payload.is_empty());
        // JPEG SOI marker
        assert_eq!(&payload[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_capture_empty_feed_yields_degenerate_payload() {
        let feed = VideoFeed::new();
        let mut sampler = FrameSampler::new(70);

        let payload = sampler.capture(&feed).unwrap();

        assert!(payload.is_empty());
    }

    #[test]
    fn test_surface_resizes_to_live_dimensions() {
        let feed = VideoFeed::new();
        let mut sampler = FrameSampler::new(70);

        feed.publish(test_frame(16, 16));
        sampler.capture(&feed).unwrap();
        assert_eq!(sampler.surface.dimensions(), (16, 16));

        feed.publish(test_frame(64, 48));
        sampler.capture(&feed).unwrap();
        assert_eq!(sampler.surface.dimensions(), (64, 48));
    }

    #[test]
    fn test_draw_clips_oversized_frame() {
        let mut surface = RasterSurface::new();
        surface.resize(4, 4);

        // Frame claims 4x4 but carries more pixel data than fits
        let frame = VideoFrame::new(4, 4, vec![7u8; 1024], 0);
        surface.draw(&frame);

        assert_eq!(surface.pixels.len(), 4 * 4 * 3);
        assert!(surface.pixels.iter().all(|&p| p == 7));
    }
}
