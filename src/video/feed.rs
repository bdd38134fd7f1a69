use std::sync::{Arc, RwLock};

use crate::capture::VideoFrame;

/// Live video surface: holds the most recent camera frame for sampling.
///
/// Plays the role of the on-screen video element: the camera pump publishes
/// into it, the frame sampler reads whatever is current, and teardown clears
/// it so a stopped session shows nothing.
#[derive(Clone, Default)]
pub struct VideoFeed {
    current: Arc<RwLock<Option<VideoFrame>>>,
}

impl VideoFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: VideoFrame) {
        if let Ok(mut slot) = self.current.write() {
            *slot = Some(frame);
        }
    }

    pub fn current(&self) -> Option<VideoFrame> {
        self.current.read().ok().and_then(|slot| slot.clone())
    }

    /// Live dimensions, (0, 0) when no frame is present
    pub fn dimensions(&self) -> (u32, u32) {
        self.current
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(|f| (f.width, f.height)))
            .unwrap_or((0, 0))
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.current.write() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_starts_empty() {
        let feed = VideoFeed::new();
        assert!(feed.current().is_none());
        assert_eq!(feed.dimensions(), (0, 0));
    }

    #[test]
    fn test_publish_replaces_current() {
        let feed = VideoFeed::new();

        feed.publish(VideoFrame::new(4, 2, vec![0u8; 4 * 2 * 3], 0));
        feed.publish(VideoFrame::new(8, 6, vec![0u8; 8 * 6 * 3], 100));

        let frame = feed.current().unwrap();
        assert_eq!((frame.width, frame.height), (8, 6));
        assert_eq!(feed.dimensions(), (8, 6));
    }

    #[test]
    fn test_clear_empties_feed() {
        let feed = VideoFeed::new();
        feed.publish(VideoFrame::new(4, 4, vec![0u8; 4 * 4 * 3], 0));

        feed.clear();

        assert!(feed.current().is_none());
    }
}
