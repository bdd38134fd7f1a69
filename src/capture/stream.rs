// Combined media stream: the single object merging one session's camera and
// microphone tracks. The camera side is pumped into a `VideoFeed` (the live
// video surface the frame sampler reads); the microphone side is held until
// the audio processing unit is installed and takes it.

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::tracks::{AudioFrame, MediaTracks};
use crate::video::VideoFeed;

pub struct CombinedStream {
    feed: VideoFeed,
    microphone: Option<mpsc::Receiver<AudioFrame>>,
    pump: Option<JoinHandle<()>>,
}

impl CombinedStream {
    /// Merge the bundle's tracks into one stream.
    ///
    /// A microphone is required; the camera is optional (audio-only capture
    /// backends), in which case the video feed simply never carries a frame.
    pub fn merge(tracks: &mut MediaTracks) -> Result<Self> {
        let microphone = tracks
            .microphone
            .as_mut()
            .and_then(|m| m.samples.take())
            .context("microphone track has no sample stream")?;

        let feed = VideoFeed::new();

        let pump = match tracks.camera.as_mut().and_then(|c| c.frames.take()) {
            Some(mut frames) => {
                let feed = feed.clone();
                Some(tokio::spawn(async move {
                    while let Some(frame) = frames.recv().await {
                        feed.publish(frame);
                    }
                    debug!("camera pump finished");
                }))
            }
            None => None,
        };

        Ok(Self {
            feed,
            microphone: Some(microphone),
            pump,
        })
    }

    /// Live video surface handle for the frame sampler
    pub fn video_feed(&self) -> VideoFeed {
        self.feed.clone()
    }

    /// Hand the microphone sample stream to the audio processing unit.
    /// Yields once per stream; the unit owns it afterwards.
    pub fn take_microphone(&mut self) -> Option<mpsc::Receiver<AudioFrame>> {
        self.microphone.take()
    }

    /// Stop pumping and clear the video surface
    pub fn shutdown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.microphone = None;
        self.feed.clear();
    }
}

impl Drop for CombinedStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tracks::{CameraTrack, MediaTrack, MicrophoneTrack, TrackKind, VideoFrame};
    use std::time::Duration;

    fn bundle_with_channels() -> (
        MediaTracks,
        mpsc::Sender<AudioFrame>,
        mpsc::Sender<VideoFrame>,
    ) {
        let (audio_tx, audio_rx) = mpsc::channel(4);
        let (video_tx, video_rx) = mpsc::channel(4);

        let tracks = MediaTracks {
            camera: Some(CameraTrack {
                track: MediaTrack::new(TrackKind::Camera),
                frames: Some(video_rx),
            }),
            microphone: Some(MicrophoneTrack {
                track: MediaTrack::new(TrackKind::Microphone),
                samples: Some(audio_rx),
            }),
        };

        (tracks, audio_tx, video_tx)
    }

    #[tokio::test]
    async fn test_merge_pumps_camera_frames_into_feed() {
        let (mut tracks, _audio_tx, video_tx) = bundle_with_channels();
        let stream = CombinedStream::merge(&mut tracks).unwrap();
        let feed = stream.video_feed();

        video_tx
            .send(VideoFrame::new(8, 8, vec![0u8; 8 * 8 * 3], 0))
            .await
            .unwrap();

        // Give the pump task a moment to run
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frame = feed.current().expect("feed should hold the pumped frame");
        assert_eq!(frame.width, 8);
    }

    #[tokio::test]
    async fn test_microphone_taken_once() {
        let (mut tracks, _audio_tx, _video_tx) = bundle_with_channels();
        let mut stream = CombinedStream::merge(&mut tracks).unwrap();

        assert!(stream.take_microphone().is_some());
        assert!(stream.take_microphone().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_clears_feed() {
        let (mut tracks, _audio_tx, video_tx) = bundle_with_channels();
        let mut stream = CombinedStream::merge(&mut tracks).unwrap();
        let feed = stream.video_feed();

        video_tx
            .send(VideoFrame::new(4, 4, vec![0u8; 4 * 4 * 3], 0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(feed.current().is_some());

        stream.shutdown();
        assert!(feed.current().is_none());
    }

    #[tokio::test]
    async fn test_merge_without_microphone_fails() {
        let (mut tracks, _audio_tx, _video_tx) = bundle_with_channels();
        tracks.microphone = None;

        assert!(CombinedStream::merge(&mut tracks).is_err());
    }
}
