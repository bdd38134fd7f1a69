use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use super::tracks::MediaTracks;

/// Constraints passed to a capture backend when requesting device access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConstraints {
    /// Request a camera track
    pub video: bool,
    /// Request a microphone track
    pub audio: bool,
    /// Preferred capture sample rate (backends may deliver another rate;
    /// the framer resamples downstream)
    pub sample_rate: u32,
    /// Preferred channel count
    pub channels: u16,
}

impl Default for DeviceConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Capture device adapter
///
/// `acquire` is the permission-request point: it either grants a bundle of
/// live tracks or fails (denied, device missing). A failed acquisition must
/// not leave partially-running producers behind.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request device access and start producing media
    async fn acquire(&self, constraints: &DeviceConstraints) -> Result<MediaTracks>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Capture source selection
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Real input device via cpal (microphone only)
    Device { device: Option<String> },
    /// WAV file replayed as the microphone, optional still image as the camera
    File {
        audio_path: PathBuf,
        image_path: Option<PathBuf>,
    },
    /// Generated tone + test pattern (development and tests)
    Synthetic,
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: CaptureSource) -> Result<Arc<dyn CaptureBackend>> {
        match source {
            CaptureSource::Device { device } => {
                Ok(Arc::new(super::device::DeviceBackend::new(device)))
            }
            CaptureSource::File {
                audio_path,
                image_path,
            } => Ok(Arc::new(super::file::FileBackend::new(
                audio_path, image_path,
            ))),
            CaptureSource::Synthetic => Ok(Arc::new(super::synthetic::SyntheticBackend::default())),
        }
    }
}
