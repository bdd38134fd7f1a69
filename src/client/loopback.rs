// Loopback client: an in-process stand-in for the real protocol client.
// Completes the handshake immediately after connect and counts the chunks it
// receives. Lets the orchestrator, control API, and tests run without a
// remote service.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{ClientHooks, MediaMime, RealtimeClient, RealtimeClientFactory, VoiceConfig};

pub struct LoopbackClient {
    hooks: ClientHooks,
    voice: Mutex<VoiceConfig>,
    connected: AtomicBool,
    audio_chunks: AtomicUsize,
    image_chunks: AtomicUsize,
}

impl LoopbackClient {
    pub fn new(hooks: ClientHooks, voice: VoiceConfig) -> Self {
        Self {
            hooks,
            voice: Mutex::new(voice),
            connected: AtomicBool::new(false),
            audio_chunks: AtomicUsize::new(0),
            image_chunks: AtomicUsize::new(0),
        }
    }

    pub fn audio_chunks(&self) -> usize {
        self.audio_chunks.load(Ordering::SeqCst)
    }

    pub fn image_chunks(&self) -> usize {
        self.image_chunks.load(Ordering::SeqCst)
    }

    pub fn voice(&self) -> VoiceConfig {
        self.voice.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl RealtimeClient for LoopbackClient {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);

        // Handshake completes on the next scheduler hop
        tokio::task::yield_now().await;
        (self.hooks.on_setup_complete)();

        debug!("loopback client connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            debug!(
                "loopback client disconnected ({} audio, {} image chunks seen)",
                self.audio_chunks(),
                self.image_chunks()
            );
        }
        Ok(())
    }

    async fn send_media_chunk(&self, payload: &str, mime: MediaMime) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        match mime {
            MediaMime::AudioPcm => self.audio_chunks.fetch_add(1, Ordering::SeqCst),
            MediaMime::ImageJpeg => self.image_chunks.fetch_add(1, Ordering::SeqCst),
        };

        debug!("loopback chunk: {} ({} bytes b64)", mime.as_str(), payload.len());
        Ok(())
    }

    async fn update_voice_config(&self, config: &VoiceConfig) -> Result<()> {
        *self.voice.lock().unwrap_or_else(|e| e.into_inner()) = config.clone();
        debug!(
            "loopback voice updated: {} / {}",
            config.voice_name, config.model
        );
        Ok(())
    }
}

/// Factory producing loopback clients
#[derive(Default)]
pub struct LoopbackFactory;

impl RealtimeClientFactory for LoopbackFactory {
    fn create(&self, hooks: ClientHooks, config: VoiceConfig) -> Result<Arc<dyn RealtimeClient>> {
        Ok(Arc::new(LoopbackClient::new(hooks, config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop_hooks() -> (ClientHooks, Arc<AtomicUsize>) {
        let setup_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&setup_count);

        let hooks = ClientHooks {
            on_transcription: Arc::new(|_| {}),
            on_setup_complete: Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            on_playback_state: Arc::new(|_| {}),
            on_output_level: Arc::new(|_| {}),
            transcription_consumer: Arc::new(|_| {}),
        };

        (hooks, setup_count)
    }

    #[tokio::test]
    async fn test_connect_fires_setup_complete() {
        let (hooks, setup_count) = noop_hooks();
        let client = LoopbackClient::new(hooks, VoiceConfig::default());

        client.connect().await.unwrap();

        assert_eq!(setup_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chunks_ignored_when_disconnected() {
        let (hooks, _) = noop_hooks();
        let client = LoopbackClient::new(hooks, VoiceConfig::default());

        client.send_media_chunk("abcd", MediaMime::AudioPcm).await.unwrap();
        assert_eq!(client.audio_chunks(), 0);

        client.connect().await.unwrap();
        client.send_media_chunk("abcd", MediaMime::AudioPcm).await.unwrap();
        assert_eq!(client.audio_chunks(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (hooks, _) = noop_hooks();
        let client = LoopbackClient::new(hooks, VoiceConfig::default());

        client.connect().await.unwrap();
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_voice_update_replaces_config() {
        let (hooks, _) = noop_hooks();
        let client = LoopbackClient::new(hooks, VoiceConfig::default());

        let next = VoiceConfig {
            voice_name: "aria".into(),
            model: "fast".into(),
        };
        client.update_voice_config(&next).await.unwrap();

        assert_eq!(client.voice(), next);
    }
}
