use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::snapshot::{ConnectionStatus, SessionSnapshot, TranscriptSegment};
use crate::audio::{
    AudioContext, AudioFramer, ChunkRecorder, ContextState, FramerMessage, RecorderConfig,
};
use crate::capture::{CaptureBackend, CombinedStream, MediaTracks};
use crate::client::{
    ClientHooks, MediaMime, RealtimeClient, RealtimeClientFactory, TranscriptionHandler,
    VoiceConfig,
};
use crate::video::FrameSampler;

/// A streaming session tying capture, audio framing, frame sampling, and the
/// realtime client together.
///
/// One session covers one start/stop cycle of the streaming toggle. The
/// session exclusively owns its media tracks, audio context, and processing
/// unit; stopping (or dropping) the session releases all of them.
pub struct Session {
    config: SessionConfig,
    capture: Arc<dyn CaptureBackend>,
    client_factory: Arc<dyn RealtimeClientFactory>,
    shared: Arc<Shared>,
    runtime: Arc<AsyncMutex<Option<Runtime>>>,
}

/// State visible to the session's background tasks and client callbacks
struct Shared {
    session_id: String,
    /// Bumped on every start and stop so completions from a superseded run
    /// are provably stale
    generation: AtomicU64,
    streaming: AtomicBool,
    socket_ready: AtomicBool,
    speaking: AtomicBool,
    audio_ready: AtomicBool,
    /// Single-flight latch for audio setup
    audio_setup_busy: AtomicBool,
    input_level: AtomicU8,
    output_level: AtomicU8,
    status: Mutex<ConnectionStatus>,
    voice: Mutex<VoiceConfig>,
    started_at: Mutex<chrono::DateTime<Utc>>,
    /// Live client instance; chunk sends are silent no-ops once this is empty
    client: RwLock<Option<Arc<dyn RealtimeClient>>>,
    transcript: Mutex<Vec<TranscriptSegment>>,
    consumer: TranscriptionHandler,
}

impl Shared {
    /// A task belongs to the current run iff its generation still matches
    /// and streaming has not been toggled off
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && self.streaming.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: ConnectionStatus) {
        let mut slot = self.status.lock().unwrap_or_else(|e| e.into_inner());
        if *slot != status {
            debug!("session {} status: {:?}", self.session_id, status);
            *slot = status;
        }
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Resources owned by an active run
struct Runtime {
    tracks: MediaTracks,
    context: Arc<AudioContext>,
    stream: CombinedStream,
    framer: Option<AudioFramer>,
    framer_task: Option<JoinHandle<()>>,
    sampler_task: Option<JoinHandle<()>>,
    event_task: Option<JoinHandle<()>>,
    recorder_tx: Option<mpsc::Sender<FramerMessage>>,
    recorder_task: Option<JoinHandle<Result<Vec<crate::audio::ChunkInfo>>>>,
}

impl Runtime {
    fn abort_tasks(&mut self) {
        for task in [
            self.sampler_task.take(),
            self.framer_task.take(),
            self.event_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
        if let Some(framer) = self.framer.take() {
            framer.teardown();
        }
    }
}

/// Events raised by the realtime client hooks
enum ClientEvent {
    SetupComplete,
    Playback(bool),
    OutputLevel(u8),
    Transcription(String),
}

impl Session {
    pub fn new(
        config: SessionConfig,
        capture: Arc<dyn CaptureBackend>,
        client_factory: Arc<dyn RealtimeClientFactory>,
        consumer: TranscriptionHandler,
    ) -> Self {
        let shared = Arc::new(Shared {
            session_id: config.session_id.clone(),
            generation: AtomicU64::new(0),
            streaming: AtomicBool::new(false),
            socket_ready: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            audio_ready: AtomicBool::new(false),
            audio_setup_busy: AtomicBool::new(false),
            input_level: AtomicU8::new(0),
            output_level: AtomicU8::new(0),
            status: Mutex::new(ConnectionStatus::Disconnected),
            voice: Mutex::new(config.voice.clone()),
            started_at: Mutex::new(Utc::now()),
            client: RwLock::new(None),
            transcript: Mutex::new(Vec::new()),
            consumer,
        });

        Self {
            config,
            capture,
            client_factory,
            shared,
            runtime: Arc::new(AsyncMutex::new(None)),
        }
    }

    /// Start streaming: acquire devices, open the realtime connection, and
    /// (once the handshake completes) begin sampling and audio framing.
    ///
    /// Acquisition or connection failure aborts the start, releases any
    /// partially-acquired resources, and leaves the session idle. Failures
    /// are reported once; nothing is retried automatically.
    pub async fn start(&self) -> Result<()> {
        if self.shared.streaming.swap(true, Ordering::SeqCst) {
            warn!("session {} is already streaming", self.config.session_id);
            return Ok(());
        }

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.set_status(ConnectionStatus::Connecting);
        *self
            .shared
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Utc::now();

        info!(
            "starting session {} (capture: {})",
            self.config.session_id,
            self.capture.name()
        );

        // Device acquisition is the permission request
        let mut tracks = match self.capture.acquire(&self.config.constraints).await {
            Ok(tracks) => tracks,
            Err(e) => {
                error!("media acquisition failed: {e:#}");
                self.reset_to_idle();
                return Err(e).context("camera/microphone acquisition failed");
            }
        };

        if !self.shared.is_current(generation) {
            // Torn down while we awaited the permission grant
            tracks.stop_all();
            return Ok(());
        }

        let context = Arc::new(AudioContext::new(self.config.context_sample_rate));

        let stream = match CombinedStream::merge(&mut tracks) {
            Ok(stream) => stream,
            Err(e) => {
                tracks.stop_all();
                self.reset_to_idle();
                return Err(e).context("failed to merge media tracks");
            }
        };

        // Optional local recording tee
        let (recorder_tx, recorder_task) = self.spawn_recorder();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hooks = self.build_hooks(generation, events_tx);

        let client = match self
            .client_factory
            .create(hooks, self.voice_config())
        {
            Ok(client) => client,
            Err(e) => {
                tracks.stop_all();
                self.reset_to_idle();
                return Err(e).context("failed to construct realtime client");
            }
        };
        *self.shared.client.write().await = Some(Arc::clone(&client));

        let event_task = tokio::spawn(run_events(
            Arc::clone(&self.shared),
            Arc::clone(&self.runtime),
            self.config.clone(),
            generation,
            events_rx,
        ));

        {
            let mut slot = self.runtime.lock().await;
            *slot = Some(Runtime {
                tracks,
                context,
                stream,
                framer: None,
                framer_task: None,
                sampler_task: None,
                event_task: Some(event_task),
                recorder_tx,
                recorder_task,
            });
        }

        // Handshake; readiness arrives through the setup-complete hook
        if let Err(e) = client.connect().await {
            error!("realtime connection failed: {e:#}");
            self.stop().await.ok();
            return Err(e).context("failed to open realtime connection");
        }

        Ok(())
    }

    /// Stop streaming and release every owned resource.
    ///
    /// Teardown order matters: the sampling timer is cancelled first, then
    /// the realtime client is closed, then the audio processing unit comes
    /// down, and finally the media tracks stop and the video feed is
    /// cleared. Idempotent; safe to call with nothing running.
    pub async fn stop(&self) -> Result<SessionSnapshot> {
        let was_streaming = self.shared.streaming.swap(false, Ordering::SeqCst);
        if !was_streaming {
            debug!("stop requested for session {} with no active stream", self.config.session_id);
        }

        // Invalidate in-flight callbacks before any asynchronous teardown
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.socket_ready.store(false, Ordering::SeqCst);

        let runtime = self.runtime.lock().await.take();

        if let Some(mut rt) = runtime {
            // 1. Sampling timer
            if let Some(task) = rt.sampler_task.take() {
                task.abort();
            }

            // 2. Realtime client
            let client = self.shared.client.write().await.take();
            if let Some(client) = client {
                if let Err(e) = client.disconnect().await {
                    warn!("client disconnect failed: {e:#}");
                }
            }

            // 3. Audio processing unit and context
            if let Some(task) = rt.framer_task.take() {
                task.abort();
            }
            if let Some(framer) = rt.framer.take() {
                framer.teardown();
            }
            rt.context.close().await;

            // 4. Media tracks and video surface
            rt.stream.shutdown();
            rt.tracks.stop_all();

            if let Some(task) = rt.event_task.take() {
                task.abort();
            }

            // Close the recording tee and collect what was written
            drop(rt.recorder_tx.take());
            if let Some(task) = rt.recorder_task.take() {
                match task.await {
                    Ok(Ok(chunks)) => {
                        if !chunks.is_empty() {
                            info!("saved {} local audio chunks", chunks.len());
                        }
                    }
                    Ok(Err(e)) => warn!("local recording failed: {e:#}"),
                    Err(e) => warn!("recorder task aborted: {e}"),
                }
            }
        } else {
            // No runtime, but a dangling client slot is still possible
            let client = self.shared.client.write().await.take();
            if let Some(client) = client {
                client.disconnect().await.ok();
            }
        }

        self.shared.speaking.store(false, Ordering::SeqCst);
        self.shared.audio_ready.store(false, Ordering::SeqCst);
        self.shared.audio_setup_busy.store(false, Ordering::SeqCst);
        self.shared.input_level.store(0, Ordering::SeqCst);
        self.shared.output_level.store(0, Ordering::SeqCst);
        self.shared.set_status(ConnectionStatus::Disconnected);

        if was_streaming {
            info!("session {} stopped", self.config.session_id);
        }

        Ok(self.snapshot())
    }

    /// Replace the stored voice configuration.
    ///
    /// Only accepted while disconnected; the next connection uses the new
    /// values. A connected session must use `update_voice_live` (or
    /// reconnect): an established connection's parameters are never mutated
    /// behind the client's back.
    pub fn set_voice_config(&self, voice: VoiceConfig) -> Result<()> {
        if self.shared.status() == ConnectionStatus::Connected {
            anyhow::bail!(
                "voice configuration cannot be replaced while connected; \
                 use a live update or reconnect"
            );
        }

        info!(
            "voice configuration staged: {} / {}",
            voice.voice_name, voice.model
        );
        *self.shared.voice.lock().unwrap_or_else(|e| e.into_inner()) = voice;
        Ok(())
    }

    /// Explicit in-place reconfiguration of a connected session. Falls back
    /// to plain staging when no client is live.
    pub async fn update_voice_live(&self, voice: VoiceConfig) -> Result<()> {
        let client = self.shared.client.read().await.clone();

        if let Some(client) = client {
            client
                .update_voice_config(&voice)
                .await
                .context("live voice update failed")?;
            info!(
                "voice configuration updated in place: {} / {}",
                voice.voice_name, voice.model
            );
        }

        *self.shared.voice.lock().unwrap_or_else(|e| e.into_inner()) = voice;
        Ok(())
    }

    pub fn voice_config(&self) -> VoiceConfig {
        self.shared
            .voice
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::SeqCst)
    }

    /// Read-only state for rendering
    pub fn snapshot(&self) -> SessionSnapshot {
        let started_at = *self
            .shared
            .started_at
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let duration = Utc::now().signed_duration_since(started_at);
        let transcript_segments = self
            .shared
            .transcript
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len();

        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            status: self.shared.status(),
            streaming: self.shared.streaming.load(Ordering::SeqCst),
            connected: self.shared.socket_ready.load(Ordering::SeqCst),
            speaking: self.shared.speaking.load(Ordering::SeqCst),
            audio_ready: self.shared.audio_ready.load(Ordering::SeqCst),
            input_level: self.shared.input_level.load(Ordering::SeqCst),
            output_level: self.shared.output_level.load(Ordering::SeqCst),
            started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            transcript_segments,
        }
    }

    /// Accumulated transcription
    pub fn transcript(&self) -> Vec<TranscriptSegment> {
        self.shared
            .transcript
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reset_to_idle(&self) {
        self.shared.streaming.store(false, Ordering::SeqCst);
        self.shared.socket_ready.store(false, Ordering::SeqCst);
        self.shared.set_status(ConnectionStatus::Disconnected);
    }

    fn spawn_recorder(
        &self,
    ) -> (
        Option<mpsc::Sender<FramerMessage>>,
        Option<JoinHandle<Result<Vec<crate::audio::ChunkInfo>>>>,
    ) {
        let Some(settings) = &self.config.recording else {
            return (None, None);
        };

        let recorder_config = RecorderConfig {
            chunk_duration: settings.chunk_duration,
            output_dir: settings.output_dir.clone(),
            session_id: self.config.session_id.clone(),
            sample_rate: self.config.framer.target_sample_rate,
            channels: self.config.framer.target_channels,
        };

        match ChunkRecorder::new(recorder_config) {
            Ok(recorder) => {
                let (tx, rx) = mpsc::channel(64);
                let task = tokio::spawn(recorder.run(rx));
                (Some(tx), Some(task))
            }
            Err(e) => {
                // Recording is a tee; its failure never blocks streaming
                warn!("local recording disabled: {e:#}");
                (None, None)
            }
        }
    }

    fn build_hooks(
        &self,
        generation: u64,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> ClientHooks {
        let on_transcription = {
            let shared = Arc::clone(&self.shared);
            let tx = events.clone();
            Arc::new(move |text: String| {
                if shared.is_current(generation) {
                    let _ = tx.send(ClientEvent::Transcription(text));
                }
            })
        };

        let on_setup_complete = {
            let shared = Arc::clone(&self.shared);
            let tx = events.clone();
            Arc::new(move || {
                if shared.is_current(generation) {
                    let _ = tx.send(ClientEvent::SetupComplete);
                }
            })
        };

        let on_playback_state = {
            let shared = Arc::clone(&self.shared);
            let tx = events.clone();
            Arc::new(move |playing: bool| {
                if shared.is_current(generation) {
                    let _ = tx.send(ClientEvent::Playback(playing));
                }
            })
        };

        let on_output_level = {
            let shared = Arc::clone(&self.shared);
            let tx = events;
            Arc::new(move |level: u8| {
                if shared.is_current(generation) {
                    let _ = tx.send(ClientEvent::OutputLevel(level));
                }
            })
        };

        ClientHooks {
            on_transcription,
            on_setup_complete,
            on_playback_state,
            on_output_level,
            transcription_consumer: Arc::clone(&self.shared.consumer),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Best-effort synchronous release; prefer `stop().await`
        self.shared.streaming.store(false, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        if let Ok(mut guard) = self.runtime.try_lock() {
            if let Some(mut rt) = guard.take() {
                rt.abort_tasks();
                rt.stream.shutdown();
                rt.tracks.stop_all();
            }
        }
    }
}

/// Dispatches realtime client events for one run
async fn run_events(
    shared: Arc<Shared>,
    runtime: Arc<AsyncMutex<Option<Runtime>>>,
    config: SessionConfig,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        if !shared.is_current(generation) {
            break;
        }

        match event {
            ClientEvent::SetupComplete => {
                if shared.socket_ready.swap(true, Ordering::SeqCst) {
                    continue;
                }
                shared.set_status(ConnectionStatus::Connected);
                info!("realtime handshake complete");

                start_sampler(&shared, &runtime, &config, generation).await;
                ensure_audio_pipeline(&shared, &runtime, &config, generation).await;
            }
            ClientEvent::Playback(playing) => {
                shared.speaking.store(playing, Ordering::SeqCst);
                debug!("remote playback: {}", playing);

                // Setup may have been deferred while remote audio was playing
                if !playing {
                    ensure_audio_pipeline(&shared, &runtime, &config, generation).await;
                }
            }
            ClientEvent::OutputLevel(level) => {
                shared.output_level.store(level.min(100), Ordering::SeqCst);
            }
            ClientEvent::Transcription(text) => {
                let segment = TranscriptSegment {
                    text,
                    timestamp: Utc::now(),
                };
                shared
                    .transcript
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push(segment);
            }
        }
    }
}

/// Start the periodic frame sampler. Runs only after socket readiness; every
/// tick rasterizes the current video frame and forwards it as an image chunk.
async fn start_sampler(
    shared: &Arc<Shared>,
    runtime: &Arc<AsyncMutex<Option<Runtime>>>,
    config: &SessionConfig,
    generation: u64,
) {
    let feed = {
        let guard = runtime.lock().await;
        match guard.as_ref() {
            Some(rt) => rt.stream.video_feed(),
            None => return,
        }
    };

    let mut sampler = FrameSampler::new(config.jpeg_quality);
    let interval = config.frame_interval;
    let task_shared = Arc::clone(shared);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !task_shared.is_current(generation) {
                break;
            }
            if !task_shared.socket_ready.load(Ordering::SeqCst) {
                continue;
            }

            match sampler.capture(&feed) {
                Ok(jpeg) => {
                    let payload = BASE64.encode(&jpeg);
                    send_chunk(&task_shared, payload, MediaMime::ImageJpeg).await;
                }
                Err(e) => warn!("frame capture failed: {e:#}"),
            }
        }
    });

    let mut guard = runtime.lock().await;
    match guard.as_mut() {
        Some(rt) => rt.sampler_task = Some(handle),
        None => handle.abort(),
    }
}

/// Install the audio processing unit if every precondition holds: streaming,
/// socket ready, not mid-playback, not already installed, and no other
/// setup in flight. One installation per session; failures release partial
/// resources and are not retried.
async fn ensure_audio_pipeline(
    shared: &Arc<Shared>,
    runtime: &Arc<AsyncMutex<Option<Runtime>>>,
    config: &SessionConfig,
    generation: u64,
) {
    if !shared.is_current(generation)
        || !shared.socket_ready.load(Ordering::SeqCst)
        || shared.speaking.load(Ordering::SeqCst)
        || shared.audio_ready.load(Ordering::SeqCst)
    {
        return;
    }

    // Single-flight latch; concurrent attempts bail out here
    if shared
        .audio_setup_busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return;
    }

    match install_audio(shared, runtime, config, generation).await {
        Ok(true) => {
            shared.audio_ready.store(true, Ordering::SeqCst);
            info!("audio pipeline ready");
        }
        Ok(false) => {
            // Superseded mid-setup; nothing left installed
        }
        Err(e) => {
            error!("audio pipeline setup failed: {e:#}");
            let mut guard = runtime.lock().await;
            if let Some(rt) = guard.as_mut() {
                if let Some(task) = rt.framer_task.take() {
                    task.abort();
                }
                if let Some(framer) = rt.framer.take() {
                    framer.teardown();
                }
            }
            shared.audio_ready.store(false, Ordering::SeqCst);
        }
    }

    shared.audio_setup_busy.store(false, Ordering::SeqCst);
}

async fn install_audio(
    shared: &Arc<Shared>,
    runtime: &Arc<AsyncMutex<Option<Runtime>>>,
    config: &SessionConfig,
    generation: u64,
) -> Result<bool> {
    let (context, microphone) = {
        let mut guard = runtime.lock().await;
        let rt = match guard.as_mut() {
            Some(rt) => rt,
            None => return Ok(false),
        };
        let microphone = rt
            .stream
            .take_microphone()
            .context("microphone stream unavailable")?;
        (Arc::clone(&rt.context), microphone)
    };

    // A fresh context sits suspended; bring it up before module install
    if context.state() == ContextState::Suspended {
        context
            .resume()
            .await
            .context("failed to resume audio context")?;
    }
    if !shared.is_current(generation) {
        return Ok(false);
    }

    let (framer, mut frames) = AudioFramer::install(&context, microphone, config.framer.clone())
        .await
        .context("audio module installation failed")?;

    if !shared.is_current(generation) {
        framer.teardown();
        return Ok(false);
    }

    let recorder_tx = {
        let guard = runtime.lock().await;
        guard.as_ref().and_then(|rt| rt.recorder_tx.clone())
    };

    let task_shared = Arc::clone(shared);
    let forward_task = tokio::spawn(async move {
        while let Some(message) = frames.recv().await {
            if !task_shared.is_current(generation) {
                break;
            }

            task_shared
                .input_level
                .store(message.level.min(100), Ordering::SeqCst);

            if let Some(tx) = &recorder_tx {
                // Lossy tee: recording never backpressures the stream
                let _ = tx.try_send(message.clone());
            }

            // Half-duplex: local audio is dropped while remote playback runs
            if task_shared.speaking.load(Ordering::SeqCst) {
                continue;
            }

            let payload = BASE64.encode(&message.pcm);
            send_chunk(&task_shared, payload, MediaMime::AudioPcm).await;
        }
    });

    let mut guard = runtime.lock().await;
    match guard.as_mut() {
        Some(rt) => {
            rt.framer = Some(framer);
            rt.framer_task = Some(forward_task);
            Ok(true)
        }
        None => {
            // Torn down while we were installing
            framer.teardown();
            forward_task.abort();
            Ok(false)
        }
    }
}

/// Outbound chunk sender: forwards iff a live client exists. The empty slot
/// case is a deliberate no-op: framer callbacks can still fire in the brief
/// window after the client is taken down, and those chunks are dropped.
async fn send_chunk(shared: &Shared, payload: String, mime: MediaMime) {
    let client = shared.client.read().await.clone();
    let Some(client) = client else {
        return;
    };

    if let Err(e) = client.send_media_chunk(&payload, mime).await {
        warn!("failed to send {} chunk: {e:#}", mime.as_str());
    }
}
