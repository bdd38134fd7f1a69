use anyhow::{bail, Context, Result};
use clap::Parser;
use colloquy::{
    create_router, AppState, CaptureBackendFactory, CaptureSource, Config, DeviceConstraints,
    FramerConfig, LoopbackFactory, RecordingSettings, Session, SessionConfig, VoiceConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "colloquy", about = "Realtime conversational-AI streaming client")]
struct Cli {
    /// Configuration file (without extension)
    #[arg(long, default_value = "config/colloquy")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let source = match cfg.capture.source.as_str() {
        "synthetic" => CaptureSource::Synthetic,
        "device" => CaptureSource::Device {
            device: cfg.capture.device.clone(),
        },
        "file" => {
            let audio_path = cfg
                .capture
                .audio_path
                .as_ref()
                .context("file capture requires capture.audio_path")?;
            CaptureSource::File {
                audio_path: PathBuf::from(audio_path),
                image_path: cfg.capture.image_path.as_ref().map(PathBuf::from),
            }
        }
        other => bail!("unknown capture source '{other}'"),
    };
    let capture = CaptureBackendFactory::create(source)?;

    let session_config = SessionConfig {
        constraints: DeviceConstraints {
            video: cfg.capture.video,
            audio: true,
            sample_rate: cfg.capture.sample_rate,
            channels: cfg.capture.channels,
        },
        framer: FramerConfig::default(),
        frame_interval: Duration::from_secs(cfg.realtime.frame_interval_secs.max(1)),
        jpeg_quality: cfg.realtime.jpeg_quality,
        voice: VoiceConfig {
            voice_name: cfg.realtime.voice_name.clone(),
            model: cfg.realtime.model.clone(),
        },
        recording: cfg.recording.enabled.then(|| RecordingSettings {
            output_dir: PathBuf::from(&cfg.recording.output_dir),
            chunk_duration: Duration::from_secs(cfg.recording.chunk_duration_secs),
        }),
        ..SessionConfig::default()
    };

    // The shipped binary runs against the loopback client; deployments with a
    // real protocol client inject their own factory through the library API.
    let session = Arc::new(Session::new(
        session_config,
        capture,
        Arc::new(LoopbackFactory),
        Arc::new(|text: String| info!("transcription: {text}")),
    ));

    let bind = cli.bind.unwrap_or(cfg.service.http.bind.clone());
    let port = cli.port.unwrap_or(cfg.service.http.port);
    let addr = format!("{bind}:{port}");

    let app = create_router(AppState::new(Arc::clone(&session)));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("control API listening on {addr}");

    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    // Server exit: make sure any live session winds down cleanly
    session.stop().await.ok();

    Ok(())
}
