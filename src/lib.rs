pub mod core;
pub mod models;
pub mod platform;

use crate::core::config::Config;
use crate::core::model_loader::ModelLoader;
use crate::core::overlay::OverlayRenderer;
use crate::core::pose_session::PoseSession;
use crate::core::signal_sink::{spawn_serial_reader, LogSink, SerialSink, SignalSink};
use crate::platform::camera::ImageSequenceSource;
use crate::platform::pose::ReplayClassifier;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Load configuration from `config_path`, or from the default location
pub fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from(&path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Config::load().context("Failed to load configuration"),
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn run(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    init_tracing(&config);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(run_session(config))
}

async fn run_session(config: Config) -> Result<()> {
    info!("Pose signal starting");

    let loader = ModelLoader::new(config.model_cache_dir.clone())
        .context("Failed to prepare model cache")?;
    let files = loader
        .ensure_model(&config.model_source())
        .await
        .context("Failed to fetch pose model")?;
    info!(
        "Model cached, checkpoint {:?}, weights {:?}",
        files.checkpoint, files.weights
    );
    let metadata = ModelLoader::load_metadata(&files.metadata)?;
    info!("Number of classes: {}", metadata.total_classes());

    if !metadata.has_label(&config.target_label) {
        warn!(
            "Target label '{}' is not one of the model's labels ({})",
            config.target_label,
            metadata.labels.join(", ")
        );
    }

    let classifier = ReplayClassifier::open(&config.recording_path, metadata)
        .context("Failed to open classifier recording")?;
    let mut source =
        ImageSequenceSource::open(&config.frames_dir, config.camera_size, config.flip)
            .context("Failed to open camera frames")?;
    let overlay = OverlayRenderer::new(
        config.min_part_confidence,
        config.overlay_output_dir.clone(),
    )?;

    let mut session = PoseSession::new(&config, Box::new(classifier), overlay)?;

    let mut serial_reader = None;
    let sink: Box<dyn SignalSink> = match &config.serial_port {
        Some(port) => {
            let sink = SerialSink::open(port, config.baud_rate, config.signal_messages())
                .with_context(|| format!("Failed to open serial port {}", port))?;
            match sink.try_clone_port() {
                Ok(reader) => serial_reader = Some(spawn_serial_reader(reader)),
                Err(e) => warn!("Not reading from {}: {}", port, e),
            }
            Box::new(sink)
        }
        None => {
            info!("No serial port configured, transitions are only logged");
            Box::new(LogSink::new())
        }
    };

    session.start(sink)?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    let result = session.run(&mut source, shutdown).await;

    let stats = session.stop().await;
    if let Some(reader) = serial_reader {
        let lines = reader.shutdown().await;
        info!("Received {} line(s) from the device", lines);
    }

    info!("Session {} finished", stats.session_id);
    info!("  Frames processed: {}", stats.total_frames);
    info!("  Frames matching '{}': {}", config.target_label, stats.matching_frames);
    info!(
        "  Transitions: {} to HIGH, {} to LOW ({} delivered, {} dropped)",
        stats.transitions_to_high,
        stats.transitions_to_low,
        stats.transitions_delivered,
        stats.transitions_dropped
    );
    info!(
        "  Average processing time: {:.1} ms",
        stats.average_processing_time_ms
    );
    info!("  Final signal: {}", stats.final_signal);

    result?;
    Ok(())
}
