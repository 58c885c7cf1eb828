//! Replay a frame capture through the ingestion engine
//!
//! Flag priority: command line > environment > config file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingestsrv::{DryRunTransmitter, EngineConfig, IngestEngine, LoggingSink};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Zigsense telemetry ingestion engine", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "INGESTSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Capture file to replay (`device endpoint cluster hex` per line)
    #[arg(value_name = "CAPTURE")]
    capture: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(long, env = "INGESTSRV_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rolling log files
    #[arg(long, env = "INGESTSRV_LOG_DIR")]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let mut log_config = config.service.logging.clone();
    log_config.service_name = config.service.name.clone();
    if let Some(level) = args.log_level {
        log_config.level = level;
    }
    if let Some(dir) = args.log_dir {
        log_config.log_dir = Some(dir);
    }
    common::logging::init_with_config(&log_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting {}", config.service.name);

    let devices = config.devices.clone();
    let engine = IngestEngine::new(config, Arc::new(LoggingSink), Arc::new(DryRunTransmitter))?;

    for entry in &devices {
        if let Err(e) = engine.init_device(&entry.id, &entry.class, &entry.endpoints) {
            error!(device = %entry.id, "Init failed: {}", e);
        }
    }
    engine.start_liveness();

    match &args.capture {
        Some(path) => {
            tokio::select! {
                result = ingestsrv::replay::replay_file(&engine, path) => {
                    if let Err(e) = result {
                        error!("Replay failed: {}", e);
                    }
                }
                reason = common::shutdown::wait_for_shutdown() => {
                    warn!("Replay interrupted: {}", reason);
                }
            }
        },
        None => {
            info!("No capture given, waiting for shutdown signal");
            let reason = common::shutdown::wait_for_shutdown().await;
            info!("Shutdown: {}", reason);
        },
    }

    for id in engine.device_ids() {
        match engine.diagnostics(&id).await {
            Ok(diag) => println!("{}", serde_json::to_string_pretty(&diag)?),
            Err(e) => warn!(device = %id, "No diagnostics: {}", e),
        }
    }

    engine.shutdown().await;
    Ok(())
}
