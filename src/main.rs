//! Prusa Connect camera CLI
//!
//! Runs the snapshot loop for the camera configured in the host
//! configuration document, or generates a fresh fingerprint.

use clap::{Parser, Subcommand};
use prusa_connect_cam::{
    config::{ConfigDocument, DEFAULT_CONFIG_PATH, PLATFORM_ID},
    identity::{ensure_fingerprint, generate_random_fingerprint},
    orchestrator::SnapshotLoop,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "prusa-connect-cam", version, about)]
struct Cli {
    /// Host configuration document (JSON)
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Platform entry to read from the configuration document
    #[arg(long, default_value = PLATFORM_ID)]
    platform: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Capture and upload snapshots until interrupted (default)
    Run,
    /// Print a new random fingerprint as JSON without touching the config
    Fingerprint,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Fingerprint => {
            let fingerprint = generate_random_fingerprint();
            println!("{}", serde_json::json!({ "fingerprint": fingerprint }));
            ExitCode::SUCCESS
        }
        Command::Run => run(cli.config, cli.platform).await,
    }
}

async fn run(path: PathBuf, platform: String) -> ExitCode {
    info!("Prusa Connect camera v{}", prusa_connect_cam::VERSION);

    let document = ConfigDocument::new(path, platform);
    let mut config = match document.load() {
        Ok(c) => c,
        Err(e) => {
            error!(path = %document.path().display(), "Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate_token() {
        error!(
            "You must configure a valid Prusa Connect token (20+ characters): {}",
            e
        );
        return ExitCode::FAILURE;
    }

    ensure_fingerprint(&mut config, &document);

    let snapshot_loop = match SnapshotLoop::from_config(&config) {
        Ok(l) => l,
        Err(e) => {
            error!("Cannot start snapshot loop: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (stop, shutdown) = watch::channel(false);
    let stop = Arc::new(stop);
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Shutdown requested");
        let _ = handler_stop.send(true);
    }) {
        warn!("Failed to install signal handler: {}", e);
    }

    snapshot_loop.run(shutdown).await;
    drop(stop);
    info!("Done.");
    ExitCode::SUCCESS
}
