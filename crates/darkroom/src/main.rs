//! Darkroom CLI - run image ingestion pipeline stages locally.
//!
//! Each subcommand runs one stage against a filesystem-backed blob store
//! (bucket = directory under `--store-root`), reading the stage's input
//! event as JSON and printing the outcome record as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Classify a stored object
//! echo '{"s3Bucket":"albums-originals","s3Key":"2024/pic.jpg"}' | darkroom classify
//!
//! # Normalize using a previously produced routing decision
//! darkroom normalize --event decision.json
//!
//! # Transcode an original to AVIF
//! darkroom transcode --event transcode.json --config darkroom.toml
//!
//! # Generate the three thumbnail variants
//! darkroom thumbnail --event thumb.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Darkroom - multi-stage image ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Path to a darkroom.toml config file
    #[arg(long, global = true, env = "DARKROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Root directory of the filesystem blob store (bucket = subdirectory)
    #[arg(long, global = true, env = "DARKROOM_STORE_ROOT", default_value = "./buckets")]
    store_root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands, one per pipeline stage.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify an object as ready or needing normalization
    Classify(cli::StageArgs),

    /// Resize/re-encode a flagged object to the standard JPEG
    Normalize(cli::StageArgs),

    /// Transcode an original to AVIF in the destination bucket
    Transcode(cli::StageArgs),

    /// Generate JPEG/WebP/AVIF thumbnails
    Thumbnail(cli::StageArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config before logging is up, so config warnings go via eprintln.
    let config = match &cli.config {
        Some(path) => match darkroom_core::Config::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to load config: {e}\n  Using default configuration.");
                darkroom_core::Config::default()
            }
        },
        None => darkroom_core::Config::default(),
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Darkroom v{}", darkroom_core::VERSION);

    match cli.command {
        Commands::Classify(args) => cli::classify(&args, &config, &cli.store_root).await,
        Commands::Normalize(args) => cli::normalize(&args, &config, &cli.store_root).await,
        Commands::Transcode(args) => cli::transcode(&args, &config, &cli.store_root).await,
        Commands::Thumbnail(args) => cli::thumbnail(&args, &config, &cli.store_root).await,
    }
}
