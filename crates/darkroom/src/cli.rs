//! Stage command handlers: event JSON in, outcome JSON out.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::de::DeserializeOwned;
use serde::Serialize;

use darkroom_core::{
    ClassifyEvent, Config, Darkroom, FsStore, RoutingDecision, ThumbnailEvent, TranscodeEvent,
};

/// Arguments shared by every stage command.
#[derive(Args, Debug)]
pub struct StageArgs {
    /// Path to the input event JSON; reads stdin when omitted or "-"
    #[arg(long)]
    pub event: Option<PathBuf>,
}

/// Read and parse the input event from a file or stdin.
fn read_event<T: DeserializeOwned>(path: Option<&Path>) -> anyhow::Result<T> {
    let raw = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("Failed to read event file {}", p.display()))?,
        _ => std::io::read_to_string(std::io::stdin()).context("Failed to read event from stdin")?,
    };
    serde_json::from_str(&raw).context("Failed to parse event JSON")
}

/// Print an outcome record to stdout.
fn print_outcome<T: Serialize>(outcome: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(())
}

fn build(config: &Config, store_root: &Path) -> Darkroom {
    let store = Arc::new(FsStore::new(store_root));
    Darkroom::new(config, store)
}

pub async fn classify(args: &StageArgs, config: &Config, store_root: &Path) -> anyhow::Result<()> {
    let event: ClassifyEvent = read_event(args.event.as_deref())?;
    let darkroom = build(config, store_root);
    let decision = darkroom.classifier.run(&event).await?;
    print_outcome(&decision)
}

pub async fn normalize(args: &StageArgs, config: &Config, store_root: &Path) -> anyhow::Result<()> {
    let event: RoutingDecision = read_event(args.event.as_deref())?;
    let darkroom = build(config, store_root);
    let outcome = darkroom.normalizer.run(&event).await?;
    print_outcome(&outcome)
}

pub async fn transcode(args: &StageArgs, config: &Config, store_root: &Path) -> anyhow::Result<()> {
    if config.destination.transcode_bucket.is_empty() {
        anyhow::bail!(
            "No transcode destination configured; set [destination] transcode_bucket in the config file"
        );
    }
    let event: TranscodeEvent = read_event(args.event.as_deref())?;
    let darkroom = build(config, store_root);
    // Transcode failures are terminal records, not process errors.
    let result = darkroom.transcoder.run(&event).await;
    print_outcome(&result)
}

pub async fn thumbnail(args: &StageArgs, config: &Config, store_root: &Path) -> anyhow::Result<()> {
    let event: ThumbnailEvent = read_event(args.event.as_deref())?;
    let darkroom = build(config, store_root);
    let result = darkroom.thumbnails.run(&event).await?;
    print_outcome(&result)
}
