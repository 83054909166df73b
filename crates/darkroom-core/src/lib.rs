//! Darkroom Core - image ingestion pipeline library.
//!
//! Darkroom takes objects newly written to a blob store and prepares them
//! for downstream consumption: classification against a format/dimension
//! envelope, normalization (resize + JPEG re-encode), AVIF transcoding of
//! originals, and concurrent three-format thumbnail generation.
//!
//! # Architecture
//!
//! ```text
//!               ┌-> Normalizer (NeedsResizing) -> -processed.jpg
//! Event -> Classifier
//!               └-> Transcoder  -> originals/<stem>.avif
//!                   Thumbnails  -> thumbnail/<stem>.{jpg,webp,avif}
//! ```
//!
//! Stage sequencing lives in the external workflow engine; this crate
//! implements the stages themselves. Storage is consumed through the
//! [`store::BlobStore`] trait.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use darkroom_core::{Config, Darkroom, FsStore};
//!
//! #[tokio::main]
//! async fn main() -> darkroom_core::Result<()> {
//!     let config = Config::default();
//!     let store = Arc::new(FsStore::new("./buckets"));
//!     let darkroom = Darkroom::new(&config, store);
//!
//!     let decision = darkroom.classifier.run(&event).await?;
//!     println!("Decision: {:?}", decision.decision);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{ConfigError, DarkroomError, Result, StageError, StageResult, StoreError};
pub use pipeline::{Classifier, Normalizer, ThumbnailGenerator, Transcoder};
pub use store::{BlobStore, FsStore, MemoryStore};
pub use types::{
    ClassifyEvent, ConversionResult, Decision, ImageDescriptor, ResizeOutcome, RoutingDecision,
    ThumbnailEvent, ThumbnailResult, TranscodeEvent,
};

use std::sync::Arc;

use pipeline::thumbnail::ThumbnailEncoding;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// All four pipeline stages wired from one configuration and one store.
///
/// The orchestrator picks the stage matching its workflow state; nothing
/// here sequences stages.
pub struct Darkroom {
    pub classifier: Classifier,
    pub normalizer: Normalizer,
    pub transcoder: Transcoder,
    pub thumbnails: ThumbnailGenerator,
}

impl Darkroom {
    /// Build all stages against one blob store.
    pub fn new(config: &Config, store: Arc<dyn BlobStore>) -> Self {
        tracing::debug!("Initializing darkroom v{}", VERSION);
        Self {
            classifier: Classifier::new(Arc::clone(&store), config.limits.clone()),
            normalizer: Normalizer::new(
                Arc::clone(&store),
                config.encoding.normalize_jpeg.clone(),
                config.limits.clone(),
            ),
            transcoder: Transcoder::new(
                Arc::clone(&store),
                config.destination.transcode_bucket.clone(),
            ),
            thumbnails: ThumbnailGenerator::new(
                store,
                ThumbnailEncoding {
                    jpeg: config.encoding.thumbnail_jpeg.clone(),
                    webp: config.encoding.thumbnail_webp.clone(),
                    avif: config.encoding.thumbnail_avif.clone(),
                },
                config.limits.thumbnail_width,
            ),
        }
    }
}
