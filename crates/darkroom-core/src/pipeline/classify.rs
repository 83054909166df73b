//! Classification stage: decide whether an image is ready for downstream
//! consumption or needs normalization first.
//!
//! The decision rules are three independent predicates combined by OR.
//! Boundary values are deliberately not flagged: exactly 256x256 and
//! exactly 8000x8000 are appropriate (strict inequality both directions).

use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::{StageError, StageResult};
use crate::keys::decode_key;
use crate::store::BlobStore;
use crate::types::{ClassifyEvent, Decision, ImageDescriptor, ImageKind, RoutingDecision};

use super::codec::decode_image_blocking;

/// Pure classification over already-inspected metadata.
///
/// `NeedsResizing` iff the format is not accepted, either dimension exceeds
/// the ceiling, or both dimensions are below the floor.
pub fn classify(kind: ImageKind, width: u32, height: u32, limits: &LimitsConfig) -> Decision {
    let too_large = width > limits.max_dimension || height > limits.max_dimension;
    let format_ok = kind.is_accepted();
    let too_small = width < limits.min_dimension && height < limits.min_dimension;

    if !format_ok || too_large || too_small {
        Decision::NeedsResizing
    } else {
        Decision::IsAppropriate
    }
}

/// Classification stage: fetch, inspect, decide.
pub struct Classifier {
    store: Arc<dyn BlobStore>,
    limits: LimitsConfig,
}

impl Classifier {
    pub fn new(store: Arc<dyn BlobStore>, limits: LimitsConfig) -> Self {
        Self { store, limits }
    }

    /// Build the routing decision for a newly stored object.
    pub async fn run(&self, event: &ClassifyEvent) -> StageResult<RoutingDecision> {
        let key = decode_key(&event.key)?;
        tracing::info!(bucket = %event.bucket, key = %key, "Classifying image");

        let object = self
            .store
            .get(&event.bucket, &key)
            .await
            .map_err(|source| StageError::Fetch {
                bucket: event.bucket.clone(),
                key: key.clone(),
                source,
            })?;

        let byte_size = object.bytes.len() as u64;
        let decoded = decode_image_blocking(object.bytes, &key).await?;
        let kind = ImageKind::parse(&decoded.format_tag);
        let decision = classify(kind, decoded.width, decoded.height, &self.limits);

        tracing::info!(
            format = %decoded.format_tag,
            width = decoded.width,
            height = decoded.height,
            ?decision,
            "Classification complete"
        );

        Ok(RoutingDecision {
            descriptor: ImageDescriptor {
                bucket: event.bucket.clone(),
                key,
                format_tag: decoded.format_tag,
                width: decoded.width,
                height: decoded.height,
                byte_size,
                last_modified: object.last_modified,
                content_type: object.content_type,
                user_metadata: object.user_metadata,
            },
            decision,
        })
    }
}
