//! Normalization stage: bring a flagged image inside the accepted envelope.
//!
//! Images below the size floor are rejected before any store or codec work.
//! Everything else is re-encoded to the fixed JPEG profile, downscaled
//! first when oversized, and written next to the original under the
//! `-processed.jpg` suffix.

use std::sync::Arc;

use crate::config::LimitsConfig;
use crate::error::{StageError, StageResult};
use crate::keys::processed_key;
use crate::pipeline::encode::{encode_jpeg, JpegOptions};
use crate::store::{BlobStore, PutOptions};
use crate::types::{ResizeOutcome, RoutingDecision};

use super::codec::decode_image;

/// Normalization stage: conditional downscale plus JPEG re-encode.
pub struct Normalizer {
    store: Arc<dyn BlobStore>,
    jpeg: JpegOptions,
    limits: LimitsConfig,
}

impl Normalizer {
    pub fn new(store: Arc<dyn BlobStore>, jpeg: JpegOptions, limits: LimitsConfig) -> Self {
        Self { store, jpeg, limits }
    }

    /// Normalize one flagged image.
    ///
    /// Returns a terminal outcome record; infrastructure failures (fetch,
    /// decode, encode, upload) surface as errors for the orchestrator to
    /// retry, never as a FAILED record fabricated here.
    pub async fn run(&self, input: &RoutingDecision) -> StageResult<ResizeOutcome> {
        let d = &input.descriptor;

        // Too small to usefully upsize: reject before any decode/encode.
        if d.width < self.limits.min_dimension && d.height < self.limits.min_dimension {
            let message = format!("Image is too small ({}x{}) to process.", d.width, d.height);
            tracing::info!(key = %d.key, "{message}");
            return Ok(ResizeOutcome::rejected_too_small(&d.key, message));
        }

        tracing::info!(bucket = %d.bucket, key = %d.key, "Normalizing image");

        let object = self
            .store
            .get(&d.bucket, &d.key)
            .await
            .map_err(|source| StageError::Fetch {
                bucket: d.bucket.clone(),
                key: d.key.clone(),
                source,
            })?;

        // Downscale per the classified metadata, not per re-measured pixels.
        let needs_downscale =
            d.width > self.limits.max_dimension || d.height > self.limits.max_dimension;
        let target = self.limits.target_dimension;
        let jpeg = self.jpeg.clone();
        let key = d.key.clone();
        let bytes = object.bytes;

        let encoded = tokio::task::spawn_blocking(move || -> StageResult<Vec<u8>> {
            let decoded = decode_image(&bytes, &key)?;
            let image = if needs_downscale {
                // Aspect-preserving fit into target x target, no cropping;
                // the larger dimension lands on the target.
                tracing::debug!(key = %key, target, "Downscaling oversized image");
                decoded.image.thumbnail(target, target)
            } else {
                decoded.image
            };
            encode_jpeg(&image, &jpeg)
        })
        .await
        .map_err(|e| StageError::Join(e.to_string()))??;

        tracing::info!(bytes = encoded.len(), "Re-encoded to JPEG");

        let new_key = processed_key(&d.key);
        self.store
            .put(
                &d.bucket,
                &new_key,
                encoded,
                &PutOptions::content_type("image/jpeg"),
            )
            .await
            .map_err(|source| StageError::Upload {
                bucket: d.bucket.clone(),
                key: new_key.clone(),
                source,
            })?;

        tracing::info!(new_key = %new_key, "Uploaded normalized image");
        Ok(ResizeOutcome::success(input, new_key))
    }
}
