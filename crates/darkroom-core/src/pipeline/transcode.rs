//! Transcoding stage: AVIF archival copies of accepted originals.
//!
//! Runs against a separately configured destination bucket, with a SHA-256
//! content checksum attached to every upload. Any step failure is folded
//! into a `FAILED` result record for the orchestrator rather than an error:
//! this stage's workflow state branches on the record's status.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{StageError, StageResult};
use crate::keys::{decode_key, originals_key};
use crate::pipeline::encode::{encode_avif, AvifOptions};
use crate::store::{BlobStore, PutOptions};
use crate::types::{ConversionResult, TranscodeEvent};

use super::codec::decode_image;

/// Transcoding stage: decode, AVIF-encode, upload to the archive bucket.
pub struct Transcoder {
    store: Arc<dyn BlobStore>,
    destination_bucket: String,
}

impl Transcoder {
    pub fn new(store: Arc<dyn BlobStore>, destination_bucket: impl Into<String>) -> Self {
        Self {
            store,
            destination_bucket: destination_bucket.into(),
        }
    }

    /// Transcode one original. Always returns a terminal record.
    pub async fn run(&self, event: &TranscodeEvent) -> ConversionResult {
        let key = match decode_key(&event.source_key) {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(key = %event.source_key, error = %e, "Transcode failed");
                return ConversionResult::failed(&event.source_key, e);
            }
        };

        match self
            .process(&event.source_bucket, &key, &event.avif_encoding)
            .await
        {
            Ok(new_key) => ConversionResult::converted(key, new_key),
            Err(e) => {
                tracing::error!(bucket = %event.source_bucket, key = %key, error = %e, "Transcode failed");
                ConversionResult::failed(key, e)
            }
        }
    }

    async fn process(&self, bucket: &str, key: &str, opts: &AvifOptions) -> StageResult<String> {
        tracing::info!(bucket = %bucket, key = %key, "Transcoding image to AVIF");

        let object = self
            .store
            .get(bucket, key)
            .await
            .map_err(|source| StageError::Fetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })?;
        let original_size = object.bytes.len();

        let opts = opts.clone();
        let key_owned = key.to_string();
        let bytes = object.bytes;
        let encoded = tokio::task::spawn_blocking(move || -> StageResult<Vec<u8>> {
            let decoded = decode_image(&bytes, &key_owned)?;
            encode_avif(&decoded.image, &opts)
        })
        .await
        .map_err(|e| StageError::Join(e.to_string()))??;

        tracing::info!(
            original_bytes = original_size,
            encoded_bytes = encoded.len(),
            "Encoded to AVIF"
        );

        let new_key = originals_key(key);
        let checksum = sha256_hex(&encoded);
        let put_opts = PutOptions {
            content_type: Some("image/avif".to_string()),
            checksum_sha256: Some(checksum),
        };

        self.store
            .put(&self.destination_bucket, &new_key, encoded, &put_opts)
            .await
            .map_err(|source| StageError::Upload {
                bucket: self.destination_bucket.clone(),
                key: new_key.clone(),
                source,
            })?;

        tracing::info!(bucket = %self.destination_bucket, new_key = %new_key, "Uploaded AVIF");
        Ok(new_key)
    }
}

/// Hex-encoded SHA-256 of a byte buffer.
fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ConversionStatus;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn event(key: &str) -> TranscodeEvent {
        TranscodeEvent {
            source_bucket: "albums-originals".to_string(),
            source_key: key.to_string(),
            avif_encoding: AvifOptions {
                quality: 60,
                effort: 8, // fast speed for tests
                bit_depth: 8,
                lossless: false,
            },
        }
    }

    #[tokio::test]
    async fn test_transcode_success() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(64, 48), None);
        let t = Transcoder::new(store.clone(), "albums-archive");

        let result = t.run(&event("2024/pic.png")).await;

        assert_eq!(result.status, ConversionStatus::Converted);
        assert_eq!(result.original_key, "2024/pic.png");
        assert_eq!(result.new_key.as_deref(), Some("2024/originals/pic.avif"));
        assert!(result.message.is_none());

        // Written to the destination bucket, not the source.
        let stored = store.object("albums-archive", "2024/originals/pic.avif").unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("image/avif"));
        assert_eq!(&stored.bytes[4..8], b"ftyp");
    }

    #[tokio::test]
    async fn test_transcode_attaches_checksum() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "pic.png", png_bytes(32, 32), None);
        let t = Transcoder::new(store.clone(), "albums-archive");

        t.run(&event("pic.png")).await;

        let stored = store.object("albums-archive", "originals/pic.avif").unwrap();
        let checksum = stored.checksum_sha256.unwrap();
        assert_eq!(checksum, sha256_hex(&stored.bytes));
    }

    #[tokio::test]
    async fn test_transcode_percent_decodes_key() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024 summer/pic.png", png_bytes(32, 32), None);
        let t = Transcoder::new(store.clone(), "albums-archive");

        let result = t.run(&event("2024%20summer/pic.png")).await;
        assert_eq!(result.status, ConversionStatus::Converted);
        assert_eq!(result.original_key, "2024 summer/pic.png");
        assert_eq!(
            result.new_key.as_deref(),
            Some("2024 summer/originals/pic.avif")
        );
    }

    #[tokio::test]
    async fn test_missing_object_yields_failed_record_not_error() {
        let store = Arc::new(MemoryStore::new());
        let t = Transcoder::new(store, "albums-archive");

        let result = t.run(&event("gone.png")).await;

        assert_eq!(result.status, ConversionStatus::Failed);
        assert!(result.new_key.is_none());
        assert!(result.message.unwrap().contains("gone.png"));
    }

    #[tokio::test]
    async fn test_corrupt_object_yields_failed_record() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "bad.png", vec![1, 2, 3, 4], None);
        let t = Transcoder::new(store, "albums-archive");

        let result = t.run(&event("bad.png")).await;
        assert_eq!(result.status, ConversionStatus::Failed);
    }

    #[tokio::test]
    async fn test_upload_failure_yields_failed_record_and_no_object() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "pic.png", png_bytes(32, 32), None);
        store.fail_puts_containing(".avif");
        let t = Transcoder::new(store.clone(), "albums-archive");

        let result = t.run(&event("pic.png")).await;

        assert_eq!(result.status, ConversionStatus::Failed);
        // No partial upload became visible.
        assert!(store.object("albums-archive", "originals/pic.avif").is_none());
    }

    #[test]
    fn test_sha256_hex() {
        // SHA-256 of the empty string, a fixed vector.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
