//! Thumbnail stage: one shared base thumbnail, three concurrent encodes.
//!
//! The base thumbnail is derived exactly once, sequentially, before any
//! format task starts. Each task then encodes and uploads an independent
//! copy of the base handle; encoders may mutate internal state, so no two
//! tasks ever share one. All three tasks are joined before returning
//! (no mid-flight cancellation when a sibling fails), and the result is
//! all-or-nothing: a complete three-format key map or a FAILED record
//! carrying the first error in fan-out order.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::{StageError, StageResult};
use crate::keys::{thumbnail_bucket, thumbnail_key};
use crate::pipeline::encode::{encode_avif, encode_jpeg, encode_webp, AvifOptions, JpegOptions, WebpOptions};
use crate::store::{BlobStore, PutOptions};
use crate::types::{ThumbnailEvent, ThumbnailFormat, ThumbnailResult};

use super::codec::decode_image;

/// Fixed encode profiles for the three thumbnail variants.
#[derive(Debug, Clone)]
pub struct ThumbnailEncoding {
    pub jpeg: JpegOptions,
    pub webp: WebpOptions,
    pub avif: AvifOptions,
}

impl Default for ThumbnailEncoding {
    fn default() -> Self {
        Self {
            jpeg: JpegOptions::thumbnail(),
            webp: WebpOptions::default(),
            avif: AvifOptions::default(),
        }
    }
}

/// Thumbnail fan-out stage.
pub struct ThumbnailGenerator {
    store: Arc<dyn BlobStore>,
    encoding: ThumbnailEncoding,
    /// Fixed base thumbnail width; height follows the aspect ratio
    width: u32,
}

impl ThumbnailGenerator {
    pub fn new(store: Arc<dyn BlobStore>, encoding: ThumbnailEncoding, width: u32) -> Self {
        Self {
            store,
            encoding,
            width,
        }
    }

    /// Generate and upload all three thumbnail variants for one object.
    ///
    /// Failures before the fan-out (fetch, decode, base derivation) surface
    /// as errors; a failure inside the fan-out produces a FAILED record
    /// with no key map.
    pub async fn run(&self, event: &ThumbnailEvent) -> StageResult<ThumbnailResult> {
        let source_key = &event.source_key;
        let dest_bucket = thumbnail_bucket(&event.source_bucket);
        tracing::info!(
            bucket = %event.source_bucket,
            key = %source_key,
            dest_bucket = %dest_bucket,
            "Generating thumbnails"
        );

        let object = self
            .store
            .get(&event.source_bucket, source_key)
            .await
            .map_err(|source| StageError::Fetch {
                bucket: event.source_bucket.clone(),
                key: source_key.clone(),
                source,
            })?;

        // The shared seed for all variants, computed exactly once.
        let width = self.width;
        let key_owned = source_key.clone();
        let bytes = object.bytes;
        let base = tokio::task::spawn_blocking(move || -> StageResult<DynamicImage> {
            let decoded = decode_image(&bytes, &key_owned)?;
            Ok(decoded.image.thumbnail(width, u32::MAX))
        })
        .await
        .map_err(|e| StageError::Join(e.to_string()))??;
        tracing::debug!(width = base.width(), height = base.height(), "Base thumbnail ready");

        // Fan out: one task per format, each on its own copy of the base.
        let mut tasks = Vec::with_capacity(ThumbnailFormat::ALL.len());
        for format in ThumbnailFormat::ALL {
            let store = Arc::clone(&self.store);
            let image = base.clone();
            let encoding = self.encoding.clone();
            let bucket = dest_bucket.clone();
            let key = source_key.clone();
            tasks.push((
                format,
                tokio::spawn(async move {
                    encode_and_upload(store, image, encoding, format, bucket, key).await
                }),
            ));
        }

        // Full barrier: every task finishes before results are folded, so a
        // partial key map can never escape.
        let mut keys = BTreeMap::new();
        let mut first_error: Option<StageError> = None;
        for (format, task) in tasks {
            let outcome = task
                .await
                .map_err(|e| StageError::Join(e.to_string()))
                .and_then(|r| r);
            match outcome {
                Ok(new_key) => {
                    keys.insert(format, new_key);
                }
                Err(e) => {
                    tracing::error!(format = format.as_str(), error = %e, "Thumbnail variant failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            Some(e) => Ok(ThumbnailResult::failed(source_key, e)),
            None => {
                tracing::info!(count = keys.len(), "All thumbnail variants uploaded");
                Ok(ThumbnailResult::success(source_key, keys))
            }
        }
    }
}

/// One fan-out task: encode a private copy of the base thumbnail and
/// upload it, returning the derived key.
async fn encode_and_upload(
    store: Arc<dyn BlobStore>,
    image: DynamicImage,
    encoding: ThumbnailEncoding,
    format: ThumbnailFormat,
    bucket: String,
    source_key: String,
) -> StageResult<String> {
    let encoded = tokio::task::spawn_blocking(move || match format {
        ThumbnailFormat::Jpeg => encode_jpeg(&image, &encoding.jpeg),
        ThumbnailFormat::Webp => encode_webp(&image, &encoding.webp),
        ThumbnailFormat::Avif => encode_avif(&image, &encoding.avif),
    })
    .await
    .map_err(|e| StageError::Join(e.to_string()))??;

    let new_key = thumbnail_key(&source_key, format);
    store
        .put(
            &bucket,
            &new_key,
            encoded,
            &PutOptions::content_type(format.content_type()),
        )
        .await
        .map_err(|source| StageError::Upload {
            bucket: bucket.clone(),
            key: new_key.clone(),
            source,
        })?;

    tracing::debug!(format = format.as_str(), bucket = %bucket, key = %new_key, "Uploaded variant");
    Ok(new_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ThumbnailStatus;
    use image::ImageFormat;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn fast_encoding() -> ThumbnailEncoding {
        ThumbnailEncoding {
            avif: AvifOptions {
                effort: 9, // fastest speed for tests
                ..AvifOptions::default()
            },
            ..ThumbnailEncoding::default()
        }
    }

    fn event() -> ThumbnailEvent {
        ThumbnailEvent {
            source_bucket: "albums-originals".to_string(),
            source_key: "2024/pic.png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_returns_complete_key_map() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        let result = gen.run(&event()).await.unwrap();

        assert_eq!(result.status, ThumbnailStatus::Success);
        assert_eq!(result.original_key, "2024/pic.png");
        let keys = result.thumbnail_keys.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(keys[&ThumbnailFormat::Jpeg], "2024/thumbnail/pic.jpg");
        assert_eq!(keys[&ThumbnailFormat::Webp], "2024/thumbnail/pic.webp");
        assert_eq!(keys[&ThumbnailFormat::Avif], "2024/thumbnail/pic.avif");
    }

    #[tokio::test]
    async fn test_variants_land_in_substituted_bucket() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        gen.run(&event()).await.unwrap();

        let jpeg = store
            .object("albums-processed", "2024/thumbnail/pic.jpg")
            .unwrap();
        assert_eq!(jpeg.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(&jpeg.bytes[0..2], &[0xFF, 0xD8]);

        let webp = store
            .object("albums-processed", "2024/thumbnail/pic.webp")
            .unwrap();
        assert_eq!(webp.content_type.as_deref(), Some("image/webp"));
        assert_eq!(&webp.bytes[0..4], b"RIFF");

        let avif = store
            .object("albums-processed", "2024/thumbnail/pic.avif")
            .unwrap();
        assert_eq!(avif.content_type.as_deref(), Some("image/avif"));
        assert_eq!(&avif.bytes[4..8], b"ftyp");

        assert_eq!(store.put_calls(), 3);
    }

    #[tokio::test]
    async fn test_base_thumbnail_width_and_aspect() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        gen.run(&event()).await.unwrap();

        let jpeg = store
            .object("albums-processed", "2024/thumbnail/pic.jpg")
            .unwrap();
        let decoded = decode_image(&jpeg.bytes, "pic.jpg").unwrap();
        assert_eq!((decoded.width, decoded.height), (40, 30));
    }

    #[tokio::test]
    async fn test_one_failed_variant_fails_whole_call_without_partial_map() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        store.fail_puts_containing(".webp");
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        let result = gen.run(&event()).await.unwrap();

        assert_eq!(result.status, ThumbnailStatus::Failed);
        assert!(result.thumbnail_keys.is_none());
        assert!(result.message.unwrap().contains("pic.webp"));
    }

    #[tokio::test]
    async fn test_siblings_complete_even_when_one_fails() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        store.fail_puts_containing(".webp");
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        gen.run(&event()).await.unwrap();

        // No cancellation: the sibling uploads still happened. Only the
        // result record hides them.
        assert!(store
            .object("albums-processed", "2024/thumbnail/pic.jpg")
            .is_some());
        assert!(store
            .object("albums-processed", "2024/thumbnail/pic.avif")
            .is_some());
        assert_eq!(store.put_calls(), 3);
    }

    #[tokio::test]
    async fn test_first_error_in_fanout_order_wins() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", png_bytes(80, 60), None);
        // Every upload fails; the reported error must be the jpeg one.
        store.fail_puts_containing("thumbnail/");
        let gen = ThumbnailGenerator::new(store.clone(), fast_encoding(), 40);

        let result = gen.run(&event()).await.unwrap();
        assert_eq!(result.status, ThumbnailStatus::Failed);
        assert!(result.message.unwrap().contains("pic.jpg"));
    }

    #[tokio::test]
    async fn test_missing_source_is_fetch_error() {
        let store = Arc::new(MemoryStore::new());
        let gen = ThumbnailGenerator::new(store, fast_encoding(), 40);

        let err = gen.run(&event()).await.unwrap_err();
        assert!(matches!(err, StageError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_source_is_decode_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert("albums-originals", "2024/pic.png", vec![0; 16], None);
        let gen = ThumbnailGenerator::new(store, fast_encoding(), 40);

        let err = gen.run(&event()).await.unwrap_err();
        assert!(matches!(
            err,
            StageError::Decode { .. } | StageError::UnsupportedFormat { .. }
        ));
    }
}
