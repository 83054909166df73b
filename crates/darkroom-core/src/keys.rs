//! Deterministic derivation of output keys and destination buckets.
//!
//! Every derived artifact's key is a pure function of the source key plus a
//! fixed directory/suffix/extension convention. Downstream consumers resolve
//! artifacts by re-deriving these keys, so the rules here are bit-exact
//! contracts:
//!
//! - normalizer:  `a/b/c.png` -> `a/b/c-processed.jpg` (same bucket)
//! - transcoder:  `a/b/c.png` -> `a/b/originals/c.avif`
//! - thumbnails:  `a/b/c.png` -> `a/b/thumbnail/c.{jpg,webp,avif}`
//!
//! An "extension" is the suffix starting at the last `.` of the final path
//! segment; keys without one get the suffix appended.

use crate::error::StageError;
use crate::types::ThumbnailFormat;

/// Percent-decode an object key delivered by an upstream event.
///
/// Event sources percent-encode keys; all derivation below operates on the
/// decoded form.
pub fn decode_key(raw: &str) -> Result<String, StageError> {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .map_err(|e| StageError::InvalidKey {
            key: raw.to_string(),
            message: e.to_string(),
        })
}

/// Split a key into (directory, filename). The directory never carries a
/// trailing slash and is empty for top-level keys.
fn split_dir(key: &str) -> (&str, &str) {
    match key.rfind('/') {
        Some(i) => (&key[..i], &key[i + 1..]),
        None => ("", key),
    }
}

/// Byte offset where the filename's extension (including the dot) starts,
/// or `None` if the final segment has no dot.
fn extension_start(key: &str) -> Option<usize> {
    let (_, filename) = split_dir(key);
    let dot = filename.rfind('.')?;
    Some(key.len() - filename.len() + dot)
}

/// Normalizer output key: strip the extension and append `-processed.jpg`.
/// Not placed in a subdirectory; it sits next to the original.
pub fn processed_key(key: &str) -> String {
    match extension_start(key) {
        Some(i) => format!("{}-processed.jpg", &key[..i]),
        None => format!("{key}-processed.jpg"),
    }
}

/// Transcoder output key: insert an `originals/` segment before the
/// filename and replace the extension with `.avif`.
pub fn originals_key(key: &str) -> String {
    derived_key(key, "originals", "avif")
}

/// Thumbnail output key for one format: insert a `thumbnail/` segment
/// before the filename and replace the extension per format.
pub fn thumbnail_key(key: &str, format: ThumbnailFormat) -> String {
    derived_key(key, "thumbnail", format.extension())
}

fn derived_key(key: &str, segment: &str, ext: &str) -> String {
    let (dir, filename) = split_dir(key);
    let stem = match filename.rfind('.') {
        Some(i) => &filename[..i],
        None => filename,
    };
    if dir.is_empty() {
        format!("{segment}/{stem}.{ext}")
    } else {
        format!("{dir}/{segment}/{stem}.{ext}")
    }
}

/// Thumbnail destination bucket: substitute `originals` -> `processed`,
/// first occurrence only, in the source bucket name.
pub fn thumbnail_bucket(source_bucket: &str) -> String {
    source_bucket.replacen("originals", "processed", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("a/b/c.png").unwrap(), "a/b/c.png");
        assert_eq!(
            decode_key("2024%20summer/caf%C3%A9.jpg").unwrap(),
            "2024 summer/café.jpg"
        );
    }

    #[test]
    fn test_decode_key_invalid_utf8() {
        let err = decode_key("bad%FF%FEkey").unwrap_err();
        assert!(matches!(err, StageError::InvalidKey { .. }));
    }

    #[test]
    fn test_processed_key() {
        assert_eq!(processed_key("a/b/c.png"), "a/b/c-processed.jpg");
        assert_eq!(processed_key("photo.jpeg"), "photo-processed.jpg");
    }

    #[test]
    fn test_processed_key_without_extension() {
        assert_eq!(processed_key("a/b/raw-upload"), "a/b/raw-upload-processed.jpg");
    }

    #[test]
    fn test_processed_key_ignores_dots_in_directories() {
        // The extension belongs to the final segment only.
        assert_eq!(
            processed_key("v1.2/export/img"),
            "v1.2/export/img-processed.jpg"
        );
    }

    #[test]
    fn test_originals_key() {
        assert_eq!(originals_key("a/b/c.png"), "a/b/originals/c.avif");
        assert_eq!(originals_key("c.png"), "originals/c.avif");
        assert_eq!(originals_key("a/b/noext"), "a/b/originals/noext.avif");
    }

    #[test]
    fn test_thumbnail_key_per_format() {
        assert_eq!(
            thumbnail_key("a/b/c.png", ThumbnailFormat::Jpeg),
            "a/b/thumbnail/c.jpg"
        );
        assert_eq!(
            thumbnail_key("a/b/c.png", ThumbnailFormat::Webp),
            "a/b/thumbnail/c.webp"
        );
        assert_eq!(
            thumbnail_key("a/b/c.png", ThumbnailFormat::Avif),
            "a/b/thumbnail/c.avif"
        );
        assert_eq!(
            thumbnail_key("c.png", ThumbnailFormat::Jpeg),
            "thumbnail/c.jpg"
        );
    }

    #[test]
    fn test_thumbnail_bucket_substitution() {
        assert_eq!(thumbnail_bucket("albums-originals"), "albums-processed");
        // First occurrence only.
        assert_eq!(
            thumbnail_bucket("originals-originals"),
            "processed-originals"
        );
        // No match leaves the bucket unchanged.
        assert_eq!(thumbnail_bucket("albums"), "albums");
    }

    #[test]
    fn test_no_collision_across_formats() {
        let keys: Vec<String> = ThumbnailFormat::ALL
            .iter()
            .map(|f| thumbnail_key("a/b/c.png", *f))
            .collect();
        assert_eq!(keys.len(), 3);
        assert!(keys.iter().all(|k| keys.iter().filter(|o| *o == k).count() == 1));
    }
}
