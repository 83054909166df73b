//! Core data types for the darkroom ingestion pipeline.
//!
//! Input events and outcome records are serde records whose field names and
//! status strings match the JSON contracts of the surrounding workflow
//! engine, so field renames here are wire changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::encode::AvifOptions;

/// Closed image-format enumeration used by the classifier.
///
/// Parsed exactly once from the codec's raw loader tag. Matching is by
/// substring, case-sensitive, preserving the upstream contract: any tag
/// *containing* "jpeg" counts as JPEG (so a hypothetical "motion-jpeg"
/// loader would match).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    WebP,
    Other,
}

impl ImageKind {
    /// Parse a raw codec format tag into a typed kind.
    pub fn parse(tag: &str) -> Self {
        if tag.contains("jpeg") {
            ImageKind::Jpeg
        } else if tag.contains("png") {
            ImageKind::Png
        } else if tag.contains("webp") {
            ImageKind::WebP
        } else {
            ImageKind::Other
        }
    }

    /// Whether this format is accepted by downstream consumers as-is.
    pub fn is_accepted(self) -> bool {
        !matches!(self, ImageKind::Other)
    }
}

/// The binary routing decision for a classified image.
///
/// Serialized as `"NeedsResizing"` / `"IsAppropriate"`; the workflow
/// engine's choice state branches on these exact strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    NeedsResizing,
    IsAppropriate,
}

/// Metadata bundle describing a fetched image.
///
/// Built once by the classifier from the stored object and the decoded
/// image, then carried through the pipeline unchanged as routing context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Source bucket
    #[serde(rename = "s3Bucket")]
    pub bucket: String,

    /// Source key (already percent-decoded)
    #[serde(rename = "s3Key")]
    pub key: String,

    /// Raw format tag reported by the codec ("jpeg", "png", ...)
    #[serde(rename = "imageFormat")]
    pub format_tag: String,

    /// Natural width in pixels
    pub width: u32,

    /// Natural height in pixels
    pub height: u32,

    /// Object size in bytes
    #[serde(rename = "fileSize")]
    pub byte_size: u64,

    /// Object last-modified timestamp (RFC 3339), if the store reports one
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// Object content type, if the store reports one
    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// Custom user metadata attached to the object
    #[serde(rename = "userMetadata", default)]
    pub user_metadata: BTreeMap<String, String>,
}

/// Classifier output: the descriptor plus the routing decision.
///
/// Created once per object, never mutated. This is also the normalizer's
/// input event; the workflow engine forwards it verbatim on the
/// `NeedsResizing` branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    #[serde(flatten)]
    pub descriptor: ImageDescriptor,

    /// Routing decision for the workflow engine's choice state
    pub decision: Decision,
}

/// Classification stage input event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyEvent {
    #[serde(rename = "s3Bucket")]
    pub bucket: String,

    /// Raw object key as delivered by the event source (percent-encoded)
    #[serde(rename = "s3Key")]
    pub key: String,
}

/// Transcoder stage input event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeEvent {
    #[serde(rename = "sourceBucket")]
    pub source_bucket: String,

    /// Raw source key (percent-encoded)
    #[serde(rename = "sourceKey")]
    pub source_key: String,

    /// Caller-supplied AVIF encoding parameters
    #[serde(rename = "avifEncoding")]
    pub avif_encoding: AvifOptions,
}

/// Thumbnail stage input event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailEvent {
    #[serde(rename = "sourceBucket")]
    pub source_bucket: String,

    #[serde(rename = "sourceKey")]
    pub source_key: String,
}

/// Normalizer outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "REJECTED_TOO_SMALL")]
    RejectedTooSmall,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Terminal record returned by the normalizer.
///
/// On success the descriptor fields of the input are carried through
/// unchanged so downstream stages keep their routing context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeOutcome {
    pub status: ResizeStatus,

    #[serde(rename = "s3Bucket", default)]
    pub bucket: String,

    #[serde(rename = "originalKey")]
    pub original_key: String,

    #[serde(rename = "newKey", skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(rename = "imageFormat", default)]
    pub format_tag: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    #[serde(rename = "fileSize", default)]
    pub byte_size: u64,

    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    #[serde(rename = "contentType", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(rename = "userMetadata", default)]
    pub user_metadata: BTreeMap<String, String>,
}

impl ResizeOutcome {
    /// Terminal rejection: the image is too small to usefully process.
    /// No codec or store work has been attempted.
    pub fn rejected_too_small(original_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: ResizeStatus::RejectedTooSmall,
            bucket: String::new(),
            original_key: original_key.into(),
            new_key: None,
            message: Some(message.into()),
            format_tag: String::new(),
            width: 0,
            height: 0,
            byte_size: 0,
            last_modified: None,
            content_type: None,
            user_metadata: BTreeMap::new(),
        }
    }

    /// Successful normalization, carrying the input descriptor through.
    pub fn success(input: &RoutingDecision, new_key: String) -> Self {
        let d = &input.descriptor;
        Self {
            status: ResizeStatus::Success,
            bucket: d.bucket.clone(),
            original_key: d.key.clone(),
            new_key: Some(new_key),
            message: None,
            format_tag: d.format_tag.clone(),
            width: d.width,
            height: d.height,
            byte_size: d.byte_size,
            last_modified: d.last_modified.clone(),
            content_type: d.content_type.clone(),
            user_metadata: d.user_metadata.clone(),
        }
    }
}

/// Transcoder outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversionStatus {
    #[serde(rename = "CONVERTED")]
    Converted,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Terminal record returned by the transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub status: ConversionStatus,

    #[serde(rename = "originalKey")]
    pub original_key: String,

    #[serde(rename = "newKey", skip_serializing_if = "Option::is_none")]
    pub new_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConversionResult {
    pub fn converted(original_key: impl Into<String>, new_key: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Converted,
            original_key: original_key.into(),
            new_key: Some(new_key.into()),
            message: None,
        }
    }

    pub fn failed(original_key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            status: ConversionStatus::Failed,
            original_key: original_key.into(),
            new_key: None,
            message: Some(message.to_string()),
        }
    }
}

/// Thumbnail variant format, in aggregation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFormat {
    Jpeg,
    Webp,
    Avif,
}

impl ThumbnailFormat {
    /// All variants, in fan-out (and first-error aggregation) order.
    pub const ALL: [ThumbnailFormat; 3] = [
        ThumbnailFormat::Jpeg,
        ThumbnailFormat::Webp,
        ThumbnailFormat::Avif,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpeg",
            ThumbnailFormat::Webp => "webp",
            ThumbnailFormat::Avif => "avif",
        }
    }

    /// File extension used in derived keys.
    pub fn extension(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "jpg",
            ThumbnailFormat::Webp => "webp",
            ThumbnailFormat::Avif => "avif",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ThumbnailFormat::Jpeg => "image/jpeg",
            ThumbnailFormat::Webp => "image/webp",
            ThumbnailFormat::Avif => "image/avif",
        }
    }
}

/// Thumbnail fan-out outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Terminal record returned by the thumbnail fan-out.
///
/// All-or-nothing: `thumbnail_keys` is either the complete three-format
/// mapping or absent. A partial map is never returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailResult {
    pub status: ThumbnailStatus,

    #[serde(rename = "originalKey")]
    pub original_key: String,

    #[serde(rename = "thumbnailKeys", skip_serializing_if = "Option::is_none")]
    pub thumbnail_keys: Option<BTreeMap<ThumbnailFormat, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ThumbnailResult {
    pub fn success(original_key: impl Into<String>, keys: BTreeMap<ThumbnailFormat, String>) -> Self {
        Self {
            status: ThumbnailStatus::Success,
            original_key: original_key.into(),
            thumbnail_keys: Some(keys),
            message: None,
        }
    }

    pub fn failed(original_key: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self {
            status: ThumbnailStatus::Failed,
            original_key: original_key.into(),
            thumbnail_keys: None,
            message: Some(message.to_string()),
        }
    }
}
