//! Pipeline stages.
//!
//! - **codec**: decode bytes and report format tag + natural dimensions
//! - **encode**: target-format option bundles and encoders
//! - **classify**: route an image as ready or needing normalization
//! - **normalize**: conditional downscale + fixed JPEG re-encode
//! - **transcode**: AVIF archival copies to the destination bucket
//! - **thumbnail**: shared base thumbnail fanned out to three formats

pub mod classify;
pub mod codec;
pub mod encode;
pub mod normalize;
pub mod thumbnail;
pub mod transcode;

// Re-exports for convenient access
pub use classify::{classify, Classifier};
pub use codec::{decode_image, DecodedImage};
pub use encode::{AvifOptions, JpegOptions, WebpOptions};
pub use normalize::Normalizer;
pub use thumbnail::{ThumbnailEncoding, ThumbnailGenerator};
pub use transcode::Transcoder;
