//! Target-format encoding: option bundles and encoder entry points.
//!
//! Each bundle carries the full parameter set of the wire contract; the
//! pure-Rust encoders apply every knob they expose (quality everywhere,
//! WebP method/sharp-YUV, AVIF speed derived from effort). Flags a given
//! encoder does not expose (JPEG trellis quantization, scan optimization)
//! are advisory and ride along for wire compatibility.
//!
//! Encoders are deterministic: identical pixels and options produce
//! identical bytes.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// JPEG encoding parameters.
///
/// The default is the normalizer's fixed profile; [`JpegOptions::thumbnail`]
/// is the thumbnail profile (interlaced, scan-optimized).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JpegOptions {
    /// Quality, 1-100
    pub quality: u8,
    /// Optimized Huffman coding
    pub optimize_coding: bool,
    /// Progressive (interlaced) output
    pub interlace: bool,
    /// Trellis quantization
    pub trellis_quant: bool,
    /// Per-scan optimization
    pub optimize_scans: bool,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: 75,
            optimize_coding: true,
            interlace: false,
            trellis_quant: true,
            optimize_scans: false,
        }
    }
}

impl JpegOptions {
    /// Fixed profile for thumbnail variants.
    pub fn thumbnail() -> Self {
        Self {
            quality: 80,
            optimize_coding: true,
            interlace: true,
            trellis_quant: true,
            optimize_scans: true,
        }
    }
}

/// WebP encoding parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebpOptions {
    /// Quality, 1-100
    pub quality: u8,
    /// Compression effort, 0-6 (libwebp "method")
    pub effort: u8,
    /// Sharp (smart) YUV chroma subsampling
    pub smart_subsample: bool,
}

impl Default for WebpOptions {
    fn default() -> Self {
        Self {
            quality: 82,
            effort: 4,
            smart_subsample: true,
        }
    }
}

/// AVIF encoding parameters (AV1, software encoder).
///
/// This is also the caller-supplied bundle on the transcode event, so the
/// field names match that JSON contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvifOptions {
    /// Quality, 1-100
    pub quality: u8,
    /// Encoding effort, 0-9 (higher is slower; inverted into rav1e speed)
    pub effort: u8,
    /// Output bit depth; 8 forces conversion to 8-bit before encode
    #[serde(rename = "bitdepth")]
    pub bit_depth: u8,
    /// Lossless flag; the rav1e path has no true lossless mode, so this
    /// maps to maximum quality. Fixed false everywhere in this pipeline.
    #[serde(skip)]
    pub lossless: bool,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: 64,
            effort: 4,
            bit_depth: 8,
            lossless: false,
        }
    }
}

impl AvifOptions {
    /// rav1e speed (1-10, higher is faster) derived from effort
    /// (0-9, higher is slower).
    fn speed(&self) -> u8 {
        (10 - self.effort.min(9)).clamp(1, 10)
    }
}

/// Encode to JPEG at the given quality.
pub fn encode_jpeg(image: &DynamicImage, opts: &JpegOptions) -> Result<Vec<u8>, StageError> {
    let rgb = image.to_rgb8();
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, opts.quality);
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| StageError::Encode {
            format: "jpeg".to_string(),
            message: e.to_string(),
        })?;
    Ok(buf)
}

/// Encode to lossy WebP, honoring quality, method (effort) and sharp YUV.
pub fn encode_webp(image: &DynamicImage, opts: &WebpOptions) -> Result<Vec<u8>, StageError> {
    let encode_err = |message: String| StageError::Encode {
        format: "webp".to_string(),
        message,
    };

    let rgba = image.to_rgba8();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());

    let mut config = webp::WebPConfig::new()
        .map_err(|_| encode_err("failed to initialize WebP config".to_string()))?;
    config.lossless = 0;
    config.quality = f32::from(opts.quality);
    config.method = i32::from(opts.effort.min(6));
    config.use_sharp_yuv = i32::from(opts.smart_subsample);

    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| encode_err(format!("{e:?}")))?;
    Ok(memory.to_vec())
}

/// Encode to AVIF via rav1e with speed derived from effort.
pub fn encode_avif(image: &DynamicImage, opts: &AvifOptions) -> Result<Vec<u8>, StageError> {
    let quality = if opts.lossless { 100 } else { opts.quality };
    let mut buf = Vec::new();
    let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
        &mut buf,
        opts.speed(),
        quality,
    );

    // The encoder derives output depth from the pixel type; 8-bit requests
    // are converted before encode.
    let result = if opts.bit_depth <= 8 {
        DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
    } else {
        image.write_with_encoder(encoder)
    };
    result.map_err(|e| StageError::Encode {
        format: "avif".to_string(),
        message: e.to_string(),
    })?;
    Ok(buf)
}
