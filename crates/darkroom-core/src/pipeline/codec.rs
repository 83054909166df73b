//! Image decoding: bytes in, decoded handle plus format tag and natural
//! dimensions out.
//!
//! Decoding is CPU-bound and synchronous; async callers go through
//! [`decode_image_blocking`] which moves the work onto the blocking pool.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::error::StageError;

/// Result of decoding an image buffer.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded pixel data. Exclusively owned by the stage that decoded
    /// it; fan-out consumers clone before encoding.
    pub image: DynamicImage,
    /// Lowercase format tag ("jpeg", "png", ...)
    pub format_tag: String,
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
}

/// Decode an image from an in-memory byte buffer.
///
/// The format is sniffed from the content, never from the key: a PNG
/// uploaded as `.jpg` is reported as png.
pub fn decode_image(bytes: &[u8], key: &str) -> Result<DecodedImage, StageError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StageError::Decode {
            key: key.to_string(),
            message: format!("Cannot sniff image format: {e}"),
        })?;

    let format = reader.format().ok_or_else(|| StageError::UnsupportedFormat {
        key: key.to_string(),
    })?;

    let image = reader.decode().map_err(|e| StageError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })?;

    let (width, height) = image.dimensions();
    Ok(DecodedImage {
        image,
        format_tag: format_to_string(format),
        width,
        height,
    })
}

/// Decode on the blocking pool. Takes ownership of the buffer so nothing
/// is copied across the spawn boundary.
pub async fn decode_image_blocking(bytes: Vec<u8>, key: &str) -> Result<DecodedImage, StageError> {
    let key_owned = key.to_string();
    tokio::task::spawn_blocking(move || decode_image(&bytes, &key_owned))
        .await
        .map_err(|e| StageError::Join(e.to_string()))?
}

/// Convert an ImageFormat to the pipeline's lowercase tag.
pub fn format_to_string(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "jpeg".to_string(),
        ImageFormat::Png => "png".to_string(),
        ImageFormat::WebP => "webp".to_string(),
        ImageFormat::Gif => "gif".to_string(),
        ImageFormat::Tiff => "tiff".to_string(),
        ImageFormat::Bmp => "bmp".to_string(),
        ImageFormat::Ico => "ico".to_string(),
        ImageFormat::Avif => "avif".to_string(),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_reports_dimensions_and_tag() {
        let decoded = decode_image(&png_bytes(320, 200), "a/b.png").unwrap();
        assert_eq!(decoded.width, 320);
        assert_eq!(decoded.height, 200);
        assert_eq!(decoded.format_tag, "png");
    }

    #[test]
    fn test_decode_sniffs_content_not_key() {
        // PNG bytes under a .jpg key decode as png.
        let decoded = decode_image(&png_bytes(16, 16), "a/misnamed.jpg").unwrap();
        assert_eq!(decoded.format_tag, "png");
    }

    #[test]
    fn test_decode_garbage_is_unsupported() {
        let err = decode_image(b"definitely not an image", "a/b.bin").unwrap_err();
        assert!(matches!(err, StageError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let mut bytes = png_bytes(64, 64);
        bytes.truncate(32);
        let err = decode_image(&bytes, "a/b.png").unwrap_err();
        assert!(matches!(err, StageError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_decode_blocking() {
        let decoded = decode_image_blocking(png_bytes(8, 8), "x.png").await.unwrap();
        assert_eq!(decoded.format_tag, "png");
    }

    #[test]
    fn test_format_to_string() {
        assert_eq!(format_to_string(ImageFormat::Jpeg), "jpeg");
        assert_eq!(format_to_string(ImageFormat::Png), "png");
        assert_eq!(format_to_string(ImageFormat::WebP), "webp");
        assert_eq!(format_to_string(ImageFormat::Qoi), "unknown");
    }
}
