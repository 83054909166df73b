//! Configuration for the darkroom pipeline.
//!
//! Defaults encode the pipeline's policy constants (dimension envelope,
//! encode profiles); a TOML file can override them. Stages receive their
//! configuration slices by constructor injection; there is no process-wide
//! configuration state.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::pipeline::encode::{AvifOptions, JpegOptions, WebpOptions};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Destination locations for derived artifacts
    pub destination: DestinationConfig,

    /// Encode profiles per stage and format
    pub encoding: EncodingConfig,

    /// Dimension policy (classification envelope, resize targets)
    pub limits: LimitsConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate config values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let quality_in_range = |name: &str, q: u8| {
            if (1..=100).contains(&q) {
                Ok(())
            } else {
                Err(ConfigError::ValidationError(format!(
                    "{name} quality must be 1-100, got {q}"
                )))
            }
        };
        quality_in_range("normalize JPEG", self.encoding.normalize_jpeg.quality)?;
        quality_in_range("thumbnail JPEG", self.encoding.thumbnail_jpeg.quality)?;
        quality_in_range("thumbnail WebP", self.encoding.thumbnail_webp.quality)?;
        quality_in_range("thumbnail AVIF", self.encoding.thumbnail_avif.quality)?;

        if self.encoding.thumbnail_webp.effort > 6 {
            return Err(ConfigError::ValidationError(format!(
                "WebP effort must be 0-6, got {}",
                self.encoding.thumbnail_webp.effort
            )));
        }
        if self.encoding.thumbnail_avif.effort > 9 {
            return Err(ConfigError::ValidationError(format!(
                "AVIF effort must be 0-9, got {}",
                self.encoding.thumbnail_avif.effort
            )));
        }

        let limits = &self.limits;
        if limits.min_dimension == 0 || limits.thumbnail_width == 0 {
            return Err(ConfigError::ValidationError(
                "dimensions must be nonzero".to_string(),
            ));
        }
        if !(limits.min_dimension < limits.target_dimension
            && limits.target_dimension < limits.max_dimension)
        {
            return Err(ConfigError::ValidationError(format!(
                "dimension policy must satisfy min < target < max, got {} / {} / {}",
                limits.min_dimension, limits.target_dimension, limits.max_dimension
            )));
        }
        Ok(())
    }
}

/// Destination locations for derived artifacts.
///
/// The normalizer writes back to the source bucket and the thumbnail stage
/// derives its bucket textually, so only the transcoder destination is
/// configured here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Bucket receiving AVIF transcodes of originals
    pub transcode_bucket: String,
}

/// Encode profiles per stage and format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Normalizer re-encode profile
    pub normalize_jpeg: JpegOptions,

    /// Thumbnail variant profiles
    pub thumbnail_jpeg: JpegOptions,
    pub thumbnail_webp: WebpOptions,
    pub thumbnail_avif: AvifOptions,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            normalize_jpeg: JpegOptions::default(),
            thumbnail_jpeg: JpegOptions::thumbnail(),
            thumbnail_webp: WebpOptions::default(),
            thumbnail_avif: AvifOptions::default(),
        }
    }
}

/// Dimension policy.
///
/// The classification envelope exists because the downstream vision model
/// has degraded accuracy outside it; these are policy constants, not
/// derived values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Larger-dimension ceiling; above it an image needs resizing
    pub max_dimension: u32,

    /// Floor below which (both dimensions) an image is too small
    pub min_dimension: u32,

    /// Larger-dimension target when the normalizer downscales
    pub target_dimension: u32,

    /// Fixed width of the shared base thumbnail
    pub thumbnail_width: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dimension: 8000,
            min_dimension: 256,
            target_dimension: 4000,
            thumbnail_width: 400,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    pub level: String,

    /// Output format ("pretty" or "json")
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.limits.max_dimension, 8000);
        assert_eq!(config.limits.min_dimension, 256);
        assert_eq!(config.limits.target_dimension, 4000);
        assert_eq!(config.limits.thumbnail_width, 400);
        assert_eq!(config.encoding.normalize_jpeg.quality, 75);
        assert_eq!(config.encoding.thumbnail_jpeg.quality, 80);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = Config::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[encoding"));
        assert!(toml_str.contains("[limits]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.limits.max_dimension, config.limits.max_dimension);
        assert_eq!(
            parsed.encoding.thumbnail_webp.quality,
            config.encoding.thumbnail_webp.quality
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [destination]
            transcode_bucket = "albums-archive"

            [limits]
            max_dimension = 6000
            "#,
        )
        .unwrap();
        assert_eq!(config.destination.transcode_bucket, "albums-archive");
        assert_eq!(config.limits.max_dimension, 6000);
        // Untouched sections keep their defaults.
        assert_eq!(config.limits.min_dimension, 256);
        assert_eq!(config.encoding.thumbnail_avif.quality, 64);
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut config = Config::default();
        config.encoding.normalize_jpeg.quality = 0;
        assert!(config.validate().is_err());

        config.encoding.normalize_jpeg.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_dimension_policy() {
        let mut config = Config::default();
        config.limits.target_dimension = 9000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("darkroom.toml");
        std::fs::write(&path, "[destination]\ntranscode_bucket = \"b\"\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.destination.transcode_bucket, "b");
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = Config::load_from(Path::new("/nonexistent/darkroom.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError(_)));
    }
}
