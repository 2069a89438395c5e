//! Configuration module
//!
//! Configuration is read once at startup from the environment (optionally seeded
//! from a `.env` file) and handed to each component explicitly. Nothing below the
//! binary's setup code reads the environment.

use std::env;
use std::path::PathBuf;

use crate::models::SizingDefaults;

// Common constants
const SERVER_PORT: u16 = 4000;
/// 8GB source file limit
const FILE_SIZE_LIMIT: u64 = 8_000_000_000;
const STORAGE_ROOT: &str = "temp";
const PREVIEW_FORMAT: &str = "png";
const HTTP_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 60 * 30;
const MAX_WORKERS: usize = 4;
const RESULT_TTL_SECS: u64 = 60 * 60 * 24;
const REAP_INTERVAL_SECS: u64 = 60;
/// Largest preview side, in pixels, a request or a resolved geometry may ask for
pub const MAX_PREVIEW_DIMENSION: u32 = 10_000;

/// Base configuration shared by the process as a whole
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub log_json: bool,
}

/// Preview pipeline configuration
#[derive(Clone, Debug)]
pub struct GlimpseConfig {
    pub base: BaseConfig,
    pub max_file_size_bytes: u64,
    /// Root directory for downloaded originals
    pub download_root: PathBuf,
    /// Root directory for generated previews (may equal `download_root`)
    pub preview_root: PathBuf,
    pub preview_defaults: SizingDefaults,
    /// Upper bound for either side of a generated preview
    pub max_preview_dimension: u32,
    /// Base URL under which files in `preview_root` are served
    pub public_base_url: String,
    pub allow_private_urls: bool,
    // Optional host allowlist for source and callback URLs.
    // Example: "example.com,cdn.example.com"
    pub url_allowlist: Option<Vec<String>>,
    pub http_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub max_workers: usize,
    /// Seconds a finished job record is kept. 0 = kept forever.
    pub result_ttl_secs: u64,
    /// Interval between expired-record sweeps. 0 = disabled.
    pub reap_interval_secs: u64,
}

impl Default for GlimpseConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: SERVER_PORT,
                environment: "development".to_string(),
                log_json: false,
            },
            max_file_size_bytes: FILE_SIZE_LIMIT,
            download_root: PathBuf::from(STORAGE_ROOT),
            preview_root: PathBuf::from(STORAGE_ROOT),
            preview_defaults: SizingDefaults {
                format: PREVIEW_FORMAT.to_string(),
                ..SizingDefaults::default()
            },
            max_preview_dimension: MAX_PREVIEW_DIMENSION,
            public_base_url: format!("http://localhost:{}/previews", SERVER_PORT),
            allow_private_urls: false,
            url_allowlist: None,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
            max_workers: MAX_WORKERS,
            result_ttl_secs: RESULT_TTL_SECS,
            reap_interval_secs: REAP_INTERVAL_SECS,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<GlimpseConfig>);

impl Config {
    fn as_glimpse(&self) -> &GlimpseConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = GlimpseConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_glimpse().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_glimpse().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_glimpse().base.environment
    }

    pub fn log_json(&self) -> bool {
        self.as_glimpse().base.log_json
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_glimpse().max_file_size_bytes
    }

    pub fn download_root(&self) -> &PathBuf {
        &self.as_glimpse().download_root
    }

    pub fn preview_root(&self) -> &PathBuf {
        &self.as_glimpse().preview_root
    }

    pub fn preview_defaults(&self) -> &SizingDefaults {
        &self.as_glimpse().preview_defaults
    }

    pub fn max_preview_dimension(&self) -> u32 {
        self.as_glimpse().max_preview_dimension
    }

    pub fn public_base_url(&self) -> &str {
        &self.as_glimpse().public_base_url
    }

    pub fn allow_private_urls(&self) -> bool {
        self.as_glimpse().allow_private_urls
    }

    pub fn url_allowlist(&self) -> Option<&[String]> {
        self.as_glimpse().url_allowlist.as_deref()
    }

    pub fn http_timeout_secs(&self) -> u64 {
        self.as_glimpse().http_timeout_secs
    }

    pub fn download_timeout_secs(&self) -> u64 {
        self.as_glimpse().download_timeout_secs
    }

    pub fn max_workers(&self) -> usize {
        self.as_glimpse().max_workers
    }

    pub fn result_ttl_secs(&self) -> u64 {
        self.as_glimpse().result_ttl_secs
    }

    pub fn reap_interval_secs(&self) -> u64 {
        self.as_glimpse().reap_interval_secs
    }
}

impl From<GlimpseConfig> for Config {
    fn from(config: GlimpseConfig) -> Self {
        Config(Box::new(config))
    }
}

/// Parse an optional positive integer, treating empty or zero values as unset.
fn optional_dimension(name: &str) -> Option<u32> {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&v| v > 0)
}

impl GlimpseConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let defaults = GlimpseConfig::default();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| defaults.base.environment.clone());

        let server_port: u16 = env::var("PORT")
            .unwrap_or_else(|_| SERVER_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let max_file_size_bytes = match env::var("GLIMPSE_FILE_SIZE_LIMIT") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                anyhow::anyhow!("GLIMPSE_FILE_SIZE_LIMIT must be a number of bytes")
            })?,
            Err(_) => FILE_SIZE_LIMIT,
        };

        let download_root = env::var("GLIMPSE_LOCAL_FILE_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.download_root);
        let preview_root = env::var("GLIMPSE_PREVIEW_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.preview_root);

        let preview_defaults = SizingDefaults {
            width: optional_dimension("GLIMPSE_PREVIEW_WIDTH"),
            height: optional_dimension("GLIMPSE_PREVIEW_HEIGHT"),
            bounding_box: optional_dimension("GLIMPSE_PREVIEW_RESIZE"),
            format: env::var("GLIMPSE_PREVIEW_FORMAT")
                .ok()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| PREVIEW_FORMAT.to_string()),
        };

        let max_preview_dimension = match env::var("GLIMPSE_MAX_PREVIEW_DIMENSION") {
            Ok(raw) => raw.trim().parse::<u32>().map_err(|_| {
                anyhow::anyhow!("GLIMPSE_MAX_PREVIEW_DIMENSION must be a number of pixels")
            })?,
            Err(_) => MAX_PREVIEW_DIMENSION,
        };

        let config = GlimpseConfig {
            base: BaseConfig {
                server_port,
                environment,
                log_json: env::var("LOG_FORMAT")
                    .map(|format| format.trim().eq_ignore_ascii_case("json"))
                    .unwrap_or(false),
            },
            max_file_size_bytes,
            download_root,
            preview_root,
            preview_defaults,
            max_preview_dimension,
            public_base_url: env::var("GLIMPSE_PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| format!("http://localhost:{}/previews", server_port)),
            allow_private_urls: env::var("GLIMPSE_ALLOW_PRIVATE_URLS")
                .unwrap_or_else(|_| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
            url_allowlist: env::var("GLIMPSE_URL_ALLOWLIST").ok().map(|s| {
                s.split(',')
                    .map(|domain| domain.trim().to_lowercase())
                    .filter(|domain| !domain.is_empty())
                    .collect()
            }),
            http_timeout_secs: env::var("GLIMPSE_HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            download_timeout_secs: env::var("GLIMPSE_DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or_else(|_| DOWNLOAD_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(DOWNLOAD_TIMEOUT_SECS),
            max_workers: env::var("GLIMPSE_MAX_WORKERS")
                .unwrap_or_else(|_| MAX_WORKERS.to_string())
                .parse()
                .unwrap_or(MAX_WORKERS),
            result_ttl_secs: env::var("GLIMPSE_RESULT_TTL_SECS")
                .unwrap_or_else(|_| RESULT_TTL_SECS.to_string())
                .parse()
                .unwrap_or(RESULT_TTL_SECS),
            reap_interval_secs: env::var("GLIMPSE_REAP_INTERVAL_SECS")
                .unwrap_or_else(|_| REAP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(REAP_INTERVAL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "GLIMPSE_FILE_SIZE_LIMIT must be greater than zero"
            ));
        }

        if self.max_workers == 0 {
            return Err(anyhow::anyhow!("GLIMPSE_MAX_WORKERS must be at least 1"));
        }

        if !self.public_base_url.starts_with("http://")
            && !self.public_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "GLIMPSE_PUBLIC_BASE_URL must be an absolute http(s) URL"
            ));
        }

        if self.preview_defaults.format.is_empty() {
            return Err(anyhow::anyhow!("GLIMPSE_PREVIEW_FORMAT must not be empty"));
        }

        if self.max_preview_dimension == 0 {
            return Err(anyhow::anyhow!(
                "GLIMPSE_MAX_PREVIEW_DIMENSION must be greater than zero"
            ));
        }

        let defaults = &self.preview_defaults;
        for (name, value) in [
            ("GLIMPSE_PREVIEW_WIDTH", defaults.width),
            ("GLIMPSE_PREVIEW_HEIGHT", defaults.height),
            ("GLIMPSE_PREVIEW_RESIZE", defaults.bounding_box),
        ] {
            if value.is_some_and(|v| v > self.max_preview_dimension) {
                return Err(anyhow::anyhow!(
                    "{} exceeds GLIMPSE_MAX_PREVIEW_DIMENSION ({})",
                    name,
                    self.max_preview_dimension
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GlimpseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_file_size_bytes, 8_000_000_000);
        assert_eq!(config.preview_defaults.format, "png");
        assert_eq!(config.preview_defaults.width, None);
        assert_eq!(config.download_root, PathBuf::from("temp"));
        assert_eq!(config.max_preview_dimension, 10_000);
    }

    #[test]
    fn test_validate_rejects_defaults_beyond_max_dimension() {
        let config = GlimpseConfig {
            max_preview_dimension: 500,
            preview_defaults: SizingDefaults {
                bounding_box: Some(750),
                format: "png".to_string(),
                ..SizingDefaults::default()
            },
            ..GlimpseConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GlimpseConfig {
            max_preview_dimension: 0,
            ..GlimpseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let config = GlimpseConfig {
            max_file_size_bytes: 0,
            ..GlimpseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_public_url() {
        let config = GlimpseConfig {
            public_base_url: "previews".to_string(),
            ..GlimpseConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = GlimpseConfig {
            max_workers: 0,
            ..GlimpseConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
