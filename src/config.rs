//! Service configuration
//!
//! Every setting is both a CLI flag and an environment variable; the env
//! names match the original deployment surface. Store credentials are
//! optional on purpose: without them the service starts, serves `/health`,
//! and fails render requests at the upload step with an explicit cause.

use clap::{ArgAction, Parser, ValueEnum};

use crate::compress::CompressionSettings;
use crate::store::StoreSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "htmltoimg", about = "HTML-to-image render service", version)]
pub struct Settings {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8002)]
    pub port: u16,

    /// Default log directive (RUST_LOG still takes precedence)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value = "json")]
    pub log_format: LogFormat,

    /// Object store host (optionally host:port), without a scheme
    #[arg(long, env = "MINIO_ENDPOINT")]
    pub store_endpoint: Option<String>,

    /// Object store access credential
    #[arg(long, env = "MINIO_ACCESS_KEY", hide_env_values = true)]
    pub store_access_key: Option<String>,

    /// Object store secret credential
    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    pub store_secret_key: Option<String>,

    /// Object store region
    #[arg(long, env = "MINIO_REGION", default_value = "us-east-1")]
    pub store_region: String,

    /// Address the store over https
    #[arg(long, env = "MINIO_SECURE", default_value_t = true, action = ArgAction::Set)]
    pub store_secure: bool,

    /// Bucket receiving the uploaded captures
    #[arg(long, env = "MINIO_BUCKET")]
    pub store_bucket: Option<String>,

    /// Re-encode captures as JPEG before upload
    #[arg(long, env = "COMPRESSION_ENABLED", default_value_t = true, action = ArgAction::Set)]
    pub compression_enabled: bool,

    /// JPEG quality on the 0-100 perceptual scale
    #[arg(long, env = "COMPRESSION_QUALITY", default_value_t = 85)]
    pub compression_quality: u8,

    /// Captures wider than this are downscaled proportionally
    #[arg(long, env = "COMPRESSION_MAX_WIDTH", default_value_t = 1920)]
    pub compression_max_width: u32,
}

impl Settings {
    /// Store settings when fully configured; `None` disables uploads.
    pub fn store(&self) -> Option<StoreSettings> {
        Some(StoreSettings {
            endpoint: self.store_endpoint.clone()?,
            access_key: self.store_access_key.clone()?,
            secret_key: self.store_secret_key.clone()?,
            bucket: self.store_bucket.clone()?,
            region: self.store_region.clone(),
            secure: self.store_secure,
        })
    }

    pub fn compression(&self) -> CompressionSettings {
        CompressionSettings {
            enabled: self.compression_enabled,
            quality: self.compression_quality,
            max_width: self.compression_max_width,
        }
    }
}
