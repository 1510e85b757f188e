//! Configuration management.
//!
//! Holds the cache location and freshness policy, download limits and
//! batch concurrency. Defaults suit interactive use; a JSON file or the
//! `NV_ENROLLMENT_CACHE_DIR` environment variable can override them.

use crate::constants::{
    CACHE_DIR_ENV, DEFAULT_MAX_CACHE_AGE_DAYS, DOWNLOAD_TIMEOUT_SECS, MIN_PAYLOAD_BYTES,
};
use crate::error::{EnrollmentError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Global configuration for enrollment fetching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Directory holding one parquet file per (year, representation)
    pub cache_dir: PathBuf,

    /// Read and write the cache at all
    pub use_cache: bool,

    /// Entries older than this are refetched (`None` = never stale)
    pub max_cache_age_days: Option<u64>,

    /// Ceiling for a single workbook download
    pub download_timeout_secs: u64,

    /// Responses below this size are rejected as error pages
    pub min_payload_bytes: u64,

    /// Years fetched concurrently in batch operations
    pub max_concurrent_years: usize,

    /// User agent sent with download requests
    pub user_agent: String,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            use_cache: true,
            max_cache_age_days: Some(DEFAULT_MAX_CACHE_AGE_DAYS),
            download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
            min_payload_bytes: MIN_PAYLOAD_BYTES,
            max_concurrent_years: num_cpus::get().clamp(1, 4),
            user_agent: format!("nv_enrollment/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Cache directory from the environment, else the platform cache dir
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("nv_enrollment")
}

impl EnrollmentConfig {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_years == 0 {
            return Err(EnrollmentError::Configuration {
                message: "max_concurrent_years must be at least 1".to_string(),
            });
        }
        if self.download_timeout_secs == 0 {
            return Err(EnrollmentError::Configuration {
                message: "download_timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn max_cache_age(&self) -> Option<Duration> {
        self.max_cache_age_days
            .map(|days| Duration::from_secs(days * 24 * 60 * 60))
    }

    /// Use a different cache directory
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Never read or write the cache
    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    /// Set the maximum cache age (`None` = entries never go stale)
    pub fn with_max_cache_age_days(mut self, days: Option<u64>) -> Self {
        self.max_cache_age_days = days;
        self
    }

    /// Set the download timeout
    pub fn with_download_timeout_secs(mut self, secs: u64) -> Self {
        self.download_timeout_secs = secs;
        self
    }

    /// Set the payload size floor
    pub fn with_min_payload_bytes(mut self, bytes: u64) -> Self {
        self.min_payload_bytes = bytes;
        self
    }

    /// Set batch concurrency
    pub fn with_max_concurrent_years(mut self, years: usize) -> Self {
        self.max_concurrent_years = years;
        self
    }
}
