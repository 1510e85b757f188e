//! Error handling for enrollment fetch and normalization operations.
//!
//! Per-year failures (bad year, unreachable source, unreadable workbook)
//! are returned as errors. Per-sheet and per-cell problems are recovered
//! close to where they happen and only show up in the logs.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid year {year}: enrollment data is published for {min}-{max} only")]
    InvalidYear { year: u16, min: u16, max: u16 },

    #[error("Year {year} is not currently available from the source")]
    YearUnavailable { year: u16 },

    #[error("Download failed for {year} ({url}): {reason}")]
    DownloadFailed {
        year: u16,
        url: String,
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Download for {year} returned {bytes} bytes, below the {floor} byte workbook floor")]
    PayloadTooSmall { year: u16, bytes: u64, floor: u64 },

    #[error("Could not read workbook {path}: {reason}")]
    Workbook { path: PathBuf, reason: String },

    #[error("Worksheet not found: {sheet}")]
    SheetNotFound { sheet: String },

    #[error("Cache error at {path}: {reason}")]
    Cache { path: PathBuf, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Background task failed: {reason}")]
    Join { reason: String },
}

impl EnrollmentError {
    /// Whether the caller can log this and carry on with the rest of the year
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EnrollmentError::SheetNotFound { .. })
    }

    /// Whether this failure belongs to the year-availability family
    pub fn is_invalid_year(&self) -> bool {
        matches!(
            self,
            EnrollmentError::InvalidYear { .. } | EnrollmentError::YearUnavailable { .. }
        )
    }

    /// Whether this failure came from the network/download step
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            EnrollmentError::DownloadFailed { .. } | EnrollmentError::PayloadTooSmall { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EnrollmentError>;
