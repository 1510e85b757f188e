//! Nevada school enrollment data
//!
//! Downloads the Nevada Department of Education "Validation Day" enrollment
//! workbooks, normalizes their drifting layouts into one schema, and serves
//! the result in wide or tidy (long) form with an on-disk parquet cache.
//!
//! The pipeline, one year at a time:
//! - classify the year into its workbook format era
//! - fetch the workbook (download or local file) into raw worksheets
//! - resolve drifting headers with ordered, per-era pattern tables
//! - normalize to wide records, keeping suppressed cells as missing
//! - reshape to long records and flag state/district/school/charter rows
//! - cache the result per (year, representation)
//!
//! ```no_run
//! use nv_enrollment::{EnrollmentClient, EnrollmentConfig};
//! use nv_enrollment::query::filter_by_district;
//!
//! let client = EnrollmentClient::new(EnrollmentConfig::default());
//! let data = client.fetch_enr(2024, true, true)?;
//! if let Some(records) = data.as_tidy() {
//!     let clark = filter_by_district(records, "2");
//!     println!("{} Clark County rows", clark.len());
//! }
//! # Ok::<(), nv_enrollment::EnrollmentError>(())
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod flags;
pub mod frames;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod resolver;
pub mod tidy;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

pub use cache::{CacheEntry, CacheKey, CacheStore, ParquetCache};
pub use classify::classify_year;
pub use config::EnrollmentConfig;
pub use error::{EnrollmentError, Result};
pub use models::{
    AggregationFlag, EntityIdentity, EntityType, FlaggedRecord, FormatEra, GradeBand, LongRecord,
    Representation, Subgroup, SubgroupCounts, WideRecord,
};
pub use fetch::BundleSource;
pub use pipeline::{BatchReport, CachePolicy, EnrollmentClient, EnrollmentData};
pub use registry::{YearRegistry, get_available_years};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
