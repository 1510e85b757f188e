//! The programmatic entry points: fetch, import, batch and summaries.
//!
//! A single-year fetch runs classify, cache lookup, download, normalize,
//! then (for tidy output) reshape and flag, and finally writes the cache.
//! Nothing is cached unless every step before it succeeded.
//!
//! Multi-year fetches run each year on the blocking pool, bounded by
//! `max_concurrent_years`. A failed year is logged and left out of the
//! combined result; the other years are unaffected.

use crate::cache::{CacheEntry, CacheKey, CacheStore, ParquetCache};
use crate::classify::classify_year;
use crate::config::EnrollmentConfig;
use crate::error::{EnrollmentError, Result};
use crate::fetch::workbook::WorkbookSource;
use crate::fetch::{BundleSource, RawFetcher, extract_bundle};
use crate::flags::flag_records;
use crate::frames::{flagged_to_frame, wide_to_frame, write_csv};
use crate::models::{FlaggedRecord, LongRecord, RawBundle, Representation, WideRecord};
use crate::normalize::normalize_bundle;
use crate::query::state_summary;
use crate::registry::YearRegistry;
use crate::tidy::tidy_enrollment;

use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use polars::prelude::DataFrame;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records for one or more years in either representation
#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentData {
    Wide(Vec<WideRecord>),
    Tidy(Vec<FlaggedRecord>),
}

impl EnrollmentData {
    pub fn empty(representation: Representation) -> Self {
        match representation {
            Representation::Wide => EnrollmentData::Wide(Vec::new()),
            Representation::Tidy => EnrollmentData::Tidy(Vec::new()),
        }
    }

    pub fn representation(&self) -> Representation {
        match self {
            EnrollmentData::Wide(_) => Representation::Wide,
            EnrollmentData::Tidy(_) => Representation::Tidy,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EnrollmentData::Wide(records) => records.len(),
            EnrollmentData::Tidy(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct end years present, ascending
    pub fn years(&self) -> Vec<u16> {
        let mut years: Vec<u16> = match self {
            EnrollmentData::Wide(records) => records.iter().map(|r| r.end_year).collect(),
            EnrollmentData::Tidy(records) => records.iter().map(|r| r.record.end_year).collect(),
        };
        years.sort_unstable();
        years.dedup();
        years
    }

    pub fn as_wide(&self) -> Option<&[WideRecord]> {
        match self {
            EnrollmentData::Wide(records) => Some(records),
            EnrollmentData::Tidy(_) => None,
        }
    }

    pub fn as_tidy(&self) -> Option<&[FlaggedRecord]> {
        match self {
            EnrollmentData::Tidy(records) => Some(records),
            EnrollmentData::Wide(_) => None,
        }
    }

    /// Append another result of the same representation
    fn extend(&mut self, other: EnrollmentData) {
        match (self, other) {
            (EnrollmentData::Wide(all), EnrollmentData::Wide(more)) => all.extend(more),
            (EnrollmentData::Tidy(all), EnrollmentData::Tidy(more)) => all.extend(more),
            (this, other) => warn!(
                "Dropping {} records: cannot combine {} with {}",
                other.len(),
                other.representation(),
                this.representation()
            ),
        }
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        match self {
            EnrollmentData::Wide(records) => wide_to_frame(records),
            EnrollmentData::Tidy(records) => flagged_to_frame(records),
        }
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_csv(&mut self.to_frame()?, path)
    }
}

/// Normalize a bundle and, for tidy output, reshape and flag it
pub fn process_bundle(
    bundle: &RawBundle,
    representation: Representation,
) -> Result<EnrollmentData> {
    let wide = normalize_bundle(bundle)?;
    Ok(match representation {
        Representation::Wide => EnrollmentData::Wide(wide),
        Representation::Tidy => EnrollmentData::Tidy(flag_records(tidy_enrollment(&wide))),
    })
}

/// How a single-year fetch treats the on-disk cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Serve a fresh entry when there is one, otherwise fetch and store
    #[default]
    Use,
    /// Always fetch, then overwrite the entry
    Refresh,
    /// Neither read nor write the cache
    Bypass,
}

impl CachePolicy {
    /// `use_cache = false` is a forced refresh: skip the read, keep the write
    pub fn from_use_cache(use_cache: bool) -> Self {
        if use_cache {
            CachePolicy::Use
        } else {
            CachePolicy::Refresh
        }
    }

    pub fn reads(self) -> bool {
        self == CachePolicy::Use
    }

    pub fn writes(self) -> bool {
        self != CachePolicy::Bypass
    }
}

fn representation(tidy: bool) -> Representation {
    if tidy {
        Representation::Tidy
    } else {
        Representation::Wide
    }
}

/// Outcome of a multi-year fetch
#[derive(Debug)]
pub struct BatchReport {
    pub data: EnrollmentData,
    /// Years left out, with the reason
    pub failures: Vec<(u16, EnrollmentError)>,
}

/// Cloneable handle over configuration, year registry and cache
#[derive(Debug, Clone)]
pub struct EnrollmentClient {
    config: Arc<EnrollmentConfig>,
    registry: Arc<YearRegistry>,
    cache: Arc<dyn CacheStore>,
    source: Option<Arc<dyn BundleSource>>,
}

impl EnrollmentClient {
    pub fn new(config: EnrollmentConfig) -> Self {
        let cache = Arc::new(ParquetCache::new(config.cache_dir.clone()));
        Self {
            config: Arc::new(config),
            registry: Arc::new(YearRegistry::default()),
            cache,
            source: None,
        }
    }

    pub fn with_registry(mut self, registry: YearRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the downloader, e.g. with workbooks already in memory
    pub fn with_source(mut self, source: Arc<dyn BundleSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    pub fn registry(&self) -> &YearRegistry {
        &self.registry
    }

    pub fn available_years(&self) -> Vec<u16> {
        self.registry.available_years()
    }

    fn fetcher(&self) -> RawFetcher {
        RawFetcher::new(Arc::clone(&self.config), Arc::clone(&self.registry))
    }

    fn load_bundle(&self, end_year: u16) -> Result<RawBundle> {
        match &self.source {
            Some(source) => source.load(end_year),
            None => self.fetcher().load(end_year),
        }
    }

    fn read_cached(&self, end_year: u16, representation: Representation) -> Result<EnrollmentData> {
        Ok(match representation {
            Representation::Wide => EnrollmentData::Wide(self.cache.read_wide(end_year)?),
            Representation::Tidy => EnrollmentData::Tidy(self.cache.read_tidy(end_year)?),
        })
    }

    /// Cache a freshly processed year; a cache failure does not fail the fetch
    fn store(&self, end_year: u16, data: &EnrollmentData) {
        let written = match data {
            EnrollmentData::Wide(records) => self.cache.write_wide(end_year, records),
            EnrollmentData::Tidy(records) => self.cache.write_tidy(end_year, records),
        };
        if let Err(e) = written {
            warn!("Could not cache {} ({}): {}", end_year, data.representation(), e);
        }
    }

    /// One year of enrollment data, from cache when allowed and fresh.
    ///
    /// `use_cache = false` forces a refetch whose result replaces the
    /// cached entry.
    pub fn fetch_enr(&self, end_year: u16, tidy: bool, use_cache: bool) -> Result<EnrollmentData> {
        self.fetch_enr_with(end_year, tidy, CachePolicy::from_use_cache(use_cache))
    }

    /// One year of enrollment data under an explicit cache policy
    pub fn fetch_enr_with(
        &self,
        end_year: u16,
        tidy: bool,
        policy: CachePolicy,
    ) -> Result<EnrollmentData> {
        let era = classify_year(end_year, &self.registry)?;
        self.registry.url_for(end_year)?;

        let representation = representation(tidy);
        let key = CacheKey::new(end_year, representation);
        let policy = if self.config.use_cache {
            policy
        } else {
            CachePolicy::Bypass
        };

        if policy.reads() && self.cache.exists(key, self.config.max_cache_age()) {
            match self.read_cached(end_year, representation) {
                Ok(data) => {
                    info!("Loaded {} from cache ({} records)", key, data.len());
                    return Ok(data);
                }
                Err(e) => warn!("Unreadable cache entry {}, refetching: {}", key, e),
            }
        }

        debug!("Fetching {} ({} format) from source", end_year, era);
        let bundle = self.load_bundle(end_year)?;
        let data = process_bundle(&bundle, representation)?;

        if policy.writes() {
            self.store(end_year, &data);
        }
        Ok(data)
    }

    /// Process a workbook file the caller already has
    pub fn import_local_enr(
        &self,
        path: &Path,
        end_year: u16,
        tidy: bool,
    ) -> Result<EnrollmentData> {
        let bundle = self.fetcher().import_local(path, end_year)?;
        let data = process_bundle(&bundle, representation(tidy))?;

        if self.config.use_cache {
            self.store(end_year, &data);
        }
        Ok(data)
    }

    /// Process an already-open workbook, e.g. an in-memory one
    pub fn process_workbook<W: WorkbookSource + ?Sized>(
        &self,
        workbook: &mut W,
        end_year: u16,
        tidy: bool,
    ) -> Result<EnrollmentData> {
        let era = classify_year(end_year, &self.registry)?;
        let bundle = extract_bundle(workbook, end_year, era)?;
        process_bundle(&bundle, representation(tidy))
    }

    /// Fetch several years concurrently, keeping track of the ones that failed
    pub async fn fetch_enr_batch(
        &self,
        years: &[u16],
        tidy: bool,
        progress: Option<ProgressBar>,
    ) -> BatchReport {
        let limit = self.config.max_concurrent_years.max(1);
        info!(
            "Fetching {} year(s) with up to {} in parallel",
            years.len(),
            limit
        );

        let mut outcomes: Vec<(u16, Result<EnrollmentData>)> = stream::iter(years.to_vec())
            .map(|year| {
                let client = self.clone();
                async move {
                    let outcome =
                        tokio::task::spawn_blocking(move || client.fetch_enr(year, tidy, true))
                            .await
                            .unwrap_or_else(|e| {
                                Err(EnrollmentError::Join {
                                    reason: e.to_string(),
                                })
                            });
                    (year, outcome)
                }
            })
            .buffer_unordered(limit)
            .inspect(|(year, _)| {
                if let Some(pb) = &progress {
                    pb.inc(1);
                    pb.set_message(format!("{}", year));
                }
            })
            .collect()
            .await;
        outcomes.sort_by_key(|(year, _)| *year);

        let mut data = EnrollmentData::empty(representation(tidy));
        let mut failures = Vec::new();
        for (year, outcome) in outcomes {
            match outcome {
                Ok(year_data) => data.extend(year_data),
                Err(e) => {
                    warn!("Skipping {}: {}", year, e);
                    failures.push((year, e));
                }
            }
        }

        BatchReport { data, failures }
    }

    /// Fetch several years; failed years are logged and excluded
    pub async fn fetch_enr_multi(&self, years: &[u16], tidy: bool) -> EnrollmentData {
        self.fetch_enr_batch(years, tidy, None).await.data
    }

    /// Fetch every year from `start` to `end` inclusive
    pub async fn fetch_enr_range(
        &self,
        start: u16,
        end: u16,
        tidy: bool,
    ) -> Result<EnrollmentData> {
        if start > end {
            return Err(EnrollmentError::Configuration {
                message: format!("Year range start {} is after end {}", start, end),
            });
        }
        let years: Vec<u16> = (start..=end).collect();
        Ok(self.fetch_enr_multi(&years, tidy).await)
    }

    /// Statewide total enrollment per year; all available years when `years` is empty
    pub async fn get_state_summary(&self, years: &[u16]) -> Vec<LongRecord> {
        let years = if years.is_empty() {
            self.available_years()
        } else {
            years.to_vec()
        };

        match self.fetch_enr_multi(&years, true).await {
            EnrollmentData::Tidy(records) => state_summary(&records),
            EnrollmentData::Wide(_) => Vec::new(),
        }
    }

    pub fn cache_status(&self) -> Result<Vec<CacheEntry>> {
        self.cache.entries()
    }

    /// Remove one year's entries (both representations), or everything
    pub fn clear_cache(&self, end_year: Option<u16>) -> Result<usize> {
        match end_year {
            Some(year) => {
                let mut removed = 0;
                for key in [CacheKey::wide(year), CacheKey::tidy(year)] {
                    if self.cache.clear(key)? {
                        removed += 1;
                    }
                }
                Ok(removed)
            }
            None => self.cache.clear_all(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::workbook::InMemoryWorkbook;
    use crate::models::EntityType;
    use tempfile::TempDir;

    fn modern_workbook() -> InMemoryWorkbook {
        InMemoryWorkbook::new()
            .with_sheet(
                "State",
                vec![
                    vec!["LEA Name", "Total", "Hispanic", "White"],
                    vec!["State of Nevada", "1000", "450", "550"],
                ],
            )
            .with_sheet(
                "District",
                vec![
                    vec!["LEA Code", "LEA Name", "Total", "Hispanic", "White"],
                    vec!["2", "Clark County School District", "600", "300", "300"],
                    vec!["18", "State Public Charter School Authority", "400", "150", "250"],
                ],
            )
            .with_sheet(
                "School",
                vec![
                    vec!["LEA Code", "School Code", "School Name", "Total", "Hispanic", "White"],
                    vec!["2", "2205", "Example Elementary School", "500", "*", "250"],
                ],
            )
    }

    fn client(temp_dir: &TempDir) -> EnrollmentClient {
        let config = EnrollmentConfig::default()
            .with_cache_dir(temp_dir.path())
            .with_max_cache_age_days(None);
        EnrollmentClient::new(config)
    }

    fn tidy_for(client: &EnrollmentClient, year: u16) -> Vec<FlaggedRecord> {
        let mut workbook = modern_workbook();
        match client.process_workbook(&mut workbook, year, true).unwrap() {
            EnrollmentData::Tidy(records) => records,
            EnrollmentData::Wide(_) => panic!("expected tidy records"),
        }
    }

    #[test]
    fn test_process_workbook_tidy() {
        let temp_dir = TempDir::new().unwrap();
        let records = tidy_for(&client(&temp_dir), 2024);

        let state = records
            .iter()
            .find(|r| r.is_state && r.record.subgroup == "hispanic")
            .unwrap();
        assert_eq!(state.record.pct, Some(0.45));

        let spcsa = records
            .iter()
            .find(|r| r.record.entity.lea_code.as_deref() == Some("18"))
            .unwrap();
        assert!(spcsa.is_charter);

        // Suppressed school hispanic count yields no row
        let school_rows: Vec<_> = records.iter().filter(|r| r.is_school).collect();
        assert!(school_rows.iter().all(|r| r.record.subgroup != "hispanic"));
        assert!(records.iter().all(FlaggedRecord::flags_consistent));
    }

    /// Stands in for the downloader with a fixed statewide total
    #[derive(Debug)]
    struct FixedWorkbook {
        state_total: &'static str,
    }

    impl BundleSource for FixedWorkbook {
        fn load(&self, end_year: u16) -> Result<RawBundle> {
            let mut workbook = InMemoryWorkbook::new().with_sheet(
                "State",
                vec![
                    vec!["LEA Name", "Total", "Hispanic", "White"],
                    vec!["State of Nevada", self.state_total, "450", "550"],
                ],
            );
            extract_bundle(&mut workbook, end_year, crate::models::FormatEra::Modern)
        }
    }

    fn state_total(records: &[FlaggedRecord]) -> Option<i64> {
        records
            .iter()
            .find(|r| r.is_state && r.record.is_total_enrollment())
            .map(|r| r.record.n_students)
    }

    fn seeded_client(temp_dir: &TempDir, state_total: &'static str) -> EnrollmentClient {
        let client = client(temp_dir);
        let stale = tidy_for(&client, 2024);
        client.cache.write_tidy(2024, &stale).unwrap();
        client.with_source(Arc::new(FixedWorkbook { state_total }))
    }

    #[test]
    fn test_forced_refetch_overwrites_cache() {
        let temp_dir = TempDir::new().unwrap();
        let client = seeded_client(&temp_dir, "2000");
        assert_eq!(state_total(&client.cache.read_tidy(2024).unwrap()), Some(1000));

        let data = client.fetch_enr(2024, true, false).unwrap();
        assert_eq!(state_total(data.as_tidy().unwrap()), Some(2000));
        assert_eq!(state_total(&client.cache.read_tidy(2024).unwrap()), Some(2000));

        // The refreshed entry now serves ordinary fetches
        let cached = client.fetch_enr_with(2024, true, CachePolicy::Use).unwrap();
        assert_eq!(state_total(cached.as_tidy().unwrap()), Some(2000));
    }

    #[test]
    fn test_cache_policy_use_and_bypass() {
        let temp_dir = TempDir::new().unwrap();
        let client = seeded_client(&temp_dir, "2000");

        let cached = client.fetch_enr_with(2024, true, CachePolicy::Use).unwrap();
        assert_eq!(state_total(cached.as_tidy().unwrap()), Some(1000));

        let bypassed = client.fetch_enr_with(2024, true, CachePolicy::Bypass).unwrap();
        assert_eq!(state_total(bypassed.as_tidy().unwrap()), Some(2000));
        assert_eq!(state_total(&client.cache.read_tidy(2024).unwrap()), Some(1000));
    }

    #[test]
    fn test_cache_policy_flags() {
        assert_eq!(CachePolicy::from_use_cache(true), CachePolicy::Use);
        assert_eq!(CachePolicy::from_use_cache(false), CachePolicy::Refresh);
        assert!(CachePolicy::Refresh.writes() && !CachePolicy::Refresh.reads());
        assert!(!CachePolicy::Bypass.writes() && !CachePolicy::Bypass.reads());
    }

    #[test]
    fn test_fetch_enr_serves_cache() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);
        let records = tidy_for(&client, 2024);
        client.cache.write_tidy(2024, &records).unwrap();

        let data = client.fetch_enr(2024, true, true).unwrap();
        assert_eq!(data, EnrollmentData::Tidy(records));
    }

    #[test]
    fn test_fetch_enr_rejects_bad_years_before_cache() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);

        let err = client.fetch_enr(1999, true, true).unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidYear { year: 1999, .. }));

        let err = client.fetch_enr(2025, true, true).unwrap_err();
        assert!(matches!(err, EnrollmentError::YearUnavailable { year: 2025 }));
    }

    #[test]
    fn test_failed_fetch_writes_no_cache_entry() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = YearRegistry::default();
        registry.set(2024, Some("http://127.0.0.1:9/enrollment.xlsx".to_string()));

        let config = EnrollmentConfig::default()
            .with_cache_dir(temp_dir.path())
            .with_download_timeout_secs(5);
        let client = EnrollmentClient::new(config).with_registry(registry);

        let err = client.fetch_enr(2024, true, true).unwrap_err();
        assert!(err.is_download_failure());
        assert!(client.cache_status().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_excludes_unavailable_year() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);
        for year in [2021, 2026] {
            let records = tidy_for(&client, year);
            client.cache.write_tidy(year, &records).unwrap();
        }

        let report = client.fetch_enr_batch(&[2021, 2025, 2026], true, None).await;
        assert_eq!(report.data.years(), vec![2021, 2026]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 2025);
        assert!(report.failures[0].1.is_invalid_year());
    }

    #[tokio::test]
    async fn test_state_summary_from_cache() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);
        for year in [2022, 2023] {
            let records = tidy_for(&client, year);
            client.cache.write_tidy(year, &records).unwrap();
        }

        let summary = client.get_state_summary(&[2023, 2022]).await;
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].end_year, 2022);
        assert!(summary.iter().all(|r| r.entity.entity_type == EntityType::State));
        assert!(summary.iter().all(|r| r.n_students == 1000));
    }

    #[tokio::test]
    async fn test_range_validates_order() {
        let temp_dir = TempDir::new().unwrap();
        let err = client(&temp_dir).fetch_enr_range(2024, 2021, true).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::Configuration { .. }));
    }

    #[test]
    fn test_clear_cache_by_year() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);
        let records = tidy_for(&client, 2024);
        client.cache.write_tidy(2024, &records).unwrap();
        client.cache.write_tidy(2023, &records).unwrap();

        assert_eq!(client.clear_cache(Some(2024)).unwrap(), 1);
        assert_eq!(client.cache_status().unwrap().len(), 1);
        assert_eq!(client.clear_cache(None).unwrap(), 1);
    }

    #[test]
    fn test_wide_csv_export() {
        let temp_dir = TempDir::new().unwrap();
        let client = client(&temp_dir);
        let mut workbook = modern_workbook();
        let data = client.process_workbook(&mut workbook, 2024, false).unwrap();
        assert_eq!(data.representation(), Representation::Wide);
        assert_eq!(data.len(), 4);

        let path = temp_dir.path().join("out.csv");
        data.write_csv(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("hispanic"));
    }
}
