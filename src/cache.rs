//! On-disk cache of processed record sets.
//!
//! One parquet file per `(end_year, representation)` key. Writes land in a
//! temporary file inside the cache directory and are renamed into place, so
//! readers never see a half-written entry.

use crate::error::{EnrollmentError, Result};
use crate::frames::{flagged_to_frame, frame_to_flagged, frame_to_wide, wide_to_frame};
use crate::models::{FlaggedRecord, Representation, WideRecord};

use chrono::{DateTime, Local};
use polars::prelude::*;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "enr_";
const FILE_SUFFIX: &str = ".parquet";

/// Identifies one cached record set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub end_year: u16,
    pub representation: Representation,
}

impl CacheKey {
    pub fn new(end_year: u16, representation: Representation) -> Self {
        Self {
            end_year,
            representation,
        }
    }

    pub fn wide(end_year: u16) -> Self {
        Self::new(end_year, Representation::Wide)
    }

    pub fn tidy(end_year: u16) -> Self {
        Self::new(end_year, Representation::Tidy)
    }

    /// `enr_{wide|tidy}_{year}.parquet`
    pub fn file_name(&self) -> String {
        format!(
            "{}{}_{}{}",
            FILE_PREFIX, self.representation, self.end_year, FILE_SUFFIX
        )
    }

    /// Inverse of [`file_name`](Self::file_name)
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        let (representation, year) = stem.split_once('_')?;
        Some(Self::new(
            year.parse().ok()?,
            Representation::parse(representation)?,
        ))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.end_year, self.representation)
    }
}

/// A cache file on disk
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: DateTime<Local>,
}

impl CacheEntry {
    pub fn age(&self) -> chrono::Duration {
        Local::now().signed_duration_since(self.modified)
    }
}

/// Storage for processed record sets, keyed by year and representation
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Whether an entry exists and, when `max_age` is given, is no older than it
    fn exists(&self, key: CacheKey, max_age: Option<Duration>) -> bool;
    fn read_wide(&self, end_year: u16) -> Result<Vec<WideRecord>>;
    fn read_tidy(&self, end_year: u16) -> Result<Vec<FlaggedRecord>>;
    fn write_wide(&self, end_year: u16, records: &[WideRecord]) -> Result<()>;
    fn write_tidy(&self, end_year: u16, records: &[FlaggedRecord]) -> Result<()>;
    /// Remove one entry; returns whether anything was removed
    fn clear(&self, key: CacheKey) -> Result<bool>;
    /// Remove every entry; returns the number removed
    fn clear_all(&self) -> Result<usize>;
    fn entries(&self) -> Result<Vec<CacheEntry>>;
}

/// Parquet files in a single directory
#[derive(Debug, Clone)]
pub struct ParquetCache {
    dir: PathBuf,
}

impl ParquetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn cache_error(path: &Path, reason: impl fmt::Display) -> EnrollmentError {
        EnrollmentError::Cache {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn read_frame(&self, key: CacheKey) -> Result<DataFrame> {
        let path = self.path_for(key);
        let file = File::open(&path).map_err(|e| Self::cache_error(&path, e))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| Self::cache_error(&path, e))?;
        debug!("Read cache entry {} ({} rows)", key, df.height());
        Ok(df)
    }

    /// Write to a temp file in the cache dir, then rename over the entry
    fn write_frame(&self, key: CacheKey, mut df: DataFrame) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::cache_error(&self.dir, e))?;
        let path = self.path_for(key);

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(|e| Self::cache_error(&path, e))?;
        ParquetWriter::new(temp.as_file_mut())
            .finish(&mut df)
            .map_err(|e| Self::cache_error(&path, e))?;
        temp.persist(&path)
            .map_err(|e| Self::cache_error(&path, e.error))?;

        info!("Cached {} ({} rows) at {}", key, df.height(), path.display());
        Ok(())
    }

    fn entry_for(path: &Path) -> Option<CacheEntry> {
        let key = CacheKey::from_file_name(path.file_name()?.to_str()?)?;
        let metadata = fs::metadata(path).ok()?;
        let modified = metadata.modified().ok()?;
        Some(CacheEntry {
            key,
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            modified: DateTime::<Local>::from(modified),
        })
    }
}

impl CacheStore for ParquetCache {
    fn exists(&self, key: CacheKey, max_age: Option<Duration>) -> bool {
        let path = self.path_for(key);
        let Ok(metadata) = fs::metadata(&path) else {
            return false;
        };
        let Some(max_age) = max_age else {
            return true;
        };

        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .unwrap_or_default();
        if age > max_age {
            debug!(
                "Cache entry {} is stale ({}s old, limit {}s)",
                key,
                age.as_secs(),
                max_age.as_secs()
            );
            return false;
        }
        true
    }

    fn read_wide(&self, end_year: u16) -> Result<Vec<WideRecord>> {
        frame_to_wide(&self.read_frame(CacheKey::wide(end_year))?)
    }

    fn read_tidy(&self, end_year: u16) -> Result<Vec<FlaggedRecord>> {
        frame_to_flagged(&self.read_frame(CacheKey::tidy(end_year))?)
    }

    fn write_wide(&self, end_year: u16, records: &[WideRecord]) -> Result<()> {
        self.write_frame(CacheKey::wide(end_year), wide_to_frame(records)?)
    }

    fn write_tidy(&self, end_year: u16, records: &[FlaggedRecord]) -> Result<()> {
        self.write_frame(CacheKey::tidy(end_year), flagged_to_frame(records)?)
    }

    fn clear(&self, key: CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed cache entry {}", key);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::cache_error(&path, e)),
        }
    }

    fn clear_all(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in self.entries()? {
            if self.clear(entry.key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = self
            .dir
            .join(format!("{}*{}", FILE_PREFIX, FILE_SUFFIX))
            .to_string_lossy()
            .into_owned();
        let paths = glob::glob(&pattern).map_err(|e| Self::cache_error(&self.dir, e))?;

        let mut entries = Vec::new();
        for path in paths {
            match path {
                Ok(path) => entries.extend(Self::entry_for(&path)),
                Err(e) => warn!("Skipping unreadable cache path: {}", e),
            }
        }
        entries.sort_by_key(|entry| entry.key);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::flag_records;
    use crate::models::{EntityIdentity, EntityType, Subgroup};
    use crate::tidy::tidy_enrollment;
    use tempfile::TempDir;

    fn sample_wide(end_year: u16) -> Vec<WideRecord> {
        let mut entity = EntityIdentity::new(EntityType::School);
        entity.lea_code = Some("02".to_string());
        entity.school_code = Some("2205".to_string());
        entity.school_name = Some("Example Elementary School".to_string());

        let mut total = WideRecord::new(end_year, entity.clone(), "TOTAL");
        total.enrollment_total = Some(500);
        total.subgroups.set(Subgroup::Female, Some(250));
        total.subgroups.set(Subgroup::Homeless, None);
        total.subgroups.set(Subgroup::Frl, Some(321));
        let mut kindergarten = WideRecord::new(end_year, entity, "K");
        kindergarten.enrollment_total = Some(80);
        vec![total, kindergarten]
    }

    #[test]
    fn test_file_names() {
        assert_eq!(CacheKey::wide(2024).file_name(), "enr_wide_2024.parquet");
        assert_eq!(CacheKey::tidy(2019).file_name(), "enr_tidy_2019.parquet");
        assert_eq!(
            CacheKey::from_file_name("enr_tidy_2019.parquet"),
            Some(CacheKey::tidy(2019))
        );
        assert_eq!(CacheKey::from_file_name("enr_long_2019.parquet"), None);
        assert_eq!(CacheKey::from_file_name("notes.txt"), None);
    }

    #[test]
    fn test_wide_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path());
        let records = sample_wide(2024);

        assert!(!cache.exists(CacheKey::wide(2024), None));
        cache.write_wide(2024, &records).unwrap();
        assert!(cache.exists(CacheKey::wide(2024), None));
        assert!(!cache.exists(CacheKey::tidy(2024), None));

        assert_eq!(cache.read_wide(2024).unwrap(), records);
    }

    #[test]
    fn test_tidy_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path().join("nested"));
        let flagged = flag_records(tidy_enrollment(&sample_wide(2021)));

        cache.write_tidy(2021, &flagged).unwrap();
        assert_eq!(cache.read_tidy(2021).unwrap(), flagged);
    }

    #[test]
    fn test_overwrite_replaces_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path());

        cache.write_wide(2024, &sample_wide(2024)).unwrap();
        let shorter = sample_wide(2024)[..1].to_vec();
        cache.write_wide(2024, &shorter).unwrap();

        assert_eq!(cache.read_wide(2024).unwrap(), shorter);
        assert_eq!(cache.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_max_age() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path());
        cache.write_wide(2024, &sample_wide(2024)).unwrap();

        assert!(cache.exists(CacheKey::wide(2024), Some(Duration::from_secs(3600))));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!cache.exists(CacheKey::wide(2024), Some(Duration::from_millis(1))));
    }

    #[test]
    fn test_entries_and_clear() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path());
        cache.write_wide(2024, &sample_wide(2024)).unwrap();
        cache.write_wide(2021, &sample_wide(2021)).unwrap();
        fs::write(temp_dir.path().join("unrelated.parquet"), b"x").unwrap();

        let entries = cache.entries().unwrap();
        let keys: Vec<CacheKey> = entries.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![CacheKey::wide(2021), CacheKey::wide(2024)]);
        assert!(entries.iter().all(|e| e.size_bytes > 0));

        assert!(cache.clear(CacheKey::wide(2021)).unwrap());
        assert!(!cache.clear(CacheKey::wide(2021)).unwrap());
        assert_eq!(cache.clear_all().unwrap(), 1);
        assert!(cache.entries().unwrap().is_empty());
        assert!(temp_dir.path().join("unrelated.parquet").exists());
    }

    #[test]
    fn test_missing_entry_is_cache_error() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ParquetCache::new(temp_dir.path());
        assert!(matches!(
            cache.read_wide(2024),
            Err(EnrollmentError::Cache { .. })
        ));
    }

    #[test]
    fn test_entries_on_missing_dir() {
        let cache = ParquetCache::new("/nonexistent/nv_enrollment_cache");
        assert!(cache.entries().unwrap().is_empty());
    }
}
