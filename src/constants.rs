//! Constants shared across the enrollment pipeline.
//!
//! Format boundaries, registry range, download limits and the canonical
//! grade codes live here so the rest of the crate can refer to them by name.

/// Last end-of-school-year published in the legacy layout
pub const LEGACY_LAST_YEAR: u16 = 2017;

/// Last end-of-school-year published in the intermediate layout
pub const INTERMEDIATE_LAST_YEAR: u16 = 2020;

/// First year in the default registry
pub const FIRST_AVAILABLE_YEAR: u16 = 2016;

/// Last year in the default registry
pub const LAST_AVAILABLE_YEAR: u16 = 2026;

/// Years the source has withdrawn after publication
pub const WITHDRAWN_YEARS: &[u16] = &[2025];

/// Base location of the validation-day enrollment workbooks
pub const SOURCE_BASE_URL: &str =
    "https://doe.nv.gov/uploadedFiles/ndedoenvgov/content/DataCenter/Enrollment";

/// Responses smaller than this are treated as error pages rather than workbooks
pub const MIN_PAYLOAD_BYTES: u64 = 10_000;

/// Large workbooks can take minutes to download from the source
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Default maximum age of a cache entry before it is considered stale
pub const DEFAULT_MAX_CACHE_AGE_DAYS: u64 = 30;

/// Environment variable that overrides the cache directory
pub const CACHE_DIR_ENV: &str = "NV_ENROLLMENT_CACHE_DIR";

/// Width of zero-padded district and LEA codes
pub const DISTRICT_CODE_WIDTH: usize = 2;

/// Width of zero-padded school codes
pub const SCHOOL_CODE_WIDTH: usize = 4;

/// Rows scanned when looking for a worksheet's header row
pub const HEADER_SCAN_ROWS: usize = 20;

/// Grade label used for whole-entity records
pub const GRADE_TOTAL: &str = "TOTAL";

/// Pseudo-subgroup carrying the entity/grade enrollment total
pub const TOTAL_ENROLLMENT: &str = "total_enrollment";

/// Canonical grade codes in reporting order
pub const GRADE_ORDER: &[&str] = &[
    "PK", "K", "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "UG", "AD",
    GRADE_TOTAL,
];

/// Legacy files used grade 13 for ungraded students
pub const LEGACY_UNGRADED_SENTINEL: i64 = 13;

/// Tolerance used when checking that a subgroup partition sums to one
pub const PARTITION_TOLERANCE: f64 = 0.01;

/// Sort position of a canonical grade code; unknown codes sort last
pub fn grade_rank(grade: &str) -> usize {
    GRADE_ORDER
        .iter()
        .position(|g| *g == grade)
        .unwrap_or(GRADE_ORDER.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_rank_ordering() {
        assert!(grade_rank("PK") < grade_rank("K"));
        assert!(grade_rank("K") < grade_rank("01"));
        assert!(grade_rank("12") < grade_rank("UG"));
        assert_eq!(grade_rank("TOTAL"), GRADE_ORDER.len() - 1);
        assert_eq!(grade_rank("??"), GRADE_ORDER.len());
    }

    #[test]
    fn test_format_boundaries_are_ordered() {
        assert!(FIRST_AVAILABLE_YEAR <= LEGACY_LAST_YEAR);
        assert!(LEGACY_LAST_YEAR < INTERMEDIATE_LAST_YEAR);
        assert!(INTERMEDIATE_LAST_YEAR < LAST_AVAILABLE_YEAR);
    }
}
