//! Raw fetching: get one year's workbook and pull out its worksheets.
//!
//! The fetcher owns the downloaded file for the duration of a fetch. The
//! temporary file is removed when the fetch returns, on success or failure.
//! A worksheet that is missing from an otherwise valid workbook is logged
//! and skipped; the rest of the bundle is still returned.

pub mod download;
pub mod workbook;

use self::workbook::{CalamineWorkbook, SheetGrid, WorkbookSource};

use crate::classify::classify_year;
use crate::config::EnrollmentConfig;
use crate::constants::HEADER_SCAN_ROWS;
use crate::error::{EnrollmentError, Result};
use crate::models::{FormatEra, RawBundle, RawSheet, SheetRole};
use crate::patterns::{EraPatterns, SheetSpec, era_patterns};
use crate::registry::YearRegistry;
use crate::resolver::CompiledField;

use regex::RegexBuilder;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Anything that can produce one year's raw worksheets
pub trait BundleSource: Send + Sync + std::fmt::Debug {
    fn load(&self, end_year: u16) -> Result<RawBundle>;
}

/// Retrieves raw worksheet bundles by download or from a local file
#[derive(Debug, Clone)]
pub struct RawFetcher {
    config: Arc<EnrollmentConfig>,
    registry: Arc<YearRegistry>,
}

impl RawFetcher {
    pub fn new(config: Arc<EnrollmentConfig>, registry: Arc<YearRegistry>) -> Self {
        Self { config, registry }
    }

    /// Download `end_year`'s workbook and extract its worksheets
    pub fn fetch(&self, end_year: u16) -> Result<RawBundle> {
        let era = classify_year(end_year, &self.registry)?;
        let url = self.registry.url_for(end_year)?;

        let client = download::build_client(&self.config)?;
        let temp_file =
            download::download_workbook(&client, url, end_year, self.config.min_payload_bytes)?;

        let bundle = {
            let mut workbook = CalamineWorkbook::open(temp_file.path())?;
            extract_bundle(&mut workbook, end_year, era)?
        };

        info!(
            "Fetched {} ({} format): {} worksheet(s)",
            end_year,
            era,
            bundle.sheets.len()
        );
        Ok(bundle)
    }

    /// Read a workbook the caller already downloaded
    pub fn import_local(&self, path: &Path, end_year: u16) -> Result<RawBundle> {
        let era = classify_year(end_year, &self.registry)?;
        if !path.exists() {
            return Err(EnrollmentError::Workbook {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let mut workbook = CalamineWorkbook::open(path)?;
        let bundle = extract_bundle(&mut workbook, end_year, era)?;
        info!(
            "Imported {} ({} format) from {}: {} worksheet(s)",
            end_year,
            era,
            path.display(),
            bundle.sheets.len()
        );
        Ok(bundle)
    }
}

impl BundleSource for RawFetcher {
    fn load(&self, end_year: u16) -> Result<RawBundle> {
        self.fetch(end_year)
    }
}

/// Pull the era's worksheets out of an open workbook
pub fn extract_bundle<W: WorkbookSource + ?Sized>(
    workbook: &mut W,
    end_year: u16,
    era: FormatEra,
) -> Result<RawBundle> {
    let table = era_patterns(era);
    let header_fields = header_fields(table)?;
    let names = workbook.sheet_names();
    let mut taken = HashSet::new();
    let mut sheets = Vec::new();

    for spec in table.sheets {
        let Some(name) = match_sheet(&names, spec, &taken)? else {
            let missing = EnrollmentError::SheetNotFound {
                sheet: spec.label.to_string(),
            };
            let note = if spec.required { "" } else { " (optional sheet)" };
            warn!(
                "{} in {} workbook{}; continuing without it",
                missing, end_year, note
            );
            continue;
        };
        taken.insert(name.clone());

        match workbook.read_sheet(&name) {
            Ok(grid) => sheets.push(build_raw_sheet(spec.role, name, grid, &header_fields)),
            Err(e) => warn!(
                "Skipping worksheet '{}' in {} workbook: {}",
                name, end_year, e
            ),
        }
    }

    Ok(RawBundle {
        end_year,
        era,
        sheets,
    })
}

/// Fields whose presence marks a header row
fn header_fields(table: &EraPatterns) -> Result<Vec<CompiledField>> {
    table
        .identifiers
        .iter()
        .chain(std::iter::once(&table.total))
        .map(CompiledField::compile)
        .collect()
}

/// First workbook sheet matching the spec, trying patterns in order
fn match_sheet(
    names: &[String],
    spec: &SheetSpec,
    taken: &HashSet<String>,
) -> Result<Option<String>> {
    for pattern in spec.patterns {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| EnrollmentError::Configuration {
                message: format!("Invalid sheet pattern '{}': {}", pattern, e),
            })?;

        if let Some(name) = names
            .iter()
            .find(|name| !taken.contains(*name) && re.is_match(name.trim()))
        {
            return Ok(Some(name.clone()));
        }
    }
    Ok(None)
}

/// Index of the row that looks most like a header, scanning the top of the sheet.
///
/// Title banners and notes often sit above the real header, so the row
/// with the most recognised identifier/total headers wins (earliest on ties).
pub fn detect_header_row(grid: &[Vec<String>], fields: &[CompiledField]) -> usize {
    let mut best = (0, 0usize);
    for (index, row) in grid.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let score = row
            .iter()
            .filter(|cell| !cell.trim().is_empty())
            .filter(|cell| fields.iter().any(|f| f.matches(cell)))
            .count();
        if score > best.1 {
            best = (index, score);
        }
    }
    best.0
}

fn build_raw_sheet(
    role: SheetRole,
    name: String,
    grid: SheetGrid,
    header_fields: &[CompiledField],
) -> RawSheet {
    let header_index = detect_header_row(&grid, header_fields);
    let mut rows = grid.into_iter().skip(header_index);
    let headers = rows.next().unwrap_or_default();
    let rows: Vec<Vec<String>> = rows
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    debug!(
        "Worksheet '{}' ({:?}): header at row {}, {} columns, {} data rows",
        name,
        role,
        header_index,
        headers.len(),
        rows.len()
    );

    RawSheet {
        role,
        name,
        headers,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::workbook::InMemoryWorkbook;
    use super::*;

    fn modern_workbook() -> InMemoryWorkbook {
        InMemoryWorkbook::new()
            .with_sheet(
                "State",
                vec![
                    vec!["Nevada Validation Day Enrollment 2023-24", "", ""],
                    vec!["", "", ""],
                    vec!["LEA Name", "Total", "Female"],
                    vec!["State of Nevada", "480000", "233000"],
                ],
            )
            .with_sheet(
                "District",
                vec![
                    vec!["LEA Code", "LEA Name", "Total"],
                    vec!["02", "Clark", "300000"],
                    vec!["", "", ""],
                    vec!["16", "Washoe", "60000"],
                ],
            )
    }

    /// Log sink for asserting on emitted events
    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_optional_sheet_is_a_warning() {
        let mut workbook = InMemoryWorkbook::new()
            .with_sheet(
                "Districts",
                vec![
                    vec!["Master District Code", "District Name", "Total"],
                    vec!["02", "Clark", "300000"],
                ],
            )
            .with_sheet(
                "Schools",
                vec![
                    vec!["Master District Code", "School Code", "School Name", "Total"],
                    vec!["02", "2205", "Example Elementary School", "500"],
                ],
            );

        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let bundle = tracing::subscriber::with_default(subscriber, || {
            extract_bundle(&mut workbook, 2019, FormatEra::Intermediate).unwrap()
        });

        assert_eq!(bundle.sheets.len(), 2);
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("optional sheet"));
    }

    #[test]
    fn test_missing_sheet_does_not_abort_extraction() {
        let mut workbook = modern_workbook();
        let bundle = extract_bundle(&mut workbook, 2024, FormatEra::Modern).unwrap();

        assert_eq!(bundle.end_year, 2024);
        assert_eq!(bundle.era, FormatEra::Modern);
        assert_eq!(bundle.sheets.len(), 2);
        assert!(bundle.sheet(SheetRole::State).is_some());
        assert!(bundle.sheet(SheetRole::District).is_some());
        assert!(bundle.sheet(SheetRole::School).is_none());
    }

    #[test]
    fn test_header_row_detected_below_title_banner() {
        let mut workbook = modern_workbook();
        let bundle = extract_bundle(&mut workbook, 2024, FormatEra::Modern).unwrap();

        let state = bundle.sheet(SheetRole::State).unwrap();
        assert_eq!(state.headers, vec!["LEA Name", "Total", "Female"]);
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.cell(0, 0), "State of Nevada");
    }

    #[test]
    fn test_blank_rows_dropped() {
        let mut workbook = modern_workbook();
        let bundle = extract_bundle(&mut workbook, 2024, FormatEra::Modern).unwrap();

        let district = bundle.sheet(SheetRole::District).unwrap();
        assert_eq!(district.rows.len(), 2);
        assert_eq!(district.cell(1, 1), "Washoe");
    }

    #[test]
    fn test_sheet_names_matched_case_insensitively_without_reuse() {
        let mut workbook = InMemoryWorkbook::new()
            .with_sheet("SCHOOL LEVEL", vec![vec!["School Name", "Total"]])
            .with_sheet("district totals", vec![vec!["District Name", "Total"]]);

        let bundle = extract_bundle(&mut workbook, 2019, FormatEra::Intermediate).unwrap();
        assert_eq!(bundle.sheets.len(), 2);
        assert_eq!(bundle.sheet(SheetRole::District).unwrap().name, "district totals");
        assert_eq!(bundle.sheet(SheetRole::School).unwrap().name, "SCHOOL LEVEL");
    }

    #[test]
    fn test_empty_workbook_yields_empty_bundle() {
        let mut workbook = InMemoryWorkbook::new();
        let bundle = extract_bundle(&mut workbook, 2024, FormatEra::Modern).unwrap();
        assert!(bundle.sheets.is_empty());
    }

    #[test]
    fn test_import_local_missing_file() {
        let fetcher = RawFetcher::new(
            Arc::new(EnrollmentConfig::default()),
            Arc::new(YearRegistry::default()),
        );
        let err = fetcher
            .import_local(Path::new("/nonexistent/2024.xlsx"), 2024)
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::Workbook { .. }));
    }

    #[test]
    fn test_import_local_validates_year_first() {
        let fetcher = RawFetcher::new(
            Arc::new(EnrollmentConfig::default()),
            Arc::new(YearRegistry::default()),
        );
        let err = fetcher
            .import_local(Path::new("/nonexistent/1990.xlsx"), 1990)
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::InvalidYear { year: 1990, .. }));
    }

    #[test]
    fn test_fetch_unavailable_year_fails_before_network() {
        let fetcher = RawFetcher::new(
            Arc::new(EnrollmentConfig::default()),
            Arc::new(YearRegistry::default()),
        );
        let err = fetcher.fetch(2025).unwrap_err();
        assert!(err.is_invalid_year());
    }
}
