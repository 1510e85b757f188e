//! Workbook access behind a small trait.
//!
//! The pipeline only needs to list worksheet names and read a named
//! worksheet into rows of cell text. `CalamineWorkbook` does that for
//! xlsx/xls files; `InMemoryWorkbook` serves grids the caller already has.

use crate::error::{EnrollmentError, Result};
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rows of cell text, header row included
pub type SheetGrid = Vec<Vec<String>>;

/// Minimal worksheet access used by the fetcher
pub trait WorkbookSource {
    fn sheet_names(&self) -> Vec<String>;
    fn read_sheet(&mut self, name: &str) -> Result<SheetGrid>;
}

/// Spreadsheet file opened with calamine (format detected from extension)
pub struct CalamineWorkbook {
    path: PathBuf,
    inner: Sheets<BufReader<File>>,
}

impl fmt::Debug for CalamineWorkbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalamineWorkbook")
            .field("path", &self.path)
            .finish()
    }
}

impl CalamineWorkbook {
    pub fn open(path: &Path) -> Result<Self> {
        let inner = open_workbook_auto(path).map_err(|e| EnrollmentError::Workbook {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Opened workbook {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }
}

/// Cell text as it would read in the spreadsheet
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Int(i) => i.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

impl WorkbookSource for CalamineWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.inner.sheet_names()
    }

    fn read_sheet(&mut self, name: &str) -> Result<SheetGrid> {
        let range = self
            .inner
            .worksheet_range(name)
            .map_err(|e| EnrollmentError::Workbook {
                path: self.path.clone(),
                reason: format!("sheet '{}': {}", name, e),
            })?;

        let (rows, cols) = range.get_size();
        debug!("Read sheet '{}': {} rows x {} columns", name, rows, cols);

        Ok(range
            .rows()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

/// Worksheets held in memory, e.g. grids converted from another source
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkbook {
    sheets: Vec<(String, SheetGrid)>,
}

impl InMemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet<R, C>(mut self, name: &str, rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let grid = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect())
            .collect();
        self.sheets.push((name.to_string(), grid));
        self
    }
}

impl WorkbookSource for InMemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn read_sheet(&mut self, name: &str) -> Result<SheetGrid> {
        self.sheets
            .iter()
            .find(|(sheet, _)| sheet == name)
            .map(|(_, grid)| grid.clone())
            .ok_or_else(|| EnrollmentError::SheetNotFound {
                sheet: name.to_string(),
            })
    }
}
