//! Year registry: which end-years the source publishes and where.
//!
//! The registry is a point-in-time fact about the source. Years can be
//! withdrawn after publication, so a year mapped to `None` and a year
//! missing from the map are both treated as "not available".

use crate::constants::{
    FIRST_AVAILABLE_YEAR, LAST_AVAILABLE_YEAR, SOURCE_BASE_URL, WITHDRAWN_YEARS,
};
use crate::error::{EnrollmentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Ordered mapping of end-year to download location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRegistry {
    years: BTreeMap<u16, Option<String>>,
}

impl Default for YearRegistry {
    fn default() -> Self {
        let years = (FIRST_AVAILABLE_YEAR..=LAST_AVAILABLE_YEAR)
            .map(|year| {
                let url = if WITHDRAWN_YEARS.contains(&year) {
                    None
                } else {
                    Some(default_url(year))
                };
                (year, url)
            })
            .collect();
        Self { years }
    }
}

/// Source file name for an end-year, e.g. 2024 -> 2023-2024 school year
fn default_url(end_year: u16) -> String {
    format!(
        "{}/{}-{}_Validation_Day_Student_Counts.xlsx",
        SOURCE_BASE_URL,
        end_year - 1,
        end_year
    )
}

impl YearRegistry {
    /// Build a registry from explicit year -> location entries
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (u16, Option<String>)>,
    {
        Self {
            years: entries.into_iter().collect(),
        }
    }

    /// Load a registry override from a JSON object of `"year": "url" | null`
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let raw: BTreeMap<String, Option<String>> = serde_json::from_str(&text)?;

        let mut years = BTreeMap::new();
        for (key, url) in raw {
            let year = key
                .trim()
                .parse::<u16>()
                .map_err(|_| EnrollmentError::Configuration {
                    message: format!("Registry key '{}' is not a year", key),
                })?;
            years.insert(year, url);
        }

        debug!(
            "Loaded year registry with {} entries from {}",
            years.len(),
            path.display()
        );
        Ok(Self { years })
    }

    /// Years that currently have a download location, ascending
    pub fn available_years(&self) -> Vec<u16> {
        self.years
            .iter()
            .filter(|(_, url)| url.is_some())
            .map(|(year, _)| *year)
            .collect()
    }

    pub fn min_year(&self) -> Option<u16> {
        self.years.keys().next().copied()
    }

    pub fn max_year(&self) -> Option<u16> {
        self.years.keys().next_back().copied()
    }

    /// Whether `year` falls inside the published range, available or not
    pub fn in_range(&self, year: u16) -> bool {
        match (self.min_year(), self.max_year()) {
            (Some(min), Some(max)) => (min..=max).contains(&year),
            _ => false,
        }
    }

    pub fn is_available(&self, year: u16) -> bool {
        matches!(self.years.get(&year), Some(Some(_)))
    }

    /// Fail with `InvalidYear` unless `year` is inside the published range
    pub fn check_range(&self, year: u16) -> Result<()> {
        if self.in_range(year) {
            Ok(())
        } else {
            Err(EnrollmentError::InvalidYear {
                year,
                min: self.min_year().unwrap_or(0),
                max: self.max_year().unwrap_or(0),
            })
        }
    }

    /// Download location for `year`
    pub fn url_for(&self, year: u16) -> Result<&str> {
        self.check_range(year)?;
        match self.years.get(&year) {
            Some(Some(url)) => Ok(url.as_str()),
            _ => Err(EnrollmentError::YearUnavailable { year }),
        }
    }

    /// Replace or add the location for a year
    pub fn set(&mut self, year: u16, url: Option<String>) {
        self.years.insert(year, url);
    }
}

/// Years available from the default registry
pub fn get_available_years() -> Vec<u16> {
    YearRegistry::default().available_years()
}
