//! Column resolution for drifting worksheet headers.
//!
//! A canonical field is described by an ordered list of case-insensitive
//! regex patterns, most specific first. Resolution tries each pattern in
//! order against every header and returns the first hit, so the same
//! header set and pattern list always resolve to the same column.
//! A field that resolves to nothing is not an error: the year's source
//! simply does not report it.

use crate::error::{EnrollmentError, Result};
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use tracing::debug;

/// Declarative match rules for one canonical field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub patterns: &'static [&'static str],
    /// Headers matching any of these are never taken for the field
    pub exclude: &'static [&'static str],
}

impl FieldSpec {
    pub const fn new(field: &'static str, patterns: &'static [&'static str]) -> Self {
        Self {
            field,
            patterns,
            exclude: &[],
        }
    }

    pub const fn excluding(mut self, exclude: &'static [&'static str]) -> Self {
        self.exclude = exclude;
        self
    }
}

/// A field spec with its patterns compiled
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub field: String,
    patterns: Vec<Regex>,
    exclude: Vec<Regex>,
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| EnrollmentError::Configuration {
            message: format!("Invalid pattern '{}' for field '{}': {}", pattern, field, e),
        })
}

impl CompiledField {
    pub fn compile(spec: &FieldSpec) -> Result<Self> {
        Self::from_patterns(spec.field, spec.patterns, spec.exclude)
    }

    pub fn from_patterns(field: &str, patterns: &[&str], exclude: &[&str]) -> Result<Self> {
        Ok(Self {
            field: field.to_string(),
            patterns: patterns
                .iter()
                .map(|p| compile_pattern(field, p))
                .collect::<Result<_>>()?,
            exclude: exclude
                .iter()
                .map(|p| compile_pattern(field, p))
                .collect::<Result<_>>()?,
        })
    }

    fn is_excluded(&self, header: &str) -> bool {
        self.exclude.iter().any(|re| re.is_match(header))
    }

    /// Whether any pattern matches the header
    pub fn matches(&self, header: &str) -> bool {
        let header = normalize_header(header);
        !self.is_excluded(&header) && self.patterns.iter().any(|re| re.is_match(&header))
    }
}

/// A header picked for a canonical field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub index: usize,
    pub header: String,
}

/// Collapse whitespace (including embedded newlines) and trim
pub fn normalize_header(header: &str) -> String {
    header.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves canonical fields against one worksheet's headers
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    raw: Vec<String>,
    normalized: Vec<String>,
    claimed: HashSet<usize>,
}

impl ColumnResolver {
    pub fn new(headers: &[String]) -> Self {
        Self {
            raw: headers.to_vec(),
            normalized: headers.iter().map(|h| normalize_header(h)).collect(),
            claimed: HashSet::new(),
        }
    }

    /// First header matching the field, trying patterns in order
    pub fn resolve(&self, field: &CompiledField) -> Option<ResolvedColumn> {
        self.find(field, false)
    }

    /// Like [`resolve`](Self::resolve), but skips columns already claimed
    /// and claims the hit so no two fields share a column
    pub fn claim(&mut self, field: &CompiledField) -> Option<ResolvedColumn> {
        let hit = self.find(field, true)?;
        self.claimed.insert(hit.index);
        Some(hit)
    }

    fn find(&self, field: &CompiledField, skip_claimed: bool) -> Option<ResolvedColumn> {
        for pattern in &field.patterns {
            for (index, header) in self.normalized.iter().enumerate() {
                if header.is_empty() || (skip_claimed && self.claimed.contains(&index)) {
                    continue;
                }
                if field.is_excluded(header) {
                    continue;
                }
                if pattern.is_match(header) {
                    debug!(
                        "Resolved field '{}' to column '{}' via /{}/",
                        field.field,
                        self.raw[index],
                        pattern.as_str()
                    );
                    return Some(ResolvedColumn {
                        index,
                        header: self.raw[index].clone(),
                    });
                }
            }
        }
        None
    }

    pub fn headers(&self) -> &[String] {
        &self.raw
    }
}

/// One-shot lookup: the first header matching any pattern, in pattern order
pub fn find_column(headers: &[String], patterns: &[&str]) -> Result<Option<String>> {
    let field = CompiledField::from_patterns("ad hoc", patterns, &[])?;
    Ok(ColumnResolver::new(headers)
        .resolve(&field)
        .map(|hit| hit.header))
}
