//! Cell-level parsing: counts, grade labels and identifier codes.
//!
//! Suppression markers, blanks and anything unparseable become `None`
//! before any arithmetic happens. A suppressed cell is never read as zero.

use crate::constants::{GRADE_TOTAL, LEGACY_UNGRADED_SENTINEL};
use tracing::warn;

/// Markers the source uses for redacted or unavailable cells
const SUPPRESSION_MARKERS: &[&str] = &[
    "n/a", "na", "n.a.", "-", "--", "—", "–", ".", "null", "none",
];

/// Parse a student count, mapping suppression markers to `None`
pub fn parse_count(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    let lowered = value.to_lowercase();
    if SUPPRESSION_MARKERS.contains(&lowered.as_str())
        || value.contains('*')
        || value.starts_with('<')
        || value.starts_with('>')
    {
        return None;
    }

    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let number = cleaned.parse::<f64>().ok()?;
    // A fractional value is a share or rate, not a head count
    if !number.is_finite() || number < 0.0 || number.fract() != 0.0 {
        return None;
    }

    Some(number as i64)
}

/// Canonical grade code: PK, K, 01-12, UG, AD or TOTAL.
///
/// Unknown labels come back upper-cased so they still sort and group.
pub fn canonical_grade(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let stripped = upper
        .strip_prefix("GRADE")
        .map(str::trim)
        .unwrap_or(upper.as_str())
        .trim_start_matches(['-', ':', '.'])
        .trim();

    match stripped {
        "PK" | "P-K" | "PRE-K" | "PREK" | "PRE-KINDERGARTEN" | "PREKINDERGARTEN" | "PRESCHOOL" => {
            return "PK".to_string();
        }
        "K" | "KG" | "KF" | "KINDERGARTEN" => return "K".to_string(),
        "UG" | "UNGRADED" => return "UG".to_string(),
        "AD" | "ADULT" => return "AD".to_string(),
        "TOTAL" | "ALL" | "ALL GRADES" | "TOTAL ENROLLMENT" => return GRADE_TOTAL.to_string(),
        _ => {}
    }

    let digits = stripped
        .trim_end_matches("ST")
        .trim_end_matches("ND")
        .trim_end_matches("RD")
        .trim_end_matches("TH");
    if let Ok(number) = digits.parse::<f64>() {
        if number.fract() == 0.0 {
            let grade = number as i64;
            if grade == LEGACY_UNGRADED_SENTINEL {
                return "UG".to_string();
            }
            if (1..=12).contains(&grade) {
                return format!("{:02}", grade);
            }
        }
    }

    stripped.to_string()
}

/// Zero-pad an identifier code to exactly `width` characters.
///
/// Workbooks often store codes as numbers, so "2", "02" and "2.0" all
/// become "02" for a width of 2. Blank cells are `None`; so are codes that
/// cannot be written in `width` characters (too long, negative,
/// fractional), which are also logged.
pub fn pad_code(raw: &str, width: usize) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() || value.contains('*') {
        return None;
    }

    let code = match value.parse::<f64>() {
        Ok(number) if number.fract() == 0.0 && number >= 0.0 => format!("{}", number as i64),
        Ok(_) => String::new(),
        Err(_) => value.to_string(),
    };

    if code.is_empty() || code.len() > width || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        warn!("Ignoring identifier code {:?}: not a {}-character code", value, width);
        return None;
    }

    Some(format!("{:0>width$}", code, width = width))
}

/// Trimmed text, `None` when blank
pub fn clean_text(raw: &str) -> Option<String> {
    let value = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if value.is_empty() { None } else { Some(value) }
}
