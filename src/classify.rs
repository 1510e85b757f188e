//! Format classification: which workbook layout a given end-year uses.

use crate::constants::{INTERMEDIATE_LAST_YEAR, LEGACY_LAST_YEAR};
use crate::error::Result;
use crate::models::FormatEra;
use crate::registry::YearRegistry;

/// Era for an end-year, without checking availability
pub fn era_for_year(end_year: u16) -> FormatEra {
    if end_year <= LEGACY_LAST_YEAR {
        FormatEra::Legacy
    } else if end_year <= INTERMEDIATE_LAST_YEAR {
        FormatEra::Intermediate
    } else {
        FormatEra::Modern
    }
}

/// Classify a requested year, failing with `InvalidYear` outside the registry range
pub fn classify_year(end_year: u16, registry: &YearRegistry) -> Result<FormatEra> {
    registry.check_range(end_year)?;
    Ok(era_for_year(end_year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrollmentError;

    #[test]
    fn test_boundary_years() {
        assert_eq!(era_for_year(2016), FormatEra::Legacy);
        assert_eq!(era_for_year(2017), FormatEra::Legacy);
        assert_eq!(era_for_year(2018), FormatEra::Intermediate);
        assert_eq!(era_for_year(2019), FormatEra::Intermediate);
        assert_eq!(era_for_year(2020), FormatEra::Intermediate);
        assert_eq!(era_for_year(2021), FormatEra::Modern);
        assert_eq!(era_for_year(2024), FormatEra::Modern);
    }

    #[test]
    fn test_classify_against_registry() {
        let registry = YearRegistry::default();
        assert_eq!(classify_year(2017, &registry).unwrap(), FormatEra::Legacy);
        assert_eq!(
            classify_year(2019, &registry).unwrap(),
            FormatEra::Intermediate
        );
        assert_eq!(classify_year(2024, &registry).unwrap(), FormatEra::Modern);
    }

    #[test]
    fn test_classify_rejects_years_outside_range() {
        let registry = YearRegistry::default();
        assert!(matches!(
            classify_year(2015, &registry),
            Err(EnrollmentError::InvalidYear { year: 2015, .. })
        ));
        assert!(matches!(
            classify_year(2030, &registry),
            Err(EnrollmentError::InvalidYear { year: 2030, .. })
        ));
    }
}
