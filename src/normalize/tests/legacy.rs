//! Legacy-era placeholder behavior (end years up to 2017)

use super::sheet;
use crate::models::{EntityType, FormatEra, RawBundle, SheetRole};
use crate::normalize::legacy::STATE_NAME;
use crate::normalize::normalize_bundle;

fn legacy_bundle(rows: &[&[&str]]) -> RawBundle {
    RawBundle {
        end_year: 2017,
        era: FormatEra::Legacy,
        sheets: vec![sheet(
            SheetRole::Combined,
            "Sheet1",
            &["District", "School Name", "Grade", "Total"],
            rows,
        )],
    }
}

#[test]
fn test_placeholder_uses_state_row_total() {
    let bundle = legacy_bundle(&[
        &["Clark", "", "", "320000"],
        &["Nevada", "", "", "467,527"],
    ]);

    let records = normalize_bundle(&bundle).unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.end_year, 2017);
    assert_eq!(record.entity.entity_type, EntityType::State);
    assert_eq!(record.entity.lea_name.as_deref(), Some(STATE_NAME));
    assert!(record.is_total_grade());
    assert_eq!(record.enrollment_total, Some(467_527));
    assert!(!record.subgroups.any_reported());
}

#[test]
fn test_placeholder_without_state_row_has_missing_total() {
    let bundle = legacy_bundle(&[&["Clark", "", "", "320000"]]);

    let records = normalize_bundle(&bundle).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].enrollment_total, None);
}

#[test]
fn test_placeholder_for_empty_bundle() {
    let bundle = RawBundle {
        end_year: 2016,
        era: FormatEra::Legacy,
        sheets: Vec::new(),
    };
    let records = normalize_bundle(&bundle).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].end_year, 2016);
}

#[test]
fn test_placeholder_ignores_district_total_rows() {
    let bundle = legacy_bundle(&[
        &["Clark", "", "Total", "320000"],
        &["State Total", "", "Total", "467527"],
    ]);

    let records = normalize_bundle(&bundle).unwrap();
    assert_eq!(records[0].enrollment_total, Some(467_527));
}
