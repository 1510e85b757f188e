//! Stateless filters and rollups over long-form record sets.

use crate::constants::{DISTRICT_CODE_WIDTH, GRADE_TOTAL};
use crate::models::{EntityIdentity, EntityType, FlaggedRecord, GradeBand, LongRecord};
use crate::normalize::values::pad_code;
use std::collections::HashMap;

/// Anything that wraps a long record
pub trait EnrollmentRow: Clone {
    fn long(&self) -> &LongRecord;
}

impl EnrollmentRow for LongRecord {
    fn long(&self) -> &LongRecord {
        self
    }
}

impl EnrollmentRow for FlaggedRecord {
    fn long(&self) -> &LongRecord {
        &self.record
    }
}

/// Rows whose LEA or district code equals `code` once padded
pub fn filter_by_district<T: EnrollmentRow>(records: &[T], code: &str) -> Vec<T> {
    let Some(code) = pad_code(code, DISTRICT_CODE_WIDTH) else {
        return Vec::new();
    };
    let code = Some(code.as_str());

    records
        .iter()
        .filter(|row| {
            let entity = &row.long().entity;
            entity.lea_code.as_deref() == code || entity.district_code.as_deref() == code
        })
        .cloned()
        .collect()
}

/// Rows whose district or LEA name contains `name`, ignoring case
pub fn filter_by_county<T: EnrollmentRow>(records: &[T], name: &str) -> Vec<T> {
    let needle = name.trim().to_lowercase();
    let matches = |value: &Option<String>| {
        value
            .as_deref()
            .is_some_and(|v| v.to_lowercase().contains(&needle))
    };

    records
        .iter()
        .filter(|row| {
            let entity = &row.long().entity;
            matches(&entity.district_name) || matches(&entity.lea_name)
        })
        .cloned()
        .collect()
}

pub fn filter_entity_level<T: EnrollmentRow>(records: &[T], level: EntityType) -> Vec<T> {
    records
        .iter()
        .filter(|row| row.long().entity.entity_type == level)
        .cloned()
        .collect()
}

/// Sum `n_students` across the band's grades per (year, entity, subgroup).
///
/// Rollup rows carry the band label as their grade and no share.
pub fn grade_band_rollup<T: EnrollmentRow>(records: &[T], band: GradeBand) -> Vec<LongRecord> {
    let mut index: HashMap<(u16, &EntityIdentity, &str), usize> = HashMap::new();
    let mut rollup: Vec<LongRecord> = Vec::new();

    for row in records.iter().map(EnrollmentRow::long) {
        if !band.contains(&row.grade_level) {
            continue;
        }

        let key = (row.end_year, &row.entity, row.subgroup.as_str());
        match index.get(&key) {
            Some(&at) => rollup[at].n_students += row.n_students,
            None => {
                index.insert(key, rollup.len());
                rollup.push(LongRecord {
                    end_year: row.end_year,
                    entity: row.entity.clone(),
                    grade_level: band.label().to_string(),
                    subgroup: row.subgroup.clone(),
                    n_students: row.n_students,
                    pct: None,
                });
            }
        }
    }

    rollup
}

/// Statewide total enrollment rows, one per year
pub fn state_summary<T: EnrollmentRow>(records: &[T]) -> Vec<LongRecord> {
    let mut rows: Vec<LongRecord> = records
        .iter()
        .map(EnrollmentRow::long)
        .filter(|r| {
            r.entity.entity_type == EntityType::State
                && r.is_total_enrollment()
                && r.grade_level == GRADE_TOTAL
        })
        .cloned()
        .collect();
    rows.sort_by_key(|r| r.end_year);
    rows
}
