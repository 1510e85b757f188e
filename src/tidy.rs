//! Wide to long (tidy) reshaping.
//!
//! Each wide record contributes a `total_enrollment` row plus one row per
//! reported subgroup. Unreported values produce no row at all, and a share
//! is only computed against a positive total.

use crate::constants::TOTAL_ENROLLMENT;
use crate::models::{LongRecord, Subgroup, WideRecord};
use tracing::debug;

/// `n / total`, or `None` when the total is zero or missing
pub fn share(n: i64, total: Option<i64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some(n as f64 / total as f64),
        _ => None,
    }
}

/// Subgroups reported by at least one record, in canonical order
pub fn present_subgroups(records: &[WideRecord]) -> Vec<Subgroup> {
    Subgroup::ALL
        .into_iter()
        .filter(|s| records.iter().any(|r| r.subgroups.get(*s).is_some()))
        .collect()
}

fn long_row(record: &WideRecord, subgroup: &str, n_students: i64) -> LongRecord {
    LongRecord {
        end_year: record.end_year,
        entity: record.entity.clone(),
        grade_level: record.grade_level.clone(),
        subgroup: subgroup.to_string(),
        n_students,
        pct: share(n_students, record.enrollment_total),
    }
}

/// Reshape wide records into long records
pub fn tidy_enrollment(records: &[WideRecord]) -> Vec<LongRecord> {
    let subgroups = present_subgroups(records);
    let mut long = Vec::with_capacity(records.len() * (1 + subgroups.len()));

    long.extend(records.iter().filter_map(|record| {
        record
            .enrollment_total
            .map(|total| long_row(record, TOTAL_ENROLLMENT, total))
    }));

    for subgroup in &subgroups {
        long.extend(records.iter().filter_map(|record| {
            record
                .subgroups
                .get(*subgroup)
                .map(|n| long_row(record, subgroup.name(), n))
        }));
    }

    debug!(
        "Tidied {} wide records into {} long records ({} subgroups present)",
        records.len(),
        long.len(),
        subgroups.len()
    );
    long
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PARTITION_TOLERANCE;
    use crate::models::{EntityIdentity, EntityType, SubgroupCategory};

    fn district(total: Option<i64>) -> WideRecord {
        let mut entity = EntityIdentity::new(EntityType::District);
        entity.lea_code = Some("02".to_string());
        entity.lea_name = Some("Clark County School District".to_string());
        let mut record = WideRecord::new(2024, entity, "TOTAL");
        record.enrollment_total = total;
        record
    }

    #[test]
    fn test_hispanic_share() {
        let mut record = district(Some(1000));
        record.subgroups.set(Subgroup::Hispanic, Some(450));

        let long = tidy_enrollment(&[record]);
        let hispanic = long.iter().find(|r| r.subgroup == "hispanic").unwrap();
        assert_eq!(hispanic.n_students, 450);
        assert_eq!(hispanic.pct, Some(0.45));
    }

    #[test]
    fn test_total_row_first_with_full_share() {
        let mut record = district(Some(1000));
        record.subgroups.set(Subgroup::Female, Some(490));

        let long = tidy_enrollment(&[record]);
        assert_eq!(long.len(), 2);
        assert!(long[0].is_total_enrollment());
        assert_eq!(long[0].n_students, 1000);
        assert_eq!(long[0].pct, Some(1.0));
    }

    #[test]
    fn test_zero_total_gives_missing_share() {
        let mut record = district(Some(0));
        record.subgroups.set(Subgroup::Female, Some(0));
        record.subgroups.set(Subgroup::Male, Some(0));

        let long = tidy_enrollment(&[record]);
        assert_eq!(long.len(), 3);
        for row in &long {
            assert_eq!(row.pct, None, "{} should have no share", row.subgroup);
        }
    }

    #[test]
    fn test_missing_total_keeps_counts_without_share() {
        let mut record = district(None);
        record.subgroups.set(Subgroup::Iep, Some(12));

        let long = tidy_enrollment(&[record]);
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].subgroup, "iep");
        assert_eq!(long[0].n_students, 12);
        assert_eq!(long[0].pct, None);
    }

    #[test]
    fn test_suppressed_values_produce_no_rows() {
        let mut reported = district(Some(100));
        reported.subgroups.set(Subgroup::El, Some(20));
        let mut suppressed = district(Some(50));
        suppressed.entity.lea_code = Some("16".to_string());
        suppressed.subgroups.set(Subgroup::El, None);

        let long = tidy_enrollment(&[reported, suppressed]);
        let el: Vec<&LongRecord> = long.iter().filter(|r| r.subgroup == "el").collect();
        assert_eq!(el.len(), 1);
        assert_eq!(el[0].entity.lea_code.as_deref(), Some("02"));
        assert!(long.iter().all(|r| r.n_students != 0));
    }

    #[test]
    fn test_unreported_subgroups_are_not_emitted() {
        let record = district(Some(100));
        assert!(present_subgroups(&[record.clone()]).is_empty());
        assert_eq!(tidy_enrollment(&[record]).len(), 1);
    }

    #[test]
    fn test_partitions_sum_to_one() {
        let mut record = district(Some(1000));
        for (subgroup, n) in [
            (Subgroup::Female, 490),
            (Subgroup::Male, 510),
            (Subgroup::AmericanIndian, 10),
            (Subgroup::Asian, 60),
            (Subgroup::Black, 110),
            (Subgroup::Hispanic, 450),
            (Subgroup::PacificIslander, 15),
            (Subgroup::White, 290),
            (Subgroup::Multiracial, 65),
            (Subgroup::Frl, 640),
        ] {
            record.subgroups.set(subgroup, Some(n));
        }

        let long = tidy_enrollment(&[record]);
        let sum_for = |category: SubgroupCategory| -> f64 {
            long.iter()
                .filter(|r| r.subgroup_kind().is_some_and(|s| s.category() == category))
                .filter_map(|r| r.pct)
                .sum()
        };

        assert!((sum_for(SubgroupCategory::RaceEthnicity) - 1.0).abs() <= PARTITION_TOLERANCE);
        assert!((sum_for(SubgroupCategory::Gender) - 1.0).abs() <= PARTITION_TOLERANCE);
    }
}
