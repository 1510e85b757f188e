//! Entity-level and charter flags for long records.

use crate::models::{AggregationFlag, EntityType, FlaggedRecord, LongRecord};

/// Case-insensitive name fragments that mark a charter LEA
const CHARTER_MARKERS: &[&str] = &["charter", "spcsa"];

/// Whether an organization name belongs to a charter authority
pub fn is_charter_name(name: Option<&str>) -> bool {
    name.map(str::to_lowercase)
        .is_some_and(|name| CHARTER_MARKERS.iter().any(|marker| name.contains(marker)))
}

pub fn aggregation_flag(entity_type: EntityType) -> AggregationFlag {
    match entity_type {
        EntityType::State => AggregationFlag::State,
        EntityType::District => AggregationFlag::District,
        EntityType::School => AggregationFlag::Campus,
    }
}

pub fn flag_record(record: LongRecord) -> FlaggedRecord {
    let entity_type = record.entity.entity_type;
    let is_charter = is_charter_name(record.entity.organization_name());

    FlaggedRecord {
        is_state: entity_type == EntityType::State,
        is_district: entity_type == EntityType::District,
        is_school: entity_type == EntityType::School,
        is_charter,
        aggregation_flag: aggregation_flag(entity_type),
        record,
    }
}

pub fn flag_records(records: Vec<LongRecord>) -> Vec<FlaggedRecord> {
    records.into_iter().map(flag_record).collect()
}

impl FlaggedRecord {
    /// Exactly one level flag is set and it matches `aggregation_flag`
    pub fn flags_consistent(&self) -> bool {
        let set = [self.is_state, self.is_district, self.is_school]
            .iter()
            .filter(|b| **b)
            .count();
        let agrees = match self.aggregation_flag {
            AggregationFlag::State => self.is_state,
            AggregationFlag::District => self.is_district,
            AggregationFlag::Campus => self.is_school,
        };
        set == 1 && agrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityIdentity;

    fn long(
        entity_type: EntityType,
        lea_name: Option<&str>,
        district_name: Option<&str>,
    ) -> LongRecord {
        let mut entity = EntityIdentity::new(entity_type);
        entity.lea_name = lea_name.map(String::from);
        entity.district_name = district_name.map(String::from);
        LongRecord {
            end_year: 2024,
            entity,
            grade_level: "TOTAL".to_string(),
            subgroup: "total_enrollment".to_string(),
            n_students: 100,
            pct: Some(1.0),
        }
    }

    #[test]
    fn test_level_flags_are_consistent() {
        for entity_type in [EntityType::State, EntityType::District, EntityType::School] {
            let flagged = flag_record(long(entity_type, None, None));
            assert!(flagged.flags_consistent(), "{:?}", entity_type);
        }

        let school = flag_record(long(EntityType::School, None, None));
        assert!(school.is_school);
        assert_eq!(school.aggregation_flag, AggregationFlag::Campus);
        assert_eq!(school.aggregation_flag.as_str(), "campus");
    }

    #[test]
    fn test_charter_detection() {
        let spcsa = flag_record(long(
            EntityType::District,
            Some("State Public Charter School Authority"),
            None,
        ));
        assert!(spcsa.is_charter);

        let acronym = flag_record(long(EntityType::School, Some("SPCSA"), None));
        assert!(acronym.is_charter);

        let clark = flag_record(long(
            EntityType::District,
            Some("Clark County School District"),
            None,
        ));
        assert!(!clark.is_charter);
    }

    #[test]
    fn test_charter_prefers_lea_name_then_district_name() {
        let from_district = flag_record(long(EntityType::District, None, Some("Charter Schools")));
        assert!(from_district.is_charter);

        let lea_wins = flag_record(long(
            EntityType::District,
            Some("Washoe"),
            Some("Charter Schools"),
        ));
        assert!(!lea_wins.is_charter);
    }

    #[test]
    fn test_no_name_defaults_to_not_charter() {
        let flagged = flag_record(long(EntityType::State, None, None));
        assert!(!flagged.is_charter);
        assert!(flagged.is_state);
    }

    #[test]
    fn test_flag_records_keeps_order() {
        let flagged = flag_records(vec![
            long(EntityType::State, None, None),
            long(EntityType::School, None, None),
        ]);
        assert_eq!(flagged.len(), 2);
        assert!(flagged[0].is_state);
        assert!(flagged[1].is_school);
        assert!(flagged.iter().all(FlaggedRecord::flags_consistent));
    }
}
