//! Core data structures for enrollment processing.
//!
//! Defines the file-format eras, entity levels, subgroups, the raw bundle
//! handed from the fetcher to the normalizer, and the wide, long and
//! flagged record shapes produced by the pipeline.

use crate::constants::{GRADE_TOTAL, TOTAL_ENROLLMENT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Historical layout of the published workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatEra {
    Legacy,
    Intermediate,
    Modern,
}

impl FormatEra {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatEra::Legacy => "legacy",
            FormatEra::Intermediate => "intermediate",
            FormatEra::Modern => "modern",
        }
    }
}

impl fmt::Display for FormatEra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of the entity a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    State,
    District,
    School,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::State => "State",
            EntityType::District => "District",
            EntityType::School => "School",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "State" => Some(EntityType::State),
            "District" => Some(EntityType::District),
            "School" => Some(EntityType::School),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partition a subgroup belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubgroupCategory {
    Gender,
    RaceEthnicity,
    SpecialPopulation,
}

/// Demographic or program population reported alongside the enrollment total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subgroup {
    Female,
    Male,
    AmericanIndian,
    Asian,
    Black,
    Hispanic,
    PacificIslander,
    White,
    Multiracial,
    Frl,
    Iep,
    El,
    Migrant,
    Foster,
    Military,
    Homeless,
}

impl Subgroup {
    /// Every subgroup in output column order
    pub const ALL: [Subgroup; 16] = [
        Subgroup::Female,
        Subgroup::Male,
        Subgroup::AmericanIndian,
        Subgroup::Asian,
        Subgroup::Black,
        Subgroup::Hispanic,
        Subgroup::PacificIslander,
        Subgroup::White,
        Subgroup::Multiracial,
        Subgroup::Frl,
        Subgroup::Iep,
        Subgroup::El,
        Subgroup::Migrant,
        Subgroup::Foster,
        Subgroup::Military,
        Subgroup::Homeless,
    ];

    /// Canonical column / subgroup name
    pub fn name(&self) -> &'static str {
        match self {
            Subgroup::Female => "female",
            Subgroup::Male => "male",
            Subgroup::AmericanIndian => "american_indian",
            Subgroup::Asian => "asian",
            Subgroup::Black => "black",
            Subgroup::Hispanic => "hispanic",
            Subgroup::PacificIslander => "pacific_islander",
            Subgroup::White => "white",
            Subgroup::Multiracial => "multiracial",
            Subgroup::Frl => "frl",
            Subgroup::Iep => "iep",
            Subgroup::El => "el",
            Subgroup::Migrant => "migrant",
            Subgroup::Foster => "foster",
            Subgroup::Military => "military",
            Subgroup::Homeless => "homeless",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Subgroup::ALL.iter().copied().find(|s| s.name() == name)
    }

    pub fn category(&self) -> SubgroupCategory {
        match self {
            Subgroup::Female | Subgroup::Male => SubgroupCategory::Gender,
            Subgroup::AmericanIndian
            | Subgroup::Asian
            | Subgroup::Black
            | Subgroup::Hispanic
            | Subgroup::PacificIslander
            | Subgroup::White
            | Subgroup::Multiracial => SubgroupCategory::RaceEthnicity,
            _ => SubgroupCategory::SpecialPopulation,
        }
    }
}

/// Subgroup counts for one entity/grade.
///
/// `None` means the source did not report the value (column absent or cell
/// suppressed). It is never interchangeable with a reported zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgroupCounts {
    pub female: Option<i64>,
    pub male: Option<i64>,
    pub american_indian: Option<i64>,
    pub asian: Option<i64>,
    pub black: Option<i64>,
    pub hispanic: Option<i64>,
    pub pacific_islander: Option<i64>,
    pub white: Option<i64>,
    pub multiracial: Option<i64>,
    pub frl: Option<i64>,
    pub iep: Option<i64>,
    pub el: Option<i64>,
    pub migrant: Option<i64>,
    pub foster: Option<i64>,
    pub military: Option<i64>,
    pub homeless: Option<i64>,
}

impl SubgroupCounts {
    pub fn get(&self, subgroup: Subgroup) -> Option<i64> {
        match subgroup {
            Subgroup::Female => self.female,
            Subgroup::Male => self.male,
            Subgroup::AmericanIndian => self.american_indian,
            Subgroup::Asian => self.asian,
            Subgroup::Black => self.black,
            Subgroup::Hispanic => self.hispanic,
            Subgroup::PacificIslander => self.pacific_islander,
            Subgroup::White => self.white,
            Subgroup::Multiracial => self.multiracial,
            Subgroup::Frl => self.frl,
            Subgroup::Iep => self.iep,
            Subgroup::El => self.el,
            Subgroup::Migrant => self.migrant,
            Subgroup::Foster => self.foster,
            Subgroup::Military => self.military,
            Subgroup::Homeless => self.homeless,
        }
    }

    pub fn set(&mut self, subgroup: Subgroup, value: Option<i64>) {
        let slot = match subgroup {
            Subgroup::Female => &mut self.female,
            Subgroup::Male => &mut self.male,
            Subgroup::AmericanIndian => &mut self.american_indian,
            Subgroup::Asian => &mut self.asian,
            Subgroup::Black => &mut self.black,
            Subgroup::Hispanic => &mut self.hispanic,
            Subgroup::PacificIslander => &mut self.pacific_islander,
            Subgroup::White => &mut self.white,
            Subgroup::Multiracial => &mut self.multiracial,
            Subgroup::Frl => &mut self.frl,
            Subgroup::Iep => &mut self.iep,
            Subgroup::El => &mut self.el,
            Subgroup::Migrant => &mut self.migrant,
            Subgroup::Foster => &mut self.foster,
            Subgroup::Military => &mut self.military,
            Subgroup::Homeless => &mut self.homeless,
        };
        *slot = value;
    }

    /// Whether any subgroup carries a reported value
    pub fn any_reported(&self) -> bool {
        Subgroup::ALL.iter().any(|s| self.get(*s).is_some())
    }
}

/// Identifying fields shared by every record shape
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityIdentity {
    pub entity_type: EntityType,
    pub lea_code: Option<String>,
    pub lea_name: Option<String>,
    pub district_code: Option<String>,
    pub district_name: Option<String>,
    pub school_code: Option<String>,
    pub school_name: Option<String>,
}

impl EntityIdentity {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            lea_code: None,
            lea_name: None,
            district_code: None,
            district_name: None,
            school_code: None,
            school_name: None,
        }
    }

    /// LEA name when present, else district name
    pub fn organization_name(&self) -> Option<&str> {
        self.lea_name
            .as_deref()
            .or(self.district_name.as_deref())
    }

    /// Stable ordering key used for deterministic output
    pub fn sort_key(&self) -> (EntityType, &str, &str, &str, &str) {
        (
            self.entity_type,
            self.district_code.as_deref().unwrap_or(""),
            self.lea_code.as_deref().unwrap_or(""),
            self.school_code.as_deref().unwrap_or(""),
            self.school_name
                .as_deref()
                .or(self.organization_name())
                .unwrap_or(""),
        )
    }
}

/// One row per (end_year, entity, grade_level) with one field per subgroup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideRecord {
    pub end_year: u16,
    pub entity: EntityIdentity,
    pub grade_level: String,
    pub enrollment_total: Option<i64>,
    pub subgroups: SubgroupCounts,
}

impl WideRecord {
    pub fn new(end_year: u16, entity: EntityIdentity, grade_level: impl Into<String>) -> Self {
        Self {
            end_year,
            entity,
            grade_level: grade_level.into(),
            enrollment_total: None,
            subgroups: SubgroupCounts::default(),
        }
    }

    pub fn is_total_grade(&self) -> bool {
        self.grade_level == GRADE_TOTAL
    }
}

/// One row per (end_year, entity, grade_level, subgroup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub end_year: u16,
    pub entity: EntityIdentity,
    pub grade_level: String,
    pub subgroup: String,
    pub n_students: i64,
    /// Share of the entity/grade total; `None` when the total is zero or
    /// missing, and for grade-band rollups
    pub pct: Option<f64>,
}

impl LongRecord {
    pub fn is_total_enrollment(&self) -> bool {
        self.subgroup == TOTAL_ENROLLMENT
    }

    /// Typed subgroup, `None` for the total pseudo-subgroup
    pub fn subgroup_kind(&self) -> Option<Subgroup> {
        Subgroup::from_name(&self.subgroup)
    }
}

/// Single categorical mirror of the entity-level booleans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationFlag {
    State,
    District,
    Campus,
}

impl AggregationFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationFlag::State => "state",
            AggregationFlag::District => "district",
            AggregationFlag::Campus => "campus",
        }
    }
}

impl fmt::Display for AggregationFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-form record annotated with entity-level and charter flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    pub record: LongRecord,
    pub is_state: bool,
    pub is_district: bool,
    pub is_school: bool,
    pub is_charter: bool,
    pub aggregation_flag: AggregationFlag,
}

/// What a worksheet in the bundle describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetRole {
    State,
    District,
    School,
    /// Mixed levels in one sheet; the level is inferred per row
    Combined,
}

/// An uninterpreted worksheet: detected header row plus the rows below it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSheet {
    pub role: SheetRole,
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawSheet {
    /// Cell text at a row/column, empty when the row is short
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Everything the fetcher pulled out of one year's workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBundle {
    pub end_year: u16,
    pub era: FormatEra,
    pub sheets: Vec<RawSheet>,
}

impl RawBundle {
    pub fn sheet(&self, role: SheetRole) -> Option<&RawSheet> {
        self.sheets.iter().find(|s| s.role == role)
    }
}

/// Wide or long output, used to key the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Representation {
    Wide,
    Tidy,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Wide => "wide",
            Representation::Tidy => "tidy",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wide" => Some(Representation::Wide),
            "tidy" => Some(Representation::Tidy),
            _ => None,
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grade bands supported by the rollup query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeBand {
    /// Kindergarten through grade 8
    K8,
    /// Grades 9 through 12
    HighSchool,
    /// Kindergarten through grade 12
    K12,
}

impl GradeBand {
    /// Synthetic grade label written onto rollup rows
    pub fn label(&self) -> &'static str {
        match self {
            GradeBand::K8 => "K8",
            GradeBand::HighSchool => "HS",
            GradeBand::K12 => "K12",
        }
    }

    pub fn grades(&self) -> &'static [&'static str] {
        const K8: &[&str] = &["K", "01", "02", "03", "04", "05", "06", "07", "08"];
        const HS: &[&str] = &["09", "10", "11", "12"];
        const K12: &[&str] = &[
            "K", "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12",
        ];
        match self {
            GradeBand::K8 => K8,
            GradeBand::HighSchool => HS,
            GradeBand::K12 => K12,
        }
    }

    pub fn contains(&self, grade: &str) -> bool {
        self.grades().contains(&grade)
    }
}
