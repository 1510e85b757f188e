//! Schema normalization: raw worksheets to canonical wide records.
//!
//! Each era's pattern table drives a column projection. Every canonical
//! field is resolved independently against a sheet's headers; fields that
//! do not resolve are left as `None` on every record from that sheet.
//! Output is sorted so the same bundle always yields identical records.

pub mod legacy;
pub mod values;

#[cfg(test)]
pub mod tests;

use self::values::{canonical_grade, clean_text, pad_code, parse_count};

use crate::constants::{DISTRICT_CODE_WIDTH, GRADE_TOTAL, SCHOOL_CODE_WIDTH, grade_rank};
use crate::error::Result;
use crate::models::{
    EntityIdentity, EntityType, FormatEra, RawBundle, RawSheet, SheetRole, Subgroup,
    SubgroupCounts, WideRecord,
};
use crate::patterns::{
    DISTRICT_CODE, DISTRICT_NAME, EraPatterns, GRADE, LEA_CODE, LEA_NAME, SCHOOL_CODE,
    SCHOOL_NAME, STATE_ROW_PATTERNS, TOTAL_ROW_PATTERNS, era_patterns,
};
use crate::resolver::{ColumnResolver, CompiledField};
use tracing::{debug, info, warn};

/// Normalize a raw bundle into wide records for its era
pub fn normalize_bundle(bundle: &RawBundle) -> Result<Vec<WideRecord>> {
    let mut records = match bundle.era {
        FormatEra::Legacy => legacy::normalize_legacy(bundle)?,
        FormatEra::Intermediate | FormatEra::Modern => {
            let projector = SheetProjector::new(era_patterns(bundle.era))?;
            let mut records = Vec::new();
            let mut state_seen = false;

            // Sheets arrive State, District, School; statewide rows come
            // from the first sheet that has any
            for sheet in &bundle.sheets {
                let mut projected = projector.project(sheet, bundle.end_year);
                let before = projected.len();
                if state_seen {
                    projected.retain(|r| r.entity.entity_type != EntityType::State);
                    if projected.len() < before {
                        debug!(
                            "Worksheet '{}': dropped {} statewide total row(s) already reported",
                            sheet.name,
                            before - projected.len()
                        );
                    }
                }
                state_seen |= projected
                    .iter()
                    .any(|r| r.entity.entity_type == EntityType::State);
                records.extend(projected);
            }
            records
        }
    };

    sort_wide(&mut records);
    info!(
        "Normalized {} ({} format): {} wide records",
        bundle.end_year,
        bundle.era,
        records.len()
    );
    Ok(records)
}

/// Deterministic order: entity level, codes, then grade
pub fn sort_wide(records: &mut [WideRecord]) {
    records.sort_by(|a, b| {
        a.end_year
            .cmp(&b.end_year)
            .then_with(|| a.entity.sort_key().cmp(&b.entity.sort_key()))
            .then_with(|| grade_rank(&a.grade_level).cmp(&grade_rank(&b.grade_level)))
            .then_with(|| a.grade_level.cmp(&b.grade_level))
    });
}

/// Column positions resolved for one worksheet
#[derive(Debug, Default)]
struct SheetColumns {
    lea_code: Option<usize>,
    lea_name: Option<usize>,
    district_code: Option<usize>,
    district_name: Option<usize>,
    school_code: Option<usize>,
    school_name: Option<usize>,
    grade: Option<usize>,
    total: Option<usize>,
    grade_counts: Vec<(&'static str, usize)>,
    subgroups: Vec<(Subgroup, usize)>,
}

impl SheetColumns {
    fn has_identifiers(&self) -> bool {
        [
            self.lea_code,
            self.lea_name,
            self.district_code,
            self.district_name,
            self.school_code,
            self.school_name,
        ]
        .iter()
        .any(Option::is_some)
    }

    fn has_counts(&self) -> bool {
        self.total.is_some() || !self.grade_counts.is_empty() || !self.subgroups.is_empty()
    }
}

/// Compiled pattern tables for one era
#[derive(Debug)]
struct SheetProjector {
    identifiers: Vec<CompiledField>,
    total: CompiledField,
    grade_counts: Vec<(&'static str, CompiledField)>,
    subgroups: Vec<(Subgroup, CompiledField)>,
    state_row: CompiledField,
}

impl SheetProjector {
    fn new(table: &EraPatterns) -> Result<Self> {
        Ok(Self {
            identifiers: table
                .identifiers
                .iter()
                .map(CompiledField::compile)
                .collect::<Result<_>>()?,
            total: CompiledField::compile(&table.total)?,
            grade_counts: table
                .grade_counts
                .iter()
                .map(|spec| Ok((spec.field, CompiledField::compile(spec)?)))
                .collect::<Result<_>>()?,
            subgroups: table
                .subgroups
                .iter()
                .map(|(subgroup, spec)| Ok((*subgroup, CompiledField::compile(spec)?)))
                .collect::<Result<_>>()?,
            state_row: CompiledField::from_patterns(
                "state_row",
                &[STATE_ROW_PATTERNS, TOTAL_ROW_PATTERNS].concat(),
                &[],
            )?,
        })
    }

    fn resolve_columns(&self, sheet: &RawSheet) -> SheetColumns {
        let mut resolver = ColumnResolver::new(&sheet.headers);
        let mut columns = SheetColumns::default();

        for field in &self.identifiers {
            let index = resolver.claim(field).map(|hit| hit.index);
            match field.field.as_str() {
                LEA_CODE => columns.lea_code = index,
                LEA_NAME => columns.lea_name = index,
                DISTRICT_CODE => columns.district_code = index,
                DISTRICT_NAME => columns.district_name = index,
                SCHOOL_CODE => columns.school_code = index,
                SCHOOL_NAME => columns.school_name = index,
                GRADE => columns.grade = index,
                other => debug!("Ignoring unknown identifier field '{}'", other),
            }
        }

        columns.total = resolver.claim(&self.total).map(|hit| hit.index);

        for (subgroup, field) in &self.subgroups {
            if let Some(hit) = resolver.claim(field) {
                columns.subgroups.push((*subgroup, hit.index));
            }
        }

        // A grade column means one row per grade; grade-count columns
        // only apply to one-row-per-entity layouts
        if columns.grade.is_none() {
            for (grade, field) in &self.grade_counts {
                if let Some(hit) = resolver.claim(field) {
                    columns.grade_counts.push((*grade, hit.index));
                }
            }
        }

        debug!(
            "Worksheet '{}': total={:?}, {} subgroup column(s), {} grade column(s)",
            sheet.name,
            columns.total,
            columns.subgroups.len(),
            columns.grade_counts.len()
        );
        columns
    }

    /// Project every data row of a worksheet onto wide records
    fn project(&self, sheet: &RawSheet, end_year: u16) -> Vec<WideRecord> {
        let columns = self.resolve_columns(sheet);
        if !columns.has_counts() {
            warn!(
                "Worksheet '{}' for {} has no recognisable count columns; skipping it",
                sheet.name, end_year
            );
            return Vec::new();
        }

        let mut records = Vec::new();
        for row in 0..sheet.rows.len() {
            records.extend(self.project_row(sheet, row, &columns, end_year));
        }

        debug!(
            "Worksheet '{}' produced {} wide records from {} rows",
            sheet.name,
            records.len(),
            sheet.rows.len()
        );
        records
    }

    fn project_row(
        &self,
        sheet: &RawSheet,
        row: usize,
        columns: &SheetColumns,
        end_year: u16,
    ) -> Vec<WideRecord> {
        let count = |column: Option<usize>| column.and_then(|c| parse_count(sheet.cell(row, c)));

        let total = count(columns.total);
        let mut subgroups = SubgroupCounts::default();
        for (subgroup, column) in &columns.subgroups {
            subgroups.set(*subgroup, count(Some(*column)));
        }
        let grade_values: Vec<(&str, Option<i64>)> = columns
            .grade_counts
            .iter()
            .map(|(grade, column)| (*grade, count(Some(*column))))
            .collect();

        // Spacer, note and footer rows carry no counts at all
        if total.is_none()
            && !subgroups.any_reported()
            && grade_values.iter().all(|(_, v)| v.is_none())
        {
            return Vec::new();
        }

        let entity = self.read_entity(sheet, row, columns);
        if entity.is_none() && columns.has_identifiers() {
            return Vec::new();
        }
        let entity = entity.unwrap_or_else(|| EntityIdentity::new(EntityType::State));

        if let Some(grade_column) = columns.grade {
            let grade = match clean_text(sheet.cell(row, grade_column)) {
                Some(label) => canonical_grade(&label),
                None => GRADE_TOTAL.to_string(),
            };
            let mut record = WideRecord::new(end_year, entity, grade);
            record.enrollment_total = total;
            record.subgroups = subgroups;
            return vec![record];
        }

        let mut records = Vec::with_capacity(1 + grade_values.len());
        if columns.total.is_some() || !columns.subgroups.is_empty() {
            let mut record = WideRecord::new(end_year, entity.clone(), GRADE_TOTAL);
            record.enrollment_total = total;
            record.subgroups = subgroups;
            records.push(record);
        }
        for (grade, value) in grade_values {
            let mut record = WideRecord::new(end_year, entity.clone(), grade);
            record.enrollment_total = value;
            records.push(record);
        }
        records
    }

    /// Identifier fields plus the inferred entity level; `None` when the row
    /// has no identifying text at all
    fn read_entity(
        &self,
        sheet: &RawSheet,
        row: usize,
        columns: &SheetColumns,
    ) -> Option<EntityIdentity> {
        let text = |column: Option<usize>| column.and_then(|c| clean_text(sheet.cell(row, c)));
        let code = |column: Option<usize>, width: usize| {
            column.and_then(|c| pad_code(sheet.cell(row, c), width))
        };

        let mut entity = EntityIdentity::new(EntityType::State);
        entity.lea_code = code(columns.lea_code, DISTRICT_CODE_WIDTH);
        entity.lea_name = text(columns.lea_name);
        entity.district_code = code(columns.district_code, DISTRICT_CODE_WIDTH);
        entity.district_name = text(columns.district_name);
        entity.school_code = code(columns.school_code, SCHOOL_CODE_WIDTH);
        entity.school_name = text(columns.school_name);

        if entity.lea_code.is_none()
            && entity.lea_name.is_none()
            && entity.district_code.is_none()
            && entity.district_name.is_none()
            && entity.school_code.is_none()
            && entity.school_name.is_none()
        {
            return None;
        }

        entity.entity_type = self.infer_entity_type(sheet.role, &entity);
        Some(entity)
    }

    fn infer_entity_type(&self, role: SheetRole, entity: &EntityIdentity) -> EntityType {
        let has_org_code = entity.lea_code.is_some() || entity.district_code.is_some();
        let looks_statewide = !has_org_code
            && entity.school_code.is_none()
            && entity
                .school_name
                .as_deref()
                .or(entity.organization_name())
                .is_some_and(|name| self.state_row.matches(name));

        match role {
            SheetRole::State => EntityType::State,
            SheetRole::District => {
                if looks_statewide {
                    EntityType::State
                } else {
                    EntityType::District
                }
            }
            SheetRole::School | SheetRole::Combined => {
                if entity.school_code.is_some() {
                    EntityType::School
                } else if looks_statewide {
                    EntityType::State
                } else if has_org_code && entity.school_name.is_none() {
                    EntityType::District
                } else {
                    EntityType::School
                }
            }
        }
    }
}
