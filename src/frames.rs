//! Record sets to and from polars DataFrames.
//!
//! Used by the parquet cache and CSV export. Subgroup columns that no
//! record reports are left out of wide frames, and any subgroup column
//! missing on read comes back as `None`.

use crate::error::Result;
use crate::flags::flag_record;
use crate::models::{EntityIdentity, EntityType, FlaggedRecord, LongRecord, Subgroup, WideRecord};
use crate::tidy::present_subgroups;

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

const END_YEAR: &str = "end_year";
const ENTITY_TYPE: &str = "entity_type";
const LEA_CODE: &str = "lea_code";
const LEA_NAME: &str = "lea_name";
const DISTRICT_CODE: &str = "district_code";
const DISTRICT_NAME: &str = "district_name";
const SCHOOL_CODE: &str = "school_code";
const SCHOOL_NAME: &str = "school_name";
const GRADE_LEVEL: &str = "grade_level";
const ENROLLMENT_TOTAL: &str = "enrollment_total";
const SUBGROUP: &str = "subgroup";
const N_STUDENTS: &str = "n_students";
const PCT: &str = "pct";

fn frame_error(message: String) -> PolarsError {
    PolarsError::ComputeError(message.into())
}

fn entity_columns(entities: &[&EntityIdentity]) -> Vec<Column> {
    let text = |name: &str, get: fn(&EntityIdentity) -> &Option<String>| {
        Column::new(
            name.into(),
            entities.iter().map(|e| get(e).clone()).collect::<Vec<_>>(),
        )
    };

    vec![
        Column::new(
            ENTITY_TYPE.into(),
            entities
                .iter()
                .map(|e| e.entity_type.as_str())
                .collect::<Vec<_>>(),
        ),
        text(LEA_CODE, |e| &e.lea_code),
        text(LEA_NAME, |e| &e.lea_name),
        text(DISTRICT_CODE, |e| &e.district_code),
        text(DISTRICT_NAME, |e| &e.district_name),
        text(SCHOOL_CODE, |e| &e.school_code),
        text(SCHOOL_NAME, |e| &e.school_name),
    ]
}

fn year_column(years: impl Iterator<Item = u16>) -> Column {
    Column::new(END_YEAR.into(), years.map(i32::from).collect::<Vec<_>>())
}

/// Wide records as a DataFrame, one column per reported subgroup
pub fn wide_to_frame(records: &[WideRecord]) -> Result<DataFrame> {
    let entities: Vec<&EntityIdentity> = records.iter().map(|r| &r.entity).collect();

    let mut columns = vec![year_column(records.iter().map(|r| r.end_year))];
    columns.extend(entity_columns(&entities));
    columns.push(Column::new(
        GRADE_LEVEL.into(),
        records
            .iter()
            .map(|r| r.grade_level.as_str())
            .collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        ENROLLMENT_TOTAL.into(),
        records
            .iter()
            .map(|r| r.enrollment_total)
            .collect::<Vec<_>>(),
    ));
    for subgroup in present_subgroups(records) {
        columns.push(Column::new(
            subgroup.name().into(),
            records
                .iter()
                .map(|r| r.subgroups.get(subgroup))
                .collect::<Vec<_>>(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

/// Long records as a DataFrame
pub fn long_to_frame(records: &[LongRecord]) -> Result<DataFrame> {
    let entities: Vec<&EntityIdentity> = records.iter().map(|r| &r.entity).collect();

    let mut columns = vec![year_column(records.iter().map(|r| r.end_year))];
    columns.extend(entity_columns(&entities));
    columns.push(Column::new(
        GRADE_LEVEL.into(),
        records
            .iter()
            .map(|r| r.grade_level.as_str())
            .collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        SUBGROUP.into(),
        records
            .iter()
            .map(|r| r.subgroup.as_str())
            .collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        N_STUDENTS.into(),
        records.iter().map(|r| r.n_students).collect::<Vec<_>>(),
    ));
    columns.push(Column::new(
        PCT.into(),
        records.iter().map(|r| r.pct).collect::<Vec<_>>(),
    ));

    Ok(DataFrame::new(columns)?)
}

/// Flagged records as a DataFrame: the long columns plus the flag columns
pub fn flagged_to_frame(records: &[FlaggedRecord]) -> Result<DataFrame> {
    let long: Vec<LongRecord> = records.iter().map(|r| r.record.clone()).collect();
    let mut df = long_to_frame(&long)?;

    let flag = |name: &str, get: fn(&FlaggedRecord) -> bool| {
        Column::new(name.into(), records.iter().map(get).collect::<Vec<_>>())
    };
    df.with_column(flag("is_state", |r| r.is_state))?;
    df.with_column(flag("is_district", |r| r.is_district))?;
    df.with_column(flag("is_school", |r| r.is_school))?;
    df.with_column(flag("is_charter", |r| r.is_charter))?;
    df.with_column(Column::new(
        "aggregation_flag".into(),
        records
            .iter()
            .map(|r| r.aggregation_flag.as_str())
            .collect::<Vec<_>>(),
    ))?;

    Ok(df)
}

fn optional_text(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn required_text(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df.column(name)?.as_materialized_series().cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

fn optional_i64(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    let series = column.as_materialized_series().cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn optional_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let Ok(column) = df.column(name) else {
        return Ok(vec![None; df.height()]);
    };
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn end_years(df: &DataFrame) -> Result<Vec<u16>> {
    let series = df.column(END_YEAR)?.as_materialized_series().cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .map(|v| {
            v.and_then(|year| u16::try_from(year).ok())
                .ok_or_else(|| frame_error(format!("invalid end_year {:?}", v)).into())
        })
        .collect()
}

fn read_entities(df: &DataFrame) -> Result<Vec<EntityIdentity>> {
    let types = required_text(df, ENTITY_TYPE)?;
    let lea_code = optional_text(df, LEA_CODE)?;
    let lea_name = optional_text(df, LEA_NAME)?;
    let district_code = optional_text(df, DISTRICT_CODE)?;
    let district_name = optional_text(df, DISTRICT_NAME)?;
    let school_code = optional_text(df, SCHOOL_CODE)?;
    let school_name = optional_text(df, SCHOOL_NAME)?;

    let mut entities = Vec::with_capacity(df.height());
    for (i, entity_type) in types.iter().enumerate() {
        let entity_type = EntityType::parse(entity_type)
            .ok_or_else(|| frame_error(format!("unknown entity_type '{}'", entity_type)))?;
        entities.push(EntityIdentity {
            entity_type,
            lea_code: lea_code[i].clone(),
            lea_name: lea_name[i].clone(),
            district_code: district_code[i].clone(),
            district_name: district_name[i].clone(),
            school_code: school_code[i].clone(),
            school_name: school_name[i].clone(),
        });
    }
    Ok(entities)
}

/// Rebuild wide records from a frame written by [`wide_to_frame`]
pub fn frame_to_wide(df: &DataFrame) -> Result<Vec<WideRecord>> {
    let years = end_years(df)?;
    let entities = read_entities(df)?;
    let grades = required_text(df, GRADE_LEVEL)?;
    let totals = optional_i64(df, ENROLLMENT_TOTAL)?;

    let mut subgroup_values = Vec::new();
    for subgroup in Subgroup::ALL {
        if df.column(subgroup.name()).is_ok() {
            subgroup_values.push((subgroup, optional_i64(df, subgroup.name())?));
        }
    }

    let records: Vec<WideRecord> = entities
        .into_iter()
        .enumerate()
        .map(|(i, entity)| {
            let mut record = WideRecord::new(years[i], entity, grades[i].clone());
            record.enrollment_total = totals[i];
            for (subgroup, values) in &subgroup_values {
                record.subgroups.set(*subgroup, values[i]);
            }
            record
        })
        .collect();

    debug!(
        "Read {} wide records ({} subgroup columns)",
        records.len(),
        subgroup_values.len()
    );
    Ok(records)
}

/// Rebuild long records from a frame written by [`long_to_frame`]
pub fn frame_to_long(df: &DataFrame) -> Result<Vec<LongRecord>> {
    let years = end_years(df)?;
    let entities = read_entities(df)?;
    let grades = required_text(df, GRADE_LEVEL)?;
    let subgroups = required_text(df, SUBGROUP)?;
    let counts = optional_i64(df, N_STUDENTS)?;
    let pcts = optional_f64(df, PCT)?;

    entities
        .into_iter()
        .enumerate()
        .map(|(i, entity)| {
            let n_students = counts[i].ok_or_else(|| {
                frame_error(format!("missing n_students in row {}", i))
            })?;
            Ok(LongRecord {
                end_year: years[i],
                entity,
                grade_level: grades[i].clone(),
                subgroup: subgroups[i].clone(),
                n_students,
                pct: pcts[i],
            })
        })
        .collect()
}

/// Rebuild flagged records; flags are derived again from the entity
pub fn frame_to_flagged(df: &DataFrame) -> Result<Vec<FlaggedRecord>> {
    Ok(frame_to_long(df)?.into_iter().map(flag_record).collect())
}

/// Write any frame to CSV with a header row
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
