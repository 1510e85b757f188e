//! Legacy-era workbooks (end years up to 2017).
//!
//! The legacy layout is not fully mapped. Normalization yields a single
//! statewide placeholder record so callers can tell "fetched but limited"
//! apart from "failed". The statewide total is filled in when a state row
//! can be located; otherwise it stays missing.

use super::values::parse_count;

use crate::constants::GRADE_TOTAL;
use crate::error::Result;
use crate::models::{EntityIdentity, EntityType, RawBundle, WideRecord};
use crate::patterns::{STATE_ROW_PATTERNS, era_patterns};
use crate::resolver::{ColumnResolver, CompiledField};
use tracing::{debug, warn};

/// Name written on the placeholder record
pub const STATE_NAME: &str = "Nevada";

pub fn normalize_legacy(bundle: &RawBundle) -> Result<Vec<WideRecord>> {
    warn!(
        "Legacy format limitation: {} workbook is only partially supported; \
         returning a statewide placeholder record",
        bundle.end_year
    );

    let mut entity = EntityIdentity::new(EntityType::State);
    entity.lea_name = Some(STATE_NAME.to_string());

    let mut record = WideRecord::new(bundle.end_year, entity, GRADE_TOTAL);
    record.enrollment_total = statewide_total(bundle)?;
    if record.enrollment_total.is_none() {
        debug!("No statewide total located in {} workbook", bundle.end_year);
    }

    Ok(vec![record])
}

/// Total from the first row whose cells name the state
fn statewide_total(bundle: &RawBundle) -> Result<Option<i64>> {
    let total_field = CompiledField::compile(&era_patterns(bundle.era).total)?;
    let state_row = CompiledField::from_patterns("state_row", STATE_ROW_PATTERNS, &[])?;

    for sheet in &bundle.sheets {
        let Some(total) = ColumnResolver::new(&sheet.headers).resolve(&total_field) else {
            continue;
        };

        for (index, row) in sheet.rows.iter().enumerate() {
            let names_state = row
                .iter()
                .enumerate()
                .any(|(column, cell)| column != total.index && state_row.matches(cell));
            if !names_state {
                continue;
            }
            if let Some(value) = parse_count(sheet.cell(index, total.index)) {
                debug!(
                    "Statewide total {} found in worksheet '{}' row {}",
                    value, sheet.name, index
                );
                return Ok(Some(value));
            }
        }
    }

    Ok(None)
}
