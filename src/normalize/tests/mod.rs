//! Normalizer tests over hand-built worksheet bundles
//!
//! Fixtures mirror the header drift seen across the three workbook eras.

pub mod legacy;

use crate::models::{FormatEra, RawBundle, RawSheet, SheetRole};

/// Build a raw worksheet from string literals
pub fn sheet(role: SheetRole, name: &str, headers: &[&str], rows: &[&[&str]]) -> RawSheet {
    RawSheet {
        role,
        name: name.to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

/// A 2023-24 workbook: state, district and school sheets
pub fn modern_bundle() -> RawBundle {
    RawBundle {
        end_year: 2024,
        era: FormatEra::Modern,
        sheets: vec![
            sheet(
                SheetRole::State,
                "State",
                &["LEA Name", "Total", "Female", "Male", "Hispanic", "White", "Foster"],
                &[&["State of Nevada", "1,000", "490", "510", "450", "300", "5"]],
            ),
            sheet(
                SheetRole::District,
                "District",
                &[
                    "LEA Code", "LEA Name", "Total", "Female", "Male", "Hispanic", "White",
                    "Foster",
                ],
                &[
                    &[
                        "16", "Washoe County School District", "400", "200", "200", "150", "150",
                        "<10",
                    ],
                    &["2", "Clark County School District", "600", "*", "310", "300", "150", "3"],
                ],
            ),
            sheet(
                SheetRole::School,
                "School",
                &[
                    "LEA Code", "School Code", "School Name", "Total", "Female", "Male",
                    "Hispanic", "White",
                ],
                &[
                    &["2", "2205", "Example Elementary School", "500", "250", "250", "200", "100"],
                    &["16", "101", "Sample Middle School", "0", "0", "0", "0", "0"],
                    &["* denotes suppressed counts", "", "", "", "", "", "", ""],
                ],
            ),
        ],
    }
}

/// A 2018-19 workbook: district and school sheets, no state sheet
pub fn intermediate_bundle() -> RawBundle {
    let headers = [
        "Master District Code", "District Name", "Total", "Female", "Male", "Am In/AK Native",
        "Asian", "Black", "Hispanic", "Pacific Islander", "White", "Multi-Race", "FRL", "IEP",
        "ELL", "Migrant", "Foster",
    ];
    RawBundle {
        end_year: 2019,
        era: FormatEra::Intermediate,
        sheets: vec![
            sheet(
                SheetRole::District,
                "Districts",
                &headers,
                &[
                    &[
                        "", "State Total", "1000", "490", "510", "10", "50", "100", "450", "15",
                        "300", "75", "600", "120", "200", "4", "9",
                    ],
                    &[
                        "02", "Clark", "600", "295", "305", "5", "30", "80", "300", "10", "150",
                        "25", "400", "70", "140", "2", "6",
                    ],
                ],
            ),
            sheet(
                SheetRole::School,
                "Schools",
                &[
                    "Master District Code", "School Code", "School Name", "Total", "Female",
                    "Male",
                ],
                &[&["2", "2205", "Example Elementary School", "500", "250", "250"]],
            ),
        ],
    }
}
