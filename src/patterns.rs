//! Declarative header and worksheet pattern tables, one set per format era.
//!
//! Adding a year's header quirk means adding a pattern here, not a new code
//! path. Patterns are case-insensitive and tried in order, most specific first.

use crate::models::{FormatEra, SheetRole, Subgroup};
use crate::resolver::FieldSpec;

/// Worksheet the fetcher looks for in an era's workbook
#[derive(Debug, Clone, Copy)]
pub struct SheetSpec {
    pub role: SheetRole,
    pub label: &'static str,
    pub patterns: &'static [&'static str],
    pub required: bool,
}

/// Everything needed to read one era's workbook
#[derive(Debug, Clone, Copy)]
pub struct EraPatterns {
    pub era: FormatEra,
    pub sheets: &'static [SheetSpec],
    pub identifiers: &'static [FieldSpec],
    pub total: FieldSpec,
    pub grade_counts: &'static [FieldSpec],
    pub subgroups: &'static [(Subgroup, FieldSpec)],
}

pub const LEA_CODE: &str = "lea_code";
pub const LEA_NAME: &str = "lea_name";
pub const DISTRICT_CODE: &str = "district_code";
pub const DISTRICT_NAME: &str = "district_name";
pub const SCHOOL_CODE: &str = "school_code";
pub const SCHOOL_NAME: &str = "school_name";
pub const GRADE: &str = "grade";
pub const ENROLLMENT_TOTAL: &str = "enrollment_total";

/// Percentage and rate columns sit next to counts in most years
const COUNT_EXCLUDE: &[&str] = &[r"%", r"percent", r"\bpct\b", r"\brate\b"];

/// Name cells that name the state itself
pub const STATE_ROW_PATTERNS: &[&str] = &[
    r"^(state\s*(of\s*nevada)?|nevada)(\s*(total|totals|summary))?$",
    r"^state\s*total",
    r"^statewide",
];

/// Name cells of code-less totals rows, which sum every entity on the sheet
pub const TOTAL_ROW_PATTERNS: &[&str] = &[
    r"^(grand\s*)?totals?:?$",
    r"^all\s*(districts|schools|leas?)\b",
];

const SCHOOL_CODE_PATTERNS: &[&str] = &[
    r"^school\s*(code|id|#|number)$",
    r"^state\s*school\s*(code|id)",
    r"^school\s*(code|id)",
];

const SCHOOL_NAME_PATTERNS: &[&str] = &[r"^school\s*name$", r"^school$", r"^name\s*of\s*school"];

const GRADE_PATTERNS: &[&str] = &[r"^grade\s*level$", r"^grade$", r"^gr\.?$"];

const LEGACY_IDENTIFIERS: &[FieldSpec] = &[
    FieldSpec::new(DISTRICT_CODE, &[r"^district\s*(code|#|number)$", r"^dist\.?\s*#"]),
    FieldSpec::new(DISTRICT_NAME, &[r"^district\s*name$", r"^district$"]),
    FieldSpec::new(SCHOOL_CODE, SCHOOL_CODE_PATTERNS),
    FieldSpec::new(SCHOOL_NAME, SCHOOL_NAME_PATTERNS),
    FieldSpec::new(GRADE, GRADE_PATTERNS),
];

const INTERMEDIATE_IDENTIFIERS: &[FieldSpec] = &[
    FieldSpec::new(
        DISTRICT_CODE,
        &[
            r"master\s*district\s*code",
            r"^district\s*(code|id|#|number)$",
            r"^dist(rict)?\.?\s*(code|#)",
        ],
    ),
    FieldSpec::new(DISTRICT_NAME, &[r"^district\s*name$", r"^district$"]),
    FieldSpec::new(LEA_CODE, &[r"^lea\s*(code|id|#)$"]),
    FieldSpec::new(LEA_NAME, &[r"^lea\s*name$"]),
    FieldSpec::new(SCHOOL_CODE, SCHOOL_CODE_PATTERNS),
    FieldSpec::new(SCHOOL_NAME, SCHOOL_NAME_PATTERNS),
    FieldSpec::new(GRADE, GRADE_PATTERNS),
];

const MODERN_IDENTIFIERS: &[FieldSpec] = &[
    FieldSpec::new(
        LEA_CODE,
        &[
            r"^lea\s*code$",
            r"local\s+education\s+agency\s+code",
            r"^lea\s*(id|#|number)$",
        ],
    ),
    FieldSpec::new(
        LEA_NAME,
        &[r"^lea\s*name$", r"local\s+education\s+agency\s+name", r"^lea$"],
    ),
    FieldSpec::new(
        DISTRICT_CODE,
        &[r"master\s*district\s*code", r"^district\s*(code|id|#|number)$"],
    ),
    FieldSpec::new(DISTRICT_NAME, &[r"^district\s*name$", r"^district$"]),
    FieldSpec::new(SCHOOL_CODE, SCHOOL_CODE_PATTERNS),
    FieldSpec::new(SCHOOL_NAME, SCHOOL_NAME_PATTERNS),
    FieldSpec::new(GRADE, GRADE_PATTERNS),
];

const TOTAL: FieldSpec = FieldSpec::new(
    ENROLLMENT_TOTAL,
    &[
        r"^total\s*enrollment$",
        r"^total(\s*students)?$",
        r"enrollment\s*total",
        r"^grand\s*total$",
        r"^enrollment$",
        r"^total\s*(count|membership)",
    ],
)
.excluding(COUNT_EXCLUDE);

/// Grade-count columns, keyed by canonical grade code
const GRADE_COUNTS: &[FieldSpec] = &[
    FieldSpec::new(
        "PK",
        &[r"^(gr(ade)?\.?\s*)?p-?k$", r"^pre-?\s*k(indergarten)?$", r"^pre-?school$"],
    )
    .excluding(COUNT_EXCLUDE),
    FieldSpec::new("K", &[r"^(gr(ade)?\.?\s*)?k(g|indergarten)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("01", &[r"^(gr(ade)?\.?\s*)?0?1(st)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("02", &[r"^(gr(ade)?\.?\s*)?0?2(nd)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("03", &[r"^(gr(ade)?\.?\s*)?0?3(rd)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("04", &[r"^(gr(ade)?\.?\s*)?0?4(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("05", &[r"^(gr(ade)?\.?\s*)?0?5(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("06", &[r"^(gr(ade)?\.?\s*)?0?6(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("07", &[r"^(gr(ade)?\.?\s*)?0?7(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("08", &[r"^(gr(ade)?\.?\s*)?0?8(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("09", &[r"^(gr(ade)?\.?\s*)?0?9(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("10", &[r"^(gr(ade)?\.?\s*)?10(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("11", &[r"^(gr(ade)?\.?\s*)?11(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new("12", &[r"^(gr(ade)?\.?\s*)?12(th)?(\s*grade)?$"]).excluding(COUNT_EXCLUDE),
    FieldSpec::new(
        "UG",
        &[r"^(gr(ade)?\.?\s*)?ug$", r"^ungraded$", r"^(gr(ade)?\.?\s*)?13$"],
    )
    .excluding(COUNT_EXCLUDE),
    FieldSpec::new("AD", &[r"^(gr(ade)?\.?\s*)?ad(ult)?$"]).excluding(COUNT_EXCLUDE),
];

const FEMALE: FieldSpec =
    FieldSpec::new("female", &[r"^female$", r"\bfemale\b", r"^f$"]).excluding(COUNT_EXCLUDE);
const MALE: FieldSpec =
    FieldSpec::new("male", &[r"^male$", r"\bmale\b", r"^m$"]).excluding(COUNT_EXCLUDE);

const AMERICAN_INDIAN: FieldSpec = FieldSpec::new(
    "american_indian",
    &[
        r"american\s*indian",
        r"alaska(n)?\s*native",
        r"^am\.?\s*in(d(ian)?)?\b",
        r"native\s*american",
    ],
)
.excluding(COUNT_EXCLUDE);
const ASIAN: FieldSpec =
    FieldSpec::new("asian", &[r"^asian$", r"\basian\b"]).excluding(COUNT_EXCLUDE);
const BLACK: FieldSpec = FieldSpec::new(
    "black",
    &[r"^black$", r"\bblack\b", r"african\s*american"],
)
.excluding(COUNT_EXCLUDE);
const HISPANIC: FieldSpec = FieldSpec::new(
    "hispanic",
    &[r"^hispanic$", r"hispanic", r"latin[oax]"],
)
.excluding(COUNT_EXCLUDE);
const PACIFIC_ISLANDER: FieldSpec = FieldSpec::new(
    "pacific_islander",
    &[r"^pacific\s*islander$", r"pacific\s*islander", r"hawaiian"],
)
.excluding(COUNT_EXCLUDE);
const WHITE: FieldSpec =
    FieldSpec::new("white", &[r"^white$", r"\bwhite\b", r"caucasian"]).excluding(COUNT_EXCLUDE);
const MULTIRACIAL: FieldSpec = FieldSpec::new(
    "multiracial",
    &[r"two\s*or\s*more", r"multi-?\s*rac", r"^multi"],
)
.excluding(COUNT_EXCLUDE);

const FRL: FieldSpec = FieldSpec::new(
    "frl",
    &[r"\bfrl\b", r"free\s*(and|&|/)?\s*reduced", r"\bfrm\b"],
)
.excluding(COUNT_EXCLUDE);
const IEP: FieldSpec = FieldSpec::new(
    "iep",
    &[r"\biep\b", r"\bswd\b", r"disabilit", r"special\s*ed"],
)
.excluding(COUNT_EXCLUDE);
const EL: FieldSpec = FieldSpec::new(
    "el",
    &[r"^el$", r"\bell?\b", r"english\s*learner", r"\blep\b", r"limited\s*english"],
)
.excluding(COUNT_EXCLUDE);
const MIGRANT: FieldSpec = FieldSpec::new("migrant", &[r"migrant"]).excluding(COUNT_EXCLUDE);
const FOSTER: FieldSpec = FieldSpec::new("foster", &[r"foster"]).excluding(COUNT_EXCLUDE);
const MILITARY: FieldSpec =
    FieldSpec::new("military", &[r"military"]).excluding(COUNT_EXCLUDE);
const HOMELESS: FieldSpec =
    FieldSpec::new("homeless", &[r"homeless", r"mckinney"]).excluding(COUNT_EXCLUDE);

/// Intermediate workbooks report gender, race and four special populations
const INTERMEDIATE_SUBGROUPS: &[(Subgroup, FieldSpec)] = &[
    (Subgroup::Female, FEMALE),
    (Subgroup::Male, MALE),
    (Subgroup::AmericanIndian, AMERICAN_INDIAN),
    (Subgroup::Asian, ASIAN),
    (Subgroup::Black, BLACK),
    (Subgroup::Hispanic, HISPANIC),
    (Subgroup::PacificIslander, PACIFIC_ISLANDER),
    (Subgroup::White, WHITE),
    (Subgroup::Multiracial, MULTIRACIAL),
    (Subgroup::Frl, FRL),
    (Subgroup::Iep, IEP),
    (Subgroup::El, EL),
    (Subgroup::Migrant, MIGRANT),
];

const MODERN_SUBGROUPS: &[(Subgroup, FieldSpec)] = &[
    (Subgroup::Female, FEMALE),
    (Subgroup::Male, MALE),
    (Subgroup::AmericanIndian, AMERICAN_INDIAN),
    (Subgroup::Asian, ASIAN),
    (Subgroup::Black, BLACK),
    (Subgroup::Hispanic, HISPANIC),
    (Subgroup::PacificIslander, PACIFIC_ISLANDER),
    (Subgroup::White, WHITE),
    (Subgroup::Multiracial, MULTIRACIAL),
    (Subgroup::Frl, FRL),
    (Subgroup::Iep, IEP),
    (Subgroup::El, EL),
    (Subgroup::Migrant, MIGRANT),
    (Subgroup::Foster, FOSTER),
    (Subgroup::Military, MILITARY),
    (Subgroup::Homeless, HOMELESS),
];

const LEGACY_SHEETS: &[SheetSpec] = &[SheetSpec {
    role: SheetRole::Combined,
    label: "first worksheet",
    patterns: &[r"."],
    required: true,
}];

const INTERMEDIATE_SHEETS: &[SheetSpec] = &[
    SheetSpec {
        role: SheetRole::State,
        label: "State",
        patterns: &[r"^state", r"nevada"],
        required: false,
    },
    SheetSpec {
        role: SheetRole::District,
        label: "District",
        patterns: &[r"^district", r"\blea\b"],
        required: true,
    },
    SheetSpec {
        role: SheetRole::School,
        label: "School",
        patterns: &[r"^school", r"school"],
        required: true,
    },
];

const MODERN_SHEETS: &[SheetSpec] = &[
    SheetSpec {
        role: SheetRole::State,
        label: "State",
        patterns: &[r"^state", r"nevada"],
        required: true,
    },
    SheetSpec {
        role: SheetRole::District,
        label: "District",
        patterns: &[r"^district", r"^lea", r"\blea\b"],
        required: true,
    },
    SheetSpec {
        role: SheetRole::School,
        label: "School",
        patterns: &[r"^school", r"school"],
        required: true,
    },
];

const LEGACY: EraPatterns = EraPatterns {
    era: FormatEra::Legacy,
    sheets: LEGACY_SHEETS,
    identifiers: LEGACY_IDENTIFIERS,
    total: TOTAL,
    grade_counts: GRADE_COUNTS,
    subgroups: &[],
};

const INTERMEDIATE: EraPatterns = EraPatterns {
    era: FormatEra::Intermediate,
    sheets: INTERMEDIATE_SHEETS,
    identifiers: INTERMEDIATE_IDENTIFIERS,
    total: TOTAL,
    grade_counts: GRADE_COUNTS,
    subgroups: INTERMEDIATE_SUBGROUPS,
};

const MODERN: EraPatterns = EraPatterns {
    era: FormatEra::Modern,
    sheets: MODERN_SHEETS,
    identifiers: MODERN_IDENTIFIERS,
    total: TOTAL,
    grade_counts: GRADE_COUNTS,
    subgroups: MODERN_SUBGROUPS,
};

/// Pattern tables for an era
pub fn era_patterns(era: FormatEra) -> &'static EraPatterns {
    match era {
        FormatEra::Legacy => &LEGACY,
        FormatEra::Intermediate => &INTERMEDIATE,
        FormatEra::Modern => &MODERN,
    }
}
