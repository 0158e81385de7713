// src/process/clean.rs
use serde::Serialize;
use tracing::debug;

use super::{
    date_parser::coerce_date,
    money::coerce_money,
    sheet::{RawCell, RawSheet},
    utils::{clean_text, has_ascii_digit},
};
use crate::dataset::{CanonicalRecord, FieldValue};
use crate::schema::{CanonicalField, ColumnMap, FieldKind, SchemaRegistry};

/// Row counts for one cleaned sheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub rows_read: usize,
    pub dropped_missing_required: usize,
    pub dropped_header_leakage: usize,
    pub rows_kept: usize,
    /// Monetary cells that failed to parse and were set to 0.00.
    pub defaulted_amounts: usize,
    /// Date cells with content that did not parse as a date.
    pub unparsed_dates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSheet {
    pub records: Vec<CanonicalRecord>,
    pub stats: CleanStats,
}

static EMPTY: RawCell = RawCell::Empty;

/// True for a data row that is really a repeated header block.
///
/// The row is leakage when the branch code carries the branch-label marker,
/// when the account number has no digit at all, or when the account number is
/// itself one of the header labels.
pub fn is_header_leakage(ca_no: &str, pea_code: &str, registry: &SchemaRegistry) -> bool {
    pea_code.contains(registry.leakage_marker())
        || !has_ascii_digit(ca_no)
        || registry.is_source_label(ca_no.trim())
}

/// Blank, or only the `nan` placeholder once normalized.
fn is_absent(cell: &RawCell) -> bool {
    cell.as_text().and_then(|t| clean_text(&t)).is_none()
}

/// Turn one raw sheet into canonical records.
///
/// Steps run in a fixed order: select mapped columns, drop rows missing a
/// required field, drop header leakage, normalize text, coerce money and
/// dates. The output vector is densely indexed from 0 in source row order.
pub fn clean(sheet: &RawSheet, map: &ColumnMap, registry: &SchemaRegistry) -> CleanedSheet {
    let mut stats = CleanStats {
        rows_read: sheet.rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(sheet.rows.len());

    for row in &sheet.rows {
        // 1) select: one cell per canonical field, `None` when unmapped
        let selected: Vec<Option<&RawCell>> = CanonicalField::ALL
            .iter()
            .map(|f| map.get(*f).map(|col| row.get(col).unwrap_or(&EMPTY)))
            .collect();
        let cell = |f: CanonicalField| selected[f.ordinal()].unwrap_or(&EMPTY);

        // 2) required fields
        if registry.required().iter().any(|f| is_absent(cell(*f))) {
            stats.dropped_missing_required += 1;
            continue;
        }

        // 3) header leakage
        let ca_no = cell(CanonicalField::CaNo).as_text().unwrap_or_default();
        let pea_code = cell(CanonicalField::PeaCodeMain)
            .as_text()
            .unwrap_or_default();
        if is_header_leakage(&ca_no, &pea_code, registry) {
            stats.dropped_header_leakage += 1;
            continue;
        }

        // 4 + 5) normalize text, coerce money and dates
        let values = CanonicalField::ALL
            .iter()
            .map(|f| {
                let Some(raw) = selected[f.ordinal()] else {
                    return FieldValue::Missing;
                };
                match f.kind() {
                    FieldKind::Text => raw
                        .as_text()
                        .and_then(|t| clean_text(&t))
                        .map(FieldValue::Text)
                        .unwrap_or(FieldValue::Missing),
                    FieldKind::Money => {
                        let coerced = coerce_money(raw);
                        if coerced.defaulted {
                            stats.defaulted_amounts += 1;
                        }
                        FieldValue::Money(coerced.value)
                    }
                    FieldKind::Date => match coerce_date(raw) {
                        Some(d) => FieldValue::Date(d),
                        None => {
                            if !raw.is_blank() {
                                stats.unparsed_dates += 1;
                            }
                            FieldValue::Missing
                        }
                    },
                }
            })
            .collect();

        records.push(CanonicalRecord::from_values(values));
    }

    stats.rows_kept = records.len();
    debug!(
        file = %sheet.name,
        read = stats.rows_read,
        missing_required = stats.dropped_missing_required,
        leakage = stats.dropped_header_leakage,
        kept = stats.rows_kept,
        "cleaned sheet"
    );
    CleanedSheet { records, stats }
}
