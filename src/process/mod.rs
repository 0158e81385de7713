// src/process/mod.rs
//! Row cleaning: raw worksheet → canonical records.

pub mod clean;
pub mod date_parser;
pub mod money;
pub mod sheet;
pub mod utils;

use std::path::Path;
use tracing::{info, warn};

pub use clean::{clean, is_header_leakage, CleanStats, CleanedSheet};
pub use money::{coerce_money, Coerced};
pub use sheet::{CalamineReader, RawCell, RawSheet, SheetReader};

use crate::error::EtlResult;
use crate::schema::SchemaRegistry;

/// Read, resolve and clean one open-format file.
///
/// Fails with `StructuralMismatch` before any row is cleaned when the sheet
/// is too narrow for the registry.
#[tracing::instrument(level = "info", skip(reader, registry), fields(path = %path.display()))]
pub fn process_file<R: SheetReader + ?Sized>(
    path: &Path,
    reader: &R,
    registry: &SchemaRegistry,
) -> EtlResult<CleanedSheet> {
    let sheet = reader.read(path, registry.header_row())?;
    let map = registry.resolve(&sheet.name, &sheet.headers)?;
    let cleaned = clean(&sheet, &map, registry);
    info!(
        rows = cleaned.stats.rows_kept,
        of = cleaned.stats.rows_read,
        defaulted_amounts = cleaned.stats.defaulted_amounts,
        "file cleaned"
    );
    if cleaned.stats.unparsed_dates > 0 {
        warn!(
            unparsed_dates = cleaned.stats.unparsed_dates,
            "date cells could not be read and were stored as missing"
        );
    }
    Ok(cleaned)
}
