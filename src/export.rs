// src/export.rs
//! CSV snapshot of a cleaned dataset.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};
use tracing::info;

use crate::dataset::CanonicalDataset;
use crate::error::{EtlError, EtlResult};

/// UTF-8 byte order mark; spreadsheet tools need it to detect Thai text.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Write `dataset` to `out`: BOM, header of canonical names, then one row per record.
pub fn write_csv_to<W: Write>(dataset: &CanonicalDataset, mut out: W) -> csv::Result<()> {
    out.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(dataset.columns().iter().map(|f| f.name()))?;
    for record in dataset.records() {
        wtr.write_record(record.values().iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_csv(dataset: &CanonicalDataset, path: &Path) -> EtlResult<()> {
    let export_err = |reason: String| EtlError::Export {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::create(path).map_err(|e| export_err(e.to_string()))?;
    write_csv_to(dataset, BufWriter::new(file)).map_err(|e| export_err(e.to_string()))?;
    info!(path = %path.display(), rows = dataset.len(), "dataset exported");
    Ok(())
}
