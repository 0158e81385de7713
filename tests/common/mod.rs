// tests/common/mod.rs
//! Fixtures for end-to-end batch tests: extracts written as CSV, a CSV-backed
//! sheet reader, and a conversion engine that copies bytes.
#![allow(dead_code)]

use dept_etl::convert::{ConversionEngine, EngineLauncher, FileFormat};
use dept_etl::error::{EtlError, EtlResult};
use dept_etl::process::{RawCell, RawSheet, SheetReader};
use dept_etl::schema::{
    CanonicalField, SchemaRegistry, SourceColumn, BRANCH_CODE_COLUMN, BRANCH_LABEL_MARKER,
    HEADER_ROW,
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Reads a "workbook" that is really a CSV grid, whatever its extension.
pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read(&self, path: &Path, header_row: usize) -> EtlResult<RawSheet> {
        let err = |e: csv::Error| EtlError::Workbook {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(err)?;
        let mut grid = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(err)?;
            grid.push(
                record
                    .iter()
                    .map(|c| if c.is_empty() { RawCell::Empty } else { RawCell::text(c) })
                    .collect(),
            );
        }
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        RawSheet::from_grid(name, grid, header_row)
    }
}

/// "Converts" by copying the source bytes to the target.
pub struct CopyLauncher;
pub struct CopyEngine;

impl EngineLauncher for CopyLauncher {
    type Engine = CopyEngine;
    fn launch(&self) -> EtlResult<CopyEngine> {
        Ok(CopyEngine)
    }
}

impl ConversionEngine for CopyEngine {
    type Workbook = PathBuf;
    fn open(&mut self, path: &Path) -> EtlResult<PathBuf> {
        Ok(path.to_path_buf())
    }
    fn save_as(&mut self, wb: &mut PathBuf, target: &Path, _: FileFormat) -> EtlResult<()> {
        fs::copy(&*wb, target).map_err(|e| EtlError::Io {
            path: target.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
    fn close(&mut self, _: PathBuf) -> EtlResult<()> {
        Ok(())
    }
    fn quit(&mut self) -> EtlResult<()> {
        Ok(())
    }
}

/// An engine that never starts.
pub struct FailingLauncher;

impl EngineLauncher for FailingLauncher {
    type Engine = CopyEngine;
    fn launch(&self) -> EtlResult<CopyEngine> {
        Err(EtlError::ConversionFailure {
            path: PathBuf::from("soffice"),
            reason: "engine did not start".to_string(),
        })
    }
}

/// One data row of an extract.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    pub ca_no: &'a str,
    pub pea_code: &'a str,
    pub amount: &'a str,
}

pub fn row<'a>(ca_no: &'a str, pea_code: &'a str, amount: &'a str) -> Row<'a> {
    Row {
        ca_no,
        pea_code,
        amount,
    }
}

const WIDTH: usize = BRANCH_CODE_COLUMN + 1;

/// Column of each labelled field in the fixture layout: labels in canonical
/// order from column 0, the branch code at its fixed position.
fn layout() -> Vec<(CanonicalField, usize, String)> {
    let mut col = 0;
    SchemaRegistry::standard()
        .specs()
        .iter()
        .map(|s| match &s.source {
            SourceColumn::Label(l) => {
                col += 1;
                (s.field, col - 1, l.clone())
            }
            SourceColumn::Position(i) => (s.field, *i, BRANCH_LABEL_MARKER.to_string()),
        })
        .collect()
}

fn column_of(field: CanonicalField) -> usize {
    layout()
        .into_iter()
        .find(|(f, _, _)| *f == field)
        .map(|(_, c, _)| c)
        .unwrap()
}

fn to_csv(grid: &[Vec<String>]) -> String {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for line in grid {
        wtr.write_record(line).unwrap();
    }
    String::from_utf8(wtr.into_inner().unwrap()).unwrap()
}

fn preamble(width: usize) -> Vec<Vec<String>> {
    let mut grid = vec![vec![String::new(); width]; HEADER_ROW];
    grid[0][0] = "รายงานหนี้ค้างชำระ".to_string();
    grid
}

/// A full-width extract: 17 preamble rows, the header row, then `rows`.
pub fn extract_csv(rows: &[Row]) -> String {
    let layout = layout();
    let mut grid = preamble(WIDTH);
    let mut header = vec![String::new(); WIDTH];
    for (_, col, label) in &layout {
        header[*col] = format!("  {}  ", label);
    }
    grid.push(header);

    for r in rows {
        let mut line = vec![String::new(); WIDTH];
        line[column_of(CanonicalField::CaNo)] = r.ca_no.to_string();
        line[column_of(CanonicalField::PeaCodeMain)] = r.pea_code.to_string();
        line[column_of(CanonicalField::OutstandingAmount)] = r.amount.to_string();
        line[column_of(CanonicalField::CustomerName)] = format!("ลูกค้า {}", r.ca_no);
        line[column_of(CanonicalField::DocDate)] = "31.01.2025".to_string();
        grid.push(line);
    }
    to_csv(&grid)
}

/// An extract with fewer columns than the branch-code position needs.
pub fn narrow_csv() -> String {
    let mut grid = preamble(20);
    grid.push((0..20).map(|i| format!("col{i}")).collect());
    grid.push((0..20).map(|i| i.to_string()).collect());
    to_csv(&grid)
}

pub fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

pub fn files_with_ext(dir: &Path, ext: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x.eq_ignore_ascii_case(ext)))
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
