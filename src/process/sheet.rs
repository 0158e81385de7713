// src/process/sheet.rs
use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDate;
use std::{borrow::Cow, path::Path};
use tracing::debug;

use crate::error::{EtlError, EtlResult};

/// A single cell as read from a spreadsheet, before any cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
    Error(String),
}

impl RawCell {
    pub fn text(s: impl Into<String>) -> Self {
        RawCell::Text(s.into())
    }

    /// Textual rendering. Integral numbers drop the fractional part so account
    /// numbers stored as numbers come out as `12345`, not `12345.0`.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            RawCell::Empty => None,
            RawCell::Text(s) => Some(Cow::Borrowed(s)),
            RawCell::Number(n) => Some(Cow::Owned(render_number(*n))),
            RawCell::Bool(b) => Some(Cow::Owned(b.to_string())),
            RawCell::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
            RawCell::Error(e) => Some(Cow::Borrowed(e)),
        }
    }

    /// Empty, or text that is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::Bool(b) => RawCell::Bool(*b),
            Data::DateTime(_) => match cell.as_datetime() {
                Some(dt) => RawCell::Date(dt.date()),
                None => RawCell::Error(format!("{}", cell)),
            },
            Data::DateTimeIso(s) => s
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .map(RawCell::Date)
                .unwrap_or_else(|| RawCell::Text(s.clone())),
            Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(e) => RawCell::Error(e.to_string()),
        }
    }
}

/// One worksheet cut at the header row: trimmed headers plus the data rows below.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    /// File name, used in reports and errors.
    pub name: String,
    /// Header labels, trimmed. `headers.len()` is the sheet width.
    pub headers: Vec<String>,
    /// Data rows below the header. Rows may be shorter than the header.
    pub rows: Vec<Vec<RawCell>>,
}

static EMPTY: RawCell = RawCell::Empty;

impl RawSheet {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        let headers = headers.into_iter().map(|h| h.trim().to_string()).collect();
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Cut a full grid (absolute rows from the top of the sheet) at `header_row`.
    pub fn from_grid(
        name: impl Into<String>,
        mut grid: Vec<Vec<RawCell>>,
        header_row: usize,
    ) -> EtlResult<Self> {
        let name = name.into();
        if grid.len() <= header_row {
            return Err(EtlError::StructuralMismatch {
                reason: format!(
                    "sheet has {} rows, header expected on row {}",
                    grid.len(),
                    header_row + 1
                ),
                file: name,
            });
        }

        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let rows = grid.split_off(header_row + 1);
        let header_cells = grid.pop().unwrap_or_default();
        let mut headers: Vec<String> = header_cells
            .iter()
            .map(|c| c.as_text().map(|t| t.trim().to_string()).unwrap_or_default())
            .collect();
        headers.resize(width, String::new());

        Ok(Self {
            name,
            headers,
            rows,
        })
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Cell at (`row`, `col`), `Empty` when the row is short.
    pub fn cell(&self, row: usize, col: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// Source of [`RawSheet`]s. Production code reads workbooks with calamine.
pub trait SheetReader {
    fn read(&self, path: &Path, header_row: usize) -> EtlResult<RawSheet>;
}

/// Reads the first worksheet of an xlsx/xls/ods workbook.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineReader;

impl SheetReader for CalamineReader {
    #[tracing::instrument(level = "debug", skip(self, path), fields(path = %path.display()))]
    fn read(&self, path: &Path, header_row: usize) -> EtlResult<RawSheet> {
        let workbook_err = |reason: String| EtlError::Workbook {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| workbook_err("workbook has no sheets".to_string()))?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| workbook_err(e.to_string()))?;

        // Absolute addressing: the header offset counts from the top of the
        // sheet, not from the first non-empty cell.
        let grid: Vec<Vec<RawCell>> = match range.end() {
            Some((last_row, last_col)) => (0..=last_row)
                .map(|r| {
                    (0..=last_col)
                        .map(|c| range.get_value((r, c)).map(RawCell::from).unwrap_or(RawCell::Empty))
                        .collect()
                })
                .collect(),
            None => Vec::new(),
        };
        debug!(sheet = %sheet_name, rows = grid.len(), "read worksheet");

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        RawSheet::from_grid(name, grid, header_row)
    }
}
