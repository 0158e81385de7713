use chrono::{Days, NaiveDate};

use super::sheet::RawCell;

/// Text layouts seen in billing extracts: SAP (`31.12.2024`), Thai office
/// exports (`31/12/2024`, `31-12-2024`) and ISO.
const DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// Largest spreadsheet serial day number (9999-12-31).
const MAX_SERIAL_DAY: f64 = 2_958_465.0;

/// Parse a date from a text cell. Time-of-day suffixes are ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = s.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Day number of a 1900-system workbook date held in an unformatted cell.
pub fn from_serial_day(n: f64) -> Option<NaiveDate> {
    if !(1.0..=MAX_SERIAL_DAY).contains(&n) {
        return None;
    }
    // day 60 is the phantom 1900-02-29, so the epoch sits on 1899-12-30
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(n.trunc() as u64))
}

/// Spreadsheet dates pass through; text and serial day numbers are parsed;
/// anything else is `None`.
pub fn coerce_date(cell: &RawCell) -> Option<NaiveDate> {
    match cell {
        RawCell::Date(d) => Some(*d),
        RawCell::Text(s) => parse_date(s),
        RawCell::Number(n) => from_serial_day(*n),
        _ => None,
    }
}
