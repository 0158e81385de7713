// src/dataset.rs
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fmt;

use crate::schema::CanonicalField;

/// One cleaned cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Absent in the source, blank after trimming, or an unparseable date.
    Missing,
    Text(String),
    Money(Decimal),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_money(&self) -> Option<Decimal> {
        match self {
            FieldValue::Money(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    /// Missing renders as the empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Money(d) => write!(f, "{:.2}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// One cleaned row, holding a value for every canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    values: Vec<FieldValue>,
}

impl CanonicalRecord {
    /// `values` must be in canonical order, one per field.
    pub(crate) fn from_values(values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(values.len(), CanonicalField::COUNT);
        Self { values }
    }

    pub fn get(&self, field: CanonicalField) -> &FieldValue {
        &self.values[field.ordinal()]
    }

    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn money(&self, field: CanonicalField) -> Option<Decimal> {
        self.get(field).as_money()
    }

    pub fn date(&self, field: CanonicalField) -> Option<NaiveDate> {
        self.get(field).as_date()
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &FieldValue)> {
        CanonicalField::ALL.iter().copied().zip(self.values.iter())
    }
}

/// Ordered concatenation of cleaned records. The position of a record in
/// [`records`](Self::records) is its dense 0..N-1 index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalDataset {
    records: Vec<CanonicalRecord>,
}

impl CanonicalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<CanonicalRecord>) -> Self {
        Self { records }
    }

    /// Concatenate per-file slices, keeping slice order and intra-slice order.
    pub fn concat<I>(slices: I) -> Self
    where
        I: IntoIterator<Item = Vec<CanonicalRecord>>,
    {
        let mut records = Vec::new();
        for slice in slices {
            records.extend(slice);
        }
        Self { records }
    }

    pub fn columns(&self) -> &'static [CanonicalField] {
        &CanonicalField::ALL
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&CanonicalRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn chunks(&self, size: usize) -> std::slice::Chunks<'_, CanonicalRecord> {
        self.records.chunks(size.max(1))
    }
}
