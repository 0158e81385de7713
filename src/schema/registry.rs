// src/schema/registry.rs
//! Fixed mapping from the billing extract's header labels to canonical fields.
//!
//! Resolution is two-phase: positional overrides are checked first (and the
//! sheet rejected if it is too narrow for them), then every remaining field is
//! looked up by its trimmed header label.

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use super::types::CanonicalField;
use crate::error::{EtlError, EtlResult};

/// Zero-based row of the header within every extract sheet.
pub const HEADER_ROW: usize = 17;

/// Column carrying the branch code, whose header is blank or ambiguous in some files.
pub const BRANCH_CODE_COLUMN: usize = 26;

/// Text of the branch-label header cell; its presence in a data row means a
/// header block was pasted into the middle of the sheet.
pub const BRANCH_LABEL_MARKER: &str = "กฟฟ.";

/// Where a canonical field is read from in the source sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceColumn {
    Label(String),
    Position(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CanonicalField,
    pub source: SourceColumn,
}

impl FieldSpec {
    fn label(field: CanonicalField, label: &str) -> Self {
        Self {
            field,
            source: SourceColumn::Label(label.to_string()),
        }
    }

    fn position(field: CanonicalField, index: usize) -> Self {
        Self {
            field,
            source: SourceColumn::Position(index),
        }
    }
}

static STANDARD: Lazy<SchemaRegistry> = Lazy::new(|| {
    use CanonicalField::*;
    let specs = vec![
        FieldSpec::label(BusType, "ประเภทธุรกิจ"),
        FieldSpec::label(AccClass, "คลาสบัญชี"),
        FieldSpec::label(PeaNameTrsg, "ชื่อ กฟฟ.(TRSG)"),
        FieldSpec::position(PeaCodeMain, BRANCH_CODE_COLUMN),
        FieldSpec::label(LineCode, "สาย"),
        FieldSpec::label(CaNo, "หมายเลขผู้ใช้ไฟฟ้า"),
        FieldSpec::label(CustomerName, "ชื่อ-สกุล"),
        FieldSpec::label(CaDocNo, "เลขที่เอกสาร CA"),
        FieldSpec::label(ContractNo, "สัญญา"),
        FieldSpec::label(BpNo, "คู่ค้าทางธุรกิจ"),
        FieldSpec::label(BillMonth, "บิลเดือน"),
        FieldSpec::label(OutstandingAmount, "เงินที่ค้างชำระ"),
        FieldSpec::label(TaxAmount, "ค่าภาษีฯ"),
        FieldSpec::label(PaymentType, "ประเภทการชำระเงิน"),
        FieldSpec::label(GlAccount, "บัญชีแยกประเภททั่วไป"),
        FieldSpec::label(RateType, "ประเภทอัตรา"),
        FieldSpec::label(DocDate, "วันที่เอกสาร"),
        FieldSpec::label(DueDate, "วันที่ครบกำหนด"),
        FieldSpec::label(DocType, "ประเภทเอกสาร"),
        FieldSpec::label(MainItem, "รายการหลัก"),
        FieldSpec::label(SubItem, "รายการย่อย"),
        FieldSpec::label(DunningLock, "ล๊อคการติดตามหนี้"),
        FieldSpec::label(InstallmentDocNo, "เลขที่เอกสารผ่อนชำระ"),
        FieldSpec::label(NoticeDueDate, "วันครบกำหนดแจ้งเตือน"),
        FieldSpec::label(NoticeResult, "ผลการวางหนังสือแจ้งเตือน"),
    ];
    SchemaRegistry {
        header_row: HEADER_ROW,
        specs,
        required: vec![CaNo, PeaCodeMain],
        leakage_marker: BRANCH_LABEL_MARKER.to_string(),
    }
});

/// Immutable source-to-canonical layout, shared read-only by every file in a batch.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    header_row: usize,
    specs: Vec<FieldSpec>,
    required: Vec<CanonicalField>,
    leakage_marker: String,
}

impl SchemaRegistry {
    /// The billing extract layout.
    pub fn standard() -> &'static SchemaRegistry {
        &STANDARD
    }

    /// Build a custom layout. Specs are reordered canonically; duplicates are rejected.
    pub fn new(
        header_row: usize,
        mut specs: Vec<FieldSpec>,
        required: Vec<CanonicalField>,
        leakage_marker: impl Into<String>,
    ) -> EtlResult<Self> {
        specs.sort_by_key(|s| s.field);
        if let Some(w) = specs.windows(2).find(|w| w[0].field == w[1].field) {
            return Err(EtlError::Config(format!(
                "field {} is mapped more than once",
                w[0].field
            )));
        }
        for field in &required {
            if !specs.iter().any(|s| s.field == *field) {
                return Err(EtlError::Config(format!(
                    "required field {} has no source column",
                    field
                )));
            }
        }
        Ok(Self {
            header_row,
            specs,
            required,
            leakage_marker: leakage_marker.into(),
        })
    }

    /// Canonical field names, in output order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.field.name()).collect()
    }

    pub fn specs(&self) -> &[FieldSpec] {
        &self.specs
    }

    /// Fields whose absence disqualifies a row.
    pub fn required(&self) -> &[CanonicalField] {
        &self.required
    }

    pub fn header_row(&self) -> usize {
        self.header_row
    }

    pub fn leakage_marker(&self) -> &str {
        &self.leakage_marker
    }

    /// Smallest column count a sheet needs for every positional override to exist.
    pub fn min_columns(&self) -> usize {
        self.positions().map(|i| i + 1).max().unwrap_or(0)
    }

    /// True when `text` is one of the configured header labels.
    pub fn is_source_label(&self, text: &str) -> bool {
        self.specs
            .iter()
            .any(|s| matches!(&s.source, SourceColumn::Label(l) if l == text))
    }

    fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.specs.iter().filter_map(|s| match s.source {
            SourceColumn::Position(i) => Some(i),
            SourceColumn::Label(_) => None,
        })
    }

    /// Resolve one sheet's header row into a [`ColumnMap`].
    ///
    /// Labelled fields whose header is missing are left out of the map. A sheet
    /// narrower than [`min_columns`](Self::min_columns) fails with
    /// [`EtlError::StructuralMismatch`].
    pub fn resolve(&self, file: &str, headers: &[String]) -> EtlResult<ColumnMap> {
        let min = self.min_columns();
        if headers.len() < min {
            return Err(EtlError::StructuralMismatch {
                file: file.to_string(),
                reason: format!(
                    "sheet has {} columns, at least {} required",
                    headers.len(),
                    min
                ),
            });
        }

        let overridden: Vec<usize> = self.positions().collect();
        let trimmed: Vec<&str> = headers.iter().map(|h| h.trim()).collect();

        let mut slots = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let index = match &spec.source {
                SourceColumn::Position(i) => Some(*i),
                SourceColumn::Label(label) => trimmed
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !overridden.contains(i) && *h == label)
                    .map(|(i, _)| i),
            };
            match index {
                Some(i) => slots.push((spec.field, i)),
                None if self.required.contains(&spec.field) => {
                    warn!(
                        file,
                        field = %spec.field,
                        "required header label not found; every row will be dropped"
                    );
                }
                None => debug!(file, field = %spec.field, "header label not found; field omitted"),
            }
        }

        Ok(ColumnMap { slots })
    }
}

/// Per-sheet resolution: canonical field → source column index, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    slots: Vec<(CanonicalField, usize)>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<usize> {
        self.slots
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, i)| *i)
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.get(field).is_some()
    }
}
