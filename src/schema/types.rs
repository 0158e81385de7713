// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a canonical field is coerced during cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Money,
    Date,
}

/// A named column of the cleaned schema, independent of source header text.
/// Declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    BusType,
    AccClass,
    PeaNameTrsg,
    PeaCodeMain,
    LineCode,
    CaNo,
    CustomerName,
    CaDocNo,
    ContractNo,
    BpNo,
    BillMonth,
    OutstandingAmount,
    TaxAmount,
    PaymentType,
    GlAccount,
    RateType,
    DocDate,
    DueDate,
    DocType,
    MainItem,
    SubItem,
    DunningLock,
    InstallmentDocNo,
    NoticeDueDate,
    NoticeResult,
}

impl CanonicalField {
    pub const COUNT: usize = 25;

    pub const ALL: [CanonicalField; CanonicalField::COUNT] = [
        CanonicalField::BusType,
        CanonicalField::AccClass,
        CanonicalField::PeaNameTrsg,
        CanonicalField::PeaCodeMain,
        CanonicalField::LineCode,
        CanonicalField::CaNo,
        CanonicalField::CustomerName,
        CanonicalField::CaDocNo,
        CanonicalField::ContractNo,
        CanonicalField::BpNo,
        CanonicalField::BillMonth,
        CanonicalField::OutstandingAmount,
        CanonicalField::TaxAmount,
        CanonicalField::PaymentType,
        CanonicalField::GlAccount,
        CanonicalField::RateType,
        CanonicalField::DocDate,
        CanonicalField::DueDate,
        CanonicalField::DocType,
        CanonicalField::MainItem,
        CanonicalField::SubItem,
        CanonicalField::DunningLock,
        CanonicalField::InstallmentDocNo,
        CanonicalField::NoticeDueDate,
        CanonicalField::NoticeResult,
    ];

    /// Column name in the cleaned table and in the target relational table.
    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::BusType => "bus_type",
            CanonicalField::AccClass => "acc_class",
            CanonicalField::PeaNameTrsg => "pea_name_trsg",
            CanonicalField::PeaCodeMain => "pea_code_main",
            CanonicalField::LineCode => "line_code",
            CanonicalField::CaNo => "ca_no",
            CanonicalField::CustomerName => "customer_name",
            CanonicalField::CaDocNo => "ca_doc_no",
            CanonicalField::ContractNo => "contract_no",
            CanonicalField::BpNo => "bp_no",
            CanonicalField::BillMonth => "bill_month",
            CanonicalField::OutstandingAmount => "outstanding_amount",
            CanonicalField::TaxAmount => "tax_amount",
            CanonicalField::PaymentType => "payment_type",
            CanonicalField::GlAccount => "gl_account",
            CanonicalField::RateType => "rate_type",
            CanonicalField::DocDate => "doc_date",
            CanonicalField::DueDate => "due_date",
            CanonicalField::DocType => "doc_type",
            CanonicalField::MainItem => "main_item",
            CanonicalField::SubItem => "sub_item",
            CanonicalField::DunningLock => "dunning_lock",
            CanonicalField::InstallmentDocNo => "installment_doc_no",
            CanonicalField::NoticeDueDate => "notice_due_date",
            CanonicalField::NoticeResult => "notice_result",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::OutstandingAmount | CanonicalField::TaxAmount => FieldKind::Money,
            CanonicalField::DocDate | CanonicalField::DueDate | CanonicalField::NoticeDueDate => {
                FieldKind::Date
            }
            _ => FieldKind::Text,
        }
    }

    /// Position in the canonical ordering.
    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
