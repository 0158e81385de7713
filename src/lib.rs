// src/lib.rs
pub mod batch;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod export;
pub mod history;
pub mod load;
pub mod pipeline;
pub mod process;
pub mod schema;

pub use dataset::{CanonicalDataset, CanonicalRecord, FieldValue};
pub use error::{EtlError, EtlResult};
