// src/error.rs
use std::{fmt, path::PathBuf};
use thiserror::Error;

pub type EtlResult<T> = std::result::Result<T, EtlError>;

/// Which phase of a load was running when the store failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Connect,
    Truncate,
    Insert,
    Procedure,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadStage::Connect => "connect",
            LoadStage::Truncate => "truncate",
            LoadStage::Insert => "bulk insert",
            LoadStage::Procedure => "refresh procedure",
        };
        f.write_str(s)
    }
}

/// Errors raised by a relational store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    /// Refused before reaching the server (bad identifier, fake store failure, ...).
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum EtlError {
    /// Sheet lacks the required column count; the file is skipped.
    #[error("structural mismatch in {file}: {reason}")]
    StructuralMismatch { file: String, reason: String },

    /// The external conversion engine failed; the conversion pass is aborted.
    #[error("conversion failed for {}: {reason}", path.display())]
    ConversionFailure { path: PathBuf, reason: String },

    #[error("cannot read workbook {}: {reason}", path.display())]
    Workbook { path: PathBuf, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("load failed during {stage}: {source}")]
    LoadFailure {
        stage: LoadStage,
        #[source]
        source: StoreError,
    },

    #[error("dataset is empty; refusing to replace table {table}")]
    EmptyDataset { table: String },

    #[error("export to {} failed: {reason}", path.display())]
    Export { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl EtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn load(stage: LoadStage, source: StoreError) -> Self {
        EtlError::LoadFailure { stage, source }
    }

    /// True for errors that only disqualify a single file from a batch.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            EtlError::StructuralMismatch { .. } | EtlError::Workbook { .. } | EtlError::Io { .. }
        )
    }
}
