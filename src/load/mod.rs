// src/load/mod.rs
//! Replace the contents of the target table with a cleaned dataset.

pub mod mysql;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub use mysql::MySqlStore;

use crate::dataset::{CanonicalDataset, CanonicalRecord};
use crate::error::{EtlError, EtlResult, LoadStage, StoreError};

/// MySQL rejects prepared statements with more placeholders than this.
pub const MAX_BIND_PARAMS: usize = 65_535;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoadOptions {
    pub table: String,
    /// Server-side routine run after the insert; skipped when unset.
    pub procedure: Option<String>,
    /// Rows per insert round trip.
    pub chunk_size: usize,
    /// Session `wait_timeout` raised before the procedure runs.
    pub wait_timeout_secs: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            table: "dept_master".to_string(),
            procedure: Some("sp_refresh_dashboard_master".to_string()),
            chunk_size: 5000,
            wait_timeout_secs: 28_800,
        }
    }
}

/// Boundary to the relational store.
#[allow(async_fn_in_trait)]
pub trait RelationalStore {
    /// Remove every row of `table`, in its own transaction.
    async fn truncate(&self, table: &str) -> Result<(), StoreError>;

    /// Insert `rows` (values in `columns` order); returns rows written.
    async fn insert_rows(
        &self,
        table: &str,
        columns: &[&str],
        rows: &[CanonicalRecord],
    ) -> Result<u64, StoreError>;

    /// Raise the session wait timeout, then call `name()` in a fresh transaction.
    async fn run_procedure(&self, name: &str, wait_timeout: Duration) -> Result<(), StoreError>;
}

/// Letters, digits and underscore only.
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::Rejected(format!("invalid identifier `{}`", name)))
    }
}

/// Truncate, bulk insert, refresh: three separately scoped steps.
///
/// A failure after the truncate leaves the table empty; nothing is retried.
pub struct LoadCoordinator<'a, S> {
    store: &'a S,
    options: LoadOptions,
}

impl<'a, S: RelationalStore> LoadCoordinator<'a, S> {
    pub fn new(store: &'a S, options: LoadOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Configured chunk size, capped so one statement stays under the bind limit.
    pub fn effective_chunk_size(&self, columns: usize) -> usize {
        let cap = MAX_BIND_PARAMS / columns.max(1);
        self.options.chunk_size.clamp(1, cap.max(1))
    }

    #[tracing::instrument(level = "info", skip(self, dataset), fields(table = %self.options.table, rows = dataset.len()))]
    pub async fn load(&self, dataset: &CanonicalDataset) -> EtlResult<u64> {
        let table = self.options.table.as_str();
        if dataset.is_empty() {
            return Err(EtlError::EmptyDataset {
                table: table.to_string(),
            });
        }
        validate_identifier(table).map_err(|e| EtlError::load(LoadStage::Truncate, e))?;
        if let Some(proc_name) = &self.options.procedure {
            validate_identifier(proc_name).map_err(|e| EtlError::load(LoadStage::Procedure, e))?;
        }

        // 1) truncate
        self.store
            .truncate(table)
            .await
            .map_err(|e| EtlError::load(LoadStage::Truncate, e))?;
        info!("table truncated");

        // 2) bulk insert
        let columns: Vec<&str> = dataset.columns().iter().map(|f| f.name()).collect();
        let chunk = self.effective_chunk_size(columns.len());
        let mut written = 0u64;
        for (i, rows) in dataset.chunks(chunk).enumerate() {
            written += self
                .store
                .insert_rows(table, &columns, rows)
                .await
                .map_err(|e| EtlError::load(LoadStage::Insert, e))?;
            debug!(chunk = i, written, "chunk inserted");
        }
        info!(written, "rows inserted");

        // 3) refresh
        if let Some(proc_name) = &self.options.procedure {
            let timeout = Duration::from_secs(self.options.wait_timeout_secs);
            self.store
                .run_procedure(proc_name, timeout)
                .await
                .map_err(|e| EtlError::load(LoadStage::Procedure, e))?;
            info!(procedure = %proc_name, "refresh procedure finished");
        }

        Ok(written)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingStore};
    use super::*;
    use crate::dataset::FieldValue;
    use crate::schema::CanonicalField;

    fn dataset(n: usize) -> CanonicalDataset {
        let records = (0..n)
            .map(|i| {
                let mut values = vec![FieldValue::Missing; CanonicalField::COUNT];
                values[CanonicalField::CaNo.ordinal()] = FieldValue::Text(i.to_string());
                CanonicalRecord::from_values(values)
            })
            .collect();
        CanonicalDataset::from_records(records)
    }

    fn options(chunk_size: usize) -> LoadOptions {
        LoadOptions {
            chunk_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn truncate_insert_refresh_in_order() {
        let store = RecordingStore::default();
        let written = LoadCoordinator::new(&store, options(2))
            .load(&dataset(5))
            .await
            .unwrap();
        assert_eq!(written, 5);

        let calls = store.calls();
        assert_eq!(calls[0], Call::Truncate("dept_master".into()));
        let chunk_sizes: Vec<usize> = calls
            .iter()
            .filter_map(|c| match c {
                Call::Insert { rows, columns, .. } => {
                    assert_eq!(*columns, CanonicalField::COUNT);
                    Some(*rows)
                }
                _ => None,
            })
            .collect();
        assert_eq!(chunk_sizes, vec![2, 2, 1]);
        assert_eq!(
            calls.last(),
            Some(&Call::Procedure {
                name: "sp_refresh_dashboard_master".into(),
                timeout_secs: 28_800
            })
        );
    }

    #[tokio::test]
    async fn insert_failure_surfaces_stage_and_skips_refresh() {
        let store = RecordingStore {
            fail_insert_after: Some(1),
            ..Default::default()
        };
        let err = LoadCoordinator::new(&store, options(2))
            .load(&dataset(5))
            .await
            .unwrap_err();
        match err {
            EtlError::LoadFailure { stage, source } => {
                assert_eq!(stage, LoadStage::Insert);
                assert!(source.to_string().contains("duplicate key"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!store
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Procedure { .. })));
    }

    #[tokio::test]
    async fn procedure_failure_is_load_failure() {
        let store = RecordingStore {
            fail_procedure: true,
            ..Default::default()
        };
        let err = LoadCoordinator::new(&store, options(100))
            .load(&dataset(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EtlError::LoadFailure {
                stage: LoadStage::Procedure,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_dataset_never_truncates() {
        let store = RecordingStore::default();
        let err = LoadCoordinator::new(&store, LoadOptions::default())
            .load(&CanonicalDataset::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::EmptyDataset { .. }));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn bad_identifiers_rejected_before_truncate() {
        let store = RecordingStore::default();
        let opts = LoadOptions {
            procedure: Some("sp; DROP TABLE x".into()),
            ..Default::default()
        };
        let err = LoadCoordinator::new(&store, opts)
            .load(&dataset(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EtlError::LoadFailure {
                stage: LoadStage::Procedure,
                ..
            }
        ));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn chunk_size_is_capped_by_bind_limit() {
        let store = RecordingStore::default();
        let c = LoadCoordinator::new(&store, options(5000));
        assert_eq!(c.effective_chunk_size(25), MAX_BIND_PARAMS / 25);
        assert_eq!(c.effective_chunk_size(1), 5000);
        let c = LoadCoordinator::new(&store, options(0));
        assert_eq!(c.effective_chunk_size(25), 1);
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("dept_master").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("a-b").is_err());
        assert!(validate_identifier("`x`").is_err());
    }
}
