// src/pipeline.rs
//! Batch entry points: convert → clean → aggregate → (export, history) → load.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::batch::{self, BatchReport};
use crate::config::BatchContext;
use crate::convert::EngineLauncher;
use crate::error::{EtlError, EtlResult};
use crate::export;
use crate::history::{entries_from_report, BatchHistory};
use crate::load::{LoadCoordinator, LoadOptions, RelationalStore};
use crate::process::{self, CleanedSheet, SheetReader};
use crate::schema::SchemaRegistry;

/// Optional side outputs of a batch.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write the aggregated dataset here as CSV before loading.
    pub export: Option<PathBuf>,
    /// Record per-file outcomes as Parquet under this directory.
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSummary {
    pub file: String,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the caller gets back from a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub converted: usize,
    pub files: Vec<FileSummary>,
    pub rows_cleaned: usize,
    pub defaulted_amounts: usize,
    /// Date cells with content that could not be read as a date (stored as missing).
    pub unparsed_dates: usize,
    /// `None` when the load was skipped.
    pub rows_loaded: Option<u64>,
    pub exported_to: Option<PathBuf>,
    pub history_file: Option<PathBuf>,
}

impl PipelineSummary {
    pub fn from_report(report: &BatchReport) -> Self {
        let mut defaulted_amounts = 0;
        let mut unparsed_dates = 0;
        let files = report
            .files
            .iter()
            .map(|f| {
                if let batch::FileOutcome::Cleaned { stats, .. } = &f.outcome {
                    defaulted_amounts += stats.defaulted_amounts;
                    unparsed_dates += stats.unparsed_dates;
                }
                FileSummary {
                    file: f.file.clone(),
                    rows: f.rows(),
                    error: f.error().map(ToString::to_string),
                }
            })
            .collect();
        Self {
            converted: report.conversion.converted.len(),
            files,
            rows_cleaned: report.total_rows(),
            defaulted_amounts,
            unparsed_dates,
            ..Default::default()
        }
    }

    pub fn error_count(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }
}

/// Convert and aggregate on the blocking pool.
pub async fn aggregate_batch<L, R>(
    ctx: BatchContext,
    launcher: L,
    reader: R,
    registry: &'static SchemaRegistry,
) -> EtlResult<BatchReport>
where
    L: EngineLauncher + Send + 'static,
    R: SheetReader + Send + 'static,
{
    tokio::task::spawn_blocking(move || batch::run(&ctx, &launcher, &reader, registry))
        .await
        .map_err(|e| EtlError::Task(e.to_string()))?
}

fn record_history(dir: &Path, report: &BatchReport) -> anyhow::Result<PathBuf> {
    let history = BatchHistory::new(dir)?;
    history.record(&entries_from_report(report, chrono::Utc::now()))
}

/// Run one full batch against `ctx`.
///
/// Per-file failures end up in the summary. Conversion, export and load
/// failures are returned as errors. With no store, or when nothing was
/// cleaned, the target table is left untouched.
#[tracing::instrument(level = "info", skip_all, fields(staging = %ctx.staging_dir.display()))]
pub async fn run_batch<L, R, S>(
    ctx: BatchContext,
    launcher: L,
    reader: R,
    registry: &'static SchemaRegistry,
    store: Option<&S>,
    load: &LoadOptions,
    opts: &RunOptions,
) -> EtlResult<PipelineSummary>
where
    L: EngineLauncher + Send + 'static,
    R: SheetReader + Send + 'static,
    S: RelationalStore,
{
    let report = aggregate_batch(ctx, launcher, reader, registry).await?;
    let mut summary = PipelineSummary::from_report(&report);
    if summary.error_count() > 0 {
        warn!(failed = summary.error_count(), "some files were skipped");
    }

    if let Some(path) = &opts.export {
        export::write_csv(&report.dataset, path)?;
        summary.exported_to = Some(path.clone());
    }

    // informational only
    if let Some(dir) = &opts.history_dir {
        match record_history(dir, &report) {
            Ok(path) => summary.history_file = Some(path),
            Err(e) => warn!("batch history not recorded: {:#}", e),
        }
    }

    match store {
        Some(_) if report.dataset.is_empty() => {
            warn!("no rows cleaned; target table left untouched");
        }
        Some(store) => {
            let written = LoadCoordinator::new(store, load.clone())
                .load(&report.dataset)
                .await?;
            summary.rows_loaded = Some(written);
        }
        None => info!("load skipped"),
    }

    info!(
        rows = summary.rows_cleaned,
        loaded = ?summary.rows_loaded,
        "batch finished"
    );
    Ok(summary)
}

/// Clean one open-format workbook in place. The file is neither deleted nor loaded.
pub fn clean_single_file<R: SheetReader + ?Sized>(
    path: &Path,
    reader: &R,
    registry: &SchemaRegistry,
) -> EtlResult<CleanedSheet> {
    process::process_file(path, reader, registry)
}
