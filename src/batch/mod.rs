// src/batch/mod.rs
//! Drives conversion and cleaning across a staging directory.

use std::{fs, path::Path};
use tracing::{error, info, warn};

use crate::config::{BatchContext, RetentionPolicy};
use crate::convert::{self, ConversionSummary, EngineLauncher, OPEN_EXTENSION};
use crate::dataset::CanonicalDataset;
use crate::error::{EtlError, EtlResult};
use crate::process::{self, CleanStats, SheetReader};
use crate::schema::SchemaRegistry;

#[derive(Debug)]
pub enum FileOutcome {
    Cleaned { rows: usize, stats: CleanStats },
    Failed { error: EtlError },
}

#[derive(Debug)]
pub struct FileReport {
    pub file: String,
    pub outcome: FileOutcome,
}

impl FileReport {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FileOutcome::Failed { .. })
    }

    pub fn rows(&self) -> usize {
        match &self.outcome {
            FileOutcome::Cleaned { rows, .. } => *rows,
            FileOutcome::Failed { .. } => 0,
        }
    }

    pub fn error(&self) -> Option<&EtlError> {
        match &self.outcome {
            FileOutcome::Failed { error } => Some(error),
            FileOutcome::Cleaned { .. } => None,
        }
    }
}

/// Result of one batch: the aggregated dataset plus what happened to each file.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub dataset: CanonicalDataset,
    pub files: Vec<FileReport>,
    pub conversion: ConversionSummary,
}

impl BatchReport {
    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.is_failed())
    }

    pub fn error_count(&self) -> usize {
        self.failed_files().count()
    }

    pub fn total_rows(&self) -> usize {
        self.dataset.len()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn remove_consumed(path: &Path, retention: RetentionPolicy) {
    if retention == RetentionPolicy::Keep {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        warn!(file = %path.display(), "failed to delete consumed file: {}", e);
    }
}

/// Run one batch over `ctx.staging_dir`.
///
/// Conversion failures abort the batch. Per-file read, structure, and
/// cleaning failures are recorded in the report and the loop moves on. Each
/// open-format file is deleted right after it has been read, and the archive
/// is purged whatever the outcome.
#[tracing::instrument(level = "info", skip_all, fields(staging = %ctx.staging_dir.display()))]
pub fn run<L, R>(
    ctx: &BatchContext,
    launcher: &L,
    reader: &R,
    registry: &SchemaRegistry,
) -> EtlResult<BatchReport>
where
    L: EngineLauncher,
    R: SheetReader + ?Sized,
{
    let result = aggregate(ctx, launcher, reader, registry);
    if let Err(e) = convert::purge_archive(ctx) {
        error!("archive purge failed: {}", e);
    }
    result
}

fn aggregate<L, R>(
    ctx: &BatchContext,
    launcher: &L,
    reader: &R,
    registry: &SchemaRegistry,
) -> EtlResult<BatchReport>
where
    L: EngineLauncher,
    R: SheetReader + ?Sized,
{
    let conversion = convert::convert_all(ctx, launcher)?;
    let inputs = convert::list_files(&ctx.staging_dir, OPEN_EXTENSION)?;
    info!(files = inputs.len(), "aggregating");

    let mut slices = Vec::with_capacity(inputs.len());
    let mut files = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = file_label(&path);
        let outcome = process::process_file(&path, reader, registry);
        remove_consumed(&path, ctx.retention);

        let outcome = match outcome {
            Ok(cleaned) => {
                let rows = cleaned.records.len();
                info!(file = %file, rows, "file ok");
                slices.push(cleaned.records);
                FileOutcome::Cleaned {
                    rows,
                    stats: cleaned.stats,
                }
            }
            Err(error) => {
                warn!(file = %file, "file skipped: {}", error);
                FileOutcome::Failed { error }
            }
        };
        files.push(FileReport { file, outcome });
    }

    let dataset = CanonicalDataset::concat(slices);
    let failed = files.iter().filter(|f| f.is_failed()).count();
    info!(
        rows = dataset.len(),
        files = files.len(),
        failed,
        "batch aggregated"
    );
    Ok(BatchReport {
        dataset,
        files,
        conversion,
    })
}
