// src/history/mod.rs
//! Per-batch audit trail, one Parquet file per batch under a date partition.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::PathBuf,
    sync::Arc,
};
use tracing::info;

use crate::batch::{BatchReport, FileOutcome};

/// One row of history: what happened to one input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub file: String,
    /// `"cleaned"` or `"failed"`.
    pub status: String,
    pub rows: u64,
    pub defaulted_amounts: u64,
    pub unparsed_dates: u64,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Flatten a batch report into history rows, all stamped with `at`.
pub fn entries_from_report(report: &BatchReport, at: DateTime<Utc>) -> Vec<HistoryEntry> {
    report
        .files
        .iter()
        .map(|f| match &f.outcome {
            FileOutcome::Cleaned { rows, stats } => HistoryEntry {
                file: f.file.clone(),
                status: "cleaned".to_string(),
                rows: *rows as u64,
                defaulted_amounts: stats.defaulted_amounts as u64,
                unparsed_dates: stats.unparsed_dates as u64,
                error: None,
                recorded_at: at,
            },
            FileOutcome::Failed { error } => HistoryEntry {
                file: f.file.clone(),
                status: "failed".to_string(),
                rows: 0,
                defaulted_amounts: 0,
                unparsed_dates: 0,
                error: Some(error.to_string()),
                recorded_at: at,
            },
        })
        .collect()
}

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("file", DataType::Utf8, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("rows", DataType::UInt64, false),
        Field::new("defaulted_amounts", DataType::UInt64, false),
        Field::new("unparsed_dates", DataType::UInt64, false),
        Field::new("error", DataType::Utf8, true),
        Field::new(
            "recorded_at",
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
    ])
}

pub struct BatchHistory {
    dir: PathBuf,
}

impl BatchHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating history directory {:?}", &dir))?;
        Ok(Self { dir })
    }

    /// Write `entries` as `date=YYYY-MM-DD/batch_<micros>.parquet`. Returns the file written.
    pub fn record(&self, entries: &[HistoryEntry]) -> Result<PathBuf> {
        let now = Utc::now();
        let partition = self.dir.join(format!("date={}", now.format("%Y-%m-%d")));
        fs::create_dir_all(&partition)
            .with_context(|| format!("creating partition {:?}", &partition))?;
        let path = partition.join(format!("batch_{}.parquet", now.timestamp_micros()));

        let schema = Arc::new(schema());
        let arrays: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.file.as_str()))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.status.as_str()))),
            Arc::new(UInt64Array::from_iter_values(entries.iter().map(|e| e.rows))),
            Arc::new(UInt64Array::from_iter_values(
                entries.iter().map(|e| e.defaulted_amounts),
            )),
            Arc::new(UInt64Array::from_iter_values(
                entries.iter().map(|e| e.unparsed_dates),
            )),
            Arc::new(StringArray::from_iter(entries.iter().map(|e| e.error.as_deref()))),
            Arc::new(TimestampMicrosecondArray::from_iter_values(
                entries.iter().map(|e| e.recorded_at.timestamp_micros()),
            )),
        ];
        let batch = RecordBatch::try_new(schema.clone(), arrays)
            .context("building history record batch")?;

        let file = File::create(&path).with_context(|| format!("creating history file {:?}", &path))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("creating Arrow writer for history")?;
        writer.write(&batch).context("writing history batch")?;
        writer.close().context("closing history writer")?;

        info!(path = %path.display(), files = entries.len(), "batch history recorded");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FileReport;
    use crate::error::EtlError;
    use crate::process::CleanStats;
    use arrow::array::Array;
    use glob::glob;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::{fs::File, path::Path};

    fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
        batch
            .column_by_name(name)
            .and_then(|c| c.as_any().downcast_ref::<T>())
            .with_context(|| format!("history column {name} missing or mistyped"))
    }

    /// Every entry recorded under `dir`, oldest partition first.
    fn read_back(dir: &Path) -> Result<Vec<HistoryEntry>> {
        let pattern = format!("{}/**/*.parquet", dir.display());
        let mut paths: Vec<PathBuf> = glob(&pattern)?.filter_map(|p| p.ok()).collect();
        paths.sort();

        let mut out = Vec::new();
        for path in paths {
            let file = File::open(&path).with_context(|| format!("opening {:?}", &path))?;
            let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)?
                .with_batch_size(1024)
                .build()?;
            while let Some(batch) = reader.next().transpose()? {
                let files = column::<StringArray>(&batch, "file")?;
                let status = column::<StringArray>(&batch, "status")?;
                let rows = column::<UInt64Array>(&batch, "rows")?;
                let defaulted = column::<UInt64Array>(&batch, "defaulted_amounts")?;
                let undated = column::<UInt64Array>(&batch, "unparsed_dates")?;
                let errors = column::<StringArray>(&batch, "error")?;
                let at = column::<TimestampMicrosecondArray>(&batch, "recorded_at")?;
                for i in 0..batch.num_rows() {
                    let recorded_at = DateTime::from_timestamp_micros(at.value(i))
                        .context("history timestamp out of range")?;
                    out.push(HistoryEntry {
                        file: files.value(i).to_string(),
                        status: status.value(i).to_string(),
                        rows: rows.value(i),
                        defaulted_amounts: defaulted.value(i),
                        unparsed_dates: undated.value(i),
                        error: (!errors.is_null(i)).then(|| errors.value(i).to_string()),
                        recorded_at,
                    });
                }
            }
        }
        Ok(out)
    }

    fn report() -> BatchReport {
        BatchReport {
            files: vec![
                FileReport {
                    file: "a.xlsx".into(),
                    outcome: FileOutcome::Cleaned {
                        rows: 12,
                        stats: CleanStats {
                            rows_kept: 12,
                            defaulted_amounts: 2,
                            unparsed_dates: 3,
                            ..Default::default()
                        },
                    },
                },
                FileReport {
                    file: "b.xlsx".into(),
                    outcome: FileOutcome::Failed {
                        error: EtlError::StructuralMismatch {
                            file: "b.xlsx".into(),
                            reason: "10 columns".into(),
                        },
                    },
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn entries_reflect_outcomes() {
        let at = Utc::now();
        let entries = entries_from_report(&report(), at);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, "cleaned");
        assert_eq!(entries[0].defaulted_amounts, 2);
        assert_eq!(entries[0].unparsed_dates, 3);
        assert_eq!(entries[1].status, "failed");
        assert!(entries[1].error.as_deref().unwrap().contains("10 columns"));
    }

    #[test]
    fn record_then_read_back() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let history = BatchHistory::new(tmp.path().join("history"))?;
        let at = DateTime::from_timestamp_micros(Utc::now().timestamp_micros()).unwrap();
        let entries = entries_from_report(&report(), at);

        let path = history.record(&entries)?;
        assert!(path.is_file());
        assert!(path
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|n| n.to_string_lossy().starts_with("date=")));

        assert_eq!(read_back(&tmp.path().join("history"))?, entries);
        Ok(())
    }
}
