// src/convert/soffice.rs
//! Headless LibreOffice as the conversion engine.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::{debug, info};

use super::engine::{ConversionEngine, EngineLauncher, FileFormat};
use crate::error::{EtlError, EtlResult};

/// Export filter for each target format.
fn filter_name(format: FileFormat) -> &'static str {
    match format {
        FileFormat::OpenXmlWorkbook => "Calc MS Excel 2007 XML",
    }
}

#[derive(Debug, Clone)]
pub struct SofficeLauncher {
    /// Path to the `soffice` executable.
    pub program: PathBuf,
}

impl SofficeLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SofficeLauncher {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl EngineLauncher for SofficeLauncher {
    type Engine = SofficeEngine;

    fn launch(&self) -> EtlResult<SofficeEngine> {
        let fail = |reason: String| EtlError::ConversionFailure {
            path: self.program.clone(),
            reason,
        };
        let output = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    fail("LibreOffice not found; install it or set soffice_path".to_string())
                } else {
                    fail(e.to_string())
                }
            })?;
        if !output.status.success() {
            return Err(fail(format!("`--version` exited with {}", output.status)));
        }
        info!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "conversion engine ready"
        );
        Ok(SofficeEngine {
            program: self.program.clone(),
        })
    }
}

pub struct SofficeEngine {
    program: PathBuf,
}

/// An "opened" source file. soffice converts in one shot, so opening only
/// checks the file is there.
pub struct SofficeWorkbook {
    source: PathBuf,
}

fn output_dir(target: &Path) -> &Path {
    target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Where soffice writes `source` converted to `format`: the whole file stem,
/// dots included, plus the format extension.
fn produced_path(out_dir: &Path, source: &Path, format: FileFormat) -> PathBuf {
    let stem = source.file_stem().unwrap_or_default();
    out_dir.join(format!("{}.{}", stem.to_string_lossy(), format.extension()))
}

impl SofficeEngine {
    /// Convert every job into `out_dir` with a single soffice process.
    fn convert_into(
        &self,
        out_dir: &Path,
        jobs: &[&(PathBuf, PathBuf)],
        format: FileFormat,
    ) -> EtlResult<()> {
        let Some((first, _)) = jobs.first() else {
            return Ok(());
        };
        let fail = |path: &Path, reason: String| EtlError::ConversionFailure {
            path: path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg("--convert-to")
            .arg(format!("{}:{}", format.extension(), filter_name(format)))
            .arg("--outdir")
            .arg(out_dir)
            .args(jobs.iter().map(|(source, _)| source))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| fail(first, e.to_string()))?;
        if !output.status.success() {
            return Err(fail(
                first,
                format!(
                    "soffice exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        for (source, target) in jobs {
            let produced = produced_path(out_dir, source, format);
            if !produced.is_file() {
                return Err(fail(source, format!("no output at {}", produced.display())));
            }
            if produced != *target {
                fs::rename(&produced, target).map_err(|e| fail(source, e.to_string()))?;
            }
            debug!(target = %target.display(), "saved");
        }
        Ok(())
    }
}

impl ConversionEngine for SofficeEngine {
    type Workbook = SofficeWorkbook;

    fn open(&mut self, path: &Path) -> EtlResult<SofficeWorkbook> {
        if !path.is_file() {
            return Err(EtlError::ConversionFailure {
                path: path.to_path_buf(),
                reason: "source file does not exist".to_string(),
            });
        }
        Ok(SofficeWorkbook {
            source: path.to_path_buf(),
        })
    }

    fn save_as(
        &mut self,
        workbook: &mut SofficeWorkbook,
        target: &Path,
        format: FileFormat,
    ) -> EtlResult<()> {
        let job = (workbook.source.clone(), target.to_path_buf());
        self.convert_into(output_dir(target), &[&job], format)
    }

    fn close(&mut self, _workbook: SofficeWorkbook) -> EtlResult<()> {
        Ok(())
    }

    fn quit(&mut self) -> EtlResult<()> {
        Ok(())
    }

    /// One soffice process per output directory instead of one per file.
    fn convert_batch(
        &mut self,
        jobs: &[(PathBuf, PathBuf)],
        format: FileFormat,
    ) -> EtlResult<()> {
        let mut by_dir: BTreeMap<&Path, Vec<&(PathBuf, PathBuf)>> = BTreeMap::new();
        for job in jobs {
            self.open(&job.0)?;
            by_dir.entry(output_dir(&job.1)).or_default().push(job);
        }
        for (out_dir, group) in by_dir {
            info!(files = group.len(), out_dir = %out_dir.display(), "converting");
            self.convert_into(out_dir, &group, format)?;
        }
        Ok(())
    }
}
