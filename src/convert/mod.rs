// src/convert/mod.rs
//! Legacy workbook conversion and the archive lifecycle of the originals.

pub mod engine;
pub mod soffice;

use glob::{glob_with, MatchOptions, Pattern};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

pub use engine::{ConversionEngine, EngineLauncher, EngineSession, FileFormat};
pub use soffice::{SofficeEngine, SofficeLauncher};

use crate::config::{BatchContext, RetentionPolicy};
use crate::error::{EtlError, EtlResult};

/// Name prefix of office lock files (another process has the file open).
pub const LOCK_FILE_PREFIX: &str = "~$";
pub const LEGACY_EXTENSION: &str = "xls";
pub const OPEN_EXTENSION: &str = "xlsx";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    /// Open-format files written next to the originals.
    pub converted: Vec<PathBuf>,
    /// Where each original ended up.
    pub archived: Vec<PathBuf>,
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(LOCK_FILE_PREFIX))
}

/// Files in `dir` with extension `ext` (case-insensitive), lock files skipped,
/// sorted by name.
pub fn list_files(dir: &Path, ext: &str) -> EtlResult<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(ext)
    );
    let options = MatchOptions {
        case_sensitive: false,
        ..Default::default()
    };
    let entries = glob_with(&pattern, options).map_err(|e| EtlError::Config(e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() && !is_lock_file(&path) => files.push(path),
            Ok(path) => debug!(path = %path.display(), "skipped"),
            Err(e) => warn!("cannot read directory entry: {}", e),
        }
    }
    Ok(files)
}

/// `a.xls` → `a.xlsx`.
pub fn converted_path(source: &Path) -> PathBuf {
    source.with_extension(FileFormat::OpenXmlWorkbook.extension())
}

/// Move `source` into `archive_dir`, falling back to copy + remove across filesystems.
pub fn archive_original(source: &Path, archive_dir: &Path) -> EtlResult<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| EtlError::Config(format!("{} has no file name", source.display())))?;
    let dest = archive_dir.join(name);
    if fs::rename(source, &dest).is_err() {
        fs::copy(source, &dest).map_err(|e| EtlError::io(source, e))?;
        fs::remove_file(source).map_err(|e| EtlError::io(source, e))?;
    }
    Ok(dest)
}

/// Convert every legacy workbook in the staging directory and archive the originals.
///
/// One engine instance serves the whole directory and is launched only if
/// there is something to convert. Originals are archived only after every
/// file converted; any failure aborts the pass and leaves them in staging.
#[tracing::instrument(level = "info", skip(ctx, launcher), fields(staging = %ctx.staging_dir.display()))]
pub fn convert_all<L: EngineLauncher>(
    ctx: &BatchContext,
    launcher: &L,
) -> EtlResult<ConversionSummary> {
    ctx.ensure_dirs()?;
    let legacy = list_files(&ctx.staging_dir, LEGACY_EXTENSION)?;
    let mut summary = ConversionSummary::default();
    if legacy.is_empty() {
        debug!("no legacy workbooks to convert");
        return Ok(summary);
    }

    let jobs: Vec<(PathBuf, PathBuf)> = legacy
        .into_iter()
        .map(|source| {
            let target = converted_path(&source);
            (source, target)
        })
        .collect();

    let mut session = EngineSession::new(launcher.launch()?);
    session.engine().convert_batch(&jobs, FileFormat::OpenXmlWorkbook)?;
    session.release()?;

    for (source, target) in jobs {
        let archived = archive_original(&source, &ctx.archive_dir)?;
        info!(file = %target.display(), "converted");
        summary.converted.push(target);
        summary.archived.push(archived);
    }
    Ok(summary)
}

/// Empty the archive directory, leaving it in place.
pub fn purge_archive(ctx: &BatchContext) -> EtlResult<()> {
    ctx.validate()?;
    let dir = &ctx.archive_dir;
    if ctx.retention == RetentionPolicy::Purge && dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| EtlError::io(dir, e))?;
        info!(archive = %dir.display(), "archive purged");
    }
    fs::create_dir_all(dir).map_err(|e| EtlError::io(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::{cell::RefCell, rc::Rc};

    /// Engine that "converts" by copying bytes and can be told to fail on a file.
    #[derive(Default, Clone)]
    struct Log {
        launched: Rc<RefCell<u32>>,
        quit: Rc<RefCell<u32>>,
        opened: Rc<RefCell<Vec<String>>>,
    }

    struct CopyEngine {
        log: Log,
        fail_on: Option<String>,
    }

    struct CopyLauncher {
        log: Log,
        fail_on: Option<String>,
        fail_launch: bool,
    }

    impl EngineLauncher for CopyLauncher {
        type Engine = CopyEngine;
        fn launch(&self) -> EtlResult<CopyEngine> {
            if self.fail_launch {
                return Err(EtlError::ConversionFailure {
                    path: PathBuf::from("engine"),
                    reason: "cannot start".into(),
                });
            }
            *self.log.launched.borrow_mut() += 1;
            Ok(CopyEngine {
                log: self.log.clone(),
                fail_on: self.fail_on.clone(),
            })
        }
    }

    impl ConversionEngine for CopyEngine {
        type Workbook = PathBuf;
        fn open(&mut self, path: &Path) -> EtlResult<PathBuf> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.log.opened.borrow_mut().push(name.clone());
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(EtlError::ConversionFailure {
                    path: path.to_path_buf(),
                    reason: "corrupt".into(),
                });
            }
            Ok(path.to_path_buf())
        }
        fn save_as(&mut self, wb: &mut PathBuf, target: &Path, _: FileFormat) -> EtlResult<()> {
            fs::copy(&*wb, target).map_err(|e| EtlError::io(target, e))?;
            Ok(())
        }
        fn close(&mut self, _: PathBuf) -> EtlResult<()> {
            Ok(())
        }
        fn quit(&mut self) -> EtlResult<()> {
            *self.log.quit.borrow_mut() += 1;
            Ok(())
        }
    }

    fn launcher(log: &Log, fail_on: Option<&str>) -> CopyLauncher {
        CopyLauncher {
            log: log.clone(),
            fail_on: fail_on.map(str::to_string),
            fail_launch: false,
        }
    }

    #[test]
    fn converts_archives_and_skips_lock_files() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path());
        fs::write(tmp.path().join("b.xls"), "B")?;
        fs::write(tmp.path().join("A.XLS"), "A")?;
        fs::write(tmp.path().join("~$b.xls"), "lock")?;
        fs::write(tmp.path().join("ready.xlsx"), "X")?;

        let log = Log::default();
        let summary = convert_all(&ctx, &launcher(&log, None))?;

        assert_eq!(summary.converted.len(), 2);
        assert_eq!(*log.launched.borrow(), 1);
        assert_eq!(*log.quit.borrow(), 1);
        assert_eq!(*log.opened.borrow(), vec!["A.XLS", "b.xls"]);
        assert!(tmp.path().join("b.xlsx").is_file());
        assert!(tmp.path().join("A.xlsx").is_file());
        assert!(!tmp.path().join("b.xls").exists());
        assert!(ctx.archive_dir.join("b.xls").is_file());
        assert!(tmp.path().join("~$b.xls").is_file());
        Ok(())
    }

    #[test]
    fn no_legacy_files_means_no_engine() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path());
        let log = Log::default();
        let failing = CopyLauncher {
            fail_launch: true,
            ..launcher(&log, None)
        };
        let summary = convert_all(&ctx, &failing)?;
        assert!(summary.converted.is_empty());
        Ok(())
    }

    #[test]
    fn per_file_failure_aborts_pass_and_releases_engine() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path());
        for name in ["a.xls", "b.xls", "c.xls"] {
            fs::write(tmp.path().join(name), name)?;
        }
        let log = Log::default();
        let err = convert_all(&ctx, &launcher(&log, Some("b.xls"))).unwrap_err();

        assert!(matches!(err, EtlError::ConversionFailure { .. }));
        assert_eq!(*log.opened.borrow(), vec!["a.xls", "b.xls"]);
        assert_eq!(*log.quit.borrow(), 1);
        // nothing archived: the whole pass reruns next batch
        for name in ["a.xls", "b.xls", "c.xls"] {
            assert!(tmp.path().join(name).is_file());
        }
        assert_eq!(fs::read_dir(&ctx.archive_dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn launch_failure_is_conversion_failure() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path());
        fs::write(tmp.path().join("a.xls"), "a")?;
        let log = Log::default();
        let failing = CopyLauncher {
            fail_launch: true,
            ..launcher(&log, None)
        };
        assert!(matches!(
            convert_all(&ctx, &failing),
            Err(EtlError::ConversionFailure { .. })
        ));
        Ok(())
    }

    #[test]
    fn purge_leaves_empty_archive() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path());
        ctx.ensure_dirs()?;
        fs::write(ctx.archive_dir.join("old.xls"), "x")?;
        fs::create_dir(ctx.archive_dir.join("nested"))?;

        purge_archive(&ctx)?;
        assert!(ctx.archive_dir.is_dir());
        assert_eq!(fs::read_dir(&ctx.archive_dir)?.count(), 0);
        Ok(())
    }

    #[test]
    fn purge_refuses_archive_that_holds_staging() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::new(tmp.path(), tmp.path());
        fs::write(tmp.path().join("next_batch.ods"), "x")?;

        assert!(matches!(purge_archive(&ctx), Err(EtlError::Config(_))));
        assert!(tmp.path().join("next_batch.ods").is_file());
        Ok(())
    }

    #[test]
    fn keep_policy_retains_archive() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let ctx = BatchContext::under(tmp.path()).with_retention(RetentionPolicy::Keep);
        ctx.ensure_dirs()?;
        fs::write(ctx.archive_dir.join("old.xls"), "x")?;
        purge_archive(&ctx)?;
        assert!(ctx.archive_dir.join("old.xls").is_file());
        Ok(())
    }
}
