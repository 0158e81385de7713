// src/convert/engine.rs
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::EtlResult;

/// Target format of a save-as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Office Open XML workbook (`.xlsx`).
    OpenXmlWorkbook,
}

impl FileFormat {
    /// Automation format code understood by office engines.
    pub fn code(self) -> u32 {
        match self {
            FileFormat::OpenXmlWorkbook => 51,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::OpenXmlWorkbook => "xlsx",
        }
    }
}

/// Automation surface of an external office engine.
pub trait ConversionEngine {
    type Workbook;

    fn open(&mut self, path: &Path) -> EtlResult<Self::Workbook>;
    fn save_as(
        &mut self,
        workbook: &mut Self::Workbook,
        target: &Path,
        format: FileFormat,
    ) -> EtlResult<()>;
    fn close(&mut self, workbook: Self::Workbook) -> EtlResult<()>;
    fn quit(&mut self) -> EtlResult<()>;

    /// Convert each `(source, target)` pair in order, stopping at the first failure.
    fn convert_batch(
        &mut self,
        jobs: &[(PathBuf, PathBuf)],
        format: FileFormat,
    ) -> EtlResult<()> {
        for (source, target) in jobs {
            info!(file = %source.display(), "converting");
            let mut workbook = self.open(source)?;
            self.save_as(&mut workbook, target, format)?;
            self.close(workbook)?;
        }
        Ok(())
    }
}

/// Starts an engine instance. Called at most once per conversion pass.
pub trait EngineLauncher {
    type Engine: ConversionEngine;

    fn launch(&self) -> EtlResult<Self::Engine>;
}

/// Owns a running engine and quits it when dropped, so the instance is
/// released on every exit path, including early `?` returns.
pub struct EngineSession<E: ConversionEngine> {
    engine: E,
    released: bool,
}

impl<E: ConversionEngine> EngineSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            released: false,
        }
    }

    pub fn engine(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Quit explicitly and surface any error.
    pub fn release(mut self) -> EtlResult<()> {
        self.released = true;
        self.engine.quit()
    }
}

impl<E: ConversionEngine> Drop for EngineSession<E> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.engine.quit() {
            warn!("conversion engine did not quit cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use std::{cell::Cell, rc::Rc};

    struct CountingEngine {
        quits: Rc<Cell<u32>>,
    }

    impl ConversionEngine for CountingEngine {
        type Workbook = ();

        fn open(&mut self, path: &Path) -> EtlResult<()> {
            Err(EtlError::ConversionFailure {
                path: path.to_path_buf(),
                reason: "cannot open".into(),
            })
        }
        fn save_as(&mut self, _: &mut (), _: &Path, _: FileFormat) -> EtlResult<()> {
            Ok(())
        }
        fn close(&mut self, _: ()) -> EtlResult<()> {
            Ok(())
        }
        fn quit(&mut self) -> EtlResult<()> {
            self.quits.set(self.quits.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn format_code_is_51() {
        assert_eq!(FileFormat::OpenXmlWorkbook.code(), 51);
        assert_eq!(FileFormat::OpenXmlWorkbook.extension(), "xlsx");
    }

    #[test]
    fn dropped_session_quits_once() {
        let quits = Rc::new(Cell::new(0));
        let run = || -> EtlResult<()> {
            let mut session = EngineSession::new(CountingEngine {
                quits: quits.clone(),
            });
            session.engine().open(Path::new("a.xls"))?;
            session.release()
        };
        assert!(run().is_err());
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn released_session_does_not_quit_twice() {
        let quits = Rc::new(Cell::new(0));
        let session = EngineSession::new(CountingEngine {
            quits: quits.clone(),
        });
        session.release().unwrap();
        assert_eq!(quits.get(), 1);
    }
}
