// src/config.rs
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::error::{EtlError, EtlResult};
use crate::load::LoadOptions;

/// Name of the archive directory created under the staging directory by default.
pub const DEFAULT_ARCHIVE_DIR: &str = "Completed_Archive";

/// What happens to consumed inputs and archived originals after a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Delete converted files once read and empty the archive after the batch.
    #[default]
    Purge,
    /// Leave everything on disk (troubleshooting only: files will be reprocessed).
    Keep,
}

/// The directories one batch works in. Passed to every component instead of
/// being read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    pub staging_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub retention: RetentionPolicy,
}

impl BatchContext {
    pub fn new(staging_dir: impl Into<PathBuf>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            archive_dir: archive_dir.into(),
            retention: RetentionPolicy::Purge,
        }
    }

    /// Archive lives in `<staging>/Completed_Archive`.
    pub fn under(staging_dir: impl Into<PathBuf>) -> Self {
        let staging_dir = staging_dir.into();
        let archive_dir = staging_dir.join(DEFAULT_ARCHIVE_DIR);
        Self::new(staging_dir, archive_dir)
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// Fails when the archive is the staging directory or one of its
    /// parents, since purging it would take the staging files with it.
    pub fn validate(&self) -> EtlResult<()> {
        let staging = resolve_path(&self.staging_dir);
        let archive = resolve_path(&self.archive_dir);
        if staging.starts_with(&archive) {
            return Err(EtlError::Config(format!(
                "archive directory {} must not be the staging directory {} or a parent of it",
                self.archive_dir.display(),
                self.staging_dir.display()
            )));
        }
        Ok(())
    }

    pub fn ensure_dirs(&self) -> EtlResult<()> {
        let staging = &self.staging_dir;
        fs::create_dir_all(staging).map_err(|e| EtlError::io(staging, e))?;
        self.validate()?;
        let archive = &self.archive_dir;
        fs::create_dir_all(archive).map_err(|e| EtlError::io(archive, e))
    }
}

/// Canonical form of `path`; a tail that does not exist yet is appended to
/// its deepest existing ancestor.
fn resolve_path(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut tail = Vec::new();
    let mut head = path.as_path();
    loop {
        if let Ok(real) = head.canonicalize() {
            return tail.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (head.parent(), head.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                head = parent;
            }
            _ => return path.clone(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "dept".to_string(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Top-level settings, read from YAML and then overridden from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub staging_dir: PathBuf,
    /// Defaults to `<staging_dir>/Completed_Archive`.
    pub archive_dir: Option<PathBuf>,
    pub retention: RetentionPolicy,
    /// Where per-batch history parquet files go; disabled when unset.
    pub history_dir: Option<PathBuf>,
    pub soffice_path: PathBuf,
    pub database: DatabaseConfig,
    pub load: LoadOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("convert"),
            archive_dir: None,
            retention: RetentionPolicy::Purge,
            history_dir: None,
            soffice_path: PathBuf::from("soffice"),
            database: DatabaseConfig::default(),
            load: LoadOptions::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml_str(text: &str) -> EtlResult<Self> {
        serde_yaml::from_str(text).map_err(|e| EtlError::Config(e.to_string()))
    }

    /// Read `path` (if given), then apply `DEPT_*` environment overrides.
    pub fn load(path: Option<&Path>) -> EtlResult<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| EtlError::io(p, e))?;
                Self::from_yaml_str(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env<F>(&mut self, lookup: F) -> EtlResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DEPT_ETL_STAGING_DIR") {
            self.staging_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("DEPT_ETL_ARCHIVE_DIR") {
            self.archive_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("DEPT_DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = lookup("DEPT_DB_PORT") {
            self.database.port = v
                .parse()
                .map_err(|_| EtlError::Config(format!("DEPT_DB_PORT is not a port: {v}")))?;
        }
        if let Some(v) = lookup("DEPT_DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = lookup("DEPT_DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = lookup("DEPT_DB_NAME") {
            self.database.database = v;
        }
        Ok(())
    }

    pub fn batch_context(&self) -> BatchContext {
        let archive = self
            .archive_dir
            .clone()
            .unwrap_or_else(|| self.staging_dir.join(DEFAULT_ARCHIVE_DIR));
        BatchContext::new(&self.staging_dir, archive).with_retention(self.retention)
    }
}
