//! Error type shared by every pipeline stage.
//!
//! Per-item variants end up inside a [`TaskResult`](crate::pool::TaskResult)
//! and never abort a batch. Structural variants are checked once before any
//! work starts and abort the whole run.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrepError>;

#[derive(Debug, Error)]
pub enum PrepError {
    /// A local file could not be opened, read, written or removed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content digest differs from the expected value.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// External tool ran and exited unsuccessfully. `code` is `None` when
    /// the process was terminated by a signal.
    #[error("{program} failed ({}): {}", describe_code(*code), stderr.trim())]
    ExternalProcess {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// External tool could not be started at all (missing binary, permissions).
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exceeded the configured command timeout and was killed.
    #[error("{program} timed out after {}s", after.as_secs_f64())]
    Timeout { program: String, after: Duration },

    /// Required base directory is absent.
    #[error("target directory {} does not exist", .0.display())]
    MissingBaseDir(PathBuf),

    /// Required manifest file is absent.
    #[error("manifest {} does not exist", .0.display())]
    MissingManifest(PathBuf),

    #[error("manifest line {line_no}: {reason}")]
    ManifestParse { line_no: usize, reason: String },

    /// Archive could not be read or extracted in-process.
    #[error("archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    /// Worker panicked instead of returning a result.
    #[error("worker panicked: {0}")]
    WorkerPanic(String),
}

impl PrepError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True for errors that must abort the run before any item is processed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PrepError::MissingBaseDir(_) | PrepError::MissingManifest(_)
        )
    }
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "terminated by signal".to_string(),
    }
}
