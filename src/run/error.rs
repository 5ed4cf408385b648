//! Fatal run errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::ledger::LedgerError;

/// Conditions that abort a whole run.
///
/// Per-item failures never surface here; they are counted in
/// [`RunStats`](super::RunStats) and logged.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The input list could not be opened or read.
    #[error("cannot read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output or scratch directory could not be prepared.
    #[error("cannot prepare directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Seeding or persisting the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The worker pool semaphore closed while items were still being submitted.
    #[error("worker pool closed unexpectedly")]
    SemaphoreClosed,
}

impl RunError {
    pub(crate) fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Input {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn directory(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Directory {
            path: path.into(),
            source,
        }
    }
}
