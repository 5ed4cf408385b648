//! Process-wide record of identifiers that are done or being written.
//!
//! The ledger keeps two sets:
//!
//! - **claimed**: every identifier seeded at start plus every identifier a
//!   worker has claimed this run. [`IdentifierLedger::claim`] is the
//!   first-writer-wins gate; a loser performs no I/O.
//! - **done**: identifiers known to have an artifact on disk (seeded, or
//!   confirmed after a successful move). Only this set is persisted, so a
//!   claim whose write later fails never reaches the ledger file.
//!
//! Both sets only grow.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashSet;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Errors from ledger seeding and persistence.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The output directory could not be listed.
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The ledger file exists but could not be read.
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The ledger file could not be written.
    #[error("failed to write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counts reported by [`IdentifierLedger::seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Artifacts found in the output directory.
    pub from_directory: usize,
    /// Lines read from the ledger file.
    pub from_ledger_file: usize,
    /// Distinct identifiers after seeding.
    pub total: usize,
}

/// Thread-safe identifier set shared by the dispatcher and all workers.
#[derive(Debug, Default)]
pub struct IdentifierLedger {
    claimed: DashSet<String>,
    done: DashSet<String>,
}

impl IdentifierLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the ledger from `<id>.<extension>` files in `output_dir` and
    /// from `ledger_path` if it exists. A missing directory or ledger file is
    /// treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if an existing directory or file cannot be read.
    #[instrument(level = "debug", skip(self), fields(output_dir = %output_dir.display()))]
    pub async fn seed(
        &self,
        output_dir: &Path,
        extension: &str,
        ledger_path: &Path,
    ) -> Result<SeedReport, LedgerError> {
        let scanned = scan_output_dir(output_dir, extension).await?;
        let from_directory = scanned.len();
        for id in scanned {
            self.insert_done(id);
        }

        let from_ledger_file = match tokio::fs::read_to_string(ledger_path).await {
            Ok(text) => {
                let mut count = 0;
                for id in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    self.insert_done(id.to_string());
                    count += 1;
                }
                count
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %ledger_path.display(), "no ledger file, first run");
                0
            }
            Err(source) => {
                return Err(LedgerError::Read {
                    path: ledger_path.to_path_buf(),
                    source,
                });
            }
        };

        let report = SeedReport {
            from_directory,
            from_ledger_file,
            total: self.done.len(),
        };
        info!(
            from_directory = report.from_directory,
            from_ledger_file = report.from_ledger_file,
            total = report.total,
            "ledger seeded"
        );
        Ok(report)
    }

    /// Returns true if `id` is done or claimed.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.claimed.contains(id)
    }

    /// Atomically claims `id`. Exactly one concurrent caller gets `true`.
    #[must_use = "a false claim means another worker owns this identifier"]
    pub fn claim(&self, id: &str) -> bool {
        self.claimed.insert(id.to_string())
    }

    /// Marks a claimed identifier as having its artifact in place.
    pub fn confirm(&self, id: &str) {
        self.claimed.insert(id.to_string());
        self.done.insert(id.to_string());
    }

    /// Returns true if `id` has a confirmed artifact.
    #[must_use]
    pub fn is_done(&self, id: &str) -> bool {
        self.done.contains(id)
    }

    /// Number of identifiers with confirmed artifacts.
    #[must_use]
    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    /// Number of identifiers done or in flight.
    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.claimed.len()
    }

    /// Sorted copy of the done set.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.done
            .iter()
            .map(|id| id.key().clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Writes the done set to `ledger_path`, one identifier per line,
    /// replacing prior contents. The file is written beside the target and
    /// renamed into place so readers never see a truncated ledger.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Write`] on any IO failure.
    #[instrument(level = "debug", skip(self), fields(path = %ledger_path.display()))]
    pub async fn persist(&self, ledger_path: &Path) -> Result<usize, LedgerError> {
        let ids = self.snapshot();
        write_ledger_file(ledger_path, &ids).await?;
        debug!(count = ids.len(), "ledger persisted");
        Ok(ids.len())
    }

    fn insert_done(&self, id: String) {
        self.claimed.insert(id.clone());
        self.done.insert(id);
    }
}

/// Rebuilds the ledger file from the output directory alone.
///
/// No network access is involved; any previous ledger contents are discarded.
///
/// # Errors
///
/// Returns [`LedgerError`] if the directory cannot be scanned or the ledger
/// cannot be written.
#[instrument(fields(output_dir = %output_dir.display(), ledger = %ledger_path.display()))]
pub async fn rebuild_ledger(
    output_dir: &Path,
    extension: &str,
    ledger_path: &Path,
) -> Result<usize, LedgerError> {
    let ledger = IdentifierLedger::new();
    for id in scan_output_dir(output_dir, extension).await? {
        ledger.insert_done(id);
    }
    let count = ledger.persist(ledger_path).await?;
    info!(count, "ledger rebuilt from output directory");
    Ok(count)
}

/// Lists identifiers recoverable from `<id>.<extension>` files in `dir`.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns [`LedgerError::Scan`] for any other listing failure.
pub async fn scan_output_dir(dir: &Path, extension: &str) -> Result<Vec<String>, LedgerError> {
    let scan_err = |source| LedgerError::Scan {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(scan_err(e)),
    };

    let suffix = format!(".{extension}");
    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let file_type = entry.file_type().await.map_err(scan_err)?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(id) = name.strip_suffix(&suffix)
            && !id.is_empty()
        {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

async fn write_ledger_file(path: &Path, ids: &[String]) -> Result<(), LedgerError> {
    let write_err = |source| LedgerError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let mut contents = String::with_capacity(ids.iter().map(|id| id.len() + 1).sum());
    for id in ids {
        contents.push_str(id);
        contents.push('\n');
    }

    let mut file = tokio::fs::File::create(&partial).await.map_err(write_err)?;
    file.write_all(contents.as_bytes()).await.map_err(write_err)?;
    file.sync_all().await.map_err(write_err)?;
    drop(file);
    tokio::fs::rename(&partial, path).await.map_err(write_err)?;
    Ok(())
}
