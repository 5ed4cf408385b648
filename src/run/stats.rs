//! Run counters.
//!
//! Updated concurrently by the dispatcher and every worker; read by the
//! progress display while the run is live.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::fetch::FailureKind;

/// Live counters for one run.
#[derive(Debug, Default)]
pub struct RunStats {
    lines_read: AtomicU64,
    out_of_range: AtomicU64,
    blank: AtomicU64,
    filtered_forbidden: AtomicU64,
    filtered_done: AtomicU64,
    throttled: AtomicU64,
    dispatched: AtomicU64,
    saved: AtomicU64,
    already_present: AtomicU64,
    failures: [AtomicU64; FailureKind::COUNT],
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_line(&self) -> u64 {
        self.lines_read.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_out_of_range(&self) {
        self.out_of_range.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_blank(&self) {
        self.blank.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered_forbidden(&self) {
        self.filtered_forbidden.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered_done(&self) {
        self.filtered_done.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_saved(&self) {
        self.saved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_already_present(&self) {
        self.already_present.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, kind: FailureKind) {
        self.failures[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Lines read from the input, including skipped ones.
    #[must_use]
    pub fn lines_read(&self) -> u64 {
        self.lines_read.load(Ordering::Relaxed)
    }

    /// Items handed to the worker pool.
    #[must_use]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Artifacts written this run.
    #[must_use]
    pub fn saved(&self) -> u64 {
        self.saved.load(Ordering::Relaxed)
    }

    /// Failures of one kind.
    #[must_use]
    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.failures[kind.index()].load(Ordering::Relaxed)
    }

    /// Failures of every kind.
    #[must_use]
    pub fn failed(&self) -> u64 {
        FailureKind::ALL.iter().map(|k| self.failures(*k)).sum()
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        RunSummary {
            lines_read: load(&self.lines_read),
            out_of_range: load(&self.out_of_range),
            blank: load(&self.blank),
            filtered_forbidden: load(&self.filtered_forbidden),
            filtered_done: load(&self.filtered_done),
            throttled: load(&self.throttled),
            dispatched: load(&self.dispatched),
            saved: load(&self.saved),
            already_present: load(&self.already_present),
            failed: self.failed(),
            failures: FailureKind::ALL
                .iter()
                .map(|k| (k.as_str(), self.failures(*k)))
                .filter(|(_, n)| *n > 0)
                .collect(),
            ledger_size: 0,
        }
    }
}

/// Serializable snapshot returned by a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub lines_read: u64,
    pub out_of_range: u64,
    pub blank: u64,
    pub filtered_forbidden: u64,
    pub filtered_done: u64,
    pub throttled: u64,
    pub dispatched: u64,
    pub saved: u64,
    pub already_present: u64,
    pub failed: u64,
    /// Non-zero failure counts keyed by [`FailureKind::as_str`].
    pub failures: BTreeMap<&'static str, u64>,
    /// Identifiers in the persisted ledger at the end of the run.
    pub ledger_size: usize,
}

impl RunSummary {
    /// Count for one failure kind (0 if none).
    #[must_use]
    pub fn failures_of(&self, kind: FailureKind) -> u64 {
        self.failures.get(kind.as_str()).copied().unwrap_or(0)
    }
}
