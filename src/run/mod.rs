//! The fetch run: line dispatch, the worker pool and per-item processing.
//!
//! [`Orchestrator::run`] reads the input sequentially on the calling task.
//! For each line it applies the range bound, parses, drops forbidden URLs
//! and identifiers already in the ledger, consults the [`DomainThrottle`],
//! and submits the item to a [`WorkerPool`]. Workers run [`fetch_item`].
//!
//! [`DomainThrottle`]: crate::fetch::DomainThrottle

mod error;
mod orchestrator;
mod pool;
mod stats;
mod worker;

pub use error::RunError;
pub use orchestrator::Orchestrator;
pub use pool::{BACKLOG_PER_WORKER, WorkerPool};
pub use stats::{RunStats, RunSummary};
pub use worker::{FetchContext, FetchRecord, ItemOutcome, fetch_item};
