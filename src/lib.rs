//! Harvester Core Library
//!
//! Bulk, resumable fetching of `(identifier, URL)` lists into a flat
//! directory of artifacts, with at most one artifact per identifier.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Run configuration, domain pattern lists, TOML config file
//! - [`input`] - Input line parsing and URL repair
//! - [`fetch`] - HTTP client, redirect resolution, throttle, artifact writes
//! - [`ledger`] - Shared identifier set, seeding, persistence, rebuild
//! - [`run`] - Line dispatch, worker pool, per-item processing
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::{FetchConfig, Orchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = FetchConfig::new("links.tsv", "./papers");
//! config.pool_size = 16;
//! let summary = Orchestrator::new(config).run().await?;
//! println!("saved {} artifacts", summary.saved);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod fetch;
pub mod input;
pub mod ledger;
pub mod run;
pub mod user_agent;

// Re-export commonly used types
pub use config::{ConfigError, DomainPatterns, FetchConfig, FileConfig, LineRange};
pub use fetch::{
    ArtifactWriter, DomainThrottle, FailureKind, FetchError, HttpClient, RedirectResolver,
    WriteOutcome,
};
pub use input::{WorkItem, normalize_url, parse_line};
pub use ledger::{IdentifierLedger, LedgerError, SeedReport, rebuild_ledger};
pub use run::{Orchestrator, RunError, RunStats, RunSummary};
