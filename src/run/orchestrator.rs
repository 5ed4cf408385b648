//! Top-level fetch run: prepare directories, seed the ledger, stream the
//! input through filters and the throttle into the pool, drain, persist.

use std::path::Path;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, instrument, trace, warn};

use super::error::RunError;
use super::pool::WorkerPool;
use super::stats::{RunStats, RunSummary};
use super::worker::{FetchContext, fetch_item};
use crate::config::FetchConfig;
use crate::fetch::{ArtifactWriter, DomainThrottle, FailureKind, HttpClient, RedirectResolver};
use crate::input::{WorkItem, parse_line};
use crate::ledger::IdentifierLedger;

/// Owns one fetch run.
///
/// The ledger and counters are shared objects so callers can inspect them
/// while [`Orchestrator::run`] is in progress, or inject a pre-seeded ledger.
#[derive(Debug)]
pub struct Orchestrator {
    config: Arc<FetchConfig>,
    ledger: Arc<IdentifierLedger>,
    stats: Arc<RunStats>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(config: FetchConfig) -> Self {
        Self::with_ledger(config, Arc::new(IdentifierLedger::new()))
    }

    /// Uses `ledger` instead of a fresh one. Seeding still runs and adds to it.
    #[must_use]
    pub fn with_ledger(config: FetchConfig, ledger: Arc<IdentifierLedger>) -> Self {
        Self {
            config: Arc::new(config),
            ledger,
            stats: Arc::new(RunStats::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Live counters.
    #[must_use]
    pub fn stats(&self) -> Arc<RunStats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn ledger(&self) -> Arc<IdentifierLedger> {
        Arc::clone(&self.ledger)
    }

    /// Executes the run to completion.
    ///
    /// Individual item failures never end the run; they are counted in the
    /// returned summary.
    ///
    /// # Errors
    ///
    /// - [`RunError::InvalidConfig`] before anything is touched
    /// - [`RunError::Input`] if the input cannot be opened or read
    /// - [`RunError::Directory`] if output or scratch cannot be prepared
    /// - [`RunError::Ledger`] if seeding or the final persist fails
    #[instrument(skip(self), fields(
        input = %self.config.input_path.display(),
        output = %self.config.output_dir.display(),
    ))]
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let config = Arc::clone(&self.config);
        config.validate()?;

        let input = File::open(&config.input_path)
            .await
            .map_err(|e| RunError::input(&config.input_path, e))?;

        prepare_directories(&config).await?;
        self.ledger
            .seed(&config.output_dir, &config.extension, &config.ledger_path)
            .await?;

        let client = HttpClient::from_config(&config).map_err(RunError::Client)?;
        let resolver = RedirectResolver::new(
            client,
            Arc::new(config.forbidden.clone()),
            config.max_hops,
            config.watch_statuses.clone(),
        );
        let ctx = Arc::new(FetchContext {
            config: Arc::clone(&config),
            resolver,
            ledger: Arc::clone(&self.ledger),
            writer: ArtifactWriter::new(),
            stats: Arc::clone(&self.stats),
        });
        let throttle = DomainThrottle::new(
            config.rate_limited.clone(),
            config.window_capacity,
            config.rate_limit_wait,
        );
        let mut pool = WorkerPool::new(config.effective_pool_size());
        info!(workers = pool.size(), ledger = self.ledger.done_count(), "starting fetch run");

        let read_result = self
            .dispatch_lines(BufReader::new(input), &throttle, &mut pool, &ctx)
            .await;

        let panicked = pool.drain().await;
        if panicked > 0 {
            warn!(panicked, "some workers panicked");
        }

        let ledger_size = self.ledger.persist(&config.ledger_path).await?;
        read_result?;

        let mut summary = self.stats.summary();
        summary.ledger_size = ledger_size;
        info!(
            lines = summary.lines_read,
            dispatched = summary.dispatched,
            saved = summary.saved,
            failed = summary.failed,
            ledger = summary.ledger_size,
            "fetch run finished"
        );
        Ok(summary)
    }

    async fn dispatch_lines(
        &self,
        mut reader: BufReader<File>,
        throttle: &DomainThrottle,
        pool: &mut WorkerPool,
        ctx: &Arc<FetchContext>,
    ) -> Result<(), RunError> {
        let config = &self.config;
        let mut buf = Vec::new();
        let mut line_number: u64 = 0;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .await
                .map_err(|e| RunError::input(&config.input_path, e))?;
            if read == 0 {
                break;
            }
            line_number += 1;

            if config.range.is_past_end(line_number) {
                debug!(line = line_number, "past last requested line, stopping");
                break;
            }
            let lines_read = self.stats.record_line();
            if !config.range.contains(line_number) {
                self.stats.record_out_of_range();
                continue;
            }

            match parse_line(line_number, &String::from_utf8_lossy(&buf)) {
                Ok(None) => self.stats.record_blank(),
                Ok(Some(item)) => self.dispatch(item, throttle, pool, ctx).await?,
                Err(e) => {
                    warn!(error = %e, "skipping malformed line");
                    self.stats.record_failure(e.kind());
                }
            }

            if config.persist_every > 0 && line_number % config.persist_every == 0 {
                self.persist_checkpoint().await;
            }
            if config.progress_interval > 0 && lines_read % config.progress_interval == 0 {
                self.log_progress(line_number, pool.in_flight());
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        item: WorkItem,
        throttle: &DomainThrottle,
        pool: &mut WorkerPool,
        ctx: &Arc<FetchContext>,
    ) -> Result<(), RunError> {
        let (url, host) = match item.target() {
            Ok(target) => target,
            Err(e) => {
                warn!(id = %item.id, error = %e, "skipping malformed URL");
                self.stats.record_failure(FailureKind::MalformedInput);
                return Ok(());
            }
        };

        // Patterns are curated against input text, so match the normalized
        // string rather than the `Url` serialization.
        if let Some(pattern) = self.config.forbidden.first_match(&item.url) {
            trace!(id = %item.id, url = %item.url, pattern, "forbidden, skipping");
            self.stats.record_filtered_forbidden();
            return Ok(());
        }
        if self.ledger.contains(&item.id) {
            trace!(id = %item.id, "already in ledger, skipping");
            self.stats.record_filtered_done();
            return Ok(());
        }

        if throttle.admit(&item.url, Some(host.as_str())).await {
            self.stats.record_throttled();
        }

        self.stats.record_dispatched();
        let ctx = Arc::clone(ctx);
        pool.submit(async move {
            fetch_item(&ctx, &item, url).await;
        })
        .await
    }

    async fn persist_checkpoint(&self) {
        match self.ledger.persist(&self.config.ledger_path).await {
            Ok(count) => debug!(count, "ledger checkpoint written"),
            Err(e) => warn!(error = %e, "ledger checkpoint failed, will retry at end of run"),
        }
    }

    fn log_progress(&self, line: u64, in_flight: usize) {
        let stats = &self.stats;
        info!(
            line,
            dispatched = stats.dispatched(),
            saved = stats.saved(),
            failed = stats.failed(),
            in_flight,
            "progress"
        );
    }
}

/// Applies `overwrite`, resets the scratch directory and creates the output
/// directory.
async fn prepare_directories(config: &FetchConfig) -> Result<(), RunError> {
    if config.overwrite {
        info!(output = %config.output_dir.display(), "overwrite requested, discarding previous output");
        remove_dir_if_present(&config.output_dir).await?;
        match tokio::fs::remove_file(&config.ledger_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(RunError::directory(&config.ledger_path, e)),
        }
    }

    remove_dir_if_present(&config.scratch_dir).await?;
    for dir in [&config.scratch_dir, &config.output_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| RunError::directory(dir, e))?;
    }
    Ok(())
}

async fn remove_dir_if_present(dir: &Path) -> Result<(), RunError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RunError::directory(dir, e)),
    }
}
