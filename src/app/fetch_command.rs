//! `harvester fetch`.

use std::io::IsTerminal;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use harvester_core::{FetchConfig, Orchestrator, RunSummary};
use tracing::{debug, info};

use crate::app::{progress, terminal};

pub(crate) async fn run(config: FetchConfig, quiet: bool, summary_json: bool) -> Result<RunSummary> {
    debug!(?config, "resolved fetch configuration");
    info!(
        input = %config.input_path.display(),
        output = %config.output_dir.display(),
        ledger = %config.ledger_path.display(),
        "Harvester starting"
    );

    let orchestrator = Orchestrator::new(config);
    let use_spinner = terminal::should_use_spinner(
        std::io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    );
    let (spinner, stop) = progress::spawn_progress_ui(use_spinner, orchestrator.stats());

    let result = orchestrator.run().await;

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = spinner {
        let _ = handle.await;
    }

    let summary = result.context("fetch run failed")?;
    if summary_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing run summary")?
        );
    }
    Ok(summary)
}
