//! `harvester rebuild-ledger`.

use std::path::Path;

use anyhow::{Context, Result};
use harvester_core::rebuild_ledger;
use tracing::info;

pub(crate) async fn run(output_dir: &Path, extension: &str, ledger_path: &Path) -> Result<usize> {
    let count = rebuild_ledger(output_dir, extension, ledger_path)
        .await
        .with_context(|| format!("rebuilding ledger from {}", output_dir.display()))?;
    info!(count, ledger = %ledger_path.display(), "Ledger rebuilt");
    Ok(count)
}
