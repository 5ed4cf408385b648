//! Per-item work executed inside the pool.
//!
//! Order of operations for one dispatched item:
//!
//! 1. resolve the redirect chain to an open 200 response
//! 2. short-circuit if the identifier was claimed meanwhile
//! 3. gate on the declared content type (headers only, nothing streamed)
//! 4. claim the identifier; a lost claim performs no I/O
//! 5. stream to scratch and move into the output directory
//! 6. mark the identifier done
//!
//! The type gate sits before the claim so a wrong-type response never holds
//! an identifier that another line could still fetch successfully.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};
use url::Url;

use super::stats::RunStats;
use crate::config::FetchConfig;
use crate::fetch::{
    ArtifactWriter, FailureKind, FetchError, RedirectResolver, WriteOutcome, is_allowed_type,
};
use crate::input::WorkItem;
use crate::ledger::IdentifierLedger;

/// Shared state every worker needs.
#[derive(Debug)]
pub struct FetchContext {
    pub config: Arc<FetchConfig>,
    pub resolver: RedirectResolver,
    pub ledger: Arc<IdentifierLedger>,
    pub writer: ArtifactWriter,
    pub stats: Arc<RunStats>,
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Artifact written this run.
    Saved { path: PathBuf, bytes: u64 },
    /// An artifact already existed at the final path.
    AlreadyPresent,
    /// The item ended without an artifact.
    Failed { kind: FailureKind, reason: String },
}

/// What happened to one item; logged, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct FetchRecord {
    pub id: String,
    pub line: u64,
    pub url: String,
    pub resolved_url: Option<String>,
    pub hops: Option<u32>,
    pub http_status: Option<u16>,
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl FetchRecord {
    fn new(item: &WorkItem) -> Self {
        Self {
            id: item.id.clone(),
            line: item.line,
            url: item.url.clone(),
            resolved_url: None,
            hops: None,
            http_status: None,
            content_type: None,
            outcome: ItemOutcome::AlreadyPresent,
        }
    }
}

/// Runs one item to a terminal state and updates the run counters.
pub async fn fetch_item(ctx: &FetchContext, item: &WorkItem, url: Url) -> FetchRecord {
    let mut record = FetchRecord::new(item);
    record.outcome = match attempt(ctx, item, url, &mut record).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log_failure(item, &e);
            ItemOutcome::Failed {
                kind: e.kind(),
                reason: e.to_string(),
            }
        }
    };

    match &record.outcome {
        ItemOutcome::Saved { .. } => ctx.stats.record_saved(),
        ItemOutcome::AlreadyPresent => ctx.stats.record_already_present(),
        ItemOutcome::Failed { kind, .. } => ctx.stats.record_failure(*kind),
    }
    trace!(record = ?record, "item finished");
    record
}

async fn attempt(
    ctx: &FetchContext,
    item: &WorkItem,
    url: Url,
    record: &mut FetchRecord,
) -> Result<ItemOutcome, FetchError> {
    let resolved = ctx.resolver.resolve(url).await?;
    let final_url = resolved.final_url.to_string();
    record.resolved_url = Some(final_url.clone());
    record.hops = Some(resolved.hops);
    record.http_status = Some(resolved.response.status().as_u16());
    record.content_type = resolved.content_type().map(str::to_string);

    if ctx.ledger.contains(&item.id) {
        return Err(FetchError::duplicate(&item.id));
    }

    if !is_allowed_type(record.content_type.as_deref(), &ctx.config.allowed_types) {
        return Err(FetchError::type_mismatch(final_url, record.content_type.clone()));
    }

    if !ctx.ledger.claim(&item.id) {
        return Err(FetchError::duplicate(&item.id));
    }

    let final_path = ctx.config.artifact_path(&item.id);
    let temp_path = ctx.config.scratch_path(&item.id);
    let body = resolved.response.bytes_stream();

    match ctx
        .writer
        .write(&item.id, body, &final_path, &temp_path)
        .await?
    {
        WriteOutcome::Saved { path, bytes } => {
            ctx.ledger.confirm(&item.id);
            debug!(id = %item.id, url = %final_url, bytes, "saved");
            Ok(ItemOutcome::Saved { path, bytes })
        }
        WriteOutcome::AlreadyExists { .. } => {
            ctx.ledger.confirm(&item.id);
            Ok(ItemOutcome::AlreadyPresent)
        }
        WriteOutcome::MoveFailed { path, reason } => Err(FetchError::io(
            path,
            std::io::Error::other(format!("move from scratch failed: {reason}")),
        )),
    }
}

fn log_failure(item: &WorkItem, error: &FetchError) {
    match error.kind() {
        FailureKind::PolicyBlocked => {
            trace!(id = %item.id, url = %item.url, error = %error, "blocked");
        }
        FailureKind::Io => {
            warn!(id = %item.id, url = %item.url, error = %error, "write failed");
        }
        // Watched statuses are already reported by the resolver.
        _ => {
            debug!(id = %item.id, url = %item.url, error = %error, "fetch failed");
        }
    }
}
