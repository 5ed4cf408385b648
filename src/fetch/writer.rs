//! Two-phase artifact writes.
//!
//! Bytes are streamed into the scratch directory first and moved into the
//! output directory only once complete, so a reader of the output directory
//! never sees a partial artifact. The caller must hold the ledger claim for
//! the identifier before calling [`ArtifactWriter::write`].

use std::io;
use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};

use super::error::FetchError;

/// Result of a completed write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The artifact was moved into place.
    Saved {
        path: PathBuf,
        bytes: u64,
    },
    /// An artifact was already at the final path; the download was discarded.
    AlreadyExists {
        path: PathBuf,
    },
    /// Streaming succeeded but the move failed; the scratch file was removed.
    MoveFailed {
        path: PathBuf,
        reason: String,
    },
}

/// Returns true if `content_type` starts with an allowed type (ASCII
/// case-insensitive). A missing header is never allowed.
#[must_use]
pub fn is_allowed_type(content_type: Option<&str>, allowed: &[String]) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let declared = content_type.trim().to_ascii_lowercase();
    allowed
        .iter()
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .any(|t| declared.starts_with(&t))
}

/// Streams bodies to scratch files and moves them into the output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactWriter;

impl ArtifactWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Streams `body` to `temp_path`, then moves it to `final_path`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Io`] if the scratch file cannot be created or
    /// the body stream fails. The scratch file is removed in both cases.
    #[instrument(level = "debug", skip(self, body), fields(final_path = %final_path.display()))]
    pub async fn write<S, B, E>(
        &self,
        id: &str,
        body: S,
        final_path: &Path,
        temp_path: &Path,
    ) -> Result<WriteOutcome, FetchError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let bytes = match stream_to_file(body, temp_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_quietly(temp_path).await;
                return Err(e);
            }
        };

        let present = match tokio::fs::try_exists(final_path).await {
            Ok(present) => present,
            Err(e) => {
                debug!(id, path = %final_path.display(), error = %e, "existence check failed, attempting move");
                false
            }
        };
        if present {
            debug!(id, path = %final_path.display(), "artifact already present, discarding download");
            remove_quietly(temp_path).await;
            return Ok(WriteOutcome::AlreadyExists {
                path: final_path.to_path_buf(),
            });
        }

        if let Err(e) = tokio::fs::rename(temp_path, final_path).await {
            warn!(id, from = %temp_path.display(), to = %final_path.display(), error = %e, "move failed");
            remove_quietly(temp_path).await;
            return Ok(WriteOutcome::MoveFailed {
                path: final_path.to_path_buf(),
                reason: e.to_string(),
            });
        }

        debug!(id, bytes, path = %final_path.display(), "artifact saved");
        Ok(WriteOutcome::Saved {
            path: final_path.to_path_buf(),
            bytes,
        })
    }
}

async fn stream_to_file<S, B, E>(body: S, temp_path: &Path) -> Result<u64, FetchError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let file = File::create(temp_path)
        .await
        .map_err(|e| FetchError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut body = std::pin::pin!(body);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| FetchError::io(temp_path, io::Error::other(e)))?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| FetchError::io(temp_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(temp_path, e))?;
    Ok(bytes_written)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "failed to remove scratch file");
    }
}
