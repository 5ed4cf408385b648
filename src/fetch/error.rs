//! Error types for the fetch pipeline.
//!
//! Every per-item failure is a [`FetchError`]. None of them is fatal to a run:
//! the orchestrator records the [`FailureKind`] and moves on to the next line.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Errors that can end the processing of a single work item.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The input line or its URL could not be understood.
    #[error("malformed input on line {line}: {reason}")]
    MalformedInput {
        /// 1-based input line number.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The URL (original or a redirect target) matched a forbidden pattern.
    #[error("{url} blocked by forbidden pattern '{pattern}'")]
    PolicyBlocked {
        /// The URL that was not requested.
        url: String,
        /// The forbidden substring it contained.
        pattern: String,
    },

    /// The server answered with a status that is neither 200 nor a redirect.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that produced the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A redirect status arrived without a usable `Location` header.
    #[error("HTTP {status} without Location header at {url}")]
    MissingLocation {
        /// The URL that redirected.
        url: String,
        /// The redirect status code.
        status: u16,
    },

    /// The redirect chain was longer than the configured hop bound.
    #[error("too many redirects ({hops}) starting from {url}")]
    RedirectExhausted {
        /// The URL the chain started from.
        url: String,
        /// Number of redirects followed before giving up.
        hops: u32,
    },

    /// The final response declared a content type outside the allow-list.
    #[error("content type {} not allowed for {url}", content_type.as_deref().unwrap_or("<none>"))]
    TypeMismatch {
        /// The resolved URL.
        url: String,
        /// The declared content type, if any.
        content_type: Option<String>,
    },

    /// Network-level failure (DNS, connection refused, TLS, reset).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timeout elapsed.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL being fetched.
        url: String,
    },

    /// Filesystem failure while streaming or moving the artifact.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Another worker already claimed this identifier.
    #[error("identifier {id} already claimed")]
    Duplicate {
        /// The identifier that lost the claim race.
        id: String,
    },
}

impl FetchError {
    /// Creates a malformed-input error.
    pub fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            reason: reason.into(),
        }
    }

    /// Creates a policy-blocked error.
    pub fn policy_blocked(url: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::PolicyBlocked {
            url: url.into(),
            pattern: pattern.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a missing-Location error.
    pub fn missing_location(url: impl Into<String>, status: u16) -> Self {
        Self::MissingLocation {
            url: url.into(),
            status,
        }
    }

    /// Creates a redirect-exhausted error.
    pub fn redirect_exhausted(url: impl Into<String>, hops: u32) -> Self {
        Self::RedirectExhausted {
            url: url.into(),
            hops,
        }
    }

    /// Creates a content-type mismatch error.
    pub fn type_mismatch(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::TypeMismatch {
            url: url.into(),
            content_type,
        }
    }

    /// Classifies a client error as timeout or generic network failure.
    pub fn from_request(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a duplicate-claim error.
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::Duplicate { id: id.into() }
    }

    /// Returns the statistics bucket for this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedInput { .. } => FailureKind::MalformedInput,
            Self::PolicyBlocked { .. } => FailureKind::PolicyBlocked,
            Self::HttpStatus { .. } => FailureKind::Blocked,
            Self::MissingLocation { .. } | Self::RedirectExhausted { .. } => {
                FailureKind::RedirectExhausted
            }
            Self::TypeMismatch { .. } => FailureKind::TypeMismatch,
            Self::Network { .. } | Self::Timeout { .. } => FailureKind::Network,
            Self::Io { .. } => FailureKind::Io,
            Self::Duplicate { .. } => FailureKind::Duplicate,
        }
    }
}

/// Coarse failure classification used for run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Unparseable line or URL.
    MalformedInput,
    /// Forbidden-domain match.
    PolicyBlocked,
    /// Non-2xx, non-redirect status.
    Blocked,
    /// Redirect bound hit or redirect without target.
    RedirectExhausted,
    /// Content type outside the allow-list.
    TypeMismatch,
    /// Connect/read failure or timeout.
    Network,
    /// Stream or move failure.
    Io,
    /// Lost the ledger claim race.
    Duplicate,
}

impl FailureKind {
    /// Number of kinds.
    pub const COUNT: usize = 8;

    /// All kinds, in reporting order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::MalformedInput,
        Self::PolicyBlocked,
        Self::Blocked,
        Self::RedirectExhausted,
        Self::TypeMismatch,
        Self::Network,
        Self::Io,
        Self::Duplicate,
    ];

    /// Stable label for logs and summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::PolicyBlocked => "policy_blocked",
            Self::Blocked => "blocked",
            Self::RedirectExhausted => "redirect_exhausted",
            Self::TypeMismatch => "type_mismatch",
            Self::Network => "network",
            Self::Io => "io",
            Self::Duplicate => "duplicate",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::MalformedInput => 0,
            Self::PolicyBlocked => 1,
            Self::Blocked => 2,
            Self::RedirectExhausted => 3,
            Self::TypeMismatch => 4,
            Self::Network => 5,
            Self::Io => 6,
            Self::Duplicate => 7,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
