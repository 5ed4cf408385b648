//! Run configuration.
//!
//! [`FetchConfig`] carries every operational control of a fetch run. It is
//! built with defaults by [`FetchConfig::new`], adjusted by the caller (CLI
//! flags, [`FileConfig`] values), then checked with [`FetchConfig::validate`]
//! before a run starts.

mod domains;
mod file;

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub use domains::{DEFAULT_FORBIDDEN_PATTERNS, DomainPatterns};
pub use file::{FileConfig, load_file_config, load_patterns, resolve_default_config_path};

use crate::user_agent;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default read timeout in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Default redirect hop bound.
pub const DEFAULT_MAX_HOPS: u32 = 10;

/// Default wait before re-contacting a recently seen rate-limited host.
pub const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Default capacity of the domain recency window.
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Default artifact extension.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Default content-type allow-list (prefix match).
pub const DEFAULT_ALLOWED_TYPES: &[&str] = &["application/pdf", "application/x-pdf"];

/// Statuses logged at warn level as likely blocks.
pub const DEFAULT_WATCH_STATUSES: &[u16] = &[403, 429, 503];

/// Default number of input lines between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Upper bound on the worker pool size.
pub const MAX_POOL_SIZE: usize = 1000;

/// Errors raised by configuration validation and loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent with another.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// The offending setting.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A config or pattern file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid TOML for [`FileConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// The file that failed.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Inclusive, 1-based bound on the input lines that are processed.
///
/// Line numbers count every physical line, blank ones included, so the same
/// bound always selects the same lines of a stable input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    from: u64,
    to: Option<u64>,
}

impl Default for LineRange {
    fn default() -> Self {
        Self { from: 1, to: None }
    }
}

impl LineRange {
    /// Processes lines `from..=to` (or to the end when `to` is `None`).
    #[must_use]
    pub fn new(from: u64, to: Option<u64>) -> Self {
        Self { from, to }
    }

    /// Skips the first `count` lines.
    #[must_use]
    pub fn skip(count: u64) -> Self {
        Self {
            from: count.saturating_add(1),
            to: None,
        }
    }

    #[must_use]
    pub fn from_line(&self) -> u64 {
        self.from
    }

    #[must_use]
    pub fn to_line(&self) -> Option<u64> {
        self.to
    }

    /// Returns true if `line` falls inside the range.
    #[must_use]
    pub fn contains(&self, line: u64) -> bool {
        line >= self.from && self.to.is_none_or(|to| line <= to)
    }

    /// Returns true once `line` is beyond the upper bound; reading can stop.
    #[must_use]
    pub fn is_past_end(&self, line: u64) -> bool {
        self.to.is_some_and(|to| line > to)
    }
}

/// Every control of a fetch run.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Tab-separated `(identifier, url)` list.
    pub input_path: PathBuf,
    /// Flat directory receiving `<identifier>.<extension>` artifacts.
    pub output_dir: PathBuf,
    /// Run-owned directory for in-progress downloads; wiped at start.
    pub scratch_dir: PathBuf,
    /// Persisted ledger, one identifier per line.
    pub ledger_path: PathBuf,
    /// Artifact extension without the leading dot.
    pub extension: String,
    /// Discard the output directory and ledger before starting.
    pub overwrite: bool,
    /// Worker pool size; 0 sizes to available parallelism minus one.
    pub pool_size: usize,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Maximum number of redirects followed per item.
    pub max_hops: u32,
    /// Sleep applied before contacting a recently seen rate-limited host.
    pub rate_limit_wait: Duration,
    /// Capacity of the domain recency window.
    pub window_capacity: usize,
    /// Input lines to process.
    pub range: LineRange,
    /// Content-type prefixes accepted for saving.
    pub allowed_types: Vec<String>,
    /// Statuses reported at warn level when they end an item.
    pub watch_statuses: Vec<u16>,
    /// URLs containing any of these are never requested.
    pub forbidden: DomainPatterns,
    /// URLs containing any of these are subject to the recency throttle.
    pub rate_limited: DomainPatterns,
    /// Persist the ledger every N input lines; 0 persists only at the end.
    pub persist_every: u64,
    /// Log a progress line every N input lines; 0 disables.
    pub progress_interval: u64,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl FetchConfig {
    /// Creates a config with source defaults. Scratch and ledger paths are
    /// derived from `output_dir`.
    #[must_use]
    pub fn new(input_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            input_path: input_path.into(),
            scratch_dir: default_scratch_dir(&output_dir),
            ledger_path: default_ledger_path(&output_dir),
            output_dir,
            extension: DEFAULT_EXTENSION.to_string(),
            overwrite: false,
            pool_size: 0,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            max_hops: DEFAULT_MAX_HOPS,
            rate_limit_wait: Duration::from_secs(DEFAULT_RATE_LIMIT_WAIT_SECS),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            range: LineRange::default(),
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|s| (*s).to_string()).collect(),
            watch_statuses: DEFAULT_WATCH_STATUSES.to_vec(),
            forbidden: DomainPatterns::default_forbidden(),
            rate_limited: DomainPatterns::default(),
            persist_every: 0,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            user_agent: user_agent::BROWSER_USER_AGENT.to_string(),
        }
    }

    /// Resolves `pool_size == 0` to available parallelism minus one (at least 1).
    #[must_use]
    pub fn effective_pool_size(&self) -> usize {
        if self.pool_size > 0 {
            return self.pool_size;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(1)
            .max(1)
    }

    /// Checks values that would make a run meaningless or unsafe.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::invalid(
                "pool_size",
                format!("{} exceeds maximum {MAX_POOL_SIZE}", self.pool_size),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::invalid("connect_timeout_ms", "must be positive"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::invalid("read_timeout_ms", "must be positive"));
        }
        if self.extension.is_empty()
            || self.extension.contains(['/', '\\', '\0'])
            || self.extension.starts_with('.')
        {
            return Err(ConfigError::invalid(
                "extension",
                format!("'{}' is not a bare file extension", self.extension),
            ));
        }
        if self.allowed_types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::invalid("allowed_types", "allow-list is empty"));
        }
        if self.range.from_line() == 0 {
            return Err(ConfigError::invalid("from_line", "line numbers start at 1"));
        }
        if let Some(to) = self.range.to_line()
            && to < self.range.from_line()
        {
            return Err(ConfigError::invalid(
                "to_line",
                format!("{to} is before from_line {}", self.range.from_line()),
            ));
        }
        self.validate_layout()
    }

    /// The scratch directory is wiped on every run, so it must not hold the
    /// output directory or the ledger, nor live inside the output directory.
    fn validate_layout(&self) -> Result<(), ConfigError> {
        let scratch = comparable(&self.scratch_dir);
        let output = comparable(&self.output_dir);
        if output.starts_with(&scratch) {
            return Err(ConfigError::invalid(
                "scratch_dir",
                format!(
                    "'{}' contains output_dir '{}'; it is wiped on every run",
                    self.scratch_dir.display(),
                    self.output_dir.display()
                ),
            ));
        }
        if scratch.starts_with(&output) {
            return Err(ConfigError::invalid(
                "scratch_dir",
                format!(
                    "'{}' is inside output_dir '{}'",
                    self.scratch_dir.display(),
                    self.output_dir.display()
                ),
            ));
        }
        if comparable(&self.ledger_path).starts_with(&scratch) {
            return Err(ConfigError::invalid(
                "ledger_path",
                format!(
                    "'{}' is inside scratch_dir '{}', which is wiped on every run",
                    self.ledger_path.display(),
                    self.scratch_dir.display()
                ),
            ));
        }
        Ok(())
    }

    /// Canonical artifact path for `id`.
    #[must_use]
    pub fn artifact_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(self.artifact_file_name(id))
    }

    /// Scratch path for `id`.
    #[must_use]
    pub fn scratch_path(&self, id: &str) -> PathBuf {
        self.scratch_dir.join(self.artifact_file_name(id))
    }

    fn artifact_file_name(&self, id: &str) -> String {
        format!("{id}.{}", self.extension)
    }
}

/// `<output>.tmp` next to the output directory.
///
/// Falls back to `harvester.tmp` under the system temp directory when the
/// output directory has no parent (the filesystem root).
#[must_use]
pub fn default_scratch_dir(output_dir: &Path) -> PathBuf {
    sibling_with_suffix(output_dir, "tmp")
        .unwrap_or_else(|| std::env::temp_dir().join("harvester.tmp"))
}

/// `<output>.ledger` next to the output directory.
#[must_use]
pub fn default_ledger_path(output_dir: &Path) -> PathBuf {
    sibling_with_suffix(output_dir, "ledger").unwrap_or_else(|| output_dir.join(".ledger"))
}

/// Names like `.` or `..` are resolved against the working directory first.
fn sibling_with_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let dir = if dir.file_name().is_some() {
        dir.to_path_buf()
    } else {
        lexical_absolute(dir)
    };
    let name = dir.file_name()?.to_str()?;
    Some(dir.with_file_name(format!("{name}.{suffix}")))
}

/// Absolute form of `path` with `.` and `..` folded away, no filesystem access.
fn lexical_absolute(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut clean = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other),
        }
    }
    clean
}

/// Form used for containment checks: lexically absolute, with symlinks
/// resolved on the longest prefix that exists.
fn comparable(path: &Path) -> PathBuf {
    let clean = lexical_absolute(path);
    for existing in clean.ancestors() {
        let Ok(real) = std::fs::canonicalize(existing) else {
            continue;
        };
        return match clean.strip_prefix(existing) {
            Ok(rest) if !rest.as_os_str().is_empty() => real.join(rest),
            _ => real,
        };
    }
    clean
}
