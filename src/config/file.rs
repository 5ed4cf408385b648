//! TOML-backed file configuration.
//!
//! Every key is optional; present keys override [`FetchConfig`] defaults and
//! are in turn overridden by command-line flags.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::{ConfigError, DomainPatterns, FetchConfig};
use crate::user_agent;

/// Values read from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub scratch_dir: Option<PathBuf>,
    pub ledger: Option<PathBuf>,
    pub extension: Option<String>,
    pub workers: Option<usize>,
    pub connect_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub max_hops: Option<u32>,
    pub rate_limit_wait_secs: Option<u64>,
    pub window: Option<usize>,
    pub allowed_types: Option<Vec<String>>,
    pub watch_statuses: Option<Vec<u16>>,
    /// Inline forbidden patterns, added to any loaded from `forbidden_file`.
    pub forbidden: Option<DomainPatterns>,
    pub forbidden_file: Option<PathBuf>,
    /// Inline rate-limited patterns, added to any loaded from `rate_limited_file`.
    pub rate_limited: Option<DomainPatterns>,
    pub rate_limited_file: Option<PathBuf>,
    /// Whether the built-in publisher list is used as the forbidden base.
    pub default_forbidden: Option<bool>,
    pub persist_every: Option<u64>,
    pub progress_interval: Option<u64>,
    /// `"browser"`, `"tool"`, or a literal header value.
    pub user_agent: Option<String>,
}

impl FileConfig {
    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for syntax errors, wrong types, or unknown keys.
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Writes the present values into `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if a referenced pattern file is unreadable.
    pub fn apply(&self, config: &mut FetchConfig) -> Result<(), ConfigError> {
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir.clone_from(dir);
        }
        if let Some(ledger) = &self.ledger {
            config.ledger_path.clone_from(ledger);
        }
        if let Some(extension) = &self.extension {
            config.extension.clone_from(extension);
        }
        if let Some(workers) = self.workers {
            config.pool_size = workers;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.read_timeout_ms {
            config.read_timeout = Duration::from_millis(ms);
        }
        if let Some(hops) = self.max_hops {
            config.max_hops = hops;
        }
        if let Some(secs) = self.rate_limit_wait_secs {
            config.rate_limit_wait = Duration::from_secs(secs);
        }
        if let Some(window) = self.window {
            config.window_capacity = window;
        }
        if let Some(types) = &self.allowed_types {
            config.allowed_types.clone_from(types);
        }
        if let Some(statuses) = &self.watch_statuses {
            config.watch_statuses.clone_from(statuses);
        }
        if let Some(every) = self.persist_every {
            config.persist_every = every;
        }
        if let Some(interval) = self.progress_interval {
            config.progress_interval = interval;
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent = user_agent::resolve(ua);
        }

        if self.default_forbidden == Some(false) {
            config.forbidden = DomainPatterns::default();
        }
        if let Some(path) = &self.forbidden_file {
            config.forbidden.extend(load_patterns(path)?);
        }
        if let Some(inline) = &self.forbidden {
            config.forbidden.extend(inline.clone());
        }
        if let Some(path) = &self.rate_limited_file {
            config.rate_limited.extend(load_patterns(path)?);
        }
        if let Some(inline) = &self.rate_limited {
            config.rate_limited.extend(inline.clone());
        }
        Ok(())
    }
}

/// Reads a pattern file, mapping IO errors into [`ConfigError::Read`].
///
/// # Errors
///
/// Returns [`ConfigError::Read`] if the file cannot be read.
pub fn load_patterns(path: &Path) -> Result<DomainPatterns, ConfigError> {
    DomainPatterns::load(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads and parses a config file.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = FileConfig::parse(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config_applies_over_defaults() {
        let raw = r#"
            workers = 50
            connect_timeout_ms = 2500
            read_timeout_ms = 4000
            max_hops = 3
            rate_limit_wait_secs = 5
            window = 4
            extension = "ps"
            allowed_types = ["application/postscript"]
            watch_statuses = [429]
            rate_limited = ["citeseerx"]
            persist_every = 1000
            user_agent = "tool"
        "#;
        let file = FileConfig::parse(raw).unwrap();
        let mut config = FetchConfig::new("in.tsv", "out");
        file.apply(&mut config).unwrap();

        assert_eq!(config.pool_size, 50);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        assert_eq!(config.read_timeout, Duration::from_millis(4000));
        assert_eq!(config.max_hops, 3);
        assert_eq!(config.rate_limit_wait, Duration::from_secs(5));
        assert_eq!(config.window_capacity, 4);
        assert_eq!(config.extension, "ps");
        assert_eq!(config.allowed_types, vec!["application/postscript"]);
        assert_eq!(config.watch_statuses, vec![429]);
        assert!(config.rate_limited.matches("http://citeseerx.ist.psu.edu/x"));
        assert_eq!(config.persist_every, 1000);
        assert!(config.user_agent.starts_with("harvester/"));
    }

    #[test]
    fn test_inline_forbidden_extends_default_list() {
        let file = FileConfig::parse(r#"forbidden = [".jp"]"#).unwrap();
        let mut config = FetchConfig::new("in.tsv", "out");
        file.apply(&mut config).unwrap();
        assert!(config.forbidden.matches("http://ieee.org/x"));
        assert!(config.forbidden.matches("http://a.ac.jp/x"));
    }

    #[test]
    fn test_default_forbidden_false_clears_base_list() {
        let file = FileConfig::parse("default_forbidden = false\nforbidden = [\"bad.example\"]").unwrap();
        let mut config = FetchConfig::new("in.tsv", "out");
        file.apply(&mut config).unwrap();
        assert!(!config.forbidden.matches("http://ieee.org/x"));
        assert!(config.forbidden.matches("http://bad.example/x"));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(FileConfig::parse("wokers = 5").is_err());
    }

    #[test]
    fn test_forbidden_file_loaded_relative_to_given_path() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("forbidden.txt");
        fs::write(&list, "blocked.example\n").unwrap();
        let file = FileConfig {
            forbidden_file: Some(list),
            ..FileConfig::default()
        };
        let mut config = FetchConfig::new("in.tsv", "out");
        file.apply(&mut config).unwrap();
        assert!(config.forbidden.matches("https://blocked.example/a"));
    }

    #[test]
    fn test_missing_pattern_file_is_read_error() {
        let file = FileConfig {
            rate_limited_file: Some(PathBuf::from("/definitely/not/here.txt")),
            ..FileConfig::default()
        };
        let mut config = FetchConfig::new("in.tsv", "out");
        let err = file.apply(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_file_config_reports_parse_error_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "workers = \"many\"").unwrap();
        let err = load_file_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}
