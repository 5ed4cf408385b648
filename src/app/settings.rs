//! Configuration lifecycle: load the config file, then layer CLI flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::config::{
    FetchConfig, FileConfig, LineRange, load_file_config, load_patterns,
    resolve_default_config_path,
};
use harvester_core::user_agent;
use tracing::debug;

use crate::cli::FetchArgs;

/// Loads `explicit` if given (must exist), else the default path if present.
pub(crate) fn load_config_file(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        let config = load_file_config(path)
            .with_context(|| format!("loading config file {}", path.display()))?;
        return Ok(Some(config));
    }
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.is_file() {
        debug!(path = %path.display(), "no default config file");
        return Ok(None);
    }
    let config = load_file_config(&path)
        .with_context(|| format!("loading config file {}", path.display()))?;
    Ok(Some(config))
}

/// Builds the run configuration: defaults, then file values, then flags.
pub(crate) fn build_fetch_config(args: &FetchArgs, file: Option<FileConfig>) -> Result<FetchConfig> {
    let mut config = FetchConfig::new(&args.input, &args.output_dir);

    let mut file = file.unwrap_or_default();
    if args.no_default_forbidden {
        file.default_forbidden = Some(false);
    }
    file.apply(&mut config).context("applying config file")?;

    apply_path_overrides(&mut config, args);
    if args.overwrite {
        config.overwrite = true;
    }
    if let Some(workers) = args.workers {
        config.pool_size = usize::from(workers);
    }
    if let Some(ms) = args.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.read_timeout_ms {
        config.read_timeout = Duration::from_millis(ms);
    }
    if let Some(hops) = args.max_hops {
        config.max_hops = hops;
    }
    if let Some(secs) = args.rate_limit_wait_secs {
        config.rate_limit_wait = Duration::from_secs(secs);
    }
    if let Some(window) = args.window {
        config.window_capacity = window;
    }
    if let Some(extension) = &args.extension {
        config.extension = extension.trim_start_matches('.').to_string();
    }
    if !args.allow_types.is_empty() {
        config.allowed_types.clone_from(&args.allow_types);
    }
    if let Some(every) = args.persist_every {
        config.persist_every = every;
    }
    if let Some(ua) = &args.user_agent {
        config.user_agent = user_agent::resolve(ua);
    }
    if let Some(path) = &args.forbidden_file {
        config.forbidden.extend(load_patterns(path)?);
    }
    if let Some(path) = &args.rate_limited_file {
        config.rate_limited.extend(load_patterns(path)?);
    }
    config.range = line_range(args);

    config.validate()?;
    Ok(config)
}

fn apply_path_overrides(config: &mut FetchConfig, args: &FetchArgs) {
    if let Some(dir) = &args.scratch_dir {
        config.scratch_dir.clone_from(dir);
    }
    if let Some(ledger) = &args.ledger {
        config.ledger_path.clone_from(ledger);
    }
}

fn line_range(args: &FetchArgs) -> LineRange {
    match (args.skip, args.from_line) {
        (Some(skip), _) => LineRange::new(skip.saturating_add(1), args.to_line),
        (None, Some(from)) => LineRange::new(from, args.to_line),
        (None, None) => LineRange::new(1, args.to_line),
    }
}

/// Ledger path for `rebuild-ledger`: explicit flag, else config file, else
/// the default beside the output directory.
pub(crate) fn rebuild_ledger_path(
    output_dir: &Path,
    explicit: Option<&Path>,
    file: Option<&FileConfig>,
) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| file.and_then(|f| f.ledger.clone()))
        .unwrap_or_else(|| harvester_core::config::default_ledger_path(output_dir))
}
