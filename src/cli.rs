//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harvester_core::config::{DEFAULT_EXTENSION, MAX_POOL_SIZE};

/// Bulk, resumable fetcher for (identifier, URL) lists.
///
/// Harvester reads a tab-separated list of identifiers and URLs and saves at
/// most one artifact per identifier into a flat output directory, skipping
/// identifiers already saved by earlier runs.
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/harvester/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every listed URL not already saved
    Fetch(FetchArgs),
    /// Rewrite the ledger from the output directory contents (no network)
    RebuildLedger(RebuildArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Tab-separated input: <identifier>\t<url> per line
    pub input: PathBuf,

    /// Directory receiving <identifier>.<extension> artifacts
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// In-progress download directory, wiped at start [default: <output>.tmp]
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Ledger file [default: <output>.ledger]
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,

    /// Delete the output directory and ledger before starting
    #[arg(long)]
    pub overwrite: bool,

    /// Concurrent workers (0 = available parallelism minus one)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u16).range(0..=MAX_POOL_SIZE as i64))]
    pub workers: Option<u16>,

    /// Connect timeout in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub connect_timeout_ms: Option<u64>,

    /// Read timeout in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_ms: Option<u64>,

    /// Maximum redirects followed per URL
    #[arg(long)]
    pub max_hops: Option<u32>,

    /// Wait before re-contacting a recently seen rate-limited host, in seconds
    #[arg(long)]
    pub rate_limit_wait_secs: Option<u64>,

    /// Capacity of the recently-contacted host window (0 disables throttling)
    #[arg(long)]
    pub window: Option<usize>,

    /// Skip the first N input lines
    #[arg(long, conflicts_with = "from_line", value_name = "N")]
    pub skip: Option<u64>,

    /// First input line to process (1-based)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub from_line: Option<u64>,

    /// Last input line to process (inclusive)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub to_line: Option<u64>,

    /// Artifact file extension
    #[arg(long)]
    pub extension: Option<String>,

    /// Accepted content type prefix; repeat to accept several
    #[arg(long = "allow-type", value_name = "MIME")]
    pub allow_types: Vec<String>,

    /// File of forbidden URL substrings, one per line
    #[arg(long, value_name = "FILE")]
    pub forbidden_file: Option<PathBuf>,

    /// File of rate-limited URL substrings, one per line
    #[arg(long, value_name = "FILE")]
    pub rate_limited_file: Option<PathBuf>,

    /// Do not start from the built-in forbidden publisher list
    #[arg(long)]
    pub no_default_forbidden: bool,

    /// Persist the ledger every N input lines (0 = only at the end)
    #[arg(long, value_name = "N")]
    pub persist_every: Option<u64>,

    /// User-Agent: "browser", "tool", or a literal value
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub summary_json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RebuildArgs {
    /// Directory holding saved artifacts
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Ledger file to overwrite [default: <output>.ledger]
    #[arg(long, value_name = "FILE")]
    pub ledger: Option<PathBuf>,

    /// Artifact file extension
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,
}
