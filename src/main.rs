//! CLI entry point for the harvester tool.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app;
mod cli;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let no_color = app::terminal::is_no_color_requested(&cli);
    app::terminal::init_tracing(app::terminal::default_log_level(cli.verbose, cli.quiet), no_color);
    debug!(?cli, "CLI arguments parsed");

    let file_config = app::settings::load_config_file(cli.config.as_deref())?;

    match cli.command {
        Command::Fetch(args) => {
            let config = app::settings::build_fetch_config(&args, file_config)?;
            app::fetch_command::run(config, cli.quiet, args.summary_json).await?;
        }
        Command::RebuildLedger(args) => {
            let ledger = app::settings::rebuild_ledger_path(
                &args.output_dir,
                args.ledger.as_deref(),
                file_config.as_ref(),
            );
            app::rebuild_command::run(&args.output_dir, &args.extension, &ledger).await?;
        }
    }

    Ok(())
}
