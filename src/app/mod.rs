//! Binary-side wiring: logging, config resolution, progress display and
//! the two subcommands.

pub(crate) mod fetch_command;
pub(crate) mod progress;
pub(crate) mod rebuild_command;
pub(crate) mod settings;
pub(crate) mod terminal;
