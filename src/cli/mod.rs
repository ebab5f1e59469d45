//! CLI module
//!
//! Command-line interface following the tap conventions.
//!
//! # Modes
//!
//! - `--discover` - print the catalog of available streams
//! - default - sync the streams selected in `--catalog` (or all discovered
//!   streams), resuming from `--state`

mod commands;
mod runner;

pub use commands::{Cli, Command};
pub use runner::{sync, write_catalog, Runner};
