//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// Replicate Microsoft Dynamics 365 entities as a record stream
#[derive(Parser, Debug)]
#[command(name = "tap-dynamics")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON or YAML)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Print the catalog of available streams and exit
    #[arg(short, long)]
    pub discover: bool,

    /// Catalog file selecting the streams to sync
    #[arg(long, visible_alias = "properties")]
    pub catalog: Option<PathBuf>,

    /// State file (JSON), rewritten after every checkpoint
    #[arg(short, long)]
    pub state: Option<PathBuf>,

    /// Inline state JSON
    #[arg(long, conflicts_with = "state")]
    pub state_json: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// What an invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print the catalog
    Discover,
    /// Replicate selected streams
    Sync,
}

impl Cli {
    /// Resolve the command from the flags
    pub fn command(&self) -> Command {
        if self.discover {
            Command::Discover
        } else {
            Command::Sync
        }
    }
}
