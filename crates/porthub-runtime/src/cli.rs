//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "porthub", about = "agent registry for extension messaging")]
pub struct Cli {
    /// Registry config (TOML)
    #[arg(long, short = 'c', global = true, env = "PORTHUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a recorded scenario of host notifications
    Replay(ReplayOpts),
    /// Print the resolved page descriptor table
    Pages(PagesOpts),
}

#[derive(clap::Args)]
pub struct ReplayOpts {
    /// Scenario file (JSON)
    pub scenario: PathBuf,

    /// Include the event log in the output
    #[arg(long)]
    pub events: bool,
}

#[derive(clap::Args)]
pub struct PagesOpts {
    /// Host manifest to derive descriptors from (overrides the config's)
    #[arg(long, short = 'm')]
    pub manifest: Option<PathBuf>,
}
