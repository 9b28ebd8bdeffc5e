//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapmox")]
#[command(author, version, about = "Scheduled snapshots and package updates for Proxmox LXC containers", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Path to the YAML configuration file (defaults are used when omitted)
    #[arg(long, short, global = true, env = "SNAPMOX_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Container manager binary to drive
    #[arg(long, global = true, env = "SNAPMOX_PCT", default_value = "pct", value_name = "PATH")]
    pub pct: PathBuf,

    /// Enable dry-run mode (read container state, change nothing)
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Run snapshots, pruning and updates as configured
    Run,

    /// Create today's snapshots and prune old ones, without updating
    Snapshot,

    /// List containers and their managed snapshots
    List,

    /// Validate and print the effective configuration
    Config {
        /// Print the built-in defaults instead of reading a file
        #[arg(long)]
        defaults: bool,
    },
}
