//! CLI argument definitions for livemem

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "livemem")]
#[command(about = "Live view of another process's memory", long_about = None)]
pub struct Cli {
    /// Log filter (e.g. "debug", "livemem=trace"); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which process to attach to
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Process ID to attach to
    #[arg(short, long, conflicts_with = "name")]
    pub pid: Option<u32>,

    /// Process name to search for (uses configured default if neither is given)
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch memory blocks update live
    #[command(visible_alias = "w")]
    Watch {
        #[command(flatten)]
        target: TargetArgs,

        /// Addresses to watch (hex, e.g. 0x7f1234567890)
        #[arg(required = true)]
        addresses: Vec<String>,

        /// Bytes per block
        #[arg(short, long, default_value = "64")]
        size: usize,

        /// Stop after this many display ticks (0 = run until killed)
        #[arg(short, long, default_value = "0")]
        ticks: u64,

        /// Milliseconds between display ticks
        #[arg(long, default_value = "500")]
        display_ms: u64,

        /// Print snapshots as JSON lines instead of hex dumps
        #[arg(long)]
        json: bool,
    },

    /// Read memory once, bypassing the cache
    #[command(visible_alias = "r")]
    Read {
        #[command(flatten)]
        target: TargetArgs,

        /// Memory address (hex, e.g. 0x7f1234567890)
        address: String,

        /// Number of bytes to read
        #[arg(short, long, default_value = "64")]
        size: usize,
    },

    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Default process name to attach to
        #[arg(long)]
        process: Option<String>,

        /// Refresh loop interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Enable idle eviction after this many milliseconds
        #[arg(long, conflicts_with = "no_retention")]
        retention_ms: Option<u64>,

        /// Disable idle eviction
        #[arg(long)]
        no_retention: bool,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}
