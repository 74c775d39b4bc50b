use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "binvet")]
#[command(about = "Static hardening verification for compiled binaries")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format (json, terminal)
    #[arg(short, long, default_value = "terminal", global = true)]
    pub format: OutputFormat,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze binaries against the hardening rule catalog
    Analyze {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Recurse into directories
        #[arg(short, long)]
        recurse: bool,

        /// Worker count (1 = deterministic sequential, 0 = one per core)
        #[arg(short, long, default_value_t = 1)]
        threads: usize,

        /// Policy file with per-rule option overrides (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Strip non-deterministic fields (timestamps, tool version,
        /// the given root prefix) for reproducible output
        #[arg(long, value_name = "ROOT")]
        normalize_root: Option<String>,
    },

    /// Compare an actual run log against an expected baseline
    Diff {
        /// Baseline run log (JSON)
        expected: PathBuf,

        /// Actual run log (JSON)
        actual: PathBuf,
    },

    /// List the registered rules and their configuration options
    Rules,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output for machine consumption
    Json,
    /// Human-readable terminal output
    Terminal,
}
