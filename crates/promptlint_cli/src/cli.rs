//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// promptlint - lint code against natural-language rules
#[derive(Parser)]
#[command(name = "promptlint")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable caching
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Print token, retry, cache and latency counters to stderr
    #[arg(long, global = true)]
    pub debug_stats: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint files
    Lint {
        /// File patterns to lint
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Maximum concurrent backend calls (overrides the config)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Report cached results and the backend calls a run would make,
        /// without making them
        #[arg(long)]
        dry_run: bool,
    },

    /// Measure rule quality against labeled fixtures
    Eval {
        /// Directory holding `<rule>/correct/*` and `<rule>/incorrect/*`
        #[arg(long, default_value = "fixtures/evals")]
        evals_dir: PathBuf,

        /// Only evaluate examples that follow their rule
        #[arg(long)]
        only_correct: bool,

        /// Only evaluate examples that violate their rule
        #[arg(long)]
        only_incorrect: bool,

        /// Restrict evaluation to these rules
        #[arg(short, long = "rule", value_name = "NAME")]
        rules: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
