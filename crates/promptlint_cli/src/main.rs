//! promptlint CLI
//!
//! Lints source files against natural-language rules judged by a chat
//! completion backend.

mod cli;
mod commands;
mod output;
mod utils;

use std::process::ExitCode;

use clap::Parser;
use miette::Result;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::Outcome;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<Outcome> {
    match &cli.command {
        Commands::Lint {
            patterns,
            format,
            concurrency,
            dry_run,
        } => commands::lint::run_lint(cli, patterns, *format, *concurrency, *dry_run),
        Commands::Eval {
            evals_dir,
            only_correct,
            only_incorrect,
            rules,
            format,
        } => commands::eval::run_eval(
            cli,
            evals_dir,
            *only_correct,
            *only_incorrect,
            rules,
            *format,
        ),
    }
}
