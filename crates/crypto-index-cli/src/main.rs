mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::calculate::CalculateArgs;
use commands::periods::PeriodsArgs;
use commands::verify::VerifyArgs;

/// Chain-linked crypto-asset index calculator
#[derive(Parser)]
#[command(
    name = "cix",
    version,
    about = "Chain-linked crypto-asset index calculator",
    long_about = "Builds a daily index history from rebalancing-period snapshots and \
                  price files with decimal precision. Supports equal and \
                  capitalization weighting, period discovery and history verification."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate the index history
    Calculate(CalculateArgs),
    /// List rebalancing periods found under the index folder
    Periods(PeriodsArgs),
    /// Check a history file against the daily grid
    Verify(VerifyArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::calculate::run_calculate(args),
        Commands::Periods(args) => commands::periods::run_periods(args),
        Commands::Verify(args) => commands::verify::run_verify(args),
        Commands::Version => {
            println!("cix {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
