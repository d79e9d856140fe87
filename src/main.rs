use account_ledger::{cli, LedgerConfig};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Run account ledger batches and inspect transaction journals")]
enum Cli {
    /// Apply a batch file and print the resulting accounts
    #[command(name = "run")]
    Run {
        input: PathBuf,
        /// Append transactions to this journal file
        #[arg(long)]
        journal: Option<PathBuf>,
        /// Seed for reproducible account numbers
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print every transaction recorded in a journal file
    #[command(name = "history")]
    History { journal: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = LedgerConfig::from_env()?;

    // Logs go to stderr so stdout stays a clean CSV
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() == 2 && !args[1].starts_with('-') && !is_subcommand(&args[1]) {
        cli::run(PathBuf::from(&args[1]), None, None, config).await?;
    } else {
        match Cli::parse() {
            Cli::Run {
                input,
                journal,
                seed,
            } => {
                cli::run(input, journal, seed, config).await?;
            }
            Cli::History { journal } => {
                cli::history(journal).await?;
            }
        }
    }

    Ok(())
}

fn is_subcommand(arg: &str) -> bool {
    matches!(arg, "run" | "history" | "help")
}
