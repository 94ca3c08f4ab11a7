use anyhow::Result;
use bullion::cli::setup::setup;
use bullion::core::log::init_logging;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration and data directories
    Setup,
    /// Display portfolio cost, value and profit
    Summary,
    /// Display cached spot prices
    Prices {
        /// Query the price sources even if the cache is fresh
        #[arg(long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Summary) => bullion::run_command(bullion::AppCommand::Summary, config_path).await,
        Some(Commands::Prices { refresh }) => {
            bullion::run_command(bullion::AppCommand::Prices { refresh }, config_path).await
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
