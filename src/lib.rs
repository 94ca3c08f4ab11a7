pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::providers::HttpPriceSource;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Summary,
    Prices { refresh: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Bullion tracker starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let provider = HttpPriceSource::new()?;
    match command {
        AppCommand::Summary => cli::summary::run(&config, &provider).await,
        AppCommand::Prices { refresh } => cli::prices::run(&config, &provider, refresh).await,
    }
}
