mod cli;
mod commands;
mod output;

use std::process::ExitCode;

use anyhow::Result;
use caltally_core::{Config, ConfigError};
use clap::Parser;

use crate::cli::Cli;
use crate::commands::App;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let app = match setup(&cli) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("[error] {}", commands::user_message(err));
            return ExitCode::FAILURE;
        }
    };

    app.execute(cli.command).await
}

/// Load config, apply command-line overrides, start logging and validate.
fn setup(cli: &Cli) -> Result<App> {
    let mut config = Config::load()?;
    if let Some(url) = &cli.api_url {
        config.backend.api_url = url.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    caltally_core::init(&config.log_level)?;

    let validation = config.validate();
    for warning in &validation.warnings {
        tracing::warn!("Config warning: {}", warning);
    }
    if !validation.is_valid() {
        return Err(ConfigError::Invalid(validation.error_summary()).into());
    }

    tracing::debug!("Using backend at {}", config.backend.api_url);
    App::new(config, cli.json)
}
