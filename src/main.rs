use std::path::Path;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use waitnotify::adapter::inbound::cli::command::DEFAULT_CONFIG_PATH;
use waitnotify::adapter::inbound::cli::{reconcile, run, status, Cli, Commands};
use waitnotify::infrastructure::config::Config;

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_PATH}")),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.command.config_arg().config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e:#}");
            std::process::exit(1);
        }
    };

    config.init_logging();

    let result = match cli.command {
        Commands::Run(_) => {
            info!("waitnotify starting");
            let result = run::execute(config).await;
            info!("waitnotify stopped");
            result
        }
        Commands::Reconcile(_) => reconcile::execute(config, cli.json).await,
        Commands::Status(_) => status::execute(config, cli.json),
    };

    if let Err(e) = result {
        error!(error = %e, "Fatal error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
