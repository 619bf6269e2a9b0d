//! Command-line interface definitions.
//!
//! Defines the CLI structure for the `waitnotify` operator binary using
//! `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Operator binary for the wait/notify engine
#[derive(Parser, Debug)]
#[command(name = "waitnotify")]
#[command(version)]
pub struct Cli {
    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run dispatchers and the reconciler until interrupted
    Run(ConfigPathArg),

    /// Run a single reconciliation pass and print its report
    Reconcile(ConfigPathArg),

    /// Show record counts and queue depth
    Status(ConfigPathArg),
}

impl Commands {
    #[must_use]
    pub fn config_arg(&self) -> &ConfigPathArg {
        match self {
            Self::Run(args) | Self::Reconcile(args) | Self::Status(args) => args,
        }
    }
}

/// Shared argument struct for commands that need only a configuration path.
///
/// A missing file at the default path means "use defaults"; an explicitly
/// given path must exist.
#[derive(Parser, Debug)]
pub struct ConfigPathArg {
    /// Path to the configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_config() {
        let cli = Cli::try_parse_from(["waitnotify", "run", "--config", "wn.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(_)));
        assert_eq!(
            cli.command.config_arg().config,
            Some(PathBuf::from("wn.toml"))
        );
    }

    #[test]
    fn json_flag_is_global() {
        let cli = Cli::try_parse_from(["waitnotify", "status", "--json"]).unwrap();
        assert!(cli.json);
        assert!(cli.command.config_arg().config.is_none());
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["waitnotify", "explode"]).is_err());
    }
}
