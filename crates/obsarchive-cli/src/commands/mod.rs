//! CLI command definitions and dispatch.

pub mod delete;
pub mod incomplete;

use std::path::Path;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use obsarchive_core::config::AppConfig;
use obsarchive_core::result::AppResult;
use obsarchive_database::DatabasePool;

use crate::output::OutputFormat;

/// MWA archive manager: delete requests and incomplete uploads
#[derive(Debug, Parser)]
#[command(name = "obsarchive", version, about, long_about = None)]
pub struct Cli {
    /// Output format for the final summary
    #[arg(long, value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process approved delete requests
    Delete(delete::DeleteArgs),
    /// Remove incomplete multipart uploads whose object is already complete
    Incomplete(incomplete::IncompleteArgs),
}

impl Cli {
    /// Whether `--verbose` was given to the subcommand.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Commands::Delete(args) => args.verbose,
            Commands::Incomplete(args) => args.verbose,
        }
    }

    /// Execute the CLI command
    pub async fn execute(&self, cancel: CancellationToken) -> AppResult<()> {
        match &self.command {
            Commands::Delete(args) => delete::execute(args, self.format, cancel).await,
            Commands::Incomplete(args) => incomplete::execute(args, self.format, cancel).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &Path) -> AppResult<AppConfig> {
    tracing::info!("Loading config from '{}'", config_path.display());
    AppConfig::load(config_path)
}

/// Helper: connect to the catalog
pub async fn connect_catalog(config: &AppConfig) -> AppResult<DatabasePool> {
    DatabasePool::connect(&config.database).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_flags_parse() {
        let cli = Cli::try_parse_from([
            "obsarchive",
            "delete",
            "--cfg",
            "archive.toml",
            "--ids",
            "3,4",
            "--dry_run",
            "--force",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose());
        let Commands::Delete(args) = cli.command else {
            panic!("expected delete");
        };
        assert_eq!(args.cfg, Path::new("archive.toml"));
        assert_eq!(args.ids.as_deref(), Some("3,4"));
        assert!(args.dry_run);
        assert!(args.force);
    }

    #[test]
    fn incomplete_requires_location() {
        assert!(Cli::try_parse_from(["obsarchive", "incomplete", "--cfg", "a.toml"]).is_err());

        let cli = Cli::try_parse_from([
            "obsarchive",
            "incomplete",
            "--cfg",
            "a.toml",
            "--location",
            "banksia",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.verbose());
        let Commands::Incomplete(args) = cli.command else {
            panic!("expected incomplete");
        };
        assert_eq!(args.location, "banksia");
        assert!(!args.dry_run);
    }
}
