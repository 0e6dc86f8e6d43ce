//! Command definitions and shared plumbing

pub mod completions;
pub mod list;
pub mod setup;
pub mod sync;
pub mod url;

use anyhow::Context;
use clap::{Args, Subcommand};
use jam_core::{Config, ConfigManager, SessionConfig};
use jam_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Flags accepted by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Named AWS profile
    #[arg(long, global = true, env = "JAM_PROFILE")]
    pub profile: Option<String>,

    /// Region for new buckets and request signing
    #[arg(long, global = true, env = "JAM_REGION")]
    pub region: Option<String>,

    /// Custom endpoint for S3-compatible services
    #[arg(long, global = true, env = "JAM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log debug events to stderr
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalArgs {
    pub fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color,
            quiet: self.quiet,
        }
    }

    /// Session values given on the command line or through the environment
    fn session_overrides(&self) -> SessionConfig {
        SessionConfig {
            profile: self.profile.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload changed files and delete stale objects
    Sync(sync::SyncArgs),

    /// Provision hosting resources
    Setup(setup::SetupArgs),

    /// List buckets or bucket contents
    #[command(subcommand)]
    List(list::ListCommands),

    /// Print the website URL of a bucket
    Url(url::UrlArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute a parsed command
pub async fn execute(command: Commands, global: &GlobalArgs) -> ExitCode {
    let output_config = global.output_config();

    match command {
        Commands::Sync(args) => sync::execute(args, global, output_config).await,
        Commands::Setup(args) => setup::execute(args, global, output_config).await,
        Commands::List(cmd) => list::execute(cmd, global, output_config).await,
        Commands::Url(args) => url::execute(args, global, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// A connected client plus the configuration it was built from
pub struct Session {
    pub client: S3Client,
    pub config: Config,
}

/// Load the configuration file, apply flag overrides and build a client
pub async fn connect(global: &GlobalArgs) -> anyhow::Result<Session> {
    let manager = ConfigManager::new().context("Failed to locate configuration")?;
    let mut config = manager.load().context("Failed to load configuration")?;

    config.session = config.session.merge(global.session_overrides());
    tracing::debug!(path = %manager.path().display(), session = ?config.session.profile, "Loaded configuration");

    let client = S3Client::new(&config.session, config.retry.clone())
        .await
        .context("Failed to create S3 client")?;

    Ok(Session { client, config })
}

/// Connect, reporting failures through the formatter
pub async fn connect_or_report(
    global: &GlobalArgs,
    formatter: &Formatter,
) -> Result<Session, ExitCode> {
    connect(global).await.map_err(|e| {
        formatter.error(&format!("{e:#}"));
        ExitCode::from_anyhow(&e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_file_values() {
        let file = SessionConfig {
            profile: Some("default".to_string()),
            region: Some("eu-west-1".to_string()),
            ..Default::default()
        };
        let global = GlobalArgs {
            region: Some("us-west-2".to_string()),
            ..Default::default()
        };

        let merged = file.merge(global.session_overrides());
        assert_eq!(merged.profile.as_deref(), Some("default"));
        assert_eq!(merged.region.as_deref(), Some("us-west-2"));
    }

    #[test]
    fn test_output_config_from_flags() {
        let global = GlobalArgs {
            json: true,
            quiet: true,
            ..Default::default()
        };
        let config = global.output_config();
        assert!(config.json);
        assert!(config.quiet);
        assert!(!config.no_color);
    }
}
