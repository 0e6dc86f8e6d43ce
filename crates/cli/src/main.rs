//! jam - publish static sites to S3
//!
//! Provisions website buckets and keeps them in sync with a local build
//! directory, uploading only what changed.

mod commands;
mod exit_code;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::{Commands, GlobalArgs};

/// Static site deployment for S3
#[derive(Parser, Debug)]
#[command(name = "jam", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Route `tracing` events to stderr so stdout stays machine readable
fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    init_logging(cli.global.debug);

    if cli.global.no_color || cli.global.json {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    commands::execute(cli.command, &cli.global).await.into()
}
