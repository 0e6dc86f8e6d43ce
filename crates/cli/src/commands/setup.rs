//! setup command - Provision hosting resources

use clap::{Args, Subcommand};
use jam_core::{HostingReport, WebsiteConfig, setup_hosting_bucket};

use super::{GlobalArgs, connect_or_report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Provision hosting resources
#[derive(Args, Debug)]
pub struct SetupArgs {
    #[command(subcommand)]
    pub command: SetupCommands,
}

#[derive(Subcommand, Debug)]
pub enum SetupCommands {
    /// Create a bucket and configure it for public website hosting
    Bucket(SetupBucketArgs),
}

#[derive(Args, Debug)]
pub struct SetupBucketArgs {
    /// Bucket name, usually the site's domain
    pub bucket: String,

    /// Document served for directory requests
    #[arg(long, default_value = "index.html")]
    pub index_document: String,

    /// Document served for missing keys
    #[arg(long, default_value = "error.html")]
    pub error_document: String,
}

/// Execute the setup command
pub async fn execute(args: SetupArgs, global: &GlobalArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    match args.command {
        SetupCommands::Bucket(bucket_args) => setup_bucket(bucket_args, global, &formatter).await,
    }
}

async fn setup_bucket(args: SetupBucketArgs, global: &GlobalArgs, formatter: &Formatter) -> ExitCode {
    let session = match connect_or_report(global, formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let region = session.client.region();
    let website = WebsiteConfig {
        index_document: args.index_document,
        error_document: args.error_document,
    };

    match setup_hosting_bucket(&session.client, &args.bucket, &region, &website).await {
        Ok(report) => {
            print_report(formatter, &report);
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to set up bucket '{}': {e}", args.bucket));
            ExitCode::from_error(&e)
        }
    }
}

fn print_report(formatter: &Formatter, report: &HostingReport) {
    if formatter.is_json() {
        formatter.json(report);
        return;
    }

    let name = formatter.style_name(&report.bucket);
    if report.created {
        formatter.success(&format!("Created bucket {name} in {}", report.region));
    } else {
        formatter.success(&format!("Bucket {name} already exists in {}", report.region));
    }
    formatter.success("Public read policy applied");
    formatter.success("Website hosting enabled");
    formatter.println(&format!("Website URL: {}", formatter.style_url(&report.url)));
}
