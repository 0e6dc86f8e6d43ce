//! list command - List buckets or the objects in a bucket

use clap::{Args, Subcommand};
use jam_core::{BucketStore as _, list_all_objects};
use jiff::Timestamp;

use super::{GlobalArgs, connect_or_report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// List buckets owned by the caller
    Buckets(ListBucketsArgs),

    /// List every object in a bucket
    Bucket(ListBucketArgs),
}

#[derive(Args, Debug)]
pub struct ListBucketsArgs {
    /// Include creation dates
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Args, Debug)]
pub struct ListBucketArgs {
    /// Bucket to list
    pub bucket: String,

    /// Include sizes and modification dates
    #[arg(short, long)]
    pub long: bool,
}

/// Execute the list command
pub async fn execute(cmd: ListCommands, global: &GlobalArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let session = match connect_or_report(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    match cmd {
        ListCommands::Buckets(args) => {
            let buckets = match session.client.list_buckets().await {
                Ok(b) => b,
                Err(e) => {
                    formatter.error(&format!("Failed to list buckets: {e}"));
                    return ExitCode::from_error(&e);
                }
            };

            if formatter.is_json() {
                formatter.json(&buckets);
                return ExitCode::Success;
            }

            for bucket in &buckets {
                let name = formatter.style_name(&format!("s3://{}", bucket.name));
                if args.long {
                    let date = format_date(bucket.created);
                    formatter.println(&format!("{}  {name}", formatter.style_date(&date)));
                } else {
                    formatter.println(&name);
                }
            }
            ExitCode::Success
        }
        ListCommands::Bucket(args) => {
            let objects = match list_all_objects(&session.client, &args.bucket).await {
                Ok(o) => o,
                Err(e) => {
                    formatter.error(&format!("Failed to list '{}': {e}", args.bucket));
                    return ExitCode::from_error(&e);
                }
            };

            if formatter.is_json() {
                formatter.json(&objects);
                return ExitCode::Success;
            }

            for object in &objects {
                if args.long {
                    let date = format_date(object.last_modified);
                    let size = humansize::format_size(object.size.max(0) as u64, humansize::BINARY);
                    formatter.println(&format!(
                        "{}  {:>10}  {}",
                        formatter.style_date(&date),
                        formatter.style_size(&size),
                        object.key
                    ));
                } else {
                    formatter.println(&object.key);
                }
            }
            ExitCode::Success
        }
    }
}

fn format_date(timestamp: Option<Timestamp>) -> String {
    timestamp
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| " ".repeat(19))
}
