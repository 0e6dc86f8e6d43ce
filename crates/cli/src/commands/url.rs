//! url command - Print the website endpoint of a bucket

use clap::Args;
use jam_core::{BucketStore as _, website_url};
use serde::Serialize;

use super::{GlobalArgs, connect_or_report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Print the website URL of a bucket
#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Bucket name
    pub bucket: String,
}

#[derive(Debug, Serialize)]
struct UrlOutput {
    bucket: String,
    region: String,
    url: String,
}

/// Execute the url command
pub async fn execute(args: UrlArgs, global: &GlobalArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let session = match connect_or_report(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let region = match session.client.bucket_region(&args.bucket).await {
        Ok(r) => r,
        Err(e) => {
            formatter.error(&format!("Failed to locate bucket '{}': {e}", args.bucket));
            return ExitCode::from_error(&e);
        }
    };

    let url = match website_url(&args.bucket, &region) {
        Ok(u) => u,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&UrlOutput {
            bucket: args.bucket,
            region,
            url,
        });
    } else {
        formatter.println(&formatter.style_url(&url));
    }

    ExitCode::Success
}
