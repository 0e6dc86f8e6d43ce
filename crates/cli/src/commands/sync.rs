//! sync command - Publish a local directory to a bucket
//!
//! Uploads new and changed files, then removes objects that no longer exist
//! locally. Unchanged files are detected by comparing entity tags, so nothing
//! is downloaded.

use std::path::PathBuf;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use jam_core::{DeleteFailure, SyncEngine, SyncEvent, SyncOptions, SyncPlan, SyncReport};
use serde::Serialize;

use super::{GlobalArgs, connect_or_report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Synchronize a local directory into a bucket
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local directory to publish
    pub path: PathBuf,

    /// Destination bucket
    pub bucket: String,

    /// Dry run (show what would be done without doing it)
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of parallel operations [default: from config, 4]
    #[arg(short = 'P', long)]
    pub parallel: Option<usize>,

    /// Glob of keys to leave untouched locally and remotely (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Also list unchanged files
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct SyncOutput {
    path: String,
    bucket: String,
    uploaded: usize,
    skipped: usize,
    deleted: usize,
    failed: usize,
    dry_run: bool,
    failures: Vec<DeleteFailure>,
}

impl SyncOutput {
    fn new(args: &SyncArgs, report: &SyncReport) -> Self {
        let summary = report.summary();
        Self {
            path: args.path.display().to_string(),
            bucket: args.bucket.clone(),
            uploaded: summary.uploaded,
            skipped: summary.skipped,
            deleted: summary.deleted,
            failed: summary.failed,
            dry_run: report.dry_run,
            failures: report.failed.clone(),
        }
    }
}

/// Execute the sync command
pub async fn execute(args: SyncArgs, global: &GlobalArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if !args.path.is_dir() {
        formatter.error(&format!(
            "Local path is not a directory: {}",
            args.path.display()
        ));
        return ExitCode::UsageError;
    }

    if args.parallel == Some(0) {
        formatter.error("--parallel must be at least 1");
        return ExitCode::UsageError;
    }

    let session = match connect_or_report(global, &formatter).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let mut options = SyncOptions::from(&session.config.sync);
    if let Some(parallel) = args.parallel {
        options.parallel = parallel;
    }
    options.dry_run = args.dry_run;
    options.exclude = args.exclude.clone();

    let engine = SyncEngine::new(&session.client, &args.bucket, options);

    let plan = match engine.plan(&args.path).await {
        Ok(p) => p,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if args.dry_run {
        print_dry_run(&args, &formatter, plan);
        return ExitCode::Success;
    }

    let total = plan.uploads().count() + plan.deletions().len();
    let progress = (formatter.is_interactive() && !args.no_progress && total > 0).then(|| {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message("Syncing...");
        pb
    });

    // Lines go through the bar when one is drawn so they do not tear it
    let emit = |line: String| match &progress {
        Some(pb) => pb.println(line),
        None => formatter.println(&line),
    };

    let observer = |event: &SyncEvent<'_>| {
        if formatter.is_json() {
            return;
        }
        match event {
            SyncEvent::Skipped { key } => {
                if args.verbose {
                    emit(formatter.style_unchanged(&format!("= {key}")));
                }
            }
            SyncEvent::Uploaded { key, .. } => {
                emit(formatter.style_added(&format!("+ {key}")));
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            SyncEvent::Deleted { key } => {
                emit(formatter.style_removed(&format!("- {key}")));
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
            SyncEvent::DeleteFailed { error, .. } => {
                formatter.warning(&error.to_string());
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            }
        }
    };

    let report = match engine.execute(plan, observer).await {
        Ok(r) => r,
        Err(e) => {
            if let Some(pb) = &progress {
                pb.abandon();
            }
            formatter.error(&e.to_string());
            return ExitCode::from_error(&e);
        }
    };

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    if formatter.is_json() {
        formatter.json(&SyncOutput::new(&args, &report));
    } else {
        let summary = report.summary();
        formatter.println(&format!(
            "Sync complete: {} uploaded, {} deleted, {} unchanged, {} failed",
            summary.uploaded, summary.deleted, summary.skipped, summary.failed
        ));
    }

    if report.is_clean() {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    }
}

fn print_dry_run(args: &SyncArgs, formatter: &Formatter, plan: SyncPlan) {
    if !formatter.is_json() {
        formatter.println("Dry run mode - no changes will be made:");
        formatter.println("");

        let uploads: Vec<_> = plan.uploads().collect();
        if !uploads.is_empty() {
            formatter.println(&format!("Would upload {} object(s):", uploads.len()));
            for planned in &uploads {
                let size = humansize::format_size(planned.file.size, humansize::BINARY);
                formatter.println(&format!(
                    "  {} ({})",
                    formatter.style_added(&format!("+ {}", planned.file.key)),
                    formatter.style_size(&size)
                ));
            }
            formatter.println("");
        }

        let deletions = plan.deletions();
        if !deletions.is_empty() {
            formatter.println(&format!("Would delete {} object(s):", deletions.len()));
            for key in &deletions {
                formatter.println(&format!(
                    "  {}",
                    formatter.style_removed(&format!("- {key}"))
                ));
            }
            formatter.println("");
        }

        if args.verbose {
            for planned in plan.skips() {
                formatter.println(&format!(
                    "  {}",
                    formatter.style_unchanged(&format!("= {}", planned.file.key))
                ));
            }
        }
    }

    let report = plan.into_dry_run_report();
    if formatter.is_json() {
        formatter.json(&SyncOutput::new(args, &report));
    } else {
        let summary = report.summary();
        formatter.println(&format!(
            "Summary: {} to upload, {} to delete, {} unchanged",
            summary.uploaded, summary.deleted, summary.skipped
        ));
    }
}
