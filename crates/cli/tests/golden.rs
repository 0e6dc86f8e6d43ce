//! Golden tests for verifying JSON output format stability
//!
//! These tests cover the paths that fail or finish before any network
//! request is made, so they run without credentials.
//!
//! Run with: `cargo test --features golden`

#![cfg(feature = "golden")]

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run the jam binary with an isolated configuration directory
fn run_jam(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_jam"))
        .args(args)
        .env("JAM_CONFIG_DIR", config_dir)
        .env_remove("JAM_PROFILE")
        .env_remove("JAM_REGION")
        .env_remove("JAM_ENDPOINT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute jam")
}

fn stderr_json(output: &Output) -> serde_json::Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    serde_json::from_str(&stderr).expect("stderr should be valid JSON")
}

#[test]
fn test_sync_missing_directory_json() {
    let config_dir = TempDir::new().unwrap();

    let output = run_jam(
        config_dir.path(),
        &["sync", "/definitely/not/here", "example.com", "--json"],
    );

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    insta::assert_json_snapshot!("sync_missing_directory", stderr_json(&output));
}

#[test]
fn test_sync_zero_parallel_json() {
    let config_dir = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();

    let output = run_jam(
        config_dir.path(),
        &[
            "sync",
            site.path().to_str().unwrap(),
            "example.com",
            "--parallel",
            "0",
            "--json",
        ],
    );

    assert_eq!(output.status.code(), Some(2));
    insta::assert_json_snapshot!("sync_zero_parallel", stderr_json(&output));
}

#[test]
fn test_invalid_config_json() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(
        config_dir.path().join("config.toml"),
        "[sync]\nchunk_size = 0\n",
    )
    .unwrap();

    let output = run_jam(config_dir.path(), &["list", "buckets", "--json"]);

    assert_eq!(output.status.code(), Some(2));
    insta::assert_json_snapshot!("invalid_config", stderr_json(&output));
}

#[test]
fn test_half_key_pair_is_rejected() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(
        config_dir.path().join("config.toml"),
        "[session]\naccess_key = \"AKIAEXAMPLE\"\n",
    )
    .unwrap();

    let output = run_jam(config_dir.path(), &["url", "example.com", "--json"]);

    assert_eq!(output.status.code(), Some(2));
    insta::assert_json_snapshot!("half_key_pair", stderr_json(&output));
}

#[test]
fn test_completions_bash() {
    let config_dir = TempDir::new().unwrap();

    let output = run_jam(config_dir.path(), &["completions", "bash"]);

    assert!(output.status.success());
    let script = String::from_utf8_lossy(&output.stdout);
    assert!(script.contains("_jam()"));
    assert!(script.contains("sync"));
    assert!(script.contains("setup"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let config_dir = TempDir::new().unwrap();

    let output = run_jam(config_dir.path(), &["deploy"]);

    assert_eq!(output.status.code(), Some(2));
}
