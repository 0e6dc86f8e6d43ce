//! jam-s3: S3 adapter for jam
//!
//! Implements [`jam_core::BucketStore`] on top of aws-sdk-s3.

pub mod client;

pub use client::{FALLBACK_REGION, S3Client};
