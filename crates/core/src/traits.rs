//! Storage backend abstraction
//!
//! The sync engine and hosting setup talk to the bucket through
//! [`BucketStore`] only, so they can be exercised against mocks and in-memory
//! stores without a network.

use std::path::Path;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::Serialize;

use crate::checksum::ETag;
use crate::error::Result;

/// Maximum keys requested per listing page
pub const LIST_PAGE_SIZE: i32 = 1000;

/// An object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteObject {
    pub key: String,
    pub etag: ETag,
    pub size: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
}

impl RemoteObject {
    pub fn new(key: impl Into<String>, etag: ETag, size: i64) -> Self {
        Self {
            key: key.into(),
            etag,
            size,
            last_modified: None,
        }
    }
}

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub objects: Vec<RemoteObject>,
    /// Token for the next page, `None` when the listing is exhausted
    pub next_token: Option<String>,
}

/// A bucket owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
}

/// Operations jam needs from an object store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Fetch one listing page, starting after `continuation_token`
    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
    ) -> Result<ObjectPage>;

    /// Upload a local file as `key`
    ///
    /// Files larger than `chunk_size` must be sent as a multi-part upload with
    /// parts of exactly `chunk_size` bytes, so the stored tag matches
    /// [`crate::checksum::checksum`] for the same chunk size.
    async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
        chunk_size: usize,
    ) -> Result<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Region the bucket lives in
    async fn bucket_region(&self, bucket: &str) -> Result<String>;

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>>;

    /// Create a bucket, returning `false` if the caller already owns it
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<bool>;

    /// Lift the account/bucket block on public policies
    async fn allow_public_access(&self, bucket: &str) -> Result<()>;

    async fn put_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()>;

    /// Enable static website hosting with the given index and error documents
    async fn put_website_config(
        &self,
        bucket: &str,
        index_document: &str,
        error_document: &str,
    ) -> Result<()>;
}
