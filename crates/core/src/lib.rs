//! jam-core: Core library for the jam static site deployer
//!
//! This crate provides everything that does not depend on a particular
//! storage SDK:
//! - Entity-tag checksums compatible with S3 multi-part uploads
//! - Local tree walking and object key derivation
//! - Remote inventory loading
//! - The incremental sync engine
//! - Static website hosting setup and the region endpoint table
//! - Configuration, errors and transport retry helpers
//!
//! Storage access goes through the [`BucketStore`] trait, implemented for S3
//! by the `jam-s3` crate.

pub mod checksum;
pub mod config;
pub mod content_type;
pub mod endpoint;
pub mod error;
pub mod hosting;
pub mod inventory;
pub mod retry;
pub mod sync;
pub mod traits;
pub mod walk;

pub use checksum::{
    DEFAULT_CHUNK_SIZE, ETag, MAX_PART_SIZE, MIN_PART_SIZE, check_part_size, checksum,
    checksum_bytes,
};
pub use config::{Config, ConfigManager, RetryConfig, SessionConfig, SyncSettings};
pub use content_type::{DEFAULT_CONTENT_TYPE, content_type_for};
pub use endpoint::{Endpoint, region_from_location, website_endpoint, website_url};
pub use error::{Error, Result};
pub use hosting::{HostingReport, WebsiteConfig, public_read_policy, setup_hosting_bucket};
pub use inventory::{RemoteInventory, list_all_objects, load_inventory};
pub use retry::{is_retryable_error, retry_with_backoff};
pub use sync::{
    Action, DeleteFailure, PendingChecksums, PlannedFile, SyncEngine, SyncEvent, SyncOptions,
    SyncPlan, SyncReport, SyncSummary, sync,
};
pub use traits::{BucketStore, BucketSummary, LIST_PAGE_SIZE, ObjectPage, RemoteObject};
pub use walk::{LocalFile, LocalTree, ObjectKey};
