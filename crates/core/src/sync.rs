//! Incremental bucket synchronisation
//!
//! A sync run reconciles a local directory with a bucket in three phases:
//!
//! 1. Load the remote inventory (`key -> tag`). A failure here aborts the run
//!    before anything is changed.
//! 2. Walk the local tree, compute each file's tag and upload the files whose
//!    tag differs from the inventory. The first failed upload aborts the run
//!    and nothing is deleted. Queued uploads are not started; uploads already
//!    in flight are allowed to finish.
//! 3. Delete every inventory key that was not seen locally. Delete failures
//!    are collected into the report and do not stop the remaining deletes.
//!
//! All uploads finish before the first delete is issued, so an interrupted
//! run never removes an object whose replacement has not landed yet.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::checksum::{DEFAULT_CHUNK_SIZE, ETag, checksum};
use crate::config::SyncSettings;
use crate::content_type::content_type_for;
use crate::error::{Error, Result};
use crate::inventory::{RemoteInventory, load_inventory};
use crate::traits::BucketStore;
use crate::walk::{LocalFile, LocalTree, ObjectKey};

/// Tunables for one sync run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Multi-part chunk size; must match what the store uses for uploads
    pub chunk_size: usize,
    /// Maximum concurrent checksum, upload or delete operations
    pub parallel: usize,
    /// Compute the plan but do not upload or delete anything
    pub dry_run: bool,
    /// Glob patterns of keys to leave alone, locally and remotely
    pub exclude: Vec<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            parallel: 4,
            dry_run: false,
            exclude: Vec::new(),
        }
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            parallel: settings.parallel,
            ..Default::default()
        }
    }
}

/// What happens to a local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Remote tag matches; nothing to send
    Skip,
    Upload,
}

/// A local file with its computed tag and decided action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub file: LocalFile,
    pub checksum: ETag,
    pub action: Action,
}

/// The decided work of one sync run
#[derive(Debug, Clone)]
pub struct SyncPlan {
    tree: LocalTree,
    inventory: RemoteInventory,
    files: Vec<PlannedFile>,
}

impl SyncPlan {
    pub fn root(&self) -> &Path {
        self.tree.root()
    }

    /// Remote state the plan was computed against
    pub fn inventory(&self) -> &RemoteInventory {
        &self.inventory
    }

    pub fn files(&self) -> &[PlannedFile] {
        &self.files
    }

    pub fn uploads(&self) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter().filter(|f| f.action == Action::Upload)
    }

    pub fn skips(&self) -> impl Iterator<Item = &PlannedFile> {
        self.files.iter().filter(|f| f.action == Action::Skip)
    }

    /// Remote keys with no local counterpart, sorted
    pub fn deletions(&self) -> Vec<ObjectKey> {
        let local: HashSet<&ObjectKey> = self.files.iter().map(|f| &f.file.key).collect();
        let mut keys: Vec<ObjectKey> = self
            .inventory
            .keys()
            .filter(|k| !local.contains(k) && !self.tree.is_excluded(k.as_str()))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Describe the plan as a report without performing it
    pub fn into_dry_run_report(self) -> SyncReport {
        let mut report = SyncReport {
            dry_run: true,
            deleted: self.deletions(),
            ..Default::default()
        };
        for planned in self.files {
            match planned.action {
                Action::Upload => report.uploaded.push(planned.file.key),
                Action::Skip => report.skipped.push(planned.file.key),
            }
        }
        report.sort();
        report
    }
}

/// Tags of the keys known to be present after the upload phase
#[derive(Debug, Clone, Default)]
pub struct PendingChecksums {
    entries: HashMap<ObjectKey, ETag>,
}

impl PendingChecksums {
    pub fn record(&mut self, key: ObjectKey, etag: ETag) {
        self.entries.insert(key, etag);
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ETag> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Progress notifications emitted while a plan executes
#[derive(Debug)]
pub enum SyncEvent<'a> {
    Skipped { key: &'a ObjectKey },
    Uploaded { key: &'a ObjectKey, size: u64 },
    Deleted { key: &'a ObjectKey },
    DeleteFailed { key: &'a ObjectKey, error: &'a Error },
}

/// A remote object that could not be removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub key: ObjectKey,
    pub message: String,
}

/// Per-key outcome of a sync run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub uploaded: Vec<ObjectKey>,
    pub skipped: Vec<ObjectKey>,
    pub deleted: Vec<ObjectKey>,
    pub failed: Vec<DeleteFailure>,
    pub dry_run: bool,
}

/// Aggregate counts of a [`SyncReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub uploaded: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            uploaded: self.uploaded.len(),
            skipped: self.skipped.len(),
            deleted: self.deleted.len(),
            failed: self.failed.len(),
        }
    }

    /// True when no deletion failed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn sort(&mut self) {
        self.uploaded.sort();
        self.skipped.sort();
        self.deleted.sort();
        self.failed.sort_by(|a, b| a.key.cmp(&b.key));
    }
}

/// Syncs local trees into one bucket of a store
pub struct SyncEngine<'a, S: BucketStore + ?Sized> {
    store: &'a S,
    bucket: String,
    options: SyncOptions,
}

impl<'a, S: BucketStore + ?Sized> SyncEngine<'a, S> {
    pub fn new(store: &'a S, bucket: impl Into<String>, options: SyncOptions) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            options,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn parallel(&self) -> usize {
        self.options.parallel.max(1)
    }

    /// Load the inventory, walk `root` and decide an action per file
    ///
    /// Nothing in the bucket is modified.
    pub async fn plan(&self, root: &Path) -> Result<SyncPlan> {
        if self.options.chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_string()));
        }
        let tree = LocalTree::new(root).exclude(&self.options.exclude)?;

        let inventory = load_inventory(self.store, &self.bucket).await?;

        tracing::info!(root = %root.display(), bucket = %self.bucket, "Walking local tree");
        let chunk_size = self.options.chunk_size;
        let mut checksums = stream::iter(tree.iter())
            .map(|item| async move {
                let file = item?;
                let path = file.path.clone();
                let etag = tokio::task::spawn_blocking(move || checksum(&path, chunk_size))
                    .await
                    .map_err(|e| Error::General(format!("checksum task failed: {e}")))??;
                Ok::<_, Error>((file, etag))
            })
            .buffer_unordered(self.parallel());

        let mut files = Vec::new();
        while let Some(result) = checksums.next().await {
            let (file, etag) = result?;
            let action = if inventory.get(&file.key) == Some(&etag) {
                Action::Skip
            } else {
                Action::Upload
            };
            tracing::debug!(key = %file.key, etag = %etag, ?action, "Planned");
            files.push(PlannedFile {
                file,
                checksum: etag,
                action,
            });
        }
        drop(checksums);

        files.sort_by(|a, b| a.file.key.cmp(&b.file.key));

        Ok(SyncPlan {
            tree,
            inventory,
            files,
        })
    }

    /// Perform a plan: uploads first, then deletions
    pub async fn execute<F>(&self, plan: SyncPlan, observer: F) -> Result<SyncReport>
    where
        F: Fn(&SyncEvent<'_>),
    {
        let SyncPlan {
            tree,
            inventory,
            files,
        } = plan;

        let mut pending = PendingChecksums::default();
        let mut report = SyncReport::default();

        let (skips, uploads): (Vec<PlannedFile>, Vec<PlannedFile>) =
            files.into_iter().partition(|f| f.action == Action::Skip);

        for planned in skips {
            tracing::debug!(key = %planned.file.key, "Unchanged, skipping");
            observer(&SyncEvent::Skipped {
                key: &planned.file.key,
            });
            pending.record(planned.file.key.clone(), planned.checksum);
            report.skipped.push(planned.file.key);
        }

        let store = self.store;
        let bucket = self.bucket.as_str();
        let chunk_size = self.options.chunk_size;

        // Set on the first failure; queued uploads that have not started yet
        // then return without touching the store
        let aborted = AtomicBool::new(false);
        let aborted = &aborted;

        let mut transfers = stream::iter(uploads)
            .map(|planned| async move {
                if aborted.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                let key = planned.file.key.as_str();
                let content_type = content_type_for(key);
                tracing::debug!(key, content_type, size = planned.file.size, "Uploading");
                let result = store
                    .upload_object(bucket, key, &planned.file.path, content_type, chunk_size)
                    .await;
                match result {
                    Ok(()) => Ok(Some(planned)),
                    Err(e) => Err(Error::Upload {
                        path: planned.file.path.clone(),
                        key: planned.file.key.to_string(),
                        source: Box::new(e),
                    }),
                }
            })
            .buffer_unordered(self.parallel());

        // In-flight uploads are drained rather than dropped so the store can
        // finish or clean up any multi-part upload it started
        let mut first_error = None;
        while let Some(result) = transfers.next().await {
            match result {
                Ok(Some(planned)) => {
                    tracing::info!(bucket, key = %planned.file.key, "Uploaded");
                    observer(&SyncEvent::Uploaded {
                        key: &planned.file.key,
                        size: planned.file.size,
                    });
                    pending.record(planned.file.key.clone(), planned.checksum);
                    report.uploaded.push(planned.file.key);
                }
                Ok(None) => {}
                Err(e) if first_error.is_none() => {
                    tracing::warn!(bucket, error = %e, "Upload failed, waiting for in-flight uploads");
                    aborted.store(true, Ordering::Relaxed);
                    first_error = Some(e);
                }
                Err(e) => tracing::warn!(bucket, error = %e, "Upload failed"),
            }
        }
        drop(transfers);

        if let Some(e) = first_error {
            return Err(e);
        }

        let mut stale: Vec<ObjectKey> = inventory
            .keys()
            .filter(|k| !pending.contains(k) && !tree.is_excluded(k.as_str()))
            .cloned()
            .collect();
        stale.sort();

        let mut removals = stream::iter(stale)
            .map(|key| async move {
                let result = store.delete_object(bucket, key.as_str()).await;
                (key, result)
            })
            .buffer_unordered(self.parallel());

        while let Some((key, result)) = removals.next().await {
            match result {
                Ok(()) => {
                    tracing::info!(bucket, key = %key, "Deleted");
                    observer(&SyncEvent::Deleted { key: &key });
                    report.deleted.push(key);
                }
                Err(e) => {
                    let error = Error::Delete {
                        key: key.to_string(),
                        source: Box::new(e),
                    };
                    tracing::warn!(bucket, key = %key, error = %error, "Delete failed");
                    observer(&SyncEvent::DeleteFailed {
                        key: &key,
                        error: &error,
                    });
                    report.failed.push(DeleteFailure {
                        message: error.root_cause().to_string(),
                        key,
                    });
                }
            }
        }

        report.sort();
        let summary = report.summary();
        tracing::info!(
            bucket,
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            deleted = summary.deleted,
            failed = summary.failed,
            "Sync finished"
        );
        Ok(report)
    }

    /// Plan and, unless this is a dry run, execute
    pub async fn run<F>(&self, root: &Path, observer: F) -> Result<SyncReport>
    where
        F: Fn(&SyncEvent<'_>),
    {
        let plan = self.plan(root).await?;
        if self.options.dry_run {
            return Ok(plan.into_dry_run_report());
        }
        self.execute(plan, observer).await
    }
}

/// Sync `root` into `bucket` without progress notifications
pub async fn sync<S: BucketStore + ?Sized>(
    store: &S,
    root: impl Into<PathBuf>,
    bucket: &str,
    options: SyncOptions,
) -> Result<SyncReport> {
    let root = root.into();
    SyncEngine::new(store, bucket, options)
        .run(&root, |_| {})
        .await
}
