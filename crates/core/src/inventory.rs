//! Remote inventory loading
//!
//! Pages through a bucket listing and collects `key -> tag`. The load is all
//! or nothing: a failed page fails the whole load, because the sync engine
//! decides deletions from this map.

use std::collections::HashMap;

use crate::checksum::ETag;
use crate::error::{Error, Result};
use crate::traits::{BucketStore, RemoteObject};
use crate::walk::ObjectKey;

/// Snapshot of the objects in a bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteInventory {
    entries: HashMap<ObjectKey, ETag>,
}

impl RemoteInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key; a later insert of the same key wins
    pub fn insert(&mut self, key: ObjectKey, etag: ETag) {
        self.entries.insert(key, etag);
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&ETag> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(ObjectKey, ETag)> for RemoteInventory {
    fn from_iter<I: IntoIterator<Item = (ObjectKey, ETag)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// List every object in `bucket`, following continuation tokens
pub async fn list_all_objects(
    store: &(impl BucketStore + ?Sized),
    bucket: &str,
) -> Result<Vec<RemoteObject>> {
    let mut objects = Vec::new();
    let mut continuation_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store.list_objects(bucket, continuation_token.take()).await?;
        pages += 1;
        tracing::debug!(bucket, page = pages, objects = page.objects.len(), "Listed page");

        objects.extend(page.objects);

        match page.next_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    Ok(objects)
}

/// Load the current `key -> tag` map of `bucket`
///
/// Any listing failure is reported as [`Error::RemoteUnavailable`].
pub async fn load_inventory(
    store: &(impl BucketStore + ?Sized),
    bucket: &str,
) -> Result<RemoteInventory> {
    let objects = list_all_objects(store, bucket)
        .await
        .map_err(|e| Error::RemoteUnavailable {
            bucket: bucket.to_string(),
            source: Box::new(e),
        })?;

    let inventory: RemoteInventory = objects
        .into_iter()
        .map(|obj| (ObjectKey::new(obj.key), obj.etag))
        .collect();

    tracing::info!(bucket, objects = inventory.len(), "Loaded remote inventory");
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockBucketStore, ObjectPage};
    use mockall::predicate::eq;

    fn object(key: &str, tag: &str) -> RemoteObject {
        RemoteObject::new(key, ETag::from_remote(tag), 1)
    }

    #[tokio::test]
    async fn test_load_inventory_follows_pages() {
        let mut store = MockBucketStore::new();
        store
            .expect_list_objects()
            .with(eq("site"), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(ObjectPage {
                    objects: vec![object("a.html", "\"A\""), object("b.html", "\"B\"")],
                    next_token: Some("t1".to_string()),
                })
            });
        store
            .expect_list_objects()
            .with(eq("site"), eq(Some("t1".to_string())))
            .times(1)
            .returning(|_, _| {
                Ok(ObjectPage {
                    objects: vec![object("c/d.css", "\"C-2\"")],
                    next_token: None,
                })
            });

        let inventory = load_inventory(&store, "site").await.unwrap();
        assert_eq!(inventory.len(), 3);
        assert_eq!(
            inventory.get(&ObjectKey::from("c/d.css")),
            Some(&ETag::from_remote("\"C-2\""))
        );
    }

    #[tokio::test]
    async fn test_duplicate_key_last_seen_wins() {
        let mut store = MockBucketStore::new();
        store
            .expect_list_objects()
            .with(eq("site"), eq(None::<String>))
            .returning(|_, _| {
                Ok(ObjectPage {
                    objects: vec![object("a", "\"old\"")],
                    next_token: Some("next".to_string()),
                })
            });
        store
            .expect_list_objects()
            .with(eq("site"), eq(Some("next".to_string())))
            .returning(|_, _| {
                Ok(ObjectPage {
                    objects: vec![object("a", "\"new\"")],
                    next_token: None,
                })
            });

        let inventory = load_inventory(&store, "site").await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(
            inventory.get(&ObjectKey::from("a")).unwrap().as_str(),
            "\"new\""
        );
    }

    #[tokio::test]
    async fn test_failed_page_returns_no_partial_inventory() {
        let mut store = MockBucketStore::new();
        store
            .expect_list_objects()
            .with(eq("site"), eq(None::<String>))
            .returning(|_, _| {
                Ok(ObjectPage {
                    objects: vec![object("a", "\"A\"")],
                    next_token: Some("t1".to_string()),
                })
            });
        store
            .expect_list_objects()
            .with(eq("site"), eq(Some("t1".to_string())))
            .returning(|_, _| Err(Error::Network("503 Service Unavailable".to_string())));

        let err = load_inventory(&store, "site").await.unwrap_err();
        match err {
            Error::RemoteUnavailable { bucket, source } => {
                assert_eq!(bucket, "site");
                assert!(matches!(*source, Error::Network(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let mut store = MockBucketStore::new();
        store
            .expect_list_objects()
            .returning(|_, _| Ok(ObjectPage::default()));

        let inventory = load_inventory(&store, "site").await.unwrap();
        assert!(inventory.is_empty());
    }
}
