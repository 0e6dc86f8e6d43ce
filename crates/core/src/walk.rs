//! Local tree enumeration
//!
//! Turns a site directory into `(path, key)` pairs. Traversal is depth-first
//! over walkdir's explicit stack, so deep trees do not recurse on the call
//! stack, and every call to [`LocalTree::iter`] starts a fresh walk.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Object key: the `/`-separated path of a file relative to the sync root
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        ObjectKey(key.into())
    }

    /// Build a key from a root-relative path
    ///
    /// Returns `None` for empty paths, paths that climb out of the root and
    /// names that are not valid UTF-8.
    pub fn from_relative(relative: &Path) -> Option<Self> {
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => parts.push(name.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if parts.is_empty() {
            None
        } else {
            Some(ObjectKey(parts.join("/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectKey {
    fn from(key: &str) -> Self {
        ObjectKey(key.to_string())
    }
}

/// A regular file found under the sync root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub key: ObjectKey,
    pub size: u64,
}

/// A directory tree to enumerate, with optional exclude patterns
#[derive(Debug, Clone)]
pub struct LocalTree {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
}

impl LocalTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
        }
    }

    /// Skip files whose key matches any of the glob `patterns`
    pub fn exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let compiled = glob::Pattern::new(pattern)
                .map_err(|e| Error::Config(format!("Invalid exclude pattern '{pattern}': {e}")))?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(key))
    }

    /// Start a new walk over the tree
    pub fn iter(&self) -> LocalFiles<'_> {
        LocalFiles {
            tree: self,
            inner: WalkDir::new(&self.root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter(),
        }
    }
}

impl<'a> IntoIterator for &'a LocalTree {
    type Item = Result<LocalFile>;
    type IntoIter = LocalFiles<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over the regular files of a [`LocalTree`]
pub struct LocalFiles<'a> {
    tree: &'a LocalTree,
    inner: walkdir::IntoIter,
}

impl Iterator for LocalFiles<'_> {
    type Item = Result<LocalFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    if let Some(ancestor) = err.loop_ancestor() {
                        tracing::warn!(
                            path = ?err.path(),
                            ancestor = %ancestor.display(),
                            "Skipping symlink loop"
                        );
                        continue;
                    }

                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.tree.root.clone());
                    let depth = err.depth();
                    let io = std::io::Error::from(err);

                    // Dangling symlinks and files removed mid-walk are not regular files
                    if depth > 0 && io.kind() == std::io::ErrorKind::NotFound {
                        tracing::debug!(path = %path.display(), "Skipping unresolvable entry");
                        continue;
                    }
                    return Some(Err(Error::local_io(path, io)));
                }
            };

            // A file root has no relative keys; walking it would look like an empty site
            if entry.depth() == 0 && !entry.file_type().is_dir() {
                return Some(Err(Error::local_io(
                    entry.path(),
                    std::io::Error::new(
                        std::io::ErrorKind::NotADirectory,
                        "sync root is not a directory",
                    ),
                )));
            }

            if !entry.file_type().is_file() {
                if !entry.file_type().is_dir() {
                    tracing::debug!(path = %entry.path().display(), "Skipping special file");
                }
                continue;
            }

            let relative = match entry.path().strip_prefix(&self.tree.root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            let Some(key) = ObjectKey::from_relative(relative) else {
                tracing::warn!(path = %entry.path().display(), "Skipping file without a valid key");
                continue;
            };

            if self.tree.is_excluded(key.as_str()) {
                tracing::debug!(key = %key, "Excluded");
                continue;
            }

            let size = match entry.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => return Some(Err(Error::local_io(entry.path(), e.into()))),
            };

            return Some(Ok(LocalFile {
                path: entry.into_path(),
                key,
                size,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn keys(tree: &LocalTree) -> Vec<String> {
        let mut keys: Vec<String> = tree
            .iter()
            .map(|f| f.unwrap().key.as_str().to_string())
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_key_normalisation() {
        let relative = Path::new("sub").join("dir").join("page.html");
        let key = ObjectKey::from_relative(&relative).unwrap();
        assert_eq!(key.as_str(), "sub/dir/page.html");
    }

    #[test]
    fn test_key_rejects_escaping_paths() {
        assert!(ObjectKey::from_relative(Path::new("")).is_none());
        assert!(ObjectKey::from_relative(Path::new("../x")).is_none());
        assert_eq!(
            ObjectKey::from_relative(Path::new("./a/b")).unwrap().as_str(),
            "a/b"
        );
    }

    #[test]
    fn test_walk_nested_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub/dir")).unwrap();
        std::fs::create_dir_all(root.join("empty")).unwrap();
        std::fs::write(root.join("index.html"), "<html>").unwrap();
        std::fs::write(root.join("sub/dir/page.html"), "page").unwrap();
        std::fs::write(root.join("sub/style.css"), "body{}").unwrap();

        let tree = LocalTree::new(root);
        assert_eq!(
            keys(&tree),
            vec!["index.html", "sub/dir/page.html", "sub/style.css"]
        );

        let page = tree
            .iter()
            .map(Result::unwrap)
            .find(|f| f.key.as_str() == "sub/dir/page.html")
            .unwrap();
        assert_eq!(page.size, 4);
        assert_eq!(page.path, root.join("sub").join("dir").join("page.html"));
    }

    #[test]
    fn test_walk_is_restartable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();

        let tree = LocalTree::new(dir.path());
        let first = keys(&tree);
        let second = keys(&tree);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_exclude_patterns() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("drafts")).unwrap();
        std::fs::write(dir.path().join("index.html"), "x").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), "x").unwrap();
        std::fs::write(dir.path().join("drafts/post.md"), "x").unwrap();

        let tree = LocalTree::new(dir.path())
            .exclude(&[".DS_Store", "drafts/*"])
            .unwrap();
        assert_eq!(keys(&tree), vec!["index.html"]);
        assert!(tree.is_excluded("drafts/other.md"));
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = LocalTree::new(".").exclude(&["[unclosed"]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let tree = LocalTree::new(dir.path().join("missing"));
        let items: Vec<_> = tree.iter().collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::LocalIo { .. })));
    }

    #[test]
    fn test_file_root_is_error() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<html>").unwrap();

        let items: Vec<_> = LocalTree::new(&file).iter().collect();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(Error::LocalIo { path, source }) => {
                assert_eq!(path, &file);
                assert_eq!(source.kind(), std::io::ErrorKind::NotADirectory);
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("real.txt"), "x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("dangling")).unwrap();

        let tree = LocalTree::new(dir.path());
        assert_eq!(keys(&tree), vec!["real.txt"]);
    }
}
