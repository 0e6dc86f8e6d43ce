//! Local entity-tag calculation
//!
//! S3 tags a single-part object with the quoted MD5 of its body. A multi-part
//! object gets the MD5 of the concatenated raw part digests followed by
//! `-<part count>`. Computing the same token locally with the same chunk size
//! as the uploader lets the sync engine compare against the stored tag
//! without downloading anything.

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Chunk size shared by checksum calculation and multi-part uploads (8 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Smallest part S3 accepts in a multi-part upload, except the last (5 MiB)
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Largest part S3 accepts in a multi-part upload (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Check that `chunk_size` is a part size S3 will accept
pub fn check_part_size(chunk_size: usize) -> Result<()> {
    if chunk_size < MIN_PART_SIZE || chunk_size as u64 > MAX_PART_SIZE {
        return Err(Error::Config(format!(
            "chunk size {chunk_size} is outside the S3 part size range (5 MiB to 5 GiB)"
        )));
    }
    Ok(())
}

/// An entity tag in the quoted form S3 reports it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Tag of a file with no content
    pub fn empty() -> Self {
        ETag("\"\"".to_string())
    }

    /// Normalise a tag received from a store
    ///
    /// Some S3-compatible services drop the surrounding quotes; they are put
    /// back so remote and local tags compare textually.
    pub fn from_remote(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
            ETag(raw.to_string())
        } else {
            ETag(format!("\"{}\"", raw.trim_matches('"')))
        }
    }

    /// Build a tag from per-chunk digests in read order
    pub fn from_digests(digests: &[md5::Digest]) -> Self {
        match digests {
            [] => ETag::empty(),
            [single] => ETag(format!("\"{single:x}\"")),
            parts => {
                let mut ctx = md5::Context::new();
                for digest in parts {
                    ctx.consume(digest.0);
                }
                ETag(format!("\"{:x}-{}\"", ctx.compute(), parts.len()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of parts for a multi-part tag, `None` for single-part tags
    pub fn part_count(&self) -> Option<usize> {
        let inner = self.0.trim_matches('"');
        let (_, count) = inner.rsplit_once('-')?;
        count.parse().ok()
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the entity tag of a file
///
/// The file is read sequentially in chunks of exactly `chunk_size` bytes; only
/// the last chunk may be shorter.
pub fn checksum(path: &Path, chunk_size: usize) -> Result<ETag> {
    if chunk_size == 0 {
        return Err(Error::Config("chunk size must be positive".to_string()));
    }

    let mut file = File::open(path).map_err(|e| Error::local_io(path, e))?;
    let mut buf = vec![0u8; chunk_size];
    let mut digests = Vec::new();

    loop {
        let filled = read_chunk(&mut file, &mut buf).map_err(|e| Error::local_io(path, e))?;
        if filled == 0 {
            break;
        }
        digests.push(md5::compute(&buf[..filled]));
        if filled < chunk_size {
            break;
        }
    }

    Ok(ETag::from_digests(&digests))
}

/// Compute the entity tag of an in-memory body
pub fn checksum_bytes(data: &[u8], chunk_size: usize) -> ETag {
    let digests: Vec<md5::Digest> = data.chunks(chunk_size.max(1)).map(md5::compute).collect();
    ETag::from_digests(&digests)
}

/// Fill `buf` from `reader`, stopping early only at end of input
fn read_chunk(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty", b"");

        let tag = checksum(&path, 4).unwrap();
        assert_eq!(tag.as_str(), "\"\"");
        assert_eq!(tag, ETag::empty());
    }

    #[test]
    fn test_single_chunk_known_value() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");

        let tag = checksum(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(tag.as_str(), "\"5eb63bbbe01eeed093cb22bb8f5acdc3\"");
        assert_eq!(tag.part_count(), None);
    }

    #[test]
    fn test_ten_bytes_in_chunks_of_four() {
        let dir = TempDir::new().unwrap();
        let data = b"0123456789";
        let path = write_file(&dir, "ten", data);

        let mut ctx = md5::Context::new();
        ctx.consume(md5::compute(&data[0..4]).0);
        ctx.consume(md5::compute(&data[4..8]).0);
        ctx.consume(md5::compute(&data[8..10]).0);
        let expected = format!("\"{:x}-3\"", ctx.compute());

        let tag = checksum(&path, 4).unwrap();
        assert_eq!(tag.as_str(), expected);
        assert_eq!(tag.part_count(), Some(3));
    }

    #[test]
    fn test_chunk_larger_than_file_is_single_part() {
        let dir = TempDir::new().unwrap();
        let data = b"0123456789";
        let path = write_file(&dir, "ten", data);

        let tag = checksum(&path, 20).unwrap();
        assert_eq!(tag.as_str(), format!("\"{:x}\"", md5::compute(data)));
    }

    #[test]
    fn test_exact_chunk_boundary_is_single_part() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "four", b"abcd");

        let tag = checksum(&path, 4).unwrap();
        assert_eq!(tag.part_count(), None);
    }

    #[test]
    fn test_deterministic_and_path_independent() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let a = write_file(&dir, "a.bin", &data);
        let b = write_file(&dir, "b.bin", &data);

        let first = checksum(&a, 1024).unwrap();
        assert_eq!(first, checksum(&a, 1024).unwrap());
        assert_eq!(first, checksum(&b, 1024).unwrap());
        assert_eq!(first, checksum_bytes(&data, 1024));
    }

    #[test]
    fn test_missing_file_is_local_io_error() {
        let dir = TempDir::new().unwrap();
        let result = checksum(&dir.path().join("nope"), 4);
        assert!(matches!(result, Err(Error::LocalIo { .. })));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "x", b"x");
        assert!(matches!(checksum(&path, 0), Err(Error::Config(_))));
    }

    #[test]
    fn test_part_size_bounds() {
        assert!(check_part_size(DEFAULT_CHUNK_SIZE).is_ok());
        assert!(check_part_size(MIN_PART_SIZE).is_ok());
        assert!(matches!(check_part_size(MIN_PART_SIZE - 1), Err(Error::Config(_))));
        assert!(matches!(check_part_size(1024 * 1024), Err(Error::Config(_))));
        assert!(check_part_size(0).is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_part_size_above_five_gib_rejected() {
        assert!(check_part_size(MAX_PART_SIZE as usize).is_ok());
        assert!(check_part_size(MAX_PART_SIZE as usize + 1).is_err());
    }

    #[test]
    fn test_from_remote_normalises_quotes() {
        assert_eq!(ETag::from_remote("\"abc\"").as_str(), "\"abc\"");
        assert_eq!(ETag::from_remote("abc").as_str(), "\"abc\"");
        assert_eq!(ETag::from_remote("\"\"").as_str(), "\"\"");
        assert_eq!(ETag::from_remote("\"abc-2\"").part_count(), Some(2));
    }
}
