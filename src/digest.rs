//! Content-digest collaborator: change detection for the extraction cache.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use xxhash_rust::xxh3::Xxh3;

/// Computes a content digest of a file's current bytes.
///
/// The digest keys the extraction cache, so it only needs to be
/// collision-resistant for change detection, not adversarially secure.
/// Failure (missing or unreadable file) is caught by the core and treated as
/// "unresolved, drop the cache entry" — it never aborts a session.
pub trait ContentDigest: Send + Sync {
    fn digest(&self, path: &Path) -> Result<String>;
}

/// Default digest: streaming XXH3 over the file in 8 KiB chunks, formatted
/// as a 16-char hex string.
#[derive(Debug, Default)]
pub struct Xxh3Digest;

impl ContentDigest for Xxh3Digest {
    fn digest(&self, path: &Path) -> Result<String> {
        let mut file = fs::File::open(path)
            .with_context(|| format!("Failed to open file for hashing {}", path.display()))?;
        let mut hasher = Xxh3::new();
        let mut buf = [0u8; 8192];

        loop {
            let n = file
                .read(&mut buf)
                .with_context(|| format!("Failed to read {} while hashing", path.display()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        Ok(format!("{:016x}", hasher.digest()))
    }
}
