//! # Filesystem CAS Backend
//!
//! Stores payloads at `{root}/{digest_hex}.json`. The filename encodes the
//! content digest; on retrieval the digest is recomputed from the stored
//! bytes and verified against the requested id.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use subtle::ConstantTimeEq;

use pneuma_core::{sha256_digest, CanonicalBytes, ContentDigest};

use crate::{ContentStore, StoreError};

/// A content-addressed store backed by the local filesystem.
///
/// ## Integrity
///
/// On retrieval via [`get`](ContentStore::get), the stored bytes are
/// re-canonicalized and their SHA-256 digest is verified against the
/// filename. A mismatch is reported as [`StoreError::Integrity`].
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Create a store rooted at the given directory.
    ///
    /// The directory does not need to exist yet; it is created on the
    /// first `put`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &ContentDigest) -> PathBuf {
        self.root.join(format!("{}.json", id.to_hex()))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, value: &Value) -> Result<ContentDigest, StoreError> {
        let canonical = CanonicalBytes::new(value)?;
        let digest = sha256_digest(&canonical);

        fs::create_dir_all(&self.root)?;

        let path = self.path_for(&digest);
        // Atomic create-if-absent: OpenOptions::create_new(true) fails with
        // AlreadyExists if the file exists, eliminating the TOCTOU race
        // between exists() and write() under concurrent access.
        match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut f) => {
                f.write_all(canonical.as_bytes())?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Content-addressed: identical digest means identical content.
            }
            Err(e) => return Err(e.into()),
        }

        Ok(digest)
    }

    async fn get(&self, id: &ContentDigest) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;

        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Integrity(format!(
                "stored payload at {} is not valid JSON: {e}",
                path.display()
            ))
        })?;
        let recanon = CanonicalBytes::from_value(value.clone()).map_err(|e| {
            StoreError::Integrity(format!(
                "stored payload at {} failed re-canonicalization: {e}",
                path.display()
            ))
        })?;
        let recomputed = sha256_digest(&recanon);
        // Constant-time comparison of the raw 32-byte digests.
        if !bool::from(recomputed.as_bytes().ct_eq(id.as_bytes())) {
            return Err(StoreError::Integrity(format!(
                "payload at {} has digest {} but filename says {}",
                path.display(),
                recomputed.to_hex(),
                id.to_hex(),
            )));
        }

        Ok(Some(value))
    }

    async fn health(&self) -> Result<(), StoreError> {
        // Writable root is the liveness condition for a local store.
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}
