//! # In-Memory Backend
//!
//! Test double for the content store. Counts writes so idempotency tests
//! can assert exactly-once storage, and can be switched into a failing
//! mode to exercise error paths.
//!
//! ## Warning
//!
//! Contents live only as long as the process. Suitable for tests and local
//! experimentation, never for deployment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use pneuma_core::{sha256_digest, CanonicalBytes, ContentDigest};

use crate::{ContentStore, StoreError};

/// In-memory content store.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    entries: RwLock<HashMap<String, Value>>,
    puts: AtomicU64,
    failing: AtomicBool,
}

impl MemoryContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls that performed a write.
    pub fn put_count(&self) -> u64 {
        self.puts.load(Ordering::SeqCst)
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Switch every subsequent operation into failure mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, value: &Value) -> Result<ContentDigest, StoreError> {
        self.check_available()?;
        let canonical = CanonicalBytes::new(value)?;
        let digest = sha256_digest(&canonical);

        let mut entries = self.entries.write();
        if !entries.contains_key(&digest.to_hex()) {
            entries.insert(digest.to_hex(), value.clone());
            self.puts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(digest)
    }

    async fn get(&self, id: &ContentDigest) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self.entries.read().get(&id.to_hex()).cloned())
    }

    async fn health(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
