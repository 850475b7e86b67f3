// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory blob store fake for testing without filesystem I/O.

use formstate_core::config::{BlobError, BlobStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory implementation of [`BlobStore`] for testing.
///
/// Clones share state, so a test can hand one clone to an
/// `EditStateStore` and inspect writes through another.
///
/// # Example
///
/// ```
/// use formstate_dry_tests::InMemoryBlobStore;
/// use formstate_core::config::SettingsService;
///
/// let store = InMemoryBlobStore::new();
/// let service = SettingsService::new(store.clone());
///
/// service.save("formstate", &serde_json::json!({"retention_minutes": 5})).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.contains_key("formstate"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent loads fail.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Make subsequent saves fail.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Number of `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Number of `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Raw bytes stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }

    /// Store `data` under `key` without counting it as a save.
    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.lock().data.insert(key.to_owned(), data.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BlobStore for InMemoryBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let mut inner = self.lock();
        inner.load_count += 1;

        if inner.fail_on_load {
            return Err(BlobError::Other("simulated load failure".into()));
        }

        inner.data.get(key).cloned().ok_or(BlobError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let mut inner = self.lock();
        inner.save_count += 1;

        if inner.fail_on_save {
            return Err(BlobError::Other("simulated save failure".into()));
        }

        inner.data.insert(key.to_owned(), data.to_vec());
        Ok(())
    }
}
