//! In-memory secure store used by the simulated tunnel and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::store::{SecretItem, SecretQuery, SecretStore, StoreError};
use super::SecretRef;

#[derive(Debug)]
struct Entry {
    reference: SecretRef,
    secret: String,
    #[allow(dead_code)]
    label: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<SecretQuery, Entry>>,
    keys: Mutex<HashMap<String, Vec<u8>>>,
    access_denied: AtomicBool,
    fail_adds: AtomicBool,
}

/// Volatile [`SecretStore`]; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<Inner>,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MemorySecretStore::default()
    }

    /// Make every read answer as if the user dismissed the access prompt.
    pub fn set_access_denied(&self, denied: bool) {
        self.inner.access_denied.store(denied, Ordering::SeqCst);
    }

    /// Make every add fail.
    pub fn set_fail_adds(&self, fail: bool) {
        self.inner.fail_adds.store(fail, Ordering::SeqCst);
    }

    /// Number of stored secrets, public keys excluded.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SecretQuery, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn keys(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.inner
            .keys
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_access(&self) -> Result<(), StoreError> {
        if self.inner.access_denied.load(Ordering::SeqCst) {
            return Err(StoreError::UserCanceled);
        }
        Ok(())
    }
}

impl SecretStore for MemorySecretStore {
    fn add(&self, item: SecretItem) -> Result<SecretRef, StoreError> {
        if self.inner.fail_adds.load(Ordering::SeqCst) {
            return Err(StoreError::Other("add rejected".to_string()));
        }
        let mut entries = self.entries();
        if entries.contains_key(&item.query) {
            return Err(StoreError::DuplicateItem);
        }
        let reference = SecretRef(Uuid::new_v4().to_string());
        entries.insert(
            item.query,
            Entry {
                reference: reference.clone(),
                secret: item.secret,
                label: item.label,
            },
        );
        Ok(reference)
    }

    fn copy_secret(&self, query: &SecretQuery) -> Result<String, StoreError> {
        self.check_access()?;
        self.entries()
            .get(query)
            .map(|entry| entry.secret.clone())
            .ok_or(StoreError::ItemNotFound)
    }

    fn copy_reference(&self, query: &SecretQuery) -> Result<SecretRef, StoreError> {
        self.check_access()?;
        self.entries()
            .get(query)
            .map(|entry| entry.reference.clone())
            .ok_or(StoreError::ItemNotFound)
    }

    fn secret_for_reference(&self, reference: &SecretRef) -> Result<String, StoreError> {
        self.check_access()?;
        self.entries()
            .values()
            .find(|entry| &entry.reference == reference)
            .map(|entry| entry.secret.clone())
            .ok_or(StoreError::ItemNotFound)
    }

    fn delete(&self, query: &SecretQuery) -> Result<(), StoreError> {
        self.entries()
            .remove(query)
            .map(|_| ())
            .ok_or(StoreError::ItemNotFound)
    }

    fn add_key(&self, identifier: &str, data: &[u8]) -> Result<(), StoreError> {
        if self.inner.fail_adds.load(Ordering::SeqCst) {
            return Err(StoreError::Other("add rejected".to_string()));
        }
        let mut keys = self.keys();
        if keys.contains_key(identifier) {
            return Err(StoreError::DuplicateItem);
        }
        keys.insert(identifier.to_string(), data.to_vec());
        Ok(())
    }

    fn copy_key(&self, identifier: &str) -> Result<Vec<u8>, StoreError> {
        self.check_access()?;
        self.keys()
            .get(identifier)
            .cloned()
            .ok_or(StoreError::ItemNotFound)
    }

    fn delete_key(&self, identifier: &str) -> Result<(), StoreError> {
        self.keys()
            .remove(identifier)
            .map(|_| ())
            .ok_or(StoreError::ItemNotFound)
    }
}
