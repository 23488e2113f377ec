//! Credential storage for tunnel secrets.
//!
//! [`CredentialAdapter`] turns controller-level requests ("store this
//! password for this account") into calls against an external
//! [`SecretStore`], and folds the store's status codes into the three
//! [`CredentialError`] variants callers care about.

mod memory;
mod store;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CoreConfig;

pub use memory::MemorySecretStore;
pub use store::{SecretItem, SecretQuery, SecretStore, StoreError};

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Errors surfaced by [`CredentialAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The secret could not be added (duplicate or store failure)
    #[error("Unable to add secret")]
    Add,

    /// No secret exists for the request
    #[error("Secret not found")]
    NotFound,

    /// The user cancelled the access prompt or access was denied
    #[error("Operation cancelled or unauthorized")]
    UserCancelled,
}

/// Opaque, persistent reference to a stored secret.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(pub String);

impl fmt::Debug for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretRef({})", self.0)
    }
}

/// Optional attributes attached to a stored secret.
#[derive(Debug, Clone, Default)]
pub struct SecretOptions {
    /// Free-form user-defined attribute, part of the lookup scope
    pub user_defined: Option<String>,
    /// Human-readable label
    pub label: Option<String>,
}

/// Outcome of [`CredentialAdapter::store_tracked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
    pub reference: SecretRef,
    /// `false` when an identical secret was already on file
    pub added: bool,
}

/// Maps credential requests onto a [`SecretStore`].
#[derive(Debug, Clone)]
pub struct CredentialAdapter<S> {
    store: S,
    access_group: Option<String>,
}

impl<S: SecretStore> CredentialAdapter<S> {
    /// Create an adapter over `store`, optionally confined to an access group.
    pub fn new(store: S, access_group: Option<String>) -> Self {
        CredentialAdapter {
            store,
            access_group,
        }
    }

    /// Create an adapter confined to the configured access group.
    pub fn from_config(store: S, config: &CoreConfig) -> Self {
        CredentialAdapter::new(store, config.keychain.access_group.clone())
    }

    /// The underlying store.
    pub fn store_backend(&self) -> &S {
        &self.store
    }

    /// Store `secret` for `account` in `scope` and return its reference.
    ///
    /// Storing the secret already on file returns the existing reference
    /// untouched; a different secret replaces the old entry.
    pub fn store(&self, secret: &str, account: &str, scope: &str) -> CredentialResult<SecretRef> {
        self.store_with(secret, account, scope, &SecretOptions::default())
    }

    /// Like [`store`](Self::store), with extra attributes.
    pub fn store_with(
        &self,
        secret: &str,
        account: &str,
        scope: &str,
        options: &SecretOptions,
    ) -> CredentialResult<SecretRef> {
        self.store_tracked(secret, account, scope, options)
            .map(|stored| stored.reference)
    }

    /// Store like [`store_with`](Self::store_with), reporting whether a new
    /// entry was added rather than an identical one reused.
    pub fn store_tracked(
        &self,
        secret: &str,
        account: &str,
        scope: &str,
        options: &SecretOptions,
    ) -> CredentialResult<StoredSecret> {
        let query = self.query(account, scope, options.user_defined.as_deref());

        match self.lookup_query(&query) {
            Ok(current) if current == secret => {
                debug!(account = %account, scope = %scope, "Secret unchanged, reusing reference");
                return self.reference_query(&query).map(|reference| StoredSecret {
                    reference,
                    added: false,
                });
            }
            Ok(_) => {
                debug!(account = %account, scope = %scope, "Replacing existing secret");
                self.remove_query(&query);
            }
            // a cancelled prompt is never "no existing secret"
            Err(CredentialError::UserCancelled) => return Err(CredentialError::UserCancelled),
            Err(_) => {}
        }

        let item = SecretItem {
            query,
            label: options.label.clone(),
            secret: secret.to_string(),
        };
        let reference = self.store.add(item).map_err(|e| {
            warn!(account = %account, scope = %scope, error = %e, "Failed to add secret");
            CredentialError::Add
        })?;
        Ok(StoredSecret {
            reference,
            added: true,
        })
    }

    /// Fetch the secret stored for `account` in `scope`.
    pub fn lookup(&self, account: &str, scope: &str) -> CredentialResult<String> {
        self.lookup_with(account, scope, &SecretOptions::default())
    }

    /// Like [`lookup`](Self::lookup), matching the user-defined attribute of `options`.
    pub fn lookup_with(
        &self,
        account: &str,
        scope: &str,
        options: &SecretOptions,
    ) -> CredentialResult<String> {
        self.lookup_query(&self.query(account, scope, options.user_defined.as_deref()))
    }

    /// Fetch the reference of the secret stored for `account` in `scope`.
    pub fn lookup_reference(&self, account: &str, scope: &str) -> CredentialResult<SecretRef> {
        self.lookup_reference_with(account, scope, &SecretOptions::default())
    }

    /// Like [`lookup_reference`](Self::lookup_reference), matching the user-defined attribute.
    pub fn lookup_reference_with(
        &self,
        account: &str,
        scope: &str,
        options: &SecretOptions,
    ) -> CredentialResult<SecretRef> {
        self.reference_query(&self.query(account, scope, options.user_defined.as_deref()))
    }

    /// Fetch the secret a reference points to.
    pub fn lookup_by_reference(&self, reference: &SecretRef) -> CredentialResult<String> {
        self.store
            .secret_for_reference(reference)
            .map_err(CredentialError::from)
    }

    /// Remove the secret stored for `account` in `scope`.
    pub fn remove(&self, account: &str, scope: &str) -> bool {
        self.remove_with(account, scope, &SecretOptions::default())
    }

    /// Like [`remove`](Self::remove), matching the user-defined attribute.
    pub fn remove_with(&self, account: &str, scope: &str, options: &SecretOptions) -> bool {
        self.remove_query(&self.query(account, scope, options.user_defined.as_deref()))
    }

    /// Add a public key under `identifier` and return the stored key data.
    pub fn add_public_key(&self, identifier: &str, data: &[u8]) -> CredentialResult<Vec<u8>> {
        self.store.add_key(identifier, data).map_err(|e| {
            warn!(identifier = %identifier, error = %e, "Failed to add public key");
            CredentialError::Add
        })?;
        self.public_key(identifier)
    }

    /// Fetch the public key stored under `identifier`.
    pub fn public_key(&self, identifier: &str) -> CredentialResult<Vec<u8>> {
        self.store.copy_key(identifier).map_err(CredentialError::from)
    }

    /// Remove the public key stored under `identifier`.
    pub fn remove_public_key(&self, identifier: &str) -> bool {
        self.store.delete_key(identifier).is_ok()
    }

    fn query(&self, account: &str, scope: &str, user_defined: Option<&str>) -> SecretQuery {
        SecretQuery {
            account: account.to_string(),
            scope: scope.to_string(),
            access_group: self.access_group.clone(),
            user_defined: user_defined.map(str::to_string),
        }
    }

    fn lookup_query(&self, query: &SecretQuery) -> CredentialResult<String> {
        self.store.copy_secret(query).map_err(CredentialError::from)
    }

    fn reference_query(&self, query: &SecretQuery) -> CredentialResult<SecretRef> {
        self.store.copy_reference(query).map_err(CredentialError::from)
    }

    fn remove_query(&self, query: &SecretQuery) -> bool {
        self.store.delete(query).is_ok()
    }
}

impl From<StoreError> for CredentialError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserCanceled | StoreError::AuthFailed => CredentialError::UserCancelled,
            _ => CredentialError::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> CredentialAdapter<MemorySecretStore> {
        CredentialAdapter::new(MemorySecretStore::new(), None)
    }

    #[test]
    fn test_store_and_lookup() {
        let adapter = adapter();
        let reference = adapter.store("s3cret", "alice", "com.example.vpn").unwrap();

        assert_eq!(adapter.lookup("alice", "com.example.vpn").unwrap(), "s3cret");
        assert_eq!(adapter.lookup_by_reference(&reference).unwrap(), "s3cret");
        assert_eq!(adapter.lookup_reference("alice", "com.example.vpn").unwrap(), reference);
    }

    #[test]
    fn test_store_same_secret_is_idempotent() {
        let adapter = adapter();
        let first = adapter.store("s3cret", "alice", "scope").unwrap();
        let second = adapter.store("s3cret", "alice", "scope").unwrap();

        assert_eq!(first, second);
        assert_eq!(adapter.store_backend().len(), 1);
    }

    #[test]
    fn test_store_different_secret_replaces() {
        let adapter = adapter();
        let first = adapter.store("old", "alice", "scope").unwrap();
        let second = adapter.store("new", "alice", "scope").unwrap();

        assert_ne!(first, second);
        assert_eq!(adapter.lookup("alice", "scope").unwrap(), "new");
        assert_eq!(adapter.store_backend().len(), 1);
        assert_eq!(adapter.lookup_by_reference(&first), Err(CredentialError::NotFound));
    }

    #[test]
    fn test_store_tracked_reports_added_entries() {
        let adapter = adapter();
        let options = SecretOptions::default();

        let first = adapter.store_tracked("s3cret", "alice", "scope", &options).unwrap();
        assert!(first.added);
        let again = adapter.store_tracked("s3cret", "alice", "scope", &options).unwrap();
        assert!(!again.added);
        assert_eq!(again.reference, first.reference);
        let replaced = adapter.store_tracked("other", "alice", "scope", &options).unwrap();
        assert!(replaced.added);
    }

    #[test]
    fn test_lookup_missing() {
        let adapter = adapter();
        assert_eq!(adapter.lookup("bob", "scope"), Err(CredentialError::NotFound));
        assert!(!adapter.remove("bob", "scope"));
    }

    #[test]
    fn test_cancel_during_existing_check_propagates() {
        let adapter = adapter();
        adapter.store("s3cret", "alice", "scope").unwrap();
        adapter.store_backend().set_access_denied(true);

        assert_eq!(
            adapter.store("other", "alice", "scope"),
            Err(CredentialError::UserCancelled)
        );
        adapter.store_backend().set_access_denied(false);
        assert_eq!(adapter.lookup("alice", "scope").unwrap(), "s3cret");
    }

    #[test]
    fn test_add_failure() {
        let adapter = adapter();
        adapter.store_backend().set_fail_adds(true);
        assert_eq!(adapter.store("s3cret", "alice", "scope"), Err(CredentialError::Add));
    }

    #[test]
    fn test_access_group_scopes_entries() {
        let store = MemorySecretStore::new();
        let grouped = CredentialAdapter::new(store.clone(), Some("group.example".to_string()));
        let plain = CredentialAdapter::new(store, None);

        grouped.store("s3cret", "alice", "scope").unwrap();
        assert_eq!(plain.lookup("alice", "scope"), Err(CredentialError::NotFound));
        assert_eq!(grouped.lookup("alice", "scope").unwrap(), "s3cret");
    }
}
