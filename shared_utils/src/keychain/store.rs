//! Boundary to the external secure store.

use thiserror::Error;

use super::SecretRef;
use crate::logging::Masked;

/// Status codes reported by a secure store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No matching item
    #[error("Item not found")]
    ItemNotFound,

    /// An item with the same attributes already exists
    #[error("Duplicate item")]
    DuplicateItem,

    /// The user dismissed the access prompt
    #[error("User canceled")]
    UserCanceled,

    /// Access denied by the store
    #[error("Authorization failed")]
    AuthFailed,

    /// Stored data could not be decoded
    #[error("Decode error")]
    Decode,

    /// Any other backend failure
    #[error("Store failure: {0}")]
    Other(String),
}

/// Attributes locating a secret in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SecretQuery {
    /// Account (username)
    pub account: String,
    /// Scope the secret belongs to
    pub scope: String,
    /// Optional access group sharing the item
    pub access_group: Option<String>,
    /// Optional user-defined attribute
    pub user_defined: Option<String>,
}

/// A secret to add to the store.
#[derive(Clone)]
pub struct SecretItem {
    /// Location attributes
    pub query: SecretQuery,
    /// Human-readable label
    pub label: Option<String>,
    /// Secret value
    pub secret: String,
}

impl std::fmt::Debug for SecretItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretItem")
            .field("query", &self.query)
            .field("label", &self.label)
            .field("secret", &Masked::sensitive(self.secret.as_str()))
            .finish()
    }
}

/// Secure key/value store keyed by account and scope.
pub trait SecretStore: Send + Sync {
    /// Add a new item and return its persistent reference.
    fn add(&self, item: SecretItem) -> Result<SecretRef, StoreError>;

    /// Copy the secret of the item matching `query`.
    fn copy_secret(&self, query: &SecretQuery) -> Result<String, StoreError>;

    /// Copy the persistent reference of the item matching `query`.
    fn copy_reference(&self, query: &SecretQuery) -> Result<SecretRef, StoreError>;

    /// Resolve a persistent reference to its secret.
    fn secret_for_reference(&self, reference: &SecretRef) -> Result<String, StoreError>;

    /// Delete the item matching `query`.
    fn delete(&self, query: &SecretQuery) -> Result<(), StoreError>;

    /// Add public key data tagged with `identifier`.
    fn add_key(&self, identifier: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Copy the public key tagged with `identifier`.
    fn copy_key(&self, identifier: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete the public key tagged with `identifier`.
    fn delete_key(&self, identifier: &str) -> Result<(), StoreError>;
}

impl<S: SecretStore + ?Sized> SecretStore for std::sync::Arc<S> {
    fn add(&self, item: SecretItem) -> Result<SecretRef, StoreError> {
        (**self).add(item)
    }

    fn copy_secret(&self, query: &SecretQuery) -> Result<String, StoreError> {
        (**self).copy_secret(query)
    }

    fn copy_reference(&self, query: &SecretQuery) -> Result<SecretRef, StoreError> {
        (**self).copy_reference(query)
    }

    fn secret_for_reference(&self, reference: &SecretRef) -> Result<String, StoreError> {
        (**self).secret_for_reference(reference)
    }

    fn delete(&self, query: &SecretQuery) -> Result<(), StoreError> {
        (**self).delete(query)
    }

    fn add_key(&self, identifier: &str, data: &[u8]) -> Result<(), StoreError> {
        (**self).add_key(identifier, data)
    }

    fn copy_key(&self, identifier: &str) -> Result<Vec<u8>, StoreError> {
        (**self).copy_key(identifier)
    }

    fn delete_key(&self, identifier: &str) -> Result<(), StoreError> {
        (**self).delete_key(identifier)
    }
}
