//! Abstract storage traits for CosmoQL.
//!
//! The store is a small document store: each document kind declares its id,
//! filter and patch types through [`Document`], and every backend implements
//! [`DocumentStore`] once per kind. By using traits, we enable:
//! - In-memory backends for testing and embedded use
//! - Persistent backends for production

use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::DocumentKind;

/// Errors that can occur during storage operations.
///
/// `Clone` so that a single failed batch fetch can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Key already exists.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// A kind of document the store can hold.
pub trait Document: Clone + Send + Sync + 'static {
    /// Identity type.
    type Id: Copy + Eq + Hash + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Selection predicate understood by every backend.
    type Filter: fmt::Debug + Send + Sync;
    /// In-place modification understood by every backend.
    type Patch: fmt::Debug + Send + Sync;

    /// Label used in logs and errors.
    const KIND: DocumentKind;

    /// Returns the document identity.
    fn id(&self) -> Self::Id;

    /// Returns true if the document is selected by `filter`.
    fn matches(&self, filter: &Self::Filter) -> bool;

    /// Applies `patch`. Returns true if the document changed.
    fn apply(&mut self, patch: &Self::Patch) -> bool;

    /// Builds the "id in {ids}" filter used for batched lookups.
    fn id_in(ids: Vec<Self::Id>) -> Self::Filter;
}

/// Storage trait for one document kind.
///
/// # Safety Considerations
/// - Every single-document write is atomic
/// - Multi-document writes (`update_many`) are applied document by document
///   with no isolation from concurrent writers
#[async_trait]
pub trait DocumentStore<D: Document>: Send + Sync {
    /// Find all documents matching `filter`, in insertion order.
    async fn find(&self, filter: &D::Filter) -> Result<Vec<D>, StorageError>;

    /// Find the first document matching `filter`.
    async fn find_one(&self, filter: &D::Filter) -> Result<Option<D>, StorageError> {
        Ok(self.find(filter).await?.into_iter().next())
    }

    /// Insert a new document. Returns error if its id already exists.
    async fn insert_one(&self, document: D) -> Result<D, StorageError>;

    /// Patch the first matching document and return it after the patch.
    ///
    /// Returns `Ok(None)` when nothing matched.
    async fn update_one(
        &self,
        filter: &D::Filter,
        patch: &D::Patch,
    ) -> Result<Option<D>, StorageError>;

    /// Delete the first matching document and return its last state.
    ///
    /// Returns `Ok(None)` when nothing matched.
    async fn delete_one(&self, filter: &D::Filter) -> Result<Option<D>, StorageError>;

    /// Patch every matching document. Returns the number of documents matched.
    async fn update_many(&self, filter: &D::Filter, patch: &D::Patch) -> Result<u64, StorageError>;
}
