//! In-memory storage backend.
//!
//! This module provides a thread-safe in-memory implementation of
//! [`DocumentStore`]. It is intended for embedded usage, tests, and as the
//! index underneath the persistent backend, which plugs a write-ahead log in
//! through the [`Journal`] hook.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::cosmonaut::Cosmonaut;
use crate::storage::traits::{Document, DocumentStore, StorageError};
use crate::storage::Stores;
use crate::superpower::Superpower;

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

/// Durability hook invoked before a change is applied to the in-memory state.
///
/// A failing hook aborts the write and leaves the in-memory state untouched.
pub trait Journal<D: Document>: Send + Sync {
    /// Records the full post-change state of a document.
    fn record_put(&self, document: &D) -> Result<(), StorageError>;

    /// Records the removal of a document.
    fn record_delete(&self, id: D::Id) -> Result<(), StorageError>;
}

/// Journal that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJournal;

impl<D: Document> Journal<D> for NoJournal {
    fn record_put(&self, _document: &D) -> Result<(), StorageError> {
        Ok(())
    }

    fn record_delete(&self, _id: D::Id) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Documents keyed by insertion sequence so scans come back in insertion order.
#[derive(Debug)]
pub(crate) struct CollectionState<D: Document> {
    docs: BTreeMap<u64, D>,
    seq_by_id: HashMap<D::Id, u64>,
    next_seq: u64,
}

impl<D: Document> CollectionState<D> {
    fn new() -> Self {
        Self {
            docs: BTreeMap::new(),
            seq_by_id: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Inserts or replaces a document. A replaced document keeps its position.
    pub(crate) fn put(&mut self, document: D) {
        let id = document.id();
        if let Some(seq) = self.seq_by_id.get(&id) {
            self.docs.insert(*seq, document);
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.seq_by_id.insert(id, seq);
        self.docs.insert(seq, document);
    }

    pub(crate) fn remove(&mut self, id: D::Id) -> Option<D> {
        let seq = self.seq_by_id.remove(&id)?;
        self.docs.remove(&seq)
    }

    fn contains(&self, id: D::Id) -> bool {
        self.seq_by_id.contains_key(&id)
    }

    fn matching<'a>(&'a self, filter: &'a D::Filter) -> impl Iterator<Item = &'a D> + 'a {
        self.docs.values().filter(move |doc| doc.matches(filter))
    }

    pub(crate) fn documents(&self) -> impl Iterator<Item = &D> {
        self.docs.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }
}

/// Thread-safe collection of one document kind.
pub struct Collection<D: Document, J: Journal<D> = NoJournal> {
    state: RwLock<CollectionState<D>>,
    journal: J,
}

/// Collection without durability.
pub type InMemoryCollection<D> = Collection<D, NoJournal>;

impl<D: Document> Default for Collection<D, NoJournal> {
    fn default() -> Self {
        Self::with_journal(NoJournal)
    }
}

impl<D: Document> Collection<D, NoJournal> {
    /// Create a new empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: Document, J: Journal<D>> Collection<D, J> {
    /// Create an empty collection that journals through `journal`.
    #[must_use]
    pub fn with_journal(journal: J) -> Self {
        Self {
            state: RwLock::new(CollectionState::new()),
            journal,
        }
    }

    /// Number of stored documents.
    ///
    /// # Errors
    /// Returns `BackendError` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StorageError> {
        Ok(self.read("len")?.len())
    }

    /// Returns true if the collection holds no documents.
    ///
    /// # Errors
    /// Returns `BackendError` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len()? == 0)
    }

    pub(crate) fn read(
        &self,
        context: &'static str,
    ) -> Result<RwLockReadGuard<'_, CollectionState<D>>, StorageError> {
        self.state.read().map_err(|_| lock_err(context))
    }

    pub(crate) fn write(
        &self,
        context: &'static str,
    ) -> Result<RwLockWriteGuard<'_, CollectionState<D>>, StorageError> {
        self.state.write().map_err(|_| lock_err(context))
    }
}

#[async_trait]
impl<D: Document, J: Journal<D>> DocumentStore<D> for Collection<D, J> {
    async fn find(&self, filter: &D::Filter) -> Result<Vec<D>, StorageError> {
        let state = self.read("find")?;
        Ok(state.matching(filter).cloned().collect())
    }

    async fn insert_one(&self, document: D) -> Result<D, StorageError> {
        let mut state = self.write("insert_one")?;
        if state.contains(document.id()) {
            return Err(StorageError::DuplicateKey(document.id().to_string()));
        }
        self.journal.record_put(&document)?;
        state.put(document.clone());
        Ok(document)
    }

    async fn update_one(
        &self,
        filter: &D::Filter,
        patch: &D::Patch,
    ) -> Result<Option<D>, StorageError> {
        let mut state = self.write("update_one")?;
        let Some(mut document) = state.matching(filter).next().cloned() else {
            return Ok(None);
        };
        if document.apply(patch) {
            self.journal.record_put(&document)?;
            state.put(document.clone());
        }
        Ok(Some(document))
    }

    async fn delete_one(&self, filter: &D::Filter) -> Result<Option<D>, StorageError> {
        let mut state = self.write("delete_one")?;
        let Some(id) = state.matching(filter).next().map(Document::id) else {
            return Ok(None);
        };
        self.journal.record_delete(id)?;
        Ok(state.remove(id))
    }

    async fn update_many(&self, filter: &D::Filter, patch: &D::Patch) -> Result<u64, StorageError> {
        let mut state = self.write("update_many")?;
        let targets: Vec<D> = state.matching(filter).cloned().collect();
        let matched = targets.len() as u64;
        for mut document in targets {
            if document.apply(patch) {
                self.journal.record_put(&document)?;
                state.put(document);
            }
        }
        Ok(matched)
    }
}

/// Convenience bundle of in-memory collections for both document kinds.
#[derive(Default)]
pub struct InMemoryStores {
    /// Cosmonaut collection.
    pub cosmonauts: Arc<InMemoryCollection<Cosmonaut>>,
    /// Superpower collection.
    pub superpowers: Arc<InMemoryCollection<Superpower>>,
}

impl InMemoryStores {
    /// Create empty stores.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased handles for request handling.
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            cosmonauts: self.cosmonauts.clone(),
            superpowers: self.superpowers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmonaut::CosmonautId;
    use crate::storage::document::{SuperpowerFilter, SuperpowerPatch};

    #[tokio::test]
    async fn test_insert_and_find_in_insertion_order() {
        let store = InMemoryCollection::<Superpower>::new();
        let names = ["Flight", "Telepathy", "Invisibility"];
        for name in names {
            store.insert_one(Superpower::new(name)).await.unwrap();
        }

        let found = store.find(&SuperpowerFilter::All).await.unwrap();
        let found_names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(found_names, names);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryCollection::<Superpower>::new();
        let power = Superpower::new("Flight");
        store.insert_one(power.clone()).await.unwrap();
        let err = store.insert_one(power).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_update_one_returns_patched_document() {
        let store = InMemoryCollection::<Superpower>::new();
        let power = store.insert_one(Superpower::new("Flight")).await.unwrap();

        let updated = store
            .update_one(
                &SuperpowerFilter::Id(power.id),
                &SuperpowerPatch::SetName("Levitation".to_string()),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Levitation");

        let missing = store
            .update_one(
                &SuperpowerFilter::Id(crate::superpower::SuperpowerId::new()),
                &SuperpowerPatch::SetName("x".to_string()),
            )
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_position() {
        let store = InMemoryCollection::<Superpower>::new();
        let first = store.insert_one(Superpower::new("A")).await.unwrap();
        store.insert_one(Superpower::new("B")).await.unwrap();
        store
            .update_one(
                &SuperpowerFilter::Id(first.id),
                &SuperpowerPatch::SetName("Z".to_string()),
            )
            .await
            .unwrap();

        let all = store.find(&SuperpowerFilter::All).await.unwrap();
        assert_eq!(all[0].name, "Z");
        assert_eq!(all[1].name, "B");
    }

    #[tokio::test]
    async fn test_delete_one_returns_snapshot() {
        let store = InMemoryCollection::<Superpower>::new();
        let power = store.insert_one(Superpower::new("Flight")).await.unwrap();

        let deleted = store
            .delete_one(&SuperpowerFilter::Id(power.id))
            .await
            .unwrap();
        assert_eq!(deleted, Some(power.clone()));
        assert!(store.is_empty().unwrap());
        assert!(store
            .delete_one(&SuperpowerFilter::Id(power.id))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_many_counts_matches() {
        let store = InMemoryCollection::<Superpower>::new();
        let user = CosmonautId::new();
        for name in ["A", "B", "C"] {
            let mut power = Superpower::new(name);
            if name != "C" {
                power.add_user(user);
            }
            store.insert_one(power).await.unwrap();
        }

        let matched = store
            .update_many(
                &SuperpowerFilter::HasUser(user),
                &SuperpowerPatch::PullUser(user),
            )
            .await
            .unwrap();
        assert_eq!(matched, 2);
        let holders = store
            .find(&SuperpowerFilter::HasUser(user))
            .await
            .unwrap();
        assert!(holders.is_empty());
    }

    #[tokio::test]
    async fn test_find_one() {
        let store = InMemoryCollection::<Superpower>::new();
        let power = store.insert_one(Superpower::new("Flight")).await.unwrap();
        let found = store
            .find_one(&SuperpowerFilter::Id(power.id))
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.name), Some("Flight".to_string()));
    }
}
