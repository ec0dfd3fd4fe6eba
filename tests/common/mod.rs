//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use cosmoql::storage::{InMemoryCollection, SuperpowerFilter, SuperpowerPatch};
use cosmoql::{
    CosmonautInput, DocumentStore, StorageError, Superpower, SuperpowerId, SuperpowerInput,
};

pub fn cosmonaut(firstname: &str, superpower: Option<SuperpowerId>) -> CosmonautInput {
    CosmonautInput {
        firstname: firstname.to_string(),
        lastname: "Gagarin".to_string(),
        birthday: "1934-03-09".to_string(),
        superpower: superpower.map(|id| id.to_string()),
    }
}

pub fn superpower(name: &str) -> SuperpowerInput {
    SuperpowerInput {
        name: name.to_string(),
    }
}

/// Superpower store that counts `find` calls and can be made to fail.
#[derive(Default)]
pub struct CountingSuperpowers {
    pub inner: InMemoryCollection<Superpower>,
    pub finds: AtomicUsize,
    pub fail_finds: bool,
}

#[async_trait]
impl DocumentStore<Superpower> for CountingSuperpowers {
    async fn find(&self, filter: &SuperpowerFilter) -> Result<Vec<Superpower>, StorageError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        if self.fail_finds {
            return Err(StorageError::ConnectionError("store unreachable".to_string()));
        }
        self.inner.find(filter).await
    }

    async fn insert_one(&self, document: Superpower) -> Result<Superpower, StorageError> {
        self.inner.insert_one(document).await
    }

    async fn update_one(
        &self,
        filter: &SuperpowerFilter,
        patch: &SuperpowerPatch,
    ) -> Result<Option<Superpower>, StorageError> {
        self.inner.update_one(filter, patch).await
    }

    async fn delete_one(
        &self,
        filter: &SuperpowerFilter,
    ) -> Result<Option<Superpower>, StorageError> {
        self.inner.delete_one(filter).await
    }

    async fn update_many(
        &self,
        filter: &SuperpowerFilter,
        patch: &SuperpowerPatch,
    ) -> Result<u64, StorageError> {
        self.inner.update_many(filter, patch).await
    }
}
