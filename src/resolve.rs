//! Relationship resolution and response shaping.
//!
//! Documents leave the crate as views. A view carries its scalar fields in
//! their rendered form and its relationships as links: small values holding
//! only the foreign key, resolved against a [`RequestScope`] when (and only
//! when) a query selects them.

use tracing::debug;

use crate::cosmonaut::{Cosmonaut, CosmonautId};
use crate::error::ApiResult;
use crate::loader::{FetchById, LoaderConfig, SuperpowerLoader};
use crate::storage::{CosmonautFilter, Stores};
use crate::superpower::{Superpower, SuperpowerId};
use crate::time::format_timestamp;

/// Everything one request resolves against: the shared stores and a loader
/// whose cache lives exactly as long as the request.
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Handles to both collections.
    pub stores: Stores,
    /// Superpower loader for this request.
    pub superpowers: SuperpowerLoader,
}

impl RequestScope {
    /// Creates a scope with a fresh, empty loader.
    #[must_use]
    pub fn new(stores: &Stores, loader_config: LoaderConfig) -> Self {
        Self {
            superpowers: SuperpowerLoader::new(
                FetchById::new(stores.superpowers.clone()),
                loader_config,
            ),
            stores: stores.clone(),
        }
    }
}

/// Deferred `superpower` field of a cosmonaut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperpowerLink {
    /// Referenced superpower, if any.
    pub id: Option<SuperpowerId>,
}

impl SuperpowerLink {
    /// Loads the referenced superpower through the request's loader.
    ///
    /// A missing reference and a dangling one both resolve to `None`.
    ///
    /// # Errors
    /// The store error of the batch the id was fetched in.
    pub async fn resolve(&self, scope: &RequestScope) -> ApiResult<Option<SuperpowerView>> {
        let Some(id) = self.id else {
            return Ok(None);
        };
        let found = scope.superpowers.load(id).await?;
        if found.is_none() {
            debug!(superpower = %id, "dangling superpower reference");
        }
        Ok(found.map(SuperpowerView::from))
    }
}

/// Deferred `users` field of a superpower.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsersLink {
    /// Cosmonauts holding the superpower.
    pub ids: Vec<CosmonautId>,
}

impl UsersLink {
    /// Fetches the referenced cosmonauts straight from the store.
    ///
    /// # Errors
    /// Any store error.
    pub async fn resolve(&self, scope: &RequestScope) -> ApiResult<Vec<CosmonautView>> {
        if self.ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = scope
            .stores
            .cosmonauts
            .find(&CosmonautFilter::IdIn(self.ids.clone()))
            .await?;
        Ok(users.into_iter().map(CosmonautView::from).collect())
    }
}

/// A cosmonaut as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmonautView {
    /// Cosmonaut id.
    pub id: CosmonautId,
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Normalized RFC 3339 rendering.
    pub birthday: String,
    /// The held superpower, resolved on demand.
    pub superpower: SuperpowerLink,
}

impl From<Cosmonaut> for CosmonautView {
    fn from(cosmonaut: Cosmonaut) -> Self {
        Self {
            id: cosmonaut.id,
            birthday: format_timestamp(&cosmonaut.birthday),
            firstname: cosmonaut.firstname,
            lastname: cosmonaut.lastname,
            superpower: SuperpowerLink {
                id: cosmonaut.superpower,
            },
        }
    }
}

/// A superpower as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperpowerView {
    /// Superpower id.
    pub id: SuperpowerId,
    /// Display name.
    pub name: String,
    /// Holders, resolved on demand.
    pub users: UsersLink,
}

impl From<Superpower> for SuperpowerView {
    fn from(superpower: Superpower) -> Self {
        Self {
            id: superpower.id,
            name: superpower.name,
            users: UsersLink {
                ids: superpower.users,
            },
        }
    }
}
