//! Filters and patches for the two document kinds.

use serde::{Deserialize, Serialize};

use crate::cosmonaut::{Cosmonaut, CosmonautFields, CosmonautId};
use crate::error::DocumentKind;
use crate::storage::traits::Document;
use crate::superpower::{Superpower, SuperpowerId};

/// Selection predicate over cosmonauts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CosmonautFilter {
    /// Every cosmonaut.
    All,
    /// The cosmonaut with this id.
    Id(CosmonautId),
    /// Cosmonauts whose id is in the set.
    IdIn(Vec<CosmonautId>),
    /// Cosmonauts referencing this superpower.
    SuperpowerIs(SuperpowerId),
}

/// In-place modification of a cosmonaut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CosmonautPatch {
    /// Overwrite names, birthday and superpower reference.
    Replace(CosmonautFields),
    /// Drop the superpower reference.
    ClearSuperpower,
}

impl Document for Cosmonaut {
    type Id = CosmonautId;
    type Filter = CosmonautFilter;
    type Patch = CosmonautPatch;

    const KIND: DocumentKind = DocumentKind::Cosmonaut;

    fn id(&self) -> CosmonautId {
        self.id
    }

    fn matches(&self, filter: &CosmonautFilter) -> bool {
        match filter {
            CosmonautFilter::All => true,
            CosmonautFilter::Id(id) => self.id == *id,
            CosmonautFilter::IdIn(ids) => ids.contains(&self.id),
            CosmonautFilter::SuperpowerIs(power) => self.superpower == Some(*power),
        }
    }

    fn apply(&mut self, patch: &CosmonautPatch) -> bool {
        match patch {
            CosmonautPatch::Replace(fields) => {
                let before = self.clone();
                self.overwrite(fields);
                *self != before
            }
            CosmonautPatch::ClearSuperpower => self.superpower.take().is_some(),
        }
    }

    fn id_in(ids: Vec<CosmonautId>) -> CosmonautFilter {
        CosmonautFilter::IdIn(ids)
    }
}

/// Selection predicate over superpowers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuperpowerFilter {
    /// Every superpower.
    All,
    /// The superpower with this id.
    Id(SuperpowerId),
    /// Superpowers whose id is in the set.
    IdIn(Vec<SuperpowerId>),
    /// Superpowers whose users contain this cosmonaut.
    HasUser(CosmonautId),
}

/// In-place modification of a superpower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuperpowerPatch {
    /// Replace the name.
    SetName(String),
    /// Add a user unless already present.
    AddUser(CosmonautId),
    /// Remove a user if present.
    PullUser(CosmonautId),
}

impl Document for Superpower {
    type Id = SuperpowerId;
    type Filter = SuperpowerFilter;
    type Patch = SuperpowerPatch;

    const KIND: DocumentKind = DocumentKind::Superpower;

    fn id(&self) -> SuperpowerId {
        self.id
    }

    fn matches(&self, filter: &SuperpowerFilter) -> bool {
        match filter {
            SuperpowerFilter::All => true,
            SuperpowerFilter::Id(id) => self.id == *id,
            SuperpowerFilter::IdIn(ids) => ids.contains(&self.id),
            SuperpowerFilter::HasUser(user) => self.has_user(*user),
        }
    }

    fn apply(&mut self, patch: &SuperpowerPatch) -> bool {
        match patch {
            SuperpowerPatch::SetName(name) => {
                if self.name == *name {
                    return false;
                }
                self.name.clone_from(name);
                true
            }
            SuperpowerPatch::AddUser(user) => self.add_user(*user),
            SuperpowerPatch::PullUser(user) => self.pull_user(*user),
        }
    }

    fn id_in(ids: Vec<SuperpowerId>) -> SuperpowerFilter {
        SuperpowerFilter::IdIn(ids)
    }
}
