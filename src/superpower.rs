//! Superpower records and their client-facing input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cosmonaut::CosmonautId;
use crate::error::ValidationError;

/// Globally unique, stable superpower identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuperpowerId(Uuid);

impl SuperpowerId {
    /// Creates a new random superpower ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a superpower ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SuperpowerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SuperpowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SuperpowerId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidId {
                value: s.to_string(),
            })
    }
}

impl From<Uuid> for SuperpowerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A stored superpower document.
///
/// `users` is the reciprocal side of `Cosmonaut::superpower`. It behaves as a
/// set: `add_user` never records the same cosmonaut twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superpower {
    /// Stable identity.
    pub id: SuperpowerId,
    /// Display name, never blank.
    pub name: String,
    /// Cosmonauts holding this superpower.
    pub users: Vec<CosmonautId>,
}

impl Superpower {
    /// Creates a superpower with no users.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SuperpowerId::new(),
            name: name.into(),
            users: Vec::new(),
        }
    }

    /// Adds a user. Returns false if it was already present.
    pub fn add_user(&mut self, user: CosmonautId) -> bool {
        if self.users.contains(&user) {
            return false;
        }
        self.users.push(user);
        true
    }

    /// Removes a user. Returns false if it was not present.
    pub fn pull_user(&mut self, user: CosmonautId) -> bool {
        let before = self.users.len();
        self.users.retain(|u| *u != user);
        self.users.len() != before
    }

    /// Returns true if the cosmonaut holds this superpower.
    #[must_use]
    pub fn has_user(&self, user: CosmonautId) -> bool {
        self.users.contains(&user)
    }
}

/// Raw superpower input as supplied by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperpowerInput {
    /// Display name; must not be blank.
    pub name: String,
}

impl SuperpowerInput {
    /// Validates the raw input and returns the name to store.
    ///
    /// # Errors
    /// Returns `EmptyField` when the name is blank.
    pub fn validate(&self) -> Result<String, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }
        Ok(self.name.clone())
    }
}
