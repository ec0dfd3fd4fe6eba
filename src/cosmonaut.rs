//! Cosmonaut records and their client-facing input.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::superpower::SuperpowerId;
use crate::time::parse_birthday;

/// Globally unique, stable cosmonaut identifier.
///
/// # Examples
///
/// ```
/// use cosmoql::CosmonautId;
///
/// let id = CosmonautId::new();
/// let parsed: CosmonautId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CosmonautId(Uuid);

impl CosmonautId {
    /// Creates a new random cosmonaut ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a cosmonaut ID from an existing UUID.
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

impl Default for CosmonautId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CosmonautId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CosmonautId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidId {
                value: s.to_string(),
            })
    }
}

impl From<Uuid> for CosmonautId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A stored cosmonaut document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cosmonaut {
    /// Stable identity.
    pub id: CosmonautId,
    /// First name, never blank.
    pub firstname: String,
    /// Last name, never blank.
    pub lastname: String,
    /// Birthday as a UTC timestamp.
    pub birthday: DateTime<Utc>,
    /// The superpower this cosmonaut holds, if any.
    pub superpower: Option<SuperpowerId>,
}

impl Cosmonaut {
    /// Creates a new cosmonaut with a fresh id from validated fields.
    #[must_use]
    pub fn new(fields: CosmonautFields) -> Self {
        Self {
            id: CosmonautId::new(),
            firstname: fields.firstname,
            lastname: fields.lastname,
            birthday: fields.birthday,
            superpower: fields.superpower,
        }
    }

    /// Overwrites every client-controlled field.
    pub fn overwrite(&mut self, fields: &CosmonautFields) {
        self.firstname.clone_from(&fields.firstname);
        self.lastname.clone_from(&fields.lastname);
        self.birthday = fields.birthday;
        self.superpower = fields.superpower;
    }
}

/// Raw cosmonaut input as supplied by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmonautInput {
    /// First name; must not be blank.
    pub firstname: String,
    /// Last name; must not be blank.
    pub lastname: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub birthday: String,
    /// Superpower id; `None` or a blank string means no superpower.
    pub superpower: Option<String>,
}

/// Validated cosmonaut fields, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmonautFields {
    /// Trimmed first name.
    pub firstname: String,
    /// Trimmed last name.
    pub lastname: String,
    /// Parsed birthday.
    pub birthday: DateTime<Utc>,
    /// Parsed superpower reference.
    pub superpower: Option<SuperpowerId>,
}

impl CosmonautInput {
    /// Validates the raw input.
    ///
    /// # Errors
    /// - `EmptyField` when a name or the birthday is blank.
    /// - `InvalidBirthday` when the birthday does not parse.
    /// - `InvalidId` when the superpower id is not a valid id.
    pub fn validate(&self) -> Result<CosmonautFields, ValidationError> {
        if self.firstname.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "firstname" });
        }
        if self.lastname.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "lastname" });
        }
        let birthday = parse_birthday(&self.birthday)?;
        let superpower = match self.superpower.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<SuperpowerId>()?),
        };

        Ok(CosmonautFields {
            firstname: self.firstname.clone(),
            lastname: self.lastname.clone(),
            birthday,
            superpower,
        })
    }
}
