//! Error types for CosmoQL.
//!
//! All errors are strongly typed using thiserror so resolvers can match on
//! specific conditions and the GraphQL layer can attach a stable error code.

use thiserror::Error;

use crate::storage::Document;
pub use crate::storage::StorageError;

/// Validation errors raised before any store call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was blank.
    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },

    /// The birthday is neither a date nor a timestamp.
    #[error("Invalid birthday '{value}': expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidBirthday {
        /// The rejected input.
        value: String,
    },

    /// An id did not parse.
    #[error("Invalid id '{value}'")]
    InvalidId {
        /// The rejected input.
        value: String,
    },
}

/// Document kinds, used to label `NotFound` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A [`crate::Cosmonaut`].
    Cosmonaut,
    /// A [`crate::Superpower`].
    Superpower,
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cosmonaut => write!(f, "Cosmonaut"),
            Self::Superpower => write!(f, "Superpower"),
        }
    }
}

/// Top-level error type surfaced by queries and mutations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Input was rejected before any store call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced document does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing document.
        kind: DocumentKind,
        /// The id looked up.
        id: String,
    },

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StorageError),

    /// The request reached a resolver without what it needs.
    #[error("Internal error: {message}")]
    Internal {
        /// What was missing.
        message: String,
    },
}

impl ApiError {
    /// Creates a not-found error for a document of kind `D`.
    #[must_use]
    pub fn not_found<D: Document>(id: D::Id) -> Self {
        Self::NotFound {
            kind: D::KIND,
            id: id.to_string(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Stable error code exposed under `extensions.code` in GraphQL errors.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Store(_) => "STORE",
            Self::Internal { .. } => "INTERNAL",
        }
    }
}

/// Result type alias for CosmoQL operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cosmonaut::{Cosmonaut, CosmonautId};
    use crate::superpower::{Superpower, SuperpowerId};

    #[test]
    fn test_validation_error_empty_field() {
        let err = ValidationError::EmptyField { field: "firstname" };
        let msg = format!("{err}");
        assert!(msg.contains("firstname"));
        assert!(msg.contains("empty"));
    }

    #[test]
    fn test_validation_error_birthday() {
        let err = ValidationError::InvalidBirthday {
            value: "yesterday".to_string(),
        };
        assert!(err.to_string().contains("yesterday"));
    }

    #[test]
    fn test_not_found_is_labelled_by_document_kind() {
        let id = SuperpowerId::new();
        let err = ApiError::not_found::<Superpower>(id);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), format!("Superpower not found: {id}"));

        let err = ApiError::not_found::<Cosmonaut>(CosmonautId::new());
        assert!(matches!(
            err,
            ApiError::NotFound {
                kind: DocumentKind::Cosmonaut,
                ..
            }
        ));
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_api_error_from_validation() {
        let err: ApiError = ValidationError::EmptyField { field: "name" }.into();
        assert!(err.is_validation());
        assert_eq!(err.code(), "VALIDATION");
    }

    #[test]
    fn test_api_error_from_storage() {
        let err: ApiError = StorageError::ConnectionError("refused".to_string()).into();
        assert!(err.is_store());
        assert_eq!(err.code(), "STORE");
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_api_error_internal() {
        let err = ApiError::internal("unexpected state");
        assert_eq!(err.code(), "INTERNAL");
        assert!(err.to_string().contains("unexpected state"));
    }
}
