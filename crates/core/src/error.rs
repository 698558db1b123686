//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// authorization, missing references, conflicts). Storage failures belong to
/// the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The acting principal is missing or may not perform the operation.
    #[error("unauthorized")]
    Unauthorized,

    /// A referenced record does not exist. Carries the entity name.
    #[error("{0} not found")]
    NotFound(String),

    /// A role-dependent selector was not supplied.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),

    /// A uniqueness constraint would be violated (e.g. duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An administrator tried to deactivate or delete their own account.
    #[error("operation not allowed on your own account")]
    SelfActionForbidden,

    /// A stored access kind is not one of the known scopes.
    #[error("invalid access kind: {0}")]
    InvalidAccessKind(String),

    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Login or password confirmation failed.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredField(field.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
