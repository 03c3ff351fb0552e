//! # Engine Error Types
//!
//! What embedding applications see. Folds the layered errors below it and
//! adds the two failure modes only the engine can produce: an unresolved
//! provider and a rejected security key.

use thiserror::Error;

use clipper_core::{MoneyError, ValidationError};
use clipper_db::DbError;

use crate::collaborators::CollaboratorError;

/// Errors surfaced by the register service.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Caller input failed validation. Surfaced immediately, never retried.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The commission split policy rejected its inputs.
    #[error("Money policy error: {0}")]
    Money(#[from] MoneyError),

    /// Storage failure, including NotFound and state conflicts.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The provider directory has no such provider.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// A required collaborator call failed.
    ///
    /// Best-effort appointment updates never raise this; it only fires for
    /// lookups the primary operation cannot proceed without.
    #[error("Collaborator call failed: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// The security gate rejected the supplied key.
    #[error("Security key rejected")]
    Unauthorized,
}

impl EngineError {
    /// Checks whether this error is a state conflict (session already
    /// open/closed, invoice already voided, lost optimistic race).
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Db(db) if db.is_conflict())
    }

    /// Checks whether this error is a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::Db(DbError::NotFound { .. }) | EngineError::ProviderNotFound(_)
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
