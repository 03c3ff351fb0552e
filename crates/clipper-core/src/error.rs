//! # Error Types
//!
//! Domain-specific error types for clipper-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  clipper-core errors (this file)                                       │
//! │  ├── MoneyError       - Split policy failures (amount/percentage)      │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── CoreError        - Umbrella over the two above                    │
//! │                                                                         │
//! │  clipper-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures, NotFound, Conflict           │
//! │                                                                         │
//! │  clipper-engine errors (separate crate)                                │
//! │  └── EngineError      - What embedding applications see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, amounts, limits)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Money Error
// =============================================================================

/// Failures of the commission split policy.
///
/// The split is pure math; these are the only two ways it can be asked to
/// do something meaningless.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    /// The sale total must be strictly positive.
    #[error("Invalid amount: {cents} cents (total must be positive)")]
    InvalidAmount { cents: i64 },

    /// Commission percentage must be within 0-100.
    #[error("Invalid percentage: {pct} (must be between 0 and 100)")]
    InvalidPercentage { pct: u32 },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Collection has too many entries.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Core Error
// =============================================================================

/// Umbrella error for the pure business layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Split policy failure.
    #[error("Money policy error: {0}")]
    Money(#[from] MoneyError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
