//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Register service (clipper-engine)                            │
//! │  └── THIS MODULE: business rule validation before any I/O              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── CHECK constraints (amounts, enum values)                          │
//! │  ├── Partial unique indexes (one open session per operator)            │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: a caller that skips the service layer still         │
//! │  cannot persist an invalid row.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::LineItem;
use crate::{MAX_DESCRIPTION_LEN, MAX_LINE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Monetary Validators
// =============================================================================

/// Validates an opening float.
///
/// ## Rules
/// - Must be non-negative (opening an empty drawer is legitimate)
pub fn validate_opening_amount(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "opening_amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a sale amount.
///
/// ## Rules
/// - Must be strictly positive; zero-value sales are data-entry errors
pub fn validate_sale_amount(cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "sale_amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a manual adjustment amount.
///
/// ## Rules
/// - May be positive or negative, but never zero (a zero adjustment is a
///   no-op and would only pollute the ledger)
pub fn validate_adjustment_amount(cents: i64) -> ValidationResult<()> {
    if cents == 0 {
        return Err(ValidationError::MustBeNonZero {
            field: "adjustment_amount".to_string(),
        });
    }

    Ok(())
}

/// Validates a counted closing amount.
///
/// ## Rules
/// - Must be non-negative; the drawer cannot contain negative cash
pub fn validate_closing_amount(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "closing_amount".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a commission percentage.
///
/// ## Rules
/// - Whole percent between 0 and 100 inclusive
pub fn validate_commission_pct(pct: u32) -> ValidationResult<()> {
    if pct > 100 {
        return Err(ValidationError::OutOfRange {
            field: "commission_pct".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Line Item Validators
// =============================================================================

/// Validates the line items of a new invoice.
///
/// ## Rules
/// - At least one line; at most [`MAX_LINE_ITEMS`]
/// - Every description non-empty
/// - Every unit price positive, every quantity positive
pub fn validate_line_items(items: &[LineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooMany {
            field: "line_items".to_string(),
            max: MAX_LINE_ITEMS,
        });
    }

    for item in items {
        if item.description.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "line_item.description".to_string(),
            });
        }

        if item.unit_price_cents <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "line_item.unit_price".to_string(),
            });
        }

        if item.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "line_item.quantity".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a free-text description (notes, reasons).
///
/// ## Rules
/// - May be empty
/// - Maximum [`MAX_DESCRIPTION_LEN`] characters
pub fn validate_description(text: &str) -> ValidationResult<()> {
    if text.len() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: MAX_DESCRIPTION_LEN,
        });
    }

    Ok(())
}

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use clipper_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
