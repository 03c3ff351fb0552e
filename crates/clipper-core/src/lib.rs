//! # clipper-core: Pure Business Logic for Clipper POS
//!
//! This crate is the **heart** of the Clipper POS ledger. It contains all
//! business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Clipper POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 clipper-engine (Register Service)               │   │
//! │  │    open_register ─► record_sale ─► void/correct ─► close       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ clipper-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ validation│  │   error   │  │   │
//! │  │   │  Session  │  │   Money   │  │   rules   │  │   kinds   │  │   │
//! │  │   │  Invoice  │  │   split   │  │   checks  │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   clipper-db (Ledger Storage)                   │   │
//! │  │            SQLite sessions, movements, invoices                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (CashSession, Movement, Invoice, etc.)
//! - [`money`] - Money type and the commission/house split (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use clipper_core::money::{split, CommissionRate, Money};
//!
//! // A 10000-cent haircut with the provider on a 70% commission
//! let parts = split(Money::from_cents(10000), CommissionRate::from_percent(70)).unwrap();
//!
//! assert_eq!(parts.commission.cents(), 7000);
//! assert_eq!(parts.house.cents(), 3000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use clipper_core::Money` instead of
// `use clipper_core::money::Money`

pub use error::{CoreError, MoneyError, ValidationError};
pub use money::{split, CommissionRate, CommissionSplit, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed on a single invoice
///
/// ## Business Reason
/// A walk-in barbershop ticket is a handful of services; a runaway cart is
/// a data-entry mistake, not a sale.
pub const MAX_LINE_ITEMS: usize = 50;

/// Maximum length for free-text descriptions (movement notes, void reasons)
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Default commission percentage applied when a provider has none configured
///
/// The shop's historic default split is 50/50.
pub const DEFAULT_COMMISSION_PCT: u32 = 50;
