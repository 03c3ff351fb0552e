//! # Domain Types
//!
//! Core domain types for the cash-register ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   CashSession   │   │    Movement     │   │     Invoice     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  session_id     │   │  id (UUID)      │       │
//! │  │  operator_id    │   │  kind           │┌─►│  provider_id    │       │
//! │  │  expected_close │   │  amount_cents   ││  │  total_cents    │       │
//! │  │  status         │   │  reference_id ──┼┘  │  commission/    │       │
//! │  └─────────────────┘   └─────────────────┘   │  house split    │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  SessionStatus  │   │  MovementKind   │   │ PaymentMethod   │       │
//! │  │  Open / Closed  │   │  Opening, Sale  │   │  Cash, Card,    │       │
//! │  │  (terminal)     │   │  Closing, Adj.  │   │  Transfer       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ledger Rules Encoded Here
//! - A session owns an ordered, append-only sequence of movements.
//! - `expected_close_cents` always equals opening + the signed deltas of
//!   its sale/adjustment movements ([`Movement::signed_delta`]).
//! - A voided invoice is terminal; `revision` guards concurrent mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{CommissionRate, Money};

// =============================================================================
// Session Status
// =============================================================================

/// The lifecycle state of a cash-register session.
///
/// `Closed` is terminal: a closed session accepts no further movements and
/// never reopens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session is taking movements.
    Open,
    /// Session was reconciled and closed.
    Closed,
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::Open
    }
}

// =============================================================================
// Movement Kind
// =============================================================================

/// The kind of a cash-affecting event within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// The opening float counted into the drawer.
    Opening,
    /// A completed sale, referencing its invoice.
    Sale,
    /// The counted amount at close.
    Closing,
    /// A manual correction to the expected total (signed).
    Adjustment,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash into the drawer.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Bank transfer.
    Transfer,
}

// =============================================================================
// Cash Session
// =============================================================================

/// A single cashier's open-to-close working period.
///
/// One per (operator, shift). `expected_close_cents` is the running total
/// maintained by the ledger; `variance_cents` is set exactly once at close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashSession {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The cashier who opened the session.
    pub operator_id: String,

    /// Open or closed (terminal).
    pub status: SessionStatus,

    /// The float counted into the drawer at open.
    pub opening_cents: i64,

    /// Running total: opening + sales + adjustments. Starts equal to
    /// `opening_cents`.
    pub expected_close_cents: i64,

    /// Counted amount at close. None while open.
    pub actual_close_cents: Option<i64>,

    /// `actual - expected`, set at close. None while open.
    pub variance_cents: Option<i64>,

    /// When the session was opened.
    pub opened_at: DateTime<Utc>,

    /// When the session was closed. None while open.
    pub closed_at: Option<DateTime<Utc>>,
}

impl CashSession {
    /// Checks if the session is still taking movements.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Returns the running expected total as Money.
    #[inline]
    pub fn expected_close(&self) -> Money {
        Money::from_cents(self.expected_close_cents)
    }

    /// Returns the close variance as Money, if the session is closed.
    #[inline]
    pub fn variance(&self) -> Option<Money> {
        self.variance_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Movement
// =============================================================================

/// One atomic cash-affecting event within a session.
///
/// Movements are immutable once written: corrections are expressed as new
/// `Adjustment` movements, never edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The owning session.
    pub session_id: String,

    /// What kind of event this is.
    pub kind: MovementKind,

    /// Amount in cents. Signed for adjustments; for opening and closing
    /// movements this records the counted drawer amount, not a delta.
    pub amount_cents: i64,

    /// How the sale was paid (sale movements only).
    pub payment_method: Option<PaymentMethod>,

    /// The invoice this movement records (sale movements only).
    pub reference_id: Option<String>,

    /// Client-supplied retry token; duplicates are rejected at insert.
    pub idempotency_key: Option<String>,

    /// Free-text note (opening float, close notes, adjustment reason).
    pub description: Option<String>,

    /// When the movement was written. Creation order is significant.
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// The movement's contribution to the session's expected total.
    ///
    /// Sales and adjustments move the total; opening and closing movements
    /// are drawer-count snapshots and contribute nothing (the opening float
    /// is already the total's starting value).
    #[inline]
    pub fn signed_delta(&self) -> i64 {
        match self.kind {
            MovementKind::Sale | MovementKind::Adjustment => self.amount_cents,
            MovementKind::Opening | MovementKind::Closing => 0,
        }
    }

    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One service line on an invoice.
///
/// The description and price are frozen at sale time; later catalog changes
/// do not reach past invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Service description at time of sale (frozen).
    pub description: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
}

impl LineItem {
    /// Returns unit_price × quantity.
    #[inline]
    pub fn line_total_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity
    }

    /// Returns the line total as Money.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents())
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// A recorded sale with its commission/house split.
///
/// Invariants:
/// - `commission_cents + house_cents == total_cents` at all times.
/// - `voided` is terminal: it is never unset and the monetary fields of a
///   voided invoice are never corrected.
/// - `revision` increments on every mutation; writers compare-and-swap on
///   it so a void and a correction cannot silently interleave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The provider who performed the service.
    pub provider_id: String,

    /// Weak reference to the appointment this sale settled, if any.
    /// Lookup only; the ledger does not own the appointment's lifecycle.
    pub appointment_id: Option<String>,

    /// Ordered service lines, frozen at sale time.
    pub line_items: Vec<LineItem>,

    /// Sale total in cents. Always positive.
    pub total_cents: i64,

    /// Commission percentage applied (whole percent, 0-100).
    pub commission_pct: u32,

    /// The provider's share: floor(total × pct / 100) unless corrected.
    pub commission_cents: i64,

    /// The house's share: total − commission.
    pub house_cents: i64,

    /// How the sale was paid.
    pub payment_method: PaymentMethod,

    /// Terminal void flag.
    pub voided: bool,

    /// Why the invoice was voided.
    pub void_reason: Option<String>,

    /// Who voided the invoice.
    pub voided_by: Option<String>,

    /// When the invoice was voided.
    pub voided_at: Option<DateTime<Utc>>,

    /// When the invoice was created.
    pub created_at: DateTime<Utc>,

    /// When the invoice was last mutated.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency counter, bumped on every mutation.
    pub revision: i64,
}

impl Invoice {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the provider's share as Money.
    #[inline]
    pub fn commission(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }

    /// Returns the house's share as Money.
    #[inline]
    pub fn house(&self) -> Money {
        Money::from_cents(self.house_cents)
    }

    /// Returns the applied commission rate.
    #[inline]
    pub fn commission_rate(&self) -> CommissionRate {
        CommissionRate::from_percent(self.commission_pct)
    }
}

// =============================================================================
// Invoice Correction
// =============================================================================

/// Immutable audit snapshot written whenever an invoice is corrected.
///
/// Records the monetary state as it was BEFORE the correction applied, so
/// the full history of an invoice can be replayed even though the invoice
/// row itself holds only the current view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceCorrection {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The corrected invoice.
    pub invoice_id: String,

    /// Provider before the correction.
    pub prior_provider_id: String,

    /// Total before the correction.
    pub prior_total_cents: i64,

    /// Commission percentage before the correction.
    pub prior_commission_pct: u32,

    /// Commission share before the correction.
    pub prior_commission_cents: i64,

    /// House share before the correction.
    pub prior_house_cents: i64,

    /// Payment method before the correction.
    pub prior_payment_method: PaymentMethod,

    /// Who asked for the correction, when known.
    pub corrected_by: Option<String>,

    /// When the correction applied.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(kind: MovementKind, amount_cents: i64) -> Movement {
        Movement {
            id: "m-1".to_string(),
            session_id: "s-1".to_string(),
            kind,
            amount_cents,
            payment_method: None,
            reference_id: None,
            idempotency_key: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_signed_delta_per_kind() {
        assert_eq!(movement(MovementKind::Sale, 10000).signed_delta(), 10000);
        assert_eq!(movement(MovementKind::Adjustment, -500).signed_delta(), -500);

        // Drawer-count snapshots never move the running total
        assert_eq!(movement(MovementKind::Opening, 50000).signed_delta(), 0);
        assert_eq!(movement(MovementKind::Closing, 74000).signed_delta(), 0);
    }

    #[test]
    fn test_line_item_total() {
        let item = LineItem {
            description: "Corte clásico".to_string(),
            unit_price_cents: 1500,
            quantity: 2,
        };
        assert_eq!(item.line_total_cents(), 3000);
    }

    #[test]
    fn test_session_status_default() {
        assert_eq!(SessionStatus::default(), SessionStatus::Open);
    }

    #[test]
    fn test_enum_serde_names() {
        // The database stores these as lowercase text; serde must agree.
        assert_eq!(
            serde_json::to_string(&MovementKind::Adjustment).unwrap(),
            "\"adjustment\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Closed).unwrap(),
            "\"closed\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Transfer).unwrap(),
            "\"transfer\""
        );
    }
}
