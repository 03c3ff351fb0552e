//! # Reconciliation Reporter
//!
//! Read-only integrity audit over persisted invoices.
//!
//! For every non-voided invoice the reporter recomputes what the commission
//! split policy says the stored figures should be and flags divergence:
//!
//! - **commission drift**: `|stored − floor(total × pct / 100)| > tolerance`
//! - **sum mismatch**: `commission + house ≠ total`
//!
//! The run is side-effect-free and idempotent: re-running over the same
//! store yields the same reports. Mismatches are reported, never
//! auto-corrected; a human decides what a drifted settlement means.
//!
//! The tolerance exists only to absorb rounding drift in rows imported from
//! the legacy system; new data is held to an exact zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;

// =============================================================================
// Report Model
// =============================================================================

/// Which invariant an invoice violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// Stored commission diverges from the recomputed floor split.
    CommissionDrift,
    /// Commission + house does not re-add to the total.
    SumMismatch,
}

/// One detected integrity violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchReport {
    /// The offending invoice.
    pub invoice_id: String,
    /// Which invariant broke.
    pub kind: MismatchKind,
    /// What the policy says the figure should be.
    pub expected_cents: i64,
    /// What the row actually holds.
    pub actual_cents: i64,
    /// `actual − expected`.
    pub delta_cents: i64,
}

/// Options for a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Allowed absolute commission drift in cents. Zero for new data.
    pub tolerance_cents: i64,
    /// Only audit invoices created at or after this instant.
    pub from: Option<DateTime<Utc>>,
    /// Only audit invoices created at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Reconciler
// =============================================================================

/// Read-side reporter over the invoice store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pool: SqlitePool,
}

impl Reconciler {
    /// Creates a new Reconciler.
    pub fn new(pool: SqlitePool) -> Self {
        Reconciler { pool }
    }

    /// Audits non-voided invoices and returns every detected mismatch.
    ///
    /// An invoice that violates both invariants produces two reports, one
    /// per violated check.
    pub async fn run(&self, options: &ReconcileOptions) -> DbResult<Vec<MismatchReport>> {
        debug!(
            tolerance_cents = options.tolerance_cents,
            from = ?options.from,
            to = ?options.to,
            "Starting reconciliation run"
        );

        let rows = sqlx::query(
            r#"
            SELECT id, total_cents, commission_pct, commission_cents, house_cents
            FROM invoices
            WHERE voided = 0
              AND (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(options.from)
        .bind(options.to)
        .fetch_all(&self.pool)
        .await?;

        let mut reports = Vec::new();

        for row in &rows {
            let invoice_id: String = row.try_get("id")?;
            let total_cents: i64 = row.try_get("total_cents")?;
            let commission_pct: u32 = row.try_get("commission_pct")?;
            let commission_cents: i64 = row.try_get("commission_cents")?;
            let house_cents: i64 = row.try_get("house_cents")?;

            // Same floor arithmetic as the split policy. Recomputed from raw
            // columns so a row the policy itself could never produce still
            // gets audited.
            let expected_commission =
                (total_cents as i128 * commission_pct as i128 / 100) as i64;

            if (commission_cents - expected_commission).abs() > options.tolerance_cents {
                reports.push(MismatchReport {
                    invoice_id: invoice_id.clone(),
                    kind: MismatchKind::CommissionDrift,
                    expected_cents: expected_commission,
                    actual_cents: commission_cents,
                    delta_cents: commission_cents - expected_commission,
                });
            }

            let sum = commission_cents + house_cents;
            if sum != total_cents {
                reports.push(MismatchReport {
                    invoice_id,
                    kind: MismatchKind::SumMismatch,
                    expected_cents: total_cents,
                    actual_cents: sum,
                    delta_cents: sum - total_cents,
                });
            }
        }

        info!(
            audited = rows.len(),
            mismatches = reports.len(),
            "Reconciliation run complete"
        );

        Ok(reports)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
