//! # Invoice Repository
//!
//! Database operations for invoices, voids, and correction audit records.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invoice Lifecycle                                  │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── insert() → Invoice { voided: false, revision: 0 }              │
//! │                                                                         │
//! │  2. (OPTIONAL, REPEATABLE) CORRECT                                     │
//! │     └── apply_correction() → fields overwritten, revision += 1         │
//! │     └── invoice_corrections row snapshots the prior monetary state     │
//! │                                                                         │
//! │  3. (OPTIONAL) VOID - terminal                                         │
//! │     └── void() → voided = true, revision += 1                          │
//! │     └── a voided invoice is never corrected, never un-voided           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Notes
//!
//! A void and a correction racing on the same invoice must not interleave:
//! a corrected invoice silently resurrected into a voided one corrupts the
//! settlement. Both writers therefore compare-and-swap:
//!
//! - `void()` fires only `WHERE voided = 0`;
//! - `apply_correction()` fires only `WHERE voided = 0 AND revision = ?`.
//!
//! Whichever commits second sees zero rows affected and reports `Conflict`.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use clipper_core::{Invoice, InvoiceCorrection, LineItem};

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Persists a freshly created invoice.
    ///
    /// The caller (the register service) has already computed the
    /// commission split; this only writes the row.
    pub async fn insert(&self, invoice: &Invoice) -> DbResult<()> {
        debug!(
            id = %invoice.id,
            provider_id = %invoice.provider_id,
            total_cents = invoice.total_cents,
            "Inserting invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, provider_id, appointment_id, line_items,
                total_cents, commission_pct, commission_cents, house_cents,
                payment_method, voided, void_reason, voided_by, voided_at,
                created_at, updated_at, revision
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.provider_id)
        .bind(&invoice.appointment_id)
        .bind(encode_line_items(&invoice.line_items)?)
        .bind(invoice.total_cents)
        .bind(invoice.commission_pct)
        .bind(invoice.commission_cents)
        .bind(invoice.house_cents)
        .bind(invoice.payment_method)
        .bind(invoice.voided)
        .bind(&invoice.void_reason)
        .bind(&invoice.voided_by)
        .bind(invoice.voided_at)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .bind(invoice.revision)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets an invoice by ID.
    pub async fn get(&self, invoice_id: &str) -> DbResult<Option<Invoice>> {
        let row = sqlx::query(
            r#"
            SELECT id, provider_id, appointment_id, line_items,
                   total_cents, commission_pct, commission_cents, house_cents,
                   payment_method, voided, void_reason, voided_by, voided_at,
                   created_at, updated_at, revision
            FROM invoices
            WHERE id = ?1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(invoice_from_row).transpose()
    }

    /// Voids an invoice. Terminal.
    ///
    /// A single guarded UPDATE flips the flag only while the invoice is
    /// still live; a concurrent correction or second void loses the race
    /// and reports `Conflict`.
    ///
    /// ## Errors
    /// - `NotFound` if the invoice does not exist
    /// - `Conflict` if the invoice is already voided
    pub async fn void(&self, invoice_id: &str, reason: &str, actor_id: &str) -> DbResult<Invoice> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET voided = 1,
                void_reason = ?1,
                voided_by = ?2,
                voided_at = ?3,
                updated_at = ?3,
                revision = revision + 1
            WHERE id = ?4 AND voided = 0
            "#,
        )
        .bind(reason)
        .bind(actor_id)
        .bind(now)
        .bind(invoice_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(match self.get(invoice_id).await? {
                None => DbError::not_found("Invoice", invoice_id),
                Some(_) => DbError::conflict("Invoice", "invoice is already voided"),
            });
        }

        debug!(invoice_id = %invoice_id, actor_id = %actor_id, "Invoice voided");

        self.get(invoice_id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("invoice {invoice_id} vanished after void")))
    }

    /// Applies a correction, guarded by the prior revision.
    ///
    /// In one transaction: overwrites the invoice's current view and
    /// appends an `invoice_corrections` row snapshotting `prior`'s monetary
    /// state, so the overwrite never erases history.
    ///
    /// ## Arguments
    /// * `updated` - the corrected invoice (same id as `prior`)
    /// * `prior` - the invoice as read before correcting; its `revision` is
    ///   the compare-and-swap guard
    /// * `corrected_by` - who asked for the correction, when known
    ///
    /// ## Errors
    /// - `NotFound` if the invoice does not exist
    /// - `Conflict` if the invoice is voided, or was mutated since `prior`
    ///   was read
    pub async fn apply_correction(
        &self,
        updated: &Invoice,
        prior: &Invoice,
        corrected_by: Option<&str>,
    ) -> DbResult<Invoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE invoices
            SET provider_id = ?1,
                line_items = ?2,
                total_cents = ?3,
                commission_pct = ?4,
                commission_cents = ?5,
                house_cents = ?6,
                payment_method = ?7,
                updated_at = ?8,
                revision = revision + 1
            WHERE id = ?9 AND voided = 0 AND revision = ?10
            "#,
        )
        .bind(&updated.provider_id)
        .bind(encode_line_items(&updated.line_items)?)
        .bind(updated.total_cents)
        .bind(updated.commission_pct)
        .bind(updated.commission_cents)
        .bind(updated.house_cents)
        .bind(updated.payment_method)
        .bind(now)
        .bind(&updated.id)
        .bind(prior.revision)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            drop(tx);
            return Err(match self.get(&updated.id).await? {
                None => DbError::not_found("Invoice", &updated.id),
                Some(current) if current.voided => {
                    DbError::conflict("Invoice", "invoice is voided")
                }
                Some(_) => DbError::conflict("Invoice", "invoice was modified concurrently"),
            });
        }

        let correction = InvoiceCorrection {
            id: Uuid::new_v4().to_string(),
            invoice_id: updated.id.clone(),
            prior_provider_id: prior.provider_id.clone(),
            prior_total_cents: prior.total_cents,
            prior_commission_pct: prior.commission_pct,
            prior_commission_cents: prior.commission_cents,
            prior_house_cents: prior.house_cents,
            prior_payment_method: prior.payment_method,
            corrected_by: corrected_by.map(str::to_string),
            created_at: now,
        };
        sqlx::query(
            r#"
            INSERT INTO invoice_corrections (
                id, invoice_id, prior_provider_id, prior_total_cents,
                prior_commission_pct, prior_commission_cents, prior_house_cents,
                prior_payment_method, corrected_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&correction.id)
        .bind(&correction.invoice_id)
        .bind(&correction.prior_provider_id)
        .bind(correction.prior_total_cents)
        .bind(correction.prior_commission_pct)
        .bind(correction.prior_commission_cents)
        .bind(correction.prior_house_cents)
        .bind(correction.prior_payment_method)
        .bind(&correction.corrected_by)
        .bind(correction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(invoice_id = %updated.id, "Correction applied");

        self.get(&updated.id).await?.ok_or_else(|| {
            DbError::Internal(format!("invoice {} vanished after correction", updated.id))
        })
    }

    /// Gets an invoice's correction audit trail, oldest first.
    pub async fn corrections(&self, invoice_id: &str) -> DbResult<Vec<InvoiceCorrection>> {
        let rows = sqlx::query(
            r#"
            SELECT id, invoice_id, prior_provider_id, prior_total_cents,
                   prior_commission_pct, prior_commission_cents, prior_house_cents,
                   prior_payment_method, corrected_by, created_at
            FROM invoice_corrections
            WHERE invoice_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(correction_from_row).collect()
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Serializes line items for the JSON TEXT column.
fn encode_line_items(items: &[LineItem]) -> DbResult<String> {
    serde_json::to_string(items)
        .map_err(|e| DbError::Internal(format!("line items failed to serialize: {e}")))
}

fn invoice_from_row(row: &SqliteRow) -> DbResult<Invoice> {
    let line_items_json: String = row.try_get("line_items")?;
    let line_items: Vec<LineItem> = serde_json::from_str(&line_items_json)
        .map_err(|e| DbError::Internal(format!("corrupt line_items column: {e}")))?;

    Ok(Invoice {
        id: row.try_get("id")?,
        provider_id: row.try_get("provider_id")?,
        appointment_id: row.try_get("appointment_id")?,
        line_items,
        total_cents: row.try_get("total_cents")?,
        commission_pct: row.try_get("commission_pct")?,
        commission_cents: row.try_get("commission_cents")?,
        house_cents: row.try_get("house_cents")?,
        payment_method: row.try_get("payment_method")?,
        voided: row.try_get("voided")?,
        void_reason: row.try_get("void_reason")?,
        voided_by: row.try_get("voided_by")?,
        voided_at: row.try_get("voided_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        revision: row.try_get("revision")?,
    })
}

fn correction_from_row(row: &SqliteRow) -> DbResult<InvoiceCorrection> {
    Ok(InvoiceCorrection {
        id: row.try_get("id")?,
        invoice_id: row.try_get("invoice_id")?,
        prior_provider_id: row.try_get("prior_provider_id")?,
        prior_total_cents: row.try_get("prior_total_cents")?,
        prior_commission_pct: row.try_get("prior_commission_pct")?,
        prior_commission_cents: row.try_get("prior_commission_cents")?,
        prior_house_cents: row.try_get("prior_house_cents")?,
        prior_payment_method: row.try_get("prior_payment_method")?,
        corrected_by: row.try_get("corrected_by")?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use clipper_core::{split, CommissionRate, Money, PaymentMethod};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sample_invoice(total_cents: i64, pct: u32) -> Invoice {
        let parts = split(
            Money::from_cents(total_cents),
            CommissionRate::from_percent(pct),
        )
        .unwrap();
        let now = Utc::now();

        Invoice {
            id: Uuid::new_v4().to_string(),
            provider_id: "prov-1".to_string(),
            appointment_id: None,
            line_items: vec![LineItem {
                description: "Corte clásico".to_string(),
                unit_price_cents: total_cents,
                quantity: 1,
            }],
            total_cents,
            commission_pct: pct,
            commission_cents: parts.commission.cents(),
            house_cents: parts.house.cents(),
            payment_method: PaymentMethod::Cash,
            voided: false,
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let db = test_db().await;
        let repo = db.invoices();

        let invoice = sample_invoice(20_000, 50);
        repo.insert(&invoice).await.unwrap();

        let loaded = repo.get(&invoice.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_cents, 20_000);
        assert_eq!(loaded.commission_cents, 10_000);
        assert_eq!(loaded.house_cents, 10_000);
        assert_eq!(loaded.line_items, invoice.line_items);
        assert!(!loaded.voided);
        assert_eq!(loaded.revision, 0);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let db = test_db().await;
        assert!(db.invoices().get("no-such").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn void_sets_terminal_fields() {
        let db = test_db().await;
        let repo = db.invoices();

        let invoice = sample_invoice(10_000, 70);
        repo.insert(&invoice).await.unwrap();

        let voided = repo
            .void(&invoice.id, "charged the wrong client", "cashier-3")
            .await
            .unwrap();
        assert!(voided.voided);
        assert_eq!(voided.void_reason.as_deref(), Some("charged the wrong client"));
        assert_eq!(voided.voided_by.as_deref(), Some("cashier-3"));
        assert!(voided.voided_at.is_some());
        assert_eq!(voided.revision, 1);
    }

    #[tokio::test]
    async fn double_void_conflicts_without_state_change() {
        let db = test_db().await;
        let repo = db.invoices();

        let invoice = sample_invoice(10_000, 70);
        repo.insert(&invoice).await.unwrap();
        let voided = repo.void(&invoice.id, "first", "cashier-1").await.unwrap();

        let err = repo.void(&invoice.id, "second", "cashier-2").await.unwrap_err();
        assert!(err.is_conflict());

        let current = repo.get(&invoice.id).await.unwrap().unwrap();
        assert_eq!(current.void_reason.as_deref(), Some("first"));
        assert_eq!(current.revision, voided.revision);
    }

    #[tokio::test]
    async fn void_missing_is_not_found() {
        let db = test_db().await;
        let err = db
            .invoices()
            .void("no-such", "reason", "cashier-1")
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn correction_overwrites_and_snapshots_prior_state() {
        let db = test_db().await;
        let repo = db.invoices();

        let prior = sample_invoice(20_000, 50);
        repo.insert(&prior).await.unwrap();

        // Reassign the sale to a 60% provider
        let parts = split(Money::from_cents(20_000), CommissionRate::from_percent(60)).unwrap();
        let mut updated = prior.clone();
        updated.provider_id = "prov-2".to_string();
        updated.commission_pct = 60;
        updated.commission_cents = parts.commission.cents();
        updated.house_cents = parts.house.cents();

        let corrected = repo
            .apply_correction(&updated, &prior, Some("admin-1"))
            .await
            .unwrap();
        assert_eq!(corrected.provider_id, "prov-2");
        assert_eq!(corrected.commission_cents, 12_000);
        assert_eq!(corrected.house_cents, 8_000);
        assert_eq!(corrected.revision, 1);

        let audit = repo.corrections(&prior.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].prior_provider_id, "prov-1");
        assert_eq!(audit[0].prior_commission_pct, 50);
        assert_eq!(audit[0].prior_commission_cents, 10_000);
        assert_eq!(audit[0].corrected_by.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn correction_of_voided_invoice_conflicts() {
        let db = test_db().await;
        let repo = db.invoices();

        let prior = sample_invoice(20_000, 50);
        repo.insert(&prior).await.unwrap();
        repo.void(&prior.id, "gone", "cashier-1").await.unwrap();

        let updated = prior.clone();
        let err = repo
            .apply_correction(&updated, &prior, None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // No audit row for the refused correction
        assert!(repo.corrections(&prior.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_revision_loses_the_race() {
        let db = test_db().await;
        let repo = db.invoices();

        let prior = sample_invoice(20_000, 50);
        repo.insert(&prior).await.unwrap();

        // First correction wins and bumps the revision
        let first = prior.clone();
        repo.apply_correction(&first, &prior, None).await.unwrap();

        // Second writer still holds revision 0 and must lose
        let err = repo
            .apply_correction(&prior, &prior, None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
