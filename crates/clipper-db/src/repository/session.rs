//! # Session Repository
//!
//! Database operations for cash-register sessions and their movement ledger.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Session Lifecycle                                  │
//! │                                                                         │
//! │  1. OPEN                                                               │
//! │     └── open() → CashSession { status: Open }                          │
//! │     └── (Appends the `opening` movement in the same transaction)       │
//! │                                                                         │
//! │  2. TAKE MOVEMENTS                                                     │
//! │     └── record_sale() → expected total += amount, `sale` movement      │
//! │     └── record_adjustment() → expected total += signed amount          │
//! │                                                                         │
//! │  3. CLOSE (terminal)                                                   │
//! │     └── close() → variance = counted − expected, `closing` movement    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Notes
//!
//! Several POS terminals hit the same session concurrently, so every state
//! transition is a guarded UPDATE whose WHERE clause re-checks the state
//! machine, never a read-then-write:
//!
//! - the running total moves only via
//!   `expected_close_cents = expected_close_cents + ?`, so two concurrent
//!   sales cannot lose an increment;
//! - one open session per operator is a partial unique index, so two
//!   terminals racing `open()` cannot both win;
//! - `close()` computes the variance inside the UPDATE itself
//!   (`variance_cents = ? - expected_close_cents`) and only fires while the
//!   row is still open.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use clipper_core::{CashSession, Movement, MovementKind, PaymentMethod, SessionStatus};

/// Repository for session and movement database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Opens a new register session for an operator.
    ///
    /// Inserts the session row and its `opening` movement in one
    /// transaction. The partial unique index on open sessions turns a
    /// concurrent double-open into a constraint violation, surfaced here
    /// as a `Conflict`.
    ///
    /// ## Errors
    /// - `Conflict` if the operator already has an open session
    pub async fn open(&self, operator_id: &str, opening_cents: i64) -> DbResult<CashSession> {
        let now = Utc::now();
        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            operator_id: operator_id.to_string(),
            status: SessionStatus::Open,
            opening_cents,
            expected_close_cents: opening_cents,
            actual_close_cents: None,
            variance_cents: None,
            opened_at: now,
            closed_at: None,
        };

        debug!(id = %session.id, operator_id = %operator_id, opening_cents, "Opening session");

        let mut tx = self.pool.begin().await?;

        let insert = sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, operator_id, status, opening_cents, expected_close_cents,
                actual_close_cents, variance_cents, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&session.id)
        .bind(&session.operator_id)
        .bind(session.status)
        .bind(session.opening_cents)
        .bind(session.expected_close_cents)
        .bind(session.actual_close_cents)
        .bind(session.variance_cents)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = insert {
            return Err(match DbError::from(err) {
                DbError::UniqueViolation { .. } => DbError::conflict(
                    "CashSession",
                    format!("operator {operator_id} already has an open session"),
                ),
                other => other,
            });
        }

        let opening = Movement {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            kind: MovementKind::Opening,
            amount_cents: opening_cents,
            payment_method: None,
            reference_id: None,
            idempotency_key: None,
            description: Some("Opening float".to_string()),
            created_at: now,
        };
        insert_movement(&mut tx, &opening).await?;

        tx.commit().await?;

        Ok(session)
    }

    /// Gets a session by ID.
    pub async fn get(&self, session_id: &str) -> DbResult<Option<CashSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, operator_id, status, opening_cents, expected_close_cents,
                   actual_close_cents, variance_cents, opened_at, closed_at
            FROM cash_sessions
            WHERE id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    /// Finds the operator's currently open session, if any.
    pub async fn find_open_for_operator(&self, operator_id: &str) -> DbResult<Option<CashSession>> {
        let row = sqlx::query(
            r#"
            SELECT id, operator_id, status, opening_cents, expected_close_cents,
                   actual_close_cents, variance_cents, opened_at, closed_at
            FROM cash_sessions
            WHERE operator_id = ?1 AND status = 'open'
            "#,
        )
        .bind(operator_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    /// Records a sale movement and bumps the session's expected total.
    ///
    /// The increment and the movement insert are one transaction; the
    /// increment happens in-place inside the UPDATE, so concurrent sales on
    /// the same session serialize without losing either amount.
    ///
    /// ## Errors
    /// - `NotFound` if the session does not exist
    /// - `Conflict` if the session is closed
    /// - `Conflict` if the idempotency key was already used
    pub async fn record_sale(
        &self,
        session_id: &str,
        amount_cents: i64,
        payment_method: PaymentMethod,
        invoice_id: &str,
        idempotency_key: Option<&str>,
    ) -> DbResult<Movement> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET expected_close_cents = expected_close_cents + ?1
            WHERE id = ?2 AND status = 'open'
            "#,
        )
        .bind(amount_cents)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(open_guard_failure(&mut tx, session_id).await);
        }

        let movement = Movement {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            kind: MovementKind::Sale,
            amount_cents,
            payment_method: Some(payment_method),
            reference_id: Some(invoice_id.to_string()),
            idempotency_key: idempotency_key.map(str::to_string),
            description: None,
            created_at: Utc::now(),
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        debug!(
            session_id = %session_id,
            invoice_id = %invoice_id,
            amount_cents,
            "Sale recorded"
        );

        Ok(movement)
    }

    /// Records a manual adjustment to the expected total.
    ///
    /// Same transaction shape as [`record_sale`](Self::record_sale); the
    /// amount may be negative.
    pub async fn record_adjustment(
        &self,
        session_id: &str,
        amount_cents: i64,
        reason: &str,
    ) -> DbResult<Movement> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET expected_close_cents = expected_close_cents + ?1
            WHERE id = ?2 AND status = 'open'
            "#,
        )
        .bind(amount_cents)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(open_guard_failure(&mut tx, session_id).await);
        }

        let movement = Movement {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            kind: MovementKind::Adjustment,
            amount_cents,
            payment_method: None,
            reference_id: None,
            idempotency_key: None,
            description: Some(reason.to_string()),
            created_at: Utc::now(),
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        debug!(session_id = %session_id, amount_cents, "Adjustment recorded");

        Ok(movement)
    }

    /// Closes a session, computing its variance. Terminal.
    ///
    /// The variance is computed inside the UPDATE
    /// (`variance_cents = counted − expected_close_cents`), so the expected
    /// total it settles against is exactly the one the row held when the
    /// status flipped.
    ///
    /// ## Errors
    /// - `NotFound` if the session does not exist
    /// - `Conflict` if the session is already closed
    pub async fn close(
        &self,
        session_id: &str,
        actual_close_cents: i64,
        notes: Option<&str>,
    ) -> DbResult<CashSession> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'closed',
                actual_close_cents = ?1,
                variance_cents = ?1 - expected_close_cents,
                closed_at = ?2
            WHERE id = ?3 AND status = 'open'
            "#,
        )
        .bind(actual_close_cents)
        .bind(now)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(open_guard_failure(&mut tx, session_id).await);
        }

        let description = match notes {
            Some(n) if !n.trim().is_empty() => format!("Close count. Notes: {n}"),
            _ => "Close count".to_string(),
        };
        let closing = Movement {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            kind: MovementKind::Closing,
            amount_cents: actual_close_cents,
            payment_method: None,
            reference_id: None,
            idempotency_key: None,
            description: Some(description),
            created_at: now,
        };
        insert_movement(&mut tx, &closing).await?;

        tx.commit().await?;

        debug!(session_id = %session_id, actual_close_cents, "Session closed");

        self.get(session_id)
            .await?
            .ok_or_else(|| DbError::Internal(format!("session {session_id} vanished after close")))
    }

    /// Gets a session's movements in creation order.
    pub async fn movements(&self, session_id: &str) -> DbResult<Vec<Movement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, kind, amount_cents, payment_method,
                   reference_id, idempotency_key, description, created_at
            FROM movements
            WHERE session_id = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(movement_from_row).collect()
    }

    /// Finds the sale movement recorded under an idempotency key, if any.
    ///
    /// Callers check this before building a new invoice for a retried
    /// request; the unique index remains the authoritative guard.
    pub async fn find_by_idempotency_key(&self, key: &str) -> DbResult<Option<Movement>> {
        let row = sqlx::query(
            r#"
            SELECT id, session_id, kind, amount_cents, payment_method,
                   reference_id, idempotency_key, description, created_at
            FROM movements
            WHERE idempotency_key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(movement_from_row).transpose()
    }

    /// Recomputes the expected total from the movement ledger.
    ///
    /// `opening + Σ signed deltas` must equal the stored
    /// `expected_close_cents` at every read; test suites and audits use
    /// this to verify the running total was never corrupted.
    pub async fn recomputed_expected_cents(&self, session_id: &str) -> DbResult<i64> {
        let recomputed: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT s.opening_cents + COALESCE((
                SELECT SUM(m.amount_cents)
                FROM movements m
                WHERE m.session_id = s.id
                  AND m.kind IN ('sale', 'adjustment')
            ), 0)
            FROM cash_sessions s
            WHERE s.id = ?1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        recomputed.ok_or_else(|| DbError::not_found("CashSession", session_id))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Explains a zero-rows-affected guard failure: missing row vs closed row.
async fn open_guard_failure(tx: &mut Transaction<'_, Sqlite>, session_id: &str) -> DbError {
    let status: Result<Option<SessionStatus>, sqlx::Error> =
        sqlx::query_scalar("SELECT status FROM cash_sessions WHERE id = ?1")
            .bind(session_id)
            .fetch_optional(&mut **tx)
            .await;

    match status {
        Ok(None) => DbError::not_found("CashSession", session_id),
        Ok(Some(_)) => DbError::conflict("CashSession", "session is closed"),
        Err(err) => err.into(),
    }
}

/// Appends a movement row. Movements are immutable; this is the only write
/// the `movements` table ever sees.
async fn insert_movement(tx: &mut Transaction<'_, Sqlite>, movement: &Movement) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO movements (
            id, session_id, kind, amount_cents, payment_method,
            reference_id, idempotency_key, description, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.session_id)
    .bind(movement.kind)
    .bind(movement.amount_cents)
    .bind(movement.payment_method)
    .bind(&movement.reference_id)
    .bind(&movement.idempotency_key)
    .bind(&movement.description)
    .bind(movement.created_at)
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) => Err(match DbError::from(err) {
            DbError::UniqueViolation { field, .. } if field.contains("idempotency_key") => {
                DbError::conflict("Movement", "duplicate idempotency key")
            }
            other => other,
        }),
    }
}

fn session_from_row(row: &SqliteRow) -> DbResult<CashSession> {
    Ok(CashSession {
        id: row.try_get("id")?,
        operator_id: row.try_get("operator_id")?,
        status: row.try_get("status")?,
        opening_cents: row.try_get("opening_cents")?,
        expected_close_cents: row.try_get("expected_close_cents")?,
        actual_close_cents: row.try_get("actual_close_cents")?,
        variance_cents: row.try_get("variance_cents")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
    })
}

fn movement_from_row(row: &SqliteRow) -> DbResult<Movement> {
    Ok(Movement {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        kind: row.try_get("kind")?,
        amount_cents: row.try_get("amount_cents")?,
        payment_method: row.try_get("payment_method")?,
        reference_id: row.try_get("reference_id")?,
        idempotency_key: row.try_get("idempotency_key")?,
        description: row.try_get("description")?,
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

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn open_writes_session_and_opening_movement() {
        let db = test_db().await;
        let repo = db.sessions();

        let session = repo.open("op-1", 50_000).await.unwrap();
        assert!(session.is_open());
        assert_eq!(session.opening_cents, 50_000);
        assert_eq!(session.expected_close_cents, 50_000);

        let movements = repo.movements(&session.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Opening);
        assert_eq!(movements[0].amount_cents, 50_000);
    }

    #[tokio::test]
    async fn second_open_for_same_operator_conflicts() {
        let db = test_db().await;
        let repo = db.sessions();

        repo.open("op-1", 10_000).await.unwrap();
        let err = repo.open("op-1", 20_000).await.unwrap_err();
        assert!(err.is_conflict(), "got: {err}");

        // A different operator is unaffected
        repo.open("op-2", 5_000).await.unwrap();
    }

    #[tokio::test]
    async fn closing_frees_the_operator_to_reopen() {
        let db = test_db().await;
        let repo = db.sessions();

        let first = repo.open("op-1", 10_000).await.unwrap();
        repo.close(&first.id, 10_000, None).await.unwrap();

        let second = repo.open("op-1", 15_000).await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn running_total_tracks_sales_and_adjustments() {
        let db = test_db().await;
        let repo = db.sessions();

        let session = repo.open("op-1", 50_000).await.unwrap();

        repo.record_sale(&session.id, 10_000, PaymentMethod::Cash, "inv-1", None)
            .await
            .unwrap();
        let after_first = repo.get(&session.id).await.unwrap().unwrap();
        assert_eq!(after_first.expected_close_cents, 60_000);

        repo.record_sale(&session.id, 15_000, PaymentMethod::Card, "inv-2", None)
            .await
            .unwrap();
        let after_second = repo.get(&session.id).await.unwrap().unwrap();
        assert_eq!(after_second.expected_close_cents, 75_000);

        repo.record_adjustment(&session.id, -2_000, "drawer shortfall")
            .await
            .unwrap();
        let after_adjustment = repo.get(&session.id).await.unwrap().unwrap();
        assert_eq!(after_adjustment.expected_close_cents, 73_000);

        // The stored total always equals opening + the ledger's signed deltas
        assert_eq!(
            repo.recomputed_expected_cents(&session.id).await.unwrap(),
            73_000
        );
        let movements = repo.movements(&session.id).await.unwrap();
        let replayed: i64 = session.opening_cents
            + movements.iter().map(Movement::signed_delta).sum::<i64>();
        assert_eq!(replayed, 73_000);
    }

    #[tokio::test]
    async fn close_computes_variance_and_is_terminal() {
        let db = test_db().await;
        let repo = db.sessions();

        let session = repo.open("op-1", 50_000).await.unwrap();
        repo.record_sale(&session.id, 10_000, PaymentMethod::Cash, "inv-1", None)
            .await
            .unwrap();
        repo.record_sale(&session.id, 15_000, PaymentMethod::Cash, "inv-2", None)
            .await
            .unwrap();

        let closed = repo
            .close(&session.id, 74_000, Some("one short till roll"))
            .await
            .unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.expected_close_cents, 75_000);
        assert_eq!(closed.actual_close_cents, Some(74_000));
        assert_eq!(closed.variance_cents, Some(-1_000));
        assert!(closed.closed_at.is_some());

        // Closing twice fails
        let err = repo.close(&session.id, 74_000, None).await.unwrap_err();
        assert!(err.is_conflict());

        // A closed session takes no further movements
        let err = repo
            .record_sale(&session.id, 1_000, PaymentMethod::Cash, "inv-3", None)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let err = repo
            .record_adjustment(&session.id, 500, "late fix")
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn movements_keep_creation_order() {
        let db = test_db().await;
        let repo = db.sessions();

        let session = repo.open("op-1", 1_000).await.unwrap();
        for (i, amount) in [100i64, 200, 300].iter().enumerate() {
            repo.record_sale(
                &session.id,
                *amount,
                PaymentMethod::Cash,
                &format!("inv-{i}"),
                None,
            )
            .await
            .unwrap();
        }
        repo.close(&session.id, 1_600, None).await.unwrap();

        let kinds: Vec<MovementKind> = repo
            .movements(&session.id)
            .await
            .unwrap()
            .iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                MovementKind::Opening,
                MovementKind::Sale,
                MovementKind::Sale,
                MovementKind::Sale,
                MovementKind::Closing,
            ]
        );
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let db = test_db().await;
        let repo = db.sessions();

        let err = repo
            .record_sale("no-such", 1_000, PaymentMethod::Cash, "inv-1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let err = repo.close("no-such", 1_000, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_is_rejected_without_double_count() {
        let db = test_db().await;
        let repo = db.sessions();

        let session = repo.open("op-1", 10_000).await.unwrap();
        repo.record_sale(
            &session.id,
            2_500,
            PaymentMethod::Cash,
            "inv-1",
            Some("retry-token-1"),
        )
        .await
        .unwrap();

        // A client retry with the same token must not count the sale twice
        let err = repo
            .record_sale(
                &session.id,
                2_500,
                PaymentMethod::Cash,
                "inv-1",
                Some("retry-token-1"),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict(), "got: {err}");

        let session = repo.get(&session.id).await.unwrap().unwrap();
        assert_eq!(session.expected_close_cents, 12_500);
        assert_eq!(
            repo.recomputed_expected_cents(&session.id).await.unwrap(),
            12_500
        );
    }

    #[tokio::test]
    async fn find_open_for_operator() {
        let db = test_db().await;
        let repo = db.sessions();

        assert!(repo.find_open_for_operator("op-1").await.unwrap().is_none());

        let session = repo.open("op-1", 5_000).await.unwrap();
        let found = repo.find_open_for_operator("op-1").await.unwrap().unwrap();
        assert_eq!(found.id, session.id);

        repo.close(&session.id, 5_000, None).await.unwrap();
        assert!(repo.find_open_for_operator("op-1").await.unwrap().is_none());
    }
}
