//! # Appointment Outbox Repository
//!
//! Retry queue for best-effort appointment updates.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  PRIMARY OPERATION (e.g., void_invoice)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Invoice voided (authoritative, committed)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Appointment collaborator call: set payment status → pending        │
//! │       │                                                                 │
//! │       ├── OK → done, nothing queued                                    │
//! │       │                                                                 │
//! │       └── FAILED → warn! + INSERT INTO appointment_outbox              │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          OUT-OF-BAND SWEEP (retry_appointment_updates)          │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM appointment_outbox WHERE resolved_at IS NULL │   │
//! │  │                                                                 │   │
//! │  │  2. For each entry:                                            │   │
//! │  │     a. Replay the update against the collaborator              │   │
//! │  │     b. On success: UPDATE ... SET resolved_at = NOW()          │   │
//! │  │     c. On failure: UPDATE ... SET attempts += 1,               │   │
//! │  │                    last_error = ?                              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • The void/correction is never rolled back by a collaborator          │
//! │  • A failed appointment update is never lost, only deferred            │
//! │  • Replays are at-least-once; the updates themselves are idempotent    │
//! │    (setting a status or a provider twice lands in the same state)      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

// =============================================================================
// Entry Model
// =============================================================================

/// Which collaborator call the entry replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OutboxAction {
    /// Reset the appointment's payment status (invoice void).
    SetPaymentStatus,
    /// Push corrected provider/service onto the appointment.
    SetProviderAndService,
}

/// An unresolved appointment update awaiting retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    /// The appointment to update.
    pub appointment_id: String,
    /// Which collaborator call to replay.
    pub action: OutboxAction,
    /// JSON arguments for the call.
    pub payload: String,
    /// Number of delivery attempts so far.
    pub attempts: i64,
    /// Last error message if a retry failed.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// When delivery was last attempted.
    pub attempted_at: Option<DateTime<Utc>>,
    /// When the update finally landed.
    pub resolved_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for appointment outbox operations.
#[derive(Debug, Clone)]
pub struct AppointmentOutboxRepository {
    pool: SqlitePool,
}

impl AppointmentOutboxRepository {
    /// Creates a new AppointmentOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AppointmentOutboxRepository { pool }
    }

    /// Queues a failed appointment update for the retry sweep.
    ///
    /// ## Arguments
    /// * `appointment_id` - the appointment that missed its update
    /// * `action` - which collaborator call to replay
    /// * `payload` - JSON arguments for the call
    /// * `error` - the failure that landed the entry here
    pub async fn enqueue(
        &self,
        appointment_id: &str,
        action: OutboxAction,
        payload: &str,
        error: &str,
    ) -> DbResult<OutboxEntry> {
        let now = Utc::now();
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            appointment_id: appointment_id.to_string(),
            action,
            payload: payload.to_string(),
            attempts: 1,
            last_error: Some(error.to_string()),
            created_at: now,
            attempted_at: Some(now),
            resolved_at: None,
        };

        debug!(
            appointment_id = %appointment_id,
            action = ?action,
            "Queuing appointment update for retry"
        );

        sqlx::query(
            r#"
            INSERT INTO appointment_outbox (
                id, appointment_id, action, payload,
                attempts, last_error, created_at, attempted_at, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.appointment_id)
        .bind(entry.action)
        .bind(&entry.payload)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.attempted_at)
        .bind(entry.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Gets unresolved entries, oldest first.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, appointment_id, action, payload,
                   attempts, last_error, created_at, attempted_at, resolved_at
            FROM appointment_outbox
            WHERE resolved_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Marks an entry as successfully replayed.
    pub async fn mark_resolved(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE appointment_outbox
            SET resolved_at = ?2, attempted_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed retry.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            UPDATE appointment_outbox
            SET attempts = attempts + 1, last_error = ?2, attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts unresolved entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM appointment_outbox WHERE resolved_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes old resolved entries (cleanup).
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn cleanup_resolved(&self, days_old: u32) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM appointment_outbox
            WHERE resolved_at IS NOT NULL
              AND resolved_at < datetime('now', '-' || ?1 || ' days')
            "#,
        )
        .bind(days_old)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn entry_from_row(row: &SqliteRow) -> DbResult<OutboxEntry> {
    Ok(OutboxEntry {
        id: row.try_get("id")?,
        appointment_id: row.try_get("appointment_id")?,
        action: row.try_get("action")?,
        payload: row.try_get("payload")?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        attempted_at: row.try_get("attempted_at")?,
        resolved_at: row.try_get("resolved_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
