//! # External Collaborators
//!
//! Trait seams for the systems the ledger talks to but does not own.
//!
//! The register needs two things from the outside world: a provider's
//! commission percentage at sale time, and the ability to push state back
//! onto an appointment after a void or correction. Both live behind
//! `async_trait` traits so the host application decides where they resolve
//! (its scheduling module, an HTTP service, a test double).
//!
//! Appointment updates are **best-effort**: the ledger's own state change
//! is authoritative, a collaborator failure is logged and queued for the
//! retry sweep, and it never propagates into the primary operation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Data Transfer Types
// =============================================================================

/// A service provider as the directory exposes it. Read-only to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// The provider's contracted commission, whole percent.
    pub commission_pct: u32,
}

/// Payment state the ledger pushes onto an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Not settled; a voided invoice resets its appointment here.
    Pending,
    /// Settled by an invoice.
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

// =============================================================================
// Collaborator Error
// =============================================================================

/// Failures reported by collaborator implementations.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The referenced entity does not exist on the collaborator's side.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The collaborator could not be reached or failed internally.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl CollaboratorError {
    /// Creates a NotFound error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CollaboratorError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Looks up providers and their commission terms.
#[async_trait]
pub trait ProviderDirectory: Send + Sync {
    /// Resolves a provider by id.
    async fn get_provider(&self, provider_id: &str) -> Result<Provider, CollaboratorError>;
}

/// Pushes ledger-driven state onto appointments.
///
/// Implementations should make both operations idempotent: the retry sweep
/// delivers at-least-once, and setting the same status or provider twice
/// must land in the same state.
#[async_trait]
pub trait AppointmentBook: Send + Sync {
    /// Sets the appointment's payment status.
    async fn set_payment_status(
        &self,
        appointment_id: &str,
        status: PaymentStatus,
    ) -> Result<(), CollaboratorError>;

    /// Updates the appointment's provider and/or service after a correction.
    /// `None` arguments leave the corresponding field untouched.
    async fn set_provider_and_service(
        &self,
        appointment_id: &str,
        provider_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<(), CollaboratorError>;
}

// =============================================================================
// Outbox Payloads
// =============================================================================

/// Serialized arguments for a queued `set_payment_status` replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusPayload {
    pub status: PaymentStatus,
}

/// Serialized arguments for a queued `set_provider_and_service` replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderServicePayload {
    pub provider_id: Option<String>,
    pub service_name: Option<String>,
}
