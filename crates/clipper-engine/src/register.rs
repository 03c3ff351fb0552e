//! # Register Service
//!
//! The operations a POS terminal calls, wired end to end.
//!
//! ## A Sale, End To End
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      record_sale(request)                               │
//! │                                                                         │
//! │  1. Validate amounts and line items (clipper-core::validation)         │
//! │  2. Session must exist and be open (fail fast, before any write)       │
//! │  3. ProviderDirectory::get_provider → commission percentage            │
//! │  4. money::split → commission / house, sum-exact by construction       │
//! │  5. InvoiceRepository::insert                                          │
//! │  6. SessionRepository::record_sale                                     │
//! │     └── atomic `expected += amount` + sale movement, one transaction   │
//! │                                                                         │
//! │  Steps 5 and 6 are separate row-level transactions on purpose: the     │
//! │  session row and the invoice row are independent shared resources,     │
//! │  and the reconciliation reporter audits the seam between them.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Destructive operations route through the [`SecurityGate`]; appointment
//! side effects are best-effort with the outbox as their safety net.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clipper_core::validation::{
    validate_adjustment_amount, validate_closing_amount, validate_commission_pct,
    validate_description, validate_line_items, validate_opening_amount, validate_sale_amount,
};
use clipper_core::{
    split, CashSession, CommissionRate, Invoice, LineItem, Money, PaymentMethod, ValidationError,
};
use clipper_db::{
    Database, DbError, MismatchReport, OutboxAction, OutboxEntry, ReconcileOptions,
};

use crate::collaborators::{
    AppointmentBook, CollaboratorError, PaymentStatus, PaymentStatusPayload, Provider,
    ProviderDirectory, ProviderServicePayload,
};
use crate::error::{EngineError, EngineResult};
use crate::gate::{SecurityGate, VOID_PIN_KEY};

// =============================================================================
// Requests & Responses
// =============================================================================

/// Everything needed to record a completed sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSaleRequest {
    /// The open session taking the sale.
    pub session_id: String,
    /// The provider who performed the service.
    pub provider_id: String,
    /// Service lines, frozen onto the invoice.
    pub line_items: Vec<LineItem>,
    /// Sale total in cents.
    pub total_cents: i64,
    /// How the client paid.
    pub payment_method: PaymentMethod,
    /// The appointment this sale settles, if it came from one.
    pub appointment_id: Option<String>,
    /// Client-generated retry token. Optional; when present, a duplicate
    /// is rejected instead of double-counted.
    pub idempotency_key: Option<String>,
}

/// What a recorded sale hands back to the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleReceipt {
    /// The persisted invoice with its commission split.
    pub invoice: Invoice,
    /// The session with its updated expected total.
    pub session: CashSession,
}

/// A non-void amendment to an invoice.
///
/// All fields optional; absent fields leave the invoice untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrectionRequest {
    /// Reassign the sale to a different provider (split recomputes at the
    /// new provider's percentage).
    pub new_provider_id: Option<String>,
    /// Replace the billed service (split recomputes at the new total).
    pub new_service: Option<ServiceChange>,
    /// Change how the sale was paid.
    pub new_payment_method: Option<PaymentMethod>,
    /// Who asked for the correction, for the audit trail.
    pub corrected_by: Option<String>,
}

/// The replacement service on a correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceChange {
    /// New service description; overwrites the first line item.
    pub description: String,
    /// New sale total in cents.
    pub total_cents: i64,
}

/// Result of one outbox retry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Entries that replayed successfully.
    pub resolved: usize,
    /// Entries that failed again and stay queued.
    pub failed: usize,
}

// =============================================================================
// Register Service
// =============================================================================

/// The cash-register engine.
///
/// Generic over its collaborator seams so host applications (and tests)
/// supply their own provider directory and appointment book.
#[derive(Debug, Clone)]
pub struct RegisterService<P, A> {
    db: Database,
    providers: P,
    appointments: A,
}

impl<P, A> RegisterService<P, A>
where
    P: ProviderDirectory,
    A: AppointmentBook,
{
    /// Creates a new register service over the given store and collaborators.
    pub fn new(db: Database, providers: P, appointments: A) -> Self {
        RegisterService {
            db,
            providers,
            appointments,
        }
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Opens a register session for an operator.
    ///
    /// ## Errors
    /// - `Validation` on a negative opening float or blank operator
    /// - `Conflict` if the operator already has an open session
    pub async fn open_register(
        &self,
        operator_id: &str,
        opening_cents: i64,
    ) -> EngineResult<CashSession> {
        require_id("operator_id", operator_id)?;
        validate_opening_amount(opening_cents)?;

        let session = self.db.sessions().open(operator_id, opening_cents).await?;

        info!(
            session_id = %session.id,
            operator_id = %operator_id,
            opening = %Money::from_cents(opening_cents),
            "Register opened"
        );

        Ok(session)
    }

    /// Records a completed sale: invoice + session movement.
    pub async fn record_sale(&self, request: RecordSaleRequest) -> EngineResult<SaleReceipt> {
        validate_sale_amount(request.total_cents)?;
        validate_line_items(&request.line_items)?;

        // A retried request that already landed must not mint a second
        // invoice; the movement's unique index backs this check up.
        if let Some(key) = request.idempotency_key.as_deref() {
            if self
                .db
                .sessions()
                .find_by_idempotency_key(key)
                .await?
                .is_some()
            {
                return Err(DbError::conflict("Movement", "duplicate idempotency key").into());
            }
        }

        // Fail fast on session state before writing anything
        let session = self
            .db
            .sessions()
            .get(&request.session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", &request.session_id))?;
        if !session.is_open() {
            return Err(DbError::conflict("CashSession", "session is closed").into());
        }

        let provider = self.lookup_provider(&request.provider_id).await?;
        validate_commission_pct(provider.commission_pct)?;

        let parts = split(
            Money::from_cents(request.total_cents),
            CommissionRate::from_percent(provider.commission_pct),
        )?;

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            provider_id: provider.id,
            appointment_id: request.appointment_id,
            line_items: request.line_items,
            total_cents: request.total_cents,
            commission_pct: provider.commission_pct,
            commission_cents: parts.commission.cents(),
            house_cents: parts.house.cents(),
            payment_method: request.payment_method,
            voided: false,
            void_reason: None,
            voided_by: None,
            voided_at: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        self.db.invoices().insert(&invoice).await?;

        self.db
            .sessions()
            .record_sale(
                &request.session_id,
                request.total_cents,
                request.payment_method,
                &invoice.id,
                request.idempotency_key.as_deref(),
            )
            .await?;

        let session = self
            .db
            .sessions()
            .get(&request.session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", &request.session_id))?;

        info!(
            invoice_id = %invoice.id,
            session_id = %session.id,
            total = %invoice.total(),
            commission = %invoice.commission(),
            house = %invoice.house(),
            "Sale recorded"
        );

        Ok(SaleReceipt { invoice, session })
    }

    /// Records a manual adjustment to a session's expected total.
    pub async fn record_adjustment(
        &self,
        session_id: &str,
        amount_cents: i64,
        reason: &str,
    ) -> EngineResult<CashSession> {
        validate_adjustment_amount(amount_cents)?;
        validate_description(reason)?;

        self.db
            .sessions()
            .record_adjustment(session_id, amount_cents, reason)
            .await?;

        let session = self
            .db
            .sessions()
            .get(session_id)
            .await?
            .ok_or_else(|| DbError::not_found("CashSession", session_id))?;

        info!(
            session_id = %session_id,
            amount = %Money::from_cents(amount_cents),
            "Adjustment recorded"
        );

        Ok(session)
    }

    /// Closes a register session against the counted drawer amount.
    pub async fn close_register(
        &self,
        session_id: &str,
        actual_close_cents: i64,
        notes: Option<&str>,
    ) -> EngineResult<CashSession> {
        validate_closing_amount(actual_close_cents)?;
        if let Some(n) = notes {
            validate_description(n)?;
        }

        let session = self
            .db
            .sessions()
            .close(session_id, actual_close_cents, notes)
            .await?;

        info!(
            session_id = %session_id,
            expected = %session.expected_close(),
            counted = %Money::from_cents(actual_close_cents),
            variance = %session.variance().unwrap_or_default(),
            "Register closed"
        );

        Ok(session)
    }

    // -------------------------------------------------------------------------
    // Invoice mutation
    // -------------------------------------------------------------------------

    /// Voids an invoice. Terminal; gated by the void pin.
    ///
    /// On success the linked appointment (if any) has its payment status
    /// reset to pending. That reset is best-effort: a collaborator failure
    /// is logged and queued for
    /// [`retry_appointment_updates`](Self::retry_appointment_updates), and
    /// never rolls back the void.
    ///
    /// ## Errors
    /// - `Unauthorized` if a pin is configured and `security_key` mismatches
    /// - `NotFound` / `Conflict` per the invoice state machine
    pub async fn void_invoice(
        &self,
        invoice_id: &str,
        reason: &str,
        actor_id: &str,
        security_key: Option<&str>,
    ) -> EngineResult<Invoice> {
        validate_description(reason)?;

        let secret = self.db.config().get(VOID_PIN_KEY).await?;
        let gate = SecurityGate::new(secret);
        if !gate.authorize(security_key) {
            warn!(invoice_id = %invoice_id, actor_id = %actor_id, "Void rejected: security key mismatch");
            return Err(EngineError::Unauthorized);
        }

        let voided = self.db.invoices().void(invoice_id, reason, actor_id).await?;

        if let Some(appointment_id) = voided.appointment_id.as_deref() {
            let payload = PaymentStatusPayload {
                status: PaymentStatus::Pending,
            };
            if let Err(err) = self
                .appointments
                .set_payment_status(appointment_id, PaymentStatus::Pending)
                .await
            {
                warn!(
                    invoice_id = %invoice_id,
                    appointment_id = %appointment_id,
                    error = %err,
                    "Appointment payment-status reset failed; queued for retry"
                );
                self.db
                    .appointment_outbox()
                    .enqueue(
                        appointment_id,
                        OutboxAction::SetPaymentStatus,
                        &encode_payload(&payload),
                        &err.to_string(),
                    )
                    .await?;
            } else {
                debug!(appointment_id = %appointment_id, "Appointment reset to pending");
            }
        }

        info!(invoice_id = %invoice_id, actor_id = %actor_id, "Invoice voided");

        Ok(voided)
    }

    /// Corrects an invoice's provider, service, or payment method.
    ///
    /// Recomputes the commission split whenever the provider or the total
    /// changed, overwrites the invoice's current view, and snapshots the
    /// prior monetary state onto the audit trail. Linked appointments get a
    /// best-effort provider/service update.
    ///
    /// ## Errors
    /// - `Conflict` if the invoice is voided or was mutated concurrently
    pub async fn correct_invoice(
        &self,
        invoice_id: &str,
        request: CorrectionRequest,
    ) -> EngineResult<Invoice> {
        let prior = self
            .db
            .invoices()
            .get(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;
        if prior.voided {
            return Err(DbError::conflict("Invoice", "invoice is voided").into());
        }

        let mut updated = prior.clone();
        let mut commission_pct = prior.commission_pct;

        if let Some(new_provider_id) = request.new_provider_id.as_deref() {
            if new_provider_id != prior.provider_id {
                let provider = self.lookup_provider(new_provider_id).await?;
                validate_commission_pct(provider.commission_pct)?;
                commission_pct = provider.commission_pct;
                updated.provider_id = provider.id;
            }
        }

        if let Some(service) = &request.new_service {
            validate_sale_amount(service.total_cents)?;
            validate_description(&service.description)?;

            updated.total_cents = service.total_cents;
            let replacement = LineItem {
                description: service.description.clone(),
                unit_price_cents: service.total_cents,
                quantity: 1,
            };
            // The first line is the principal service; replace it, keep the rest
            match updated.line_items.first_mut() {
                Some(first) => *first = replacement,
                None => updated.line_items.push(replacement),
            }
        }

        if let Some(method) = request.new_payment_method {
            updated.payment_method = method;
        }

        let provider_changed = updated.provider_id != prior.provider_id;
        let total_changed = updated.total_cents != prior.total_cents;
        if provider_changed || total_changed {
            let parts = split(
                Money::from_cents(updated.total_cents),
                CommissionRate::from_percent(commission_pct),
            )?;
            updated.commission_pct = commission_pct;
            updated.commission_cents = parts.commission.cents();
            updated.house_cents = parts.house.cents();
        }

        let corrected = self
            .db
            .invoices()
            .apply_correction(&updated, &prior, request.corrected_by.as_deref())
            .await?;

        if let Some(appointment_id) = corrected.appointment_id.as_deref() {
            if provider_changed || request.new_service.is_some() {
                let provider_id = provider_changed.then(|| corrected.provider_id.clone());
                let service_name = request
                    .new_service
                    .as_ref()
                    .map(|s| s.description.clone());
                let payload = ProviderServicePayload {
                    provider_id: provider_id.clone(),
                    service_name: service_name.clone(),
                };

                if let Err(err) = self
                    .appointments
                    .set_provider_and_service(
                        appointment_id,
                        provider_id.as_deref(),
                        service_name.as_deref(),
                    )
                    .await
                {
                    warn!(
                        invoice_id = %invoice_id,
                        appointment_id = %appointment_id,
                        error = %err,
                        "Appointment provider/service update failed; queued for retry"
                    );
                    self.db
                        .appointment_outbox()
                        .enqueue(
                            appointment_id,
                            OutboxAction::SetProviderAndService,
                            &encode_payload(&payload),
                            &err.to_string(),
                        )
                        .await?;
                }
            }
        }

        info!(
            invoice_id = %invoice_id,
            commission = %corrected.commission(),
            house = %corrected.house(),
            "Invoice corrected"
        );

        Ok(corrected)
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Replays unresolved appointment updates from the outbox.
    ///
    /// At-least-once: an entry that fails again stays queued with its error
    /// recorded; an entry that lands is marked resolved.
    pub async fn retry_appointment_updates(&self, limit: u32) -> EngineResult<SweepOutcome> {
        let outbox = self.db.appointment_outbox();
        let pending = outbox.pending(limit).await?;

        let mut outcome = SweepOutcome {
            resolved: 0,
            failed: 0,
        };

        for entry in pending {
            match self.replay_entry(&entry).await {
                Ok(()) => {
                    outbox.mark_resolved(&entry.id).await?;
                    outcome.resolved += 1;
                }
                Err(err) => {
                    warn!(
                        entry_id = %entry.id,
                        appointment_id = %entry.appointment_id,
                        error = %err,
                        "Outbox replay failed"
                    );
                    outbox.mark_failed(&entry.id, &err.to_string()).await?;
                    outcome.failed += 1;
                }
            }
        }

        info!(
            resolved = outcome.resolved,
            failed = outcome.failed,
            "Appointment outbox sweep complete"
        );

        Ok(outcome)
    }

    /// Runs the read-only reconciliation audit over stored invoices.
    pub async fn reconcile(&self, options: ReconcileOptions) -> EngineResult<Vec<MismatchReport>> {
        Ok(self.db.reconciler().run(&options).await?)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    async fn lookup_provider(&self, provider_id: &str) -> EngineResult<Provider> {
        self.providers
            .get_provider(provider_id)
            .await
            .map_err(|err| match err {
                CollaboratorError::NotFound { .. } => {
                    EngineError::ProviderNotFound(provider_id.to_string())
                }
                other => EngineError::Collaborator(other),
            })
    }

    async fn replay_entry(&self, entry: &OutboxEntry) -> Result<(), CollaboratorError> {
        match entry.action {
            OutboxAction::SetPaymentStatus => {
                let payload: PaymentStatusPayload = decode_payload(&entry.payload)?;
                self.appointments
                    .set_payment_status(&entry.appointment_id, payload.status)
                    .await
            }
            OutboxAction::SetProviderAndService => {
                let payload: ProviderServicePayload = decode_payload(&entry.payload)?;
                self.appointments
                    .set_provider_and_service(
                        &entry.appointment_id,
                        payload.provider_id.as_deref(),
                        payload.service_name.as_deref(),
                    )
                    .await
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn require_id(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Outbox payloads are plain data and always serialize; if one somehow
/// cannot, an empty object keeps the void/correction from failing over a
/// logging-adjacent concern.
fn encode_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string())
}

fn decode_payload<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, CollaboratorError> {
    serde_json::from_str(json)
        .map_err(|e| CollaboratorError::Unavailable(format!("corrupt outbox payload: {e}")))
}
