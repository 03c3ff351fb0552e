//! End-to-end register flows over an in-memory store.
//!
//! Collaborators are in-memory doubles: a static provider directory and an
//! appointment book that records every call and can be told to fail, which
//! is how the best-effort/outbox path gets exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use clipper_core::{LineItem, MovementKind, PaymentMethod, SessionStatus};
use clipper_db::{DbConfig, MismatchKind};
use clipper_engine::{
    AppointmentBook, CollaboratorError, CorrectionRequest, Database, EngineError, PaymentStatus,
    Provider, ProviderDirectory, ReconcileOptions, RecordSaleRequest, RegisterService,
    ServiceChange, VOID_PIN_KEY,
};

// =============================================================================
// Collaborator Doubles
// =============================================================================

#[derive(Clone, Default)]
struct StaticProviders {
    providers: HashMap<String, Provider>,
}

impl StaticProviders {
    fn with(pairs: &[(&str, u32)]) -> Self {
        let providers = pairs
            .iter()
            .map(|(id, pct)| {
                (
                    id.to_string(),
                    Provider {
                        id: id.to_string(),
                        name: format!("Provider {id}"),
                        commission_pct: *pct,
                    },
                )
            })
            .collect();
        StaticProviders { providers }
    }
}

#[async_trait]
impl ProviderDirectory for StaticProviders {
    async fn get_provider(&self, provider_id: &str) -> Result<Provider, CollaboratorError> {
        self.providers
            .get(provider_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found("Provider", provider_id))
    }
}

#[derive(Clone, Default)]
struct FakeAppointments {
    calls: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
}

impl FakeAppointments {
    fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(CollaboratorError::Unavailable(
                "appointment service down".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AppointmentBook for FakeAppointments {
    async fn set_payment_status(
        &self,
        appointment_id: &str,
        status: PaymentStatus,
    ) -> Result<(), CollaboratorError> {
        self.check_available()?;
        self.calls
            .lock()
            .unwrap()
            .push(format!("payment_status:{appointment_id}:{status}"));
        Ok(())
    }

    async fn set_provider_and_service(
        &self,
        appointment_id: &str,
        provider_id: Option<&str>,
        service_name: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        self.check_available()?;
        self.calls.lock().unwrap().push(format!(
            "provider_service:{appointment_id}:{}:{}",
            provider_id.unwrap_or("-"),
            service_name.unwrap_or("-")
        ));
        Ok(())
    }
}

// =============================================================================
// Setup
// =============================================================================

type TestService = RegisterService<StaticProviders, FakeAppointments>;

async fn service_with(providers: &[(&str, u32)]) -> (TestService, FakeAppointments) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let appointments = FakeAppointments::default();
    let service = RegisterService::new(db, StaticProviders::with(providers), appointments.clone());
    (service, appointments)
}

fn haircut(total_cents: i64) -> Vec<LineItem> {
    vec![LineItem {
        description: "Corte clásico".to_string(),
        unit_price_cents: total_cents,
        quantity: 1,
    }]
}

fn sale(session_id: &str, provider_id: &str, total_cents: i64) -> RecordSaleRequest {
    RecordSaleRequest {
        session_id: session_id.to_string(),
        provider_id: provider_id.to_string(),
        line_items: haircut(total_cents),
        total_cents,
        payment_method: PaymentMethod::Cash,
        appointment_id: None,
        idempotency_key: None,
    }
}

// =============================================================================
// Session Flows
// =============================================================================

#[tokio::test]
async fn shift_open_sell_close() {
    let (service, _) = service_with(&[("p1", 70)]).await;

    let session = service.open_register("op-1", 50_000).await.unwrap();
    assert_eq!(session.expected_close_cents, 50_000);

    let first = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();
    assert_eq!(first.invoice.commission_cents, 7_000);
    assert_eq!(first.invoice.house_cents, 3_000);
    assert_eq!(first.session.expected_close_cents, 60_000);

    let second = service.record_sale(sale(&session.id, "p1", 15_000)).await.unwrap();
    assert_eq!(second.session.expected_close_cents, 75_000);

    let closed = service
        .close_register(&session.id, 74_000, Some("short one bill"))
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Closed);
    assert_eq!(closed.variance_cents, Some(-1_000));

    // The ledger replays to the same total the row carried
    let sessions = service.database().sessions();
    assert_eq!(
        sessions.recomputed_expected_cents(&session.id).await.unwrap(),
        75_000
    );
    let kinds: Vec<MovementKind> = sessions
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
            MovementKind::Closing,
        ]
    );
}

#[tokio::test]
async fn double_open_conflicts_until_closed() {
    let (service, _) = service_with(&[("p1", 70)]).await;

    let session = service.open_register("op-1", 10_000).await.unwrap();
    let err = service.open_register("op-1", 5_000).await.unwrap_err();
    assert!(err.is_conflict(), "got: {err}");

    service.close_register(&session.id, 10_000, None).await.unwrap();
    service.open_register("op-1", 5_000).await.unwrap();
}

#[tokio::test]
async fn sale_on_closed_register_writes_nothing() {
    let (service, _) = service_with(&[("p1", 70)]).await;

    let session = service.open_register("op-1", 10_000).await.unwrap();
    service.close_register(&session.id, 10_000, None).await.unwrap();

    let err = service
        .record_sale(sale(&session.id, "p1", 5_000))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // The fail-fast check ran before the invoice insert
    let invoice_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
        .fetch_one(service.database().pool())
        .await
        .unwrap();
    assert_eq!(invoice_count, 0);
}

#[tokio::test]
async fn adjustments_move_the_expected_total() {
    let (service, _) = service_with(&[("p1", 70)]).await;

    let session = service.open_register("op-1", 20_000).await.unwrap();
    let after = service
        .record_adjustment(&session.id, -1_500, "paid the water delivery")
        .await
        .unwrap();
    assert_eq!(after.expected_close_cents, 18_500);

    let err = service
        .record_adjustment(&session.id, 0, "noop")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn duplicate_idempotency_key_returns_conflict_and_no_second_invoice() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 10_000).await.unwrap();

    let mut request = sale(&session.id, "p1", 2_500);
    request.idempotency_key = Some("retry-1".to_string());
    service.record_sale(request.clone()).await.unwrap();

    let err = service.record_sale(request).await.unwrap_err();
    assert!(err.is_conflict(), "got: {err}");

    let invoice_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
        .fetch_one(service.database().pool())
        .await
        .unwrap();
    assert_eq!(invoice_count, 1);

    let current = service
        .database()
        .sessions()
        .get(&session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.expected_close_cents, 12_500);
}

// =============================================================================
// Invoice Flows
// =============================================================================

#[tokio::test]
async fn unknown_provider_fails_the_sale() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 10_000).await.unwrap();

    let err = service
        .record_sale(sale(&session.id, "p9", 5_000))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn correction_reassigns_provider_and_recomputes_split() {
    let (service, _) = service_with(&[("p1", 50), ("p2", 60)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();

    let receipt = service.record_sale(sale(&session.id, "p1", 20_000)).await.unwrap();
    assert_eq!(receipt.invoice.commission_cents, 10_000);

    let corrected = service
        .correct_invoice(
            &receipt.invoice.id,
            CorrectionRequest {
                new_provider_id: Some("p2".to_string()),
                corrected_by: Some("admin-1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(corrected.provider_id, "p2");
    assert_eq!(corrected.commission_pct, 60);
    assert_eq!(corrected.commission_cents, 12_000);
    assert_eq!(corrected.house_cents, 8_000);

    // The prior monetary state survives on the audit trail
    let audit = service
        .database()
        .invoices()
        .corrections(&receipt.invoice.id)
        .await
        .unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].prior_provider_id, "p1");
    assert_eq!(audit[0].prior_commission_cents, 10_000);
}

#[tokio::test]
async fn correction_replaces_service_and_total() {
    let (service, _) = service_with(&[("p1", 50)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();
    let receipt = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();

    let corrected = service
        .correct_invoice(
            &receipt.invoice.id,
            CorrectionRequest {
                new_service: Some(ServiceChange {
                    description: "Corte y barba".to_string(),
                    total_cents: 16_000,
                }),
                new_payment_method: Some(PaymentMethod::Card),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(corrected.total_cents, 16_000);
    assert_eq!(corrected.commission_cents, 8_000);
    assert_eq!(corrected.house_cents, 8_000);
    assert_eq!(corrected.payment_method, PaymentMethod::Card);
    assert_eq!(corrected.line_items[0].description, "Corte y barba");
    assert_eq!(corrected.line_items[0].unit_price_cents, 16_000);
}

#[tokio::test]
async fn void_is_terminal_and_correction_is_refused() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();
    let receipt = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();

    let voided = service
        .void_invoice(&receipt.invoice.id, "wrong client", "cashier-1", None)
        .await
        .unwrap();
    assert!(voided.voided);

    let err = service
        .void_invoice(&receipt.invoice.id, "again", "cashier-1", None)
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    let err = service
        .correct_invoice(&receipt.invoice.id, CorrectionRequest::default())
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

// =============================================================================
// Security Gate
// =============================================================================

#[tokio::test]
async fn void_gate_open_when_no_pin_configured() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();
    let receipt = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();

    // No pin in site config: void passes without a key
    service
        .void_invoice(&receipt.invoice.id, "test", "cashier-1", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn void_gate_rejects_wrong_or_missing_key() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();
    let receipt = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();

    service
        .database()
        .config()
        .set(VOID_PIN_KEY, "1234")
        .await
        .unwrap();

    let err = service
        .void_invoice(&receipt.invoice.id, "nope", "cashier-1", Some("9999"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    let err = service
        .void_invoice(&receipt.invoice.id, "nope", "cashier-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized));

    // The invoice is untouched
    let current = service
        .database()
        .invoices()
        .get(&receipt.invoice.id)
        .await
        .unwrap()
        .unwrap();
    assert!(!current.voided);

    // The right key passes
    service
        .void_invoice(&receipt.invoice.id, "yes", "cashier-1", Some("1234"))
        .await
        .unwrap();
}

// =============================================================================
// Best-Effort Appointment Updates
// =============================================================================

#[tokio::test]
async fn void_resets_linked_appointment() {
    let (service, appointments) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();

    let mut request = sale(&session.id, "p1", 10_000);
    request.appointment_id = Some("appt-7".to_string());
    let receipt = service.record_sale(request).await.unwrap();

    service
        .void_invoice(&receipt.invoice.id, "client no-show billed wrong", "c-1", None)
        .await
        .unwrap();

    assert_eq!(appointments.calls(), vec!["payment_status:appt-7:pending"]);
    assert_eq!(
        service
            .database()
            .appointment_outbox()
            .count_pending()
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn collaborator_failure_never_rolls_back_the_void() {
    let (service, appointments) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();

    let mut request = sale(&session.id, "p1", 10_000);
    request.appointment_id = Some("appt-8".to_string());
    let receipt = service.record_sale(request).await.unwrap();

    // Appointment service is down: the void must still land
    appointments.set_failing(true);
    let voided = service
        .void_invoice(&receipt.invoice.id, "refund", "c-1", None)
        .await
        .unwrap();
    assert!(voided.voided);
    assert!(appointments.calls().is_empty());

    let outbox = service.database().appointment_outbox();
    assert_eq!(outbox.count_pending().await.unwrap(), 1);

    // A sweep while the service is still down keeps the entry queued
    let outcome = service.retry_appointment_updates(10).await.unwrap();
    assert_eq!(outcome.resolved, 0);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outbox.count_pending().await.unwrap(), 1);

    // Service recovers: the sweep lands the reset
    appointments.set_failing(false);
    let outcome = service.retry_appointment_updates(10).await.unwrap();
    assert_eq!(outcome.resolved, 1);
    assert_eq!(outcome.failed, 0);
    assert_eq!(outbox.count_pending().await.unwrap(), 0);
    assert_eq!(appointments.calls(), vec!["payment_status:appt-8:pending"]);
}

#[tokio::test]
async fn correction_pushes_provider_change_to_appointment() {
    let (service, appointments) = service_with(&[("p1", 50), ("p2", 60)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();

    let mut request = sale(&session.id, "p1", 10_000);
    request.appointment_id = Some("appt-9".to_string());
    let receipt = service.record_sale(request).await.unwrap();

    service
        .correct_invoice(
            &receipt.invoice.id,
            CorrectionRequest {
                new_provider_id: Some("p2".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(appointments.calls(), vec!["provider_service:appt-9:p2:-"]);
}

// =============================================================================
// Reconciliation
// =============================================================================

#[tokio::test]
async fn reconcile_surfaces_a_tampered_invoice() {
    let (service, _) = service_with(&[("p1", 70)]).await;
    let session = service.open_register("op-1", 0).await.unwrap();

    let clean = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();
    let dirty = service.record_sale(sale(&session.id, "p1", 10_000)).await.unwrap();

    // Someone edits a commission by hand
    sqlx::query("UPDATE invoices SET commission_cents = 7500, house_cents = 2500 WHERE id = ?1")
        .bind(&dirty.invoice.id)
        .execute(service.database().pool())
        .await
        .unwrap();

    let reports = service.reconcile(ReconcileOptions::default()).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].invoice_id, dirty.invoice.id);
    assert_eq!(reports[0].kind, MismatchKind::CommissionDrift);
    assert_eq!(reports[0].expected_cents, 7_000);
    assert_eq!(reports[0].actual_cents, 7_500);
    assert_eq!(reports[0].delta_cents, 500);
    assert_ne!(reports[0].invoice_id, clean.invoice.id);
}
