//! # clipper-engine: Register Service for Clipper POS
//!
//! The orchestration layer of the cash-register ledger. Host applications
//! construct one [`RegisterService`] per process and call it from however
//! many POS terminals they serve; every operation is safe under concurrent
//! invocation because the state machine is enforced in the storage layer,
//! not in process memory.
//!
//! ## Operation Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RegisterService                                  │
//! │                                                                         │
//! │  open_register ──────► SessionRepository::open                         │
//! │                                                                         │
//! │  record_sale ────┬───► ProviderDirectory::get_provider (commission %)  │
//! │                  ├───► money::split (commission / house)               │
//! │                  ├───► InvoiceRepository::insert                       │
//! │                  └───► SessionRepository::record_sale (atomic total)   │
//! │                                                                         │
//! │  close_register ─────► SessionRepository::close (variance)             │
//! │                                                                         │
//! │  void_invoice ───┬───► SecurityGate (void pin)                         │
//! │                  ├───► InvoiceRepository::void (terminal)              │
//! │                  └───► AppointmentBook::set_payment_status             │
//! │                        (best-effort; failures → outbox)                │
//! │                                                                         │
//! │  correct_invoice ┬───► recompute split, overwrite current view         │
//! │                  └───► audit snapshot + best-effort appointment sync   │
//! │                                                                         │
//! │  retry_appointment_updates ──► replay the outbox                       │
//! │  reconcile ──────────────────► read-only integrity audit               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod collaborators;
pub mod error;
pub mod gate;
pub mod register;

// =============================================================================
// Re-exports
// =============================================================================

pub use collaborators::{
    AppointmentBook, CollaboratorError, PaymentStatus, Provider, ProviderDirectory,
};
pub use error::{EngineError, EngineResult};
pub use gate::{SecurityGate, VOID_PIN_KEY};
pub use register::{
    CorrectionRequest, RecordSaleRequest, RegisterService, SaleReceipt, ServiceChange,
    SweepOutcome,
};

// Storage-layer types callers routinely need alongside the service
pub use clipper_db::{Database, DbConfig, MismatchReport, ReconcileOptions};
