//! # clipper-db: Ledger Storage for Clipper POS
//!
//! This crate provides database access for the cash-register ledger.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Clipper POS Data Flow                             │
//! │                                                                         │
//! │  RegisterService (clipper-engine)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     clipper-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ session.rs    │    │  (embedded)  │  │   │
//! │  │   │               │    │ invoice.rs    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ config.rs     │    │ 001_init.sql │  │   │
//! │  │   │ WAL + FKs     │    │ outbox.rs     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────────────────────────────────────────────────┐│   │
//! │  │   │ reconcile.rs - read-only integrity audit over invoices    ││   │
//! │  │   └───────────────────────────────────────────────────────────┘│   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                      SQLite Database (WAL mode)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (session, invoice, ...)
//! - [`reconcile`] - Read-side mismatch reporting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clipper_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/register.db")).await?;
//!
//! let session = db.sessions().open("operator-1", 50_000).await?;
//! db.sessions().record_sale(&session.id, 10_000, PaymentMethod::Cash, "inv-1", None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod reconcile;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use reconcile::{MismatchKind, MismatchReport, ReconcileOptions, Reconciler};

// Repository re-exports for convenience
pub use repository::config::ConfigRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::outbox::{AppointmentOutboxRepository, OutboxAction, OutboxEntry};
pub use repository::session::SessionRepository;
