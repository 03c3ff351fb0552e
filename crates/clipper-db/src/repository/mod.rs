//! # Repository Module
//!
//! Database repository implementations for the register ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  RegisterService                                                       │
//! │       │                                                                 │
//! │       │  db.sessions().record_sale(...)                                │
//! │       ▼                                                                 │
//! │  SessionRepository                                                     │
//! │  ├── open(&self, operator_id, opening_cents)                           │
//! │  ├── record_sale(&self, session_id, amount, ...)                       │
//! │  ├── close(&self, session_id, actual, notes)                           │
//! │  └── movements(&self, session_id)                                      │
//! │       │                                                                 │
//! │       │  SQL (guarded UPDATE + movement INSERT in one transaction)     │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • State-machine guards live next to the SQL that enforces them        │
//! │  • SQL is isolated in one place                                        │
//! │  • Easy to test against an in-memory database                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`session::SessionRepository`] - Session lifecycle and movement ledger
//! - [`invoice::InvoiceRepository`] - Invoice CRUD, void, correction audit
//! - [`config::ConfigRepository`] - Site key/value configuration
//! - [`outbox::AppointmentOutboxRepository`] - Best-effort update retry queue

pub mod config;
pub mod invoice;
pub mod outbox;
pub mod session;
