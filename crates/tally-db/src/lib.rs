//! # tally-db: Database Layer for Tally POS
//!
//! Persistence for sales documents, order lines, payments, held orders and
//! customers. SQLite through sqlx, with every table reached through a
//! repository that implements one of the ports in [`store`].
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  Order.save() / OrderStorage.place_on_hold() / PaymentLedger           │
//! │       │                                                                 │
//! │       ▼  Arc<dyn DocumentStore | HeldOrderStore | PaymentStore>         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │   Repositories     │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ DocumentRepository │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ PaymentRepository  │  │ 001_init   │  │   │
//! │  │   │ WAL + FKs     │    │ HeldOrderRepository│  │            │  │   │
//! │  │   │               │    │ CustomerRepository │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`store`] - Persistence ports (async traits)
//! - [`repository`] - SQLite implementations of the ports
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig, DocumentStore};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//! let mut document = tally_core::Document::new(tally_core::DocumentKind::Invoice);
//! db.documents().save_document(&mut document).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::{CustomerDirectory, DocumentStore, HeldOrderStore, PaymentStore};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::document::DocumentRepository;
pub use repository::held::HeldOrderRepository;
pub use repository::payment::PaymentRepository;
