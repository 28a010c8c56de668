//! # Repository Module
//!
//! SQLite implementations of the persistence ports in [`crate::store`].
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order workflow (tally-pos)                                             │
//! │       │                                                                 │
//! │       │  documents.save_document(&mut doc)                              │
//! │       ▼                                                                 │
//! │  DocumentRepository          (impl DocumentStore)                       │
//! │  ├── save_document / save_line                                          │
//! │  ├── delete_lines / delete_document                                     │
//! │  └── get_document / get_lines / latest_placed                           │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`document::DocumentRepository`] - Headers, lines and numbering
//! - [`payment::PaymentRepository`] - Payments and reconciliation sums
//! - [`held::HeldOrderRepository`] - Scoped held-order snapshots
//! - [`customer::CustomerRepository`] - Subject directory

pub mod customer;
pub mod document;
pub mod held;
pub mod payment;
