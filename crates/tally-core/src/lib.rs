//! # tally-core: Pure Business Logic for Tally POS
//!
//! This crate is the **heart** of Tally POS. It turns raw terminal input
//! into typed documents and lines and derives their totals, with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  Web controller (external)                      │   │
//! │  │   recalculate-order, save-order, hold-order, resume-order ...   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   tally-pos: TokenGuard, Order, OrderStorage, PaymentLedger     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  request  │  │ document  │  │   line    │  │  recalc   │  │   │
//! │  │   │  buckets  │  │  header   │  │  LineSet  │  │  totals   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │   types   │  │  fields   │  │ validation│  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-db (Database Layer)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic and half-even rounding
//! - [`types`] - Rate, DocumentKind registry, statuses, payments, held orders
//! - [`fields`] - Request field names and loose JSON value coercion
//! - [`request`] - `OrderRequest` normalization into buckets
//! - [`document`] - The sales document header and totals
//! - [`line`] - Order lines and the descending-index `LineSet`
//! - [`recalc`] - The pure `Recalculator`
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use serde_json::json;
//! use tally_core::{DocumentKind, OrderRequest, Recalculator};
//!
//! let raw = json!({
//!     "customer_code": "C001",
//!     "lines": [
//!         { "reference": "COFFEE", "quantity": 2, "unit_price": "1.50", "tax_rate": "10" }
//!     ]
//! });
//!
//! let request = OrderRequest::for_build(raw.as_object().unwrap().clone()).unwrap();
//! let (document, lines) = request.build_document(DocumentKind::Invoice).unwrap();
//! let result = Recalculator::new().run(&document, &lines);
//!
//! assert_eq!(result.totals.net.cents(), 300);
//! assert_eq!(result.totals.tax.cents(), 30);
//! assert_eq!(result.totals.total.cents(), 330);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod fields;
pub mod line;
pub mod money;
pub mod recalc;
pub mod request;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{Document, DocumentTotals};
pub use error::{CoreError, CoreResult, ValidationError};
pub use line::{LineSet, OrderLine};
pub use money::Money;
pub use recalc::{LineAmounts, Recalculation, Recalculator};
pub use request::{OrderRequest, RequestMode};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines accepted on a single document.
///
/// Overridable per deployment through the POS configuration; this is the
/// default and the hard ceiling used by validation.
pub const MAX_ORDER_LINES: usize = 500;

/// Maximum quantity of a single line.
///
/// Catches typing 10000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum unit price in cents (100 million).
///
/// With [`MAX_ITEM_QUANTITY`] and [`MAX_ORDER_LINES`] this keeps every
/// document total far inside `i64`.
pub const MAX_UNIT_PRICE: i64 = 10_000_000_000;

/// Maximum amount of a single payment in cents (1 billion).
pub const MAX_PAYMENT_AMOUNT: i64 = 100_000_000_000;
