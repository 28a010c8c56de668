//! # Domain Types
//!
//! Small value types shared by every layer of Tally POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  DocumentKind   │   │ DocumentStatus  │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Invoice        │   │  Draft          │   │  method (code)  │       │
//! │  │  DeliveryNote   │   │  Held           │   │  amount         │       │
//! │  │  SalesOrder     │   │  Placed         │   │  tendered       │       │
//! │  │  Estimate       │   │                 │   │  change         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Rate       │   │  SessionScope   │   │   HeldOrder     │       │
//! │  │  bps (u32)      │   │  terminal_id    │   │  code           │       │
//! │  │  2100 = 21%     │   │  session_id     │   │  document_data  │       │
//! │  └─────────────────┘   └─────────────────┘   │  line_data      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::CoreError;
use crate::money::{parse_scaled, Money};

// =============================================================================
// Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 2100 bps = 21%. Used for tax, surcharge,
/// withholding and discount percentages alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    /// Parses a percentage such as `"21"`, `"10.5"` or `"4,75"`.
    ///
    /// Negative values are rejected.
    pub fn parse_percentage(input: &str) -> Option<Self> {
        let bps = parse_scaled(input, 2)?;
        u32::try_from(bps).ok().map(Rate)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// The closed set of sales documents the POS can produce.
///
/// ## Registry
/// Request data names the document type by code. Lookup goes through
/// [`DocumentKind::from_code`], which returns
/// [`CoreError::UnsupportedDocumentType`] for anything outside this set.
///
/// | Code             | Kind           | Number prefix |
/// |------------------|----------------|---------------|
/// | `invoice`        | Invoice        | `INV`         |
/// | `delivery-note`  | DeliveryNote   | `DN`          |
/// | `sales-order`    | SalesOrder     | `SO`          |
/// | `estimate`       | Estimate       | `EST`         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Invoice,
    DeliveryNote,
    SalesOrder,
    Estimate,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Invoice,
        DocumentKind::DeliveryNote,
        DocumentKind::SalesOrder,
        DocumentKind::Estimate,
    ];

    /// Looks up a document kind by its request code.
    ///
    /// ```rust
    /// use tally_core::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::from_code("invoice").unwrap(), DocumentKind::Invoice);
    /// assert!(DocumentKind::from_code("purchase-invoice").is_err());
    /// ```
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        let code = code.trim();
        DocumentKind::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| CoreError::UnsupportedDocumentType(code.to_string()))
    }

    /// Request code for this kind.
    pub const fn code(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice",
            DocumentKind::DeliveryNote => "delivery-note",
            DocumentKind::SalesOrder => "sales-order",
            DocumentKind::Estimate => "estimate",
        }
    }

    /// Prefix used when numbering documents of this kind.
    pub const fn number_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::DeliveryNote => "DN",
            DocumentKind::SalesOrder => "SO",
            DocumentKind::Estimate => "EST",
        }
    }
}

impl Default for DocumentKind {
    fn default() -> Self {
        DocumentKind::Invoice
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Document Status
// =============================================================================

/// Lifecycle status of a persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Being built; header may be persisted but the sale is not final.
    Draft,
    /// Suspended mid-entry, referenced by a held-order snapshot.
    Held,
    /// Saved with final totals. Immutable history from here on.
    Placed,
}

impl Default for DocumentStatus {
    fn default() -> Self {
        DocumentStatus::Draft
    }
}

// =============================================================================
// Session Scope
// =============================================================================

/// The (terminal, session) pair that scopes held orders and ledger totals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScope {
    pub terminal_id: String,
    pub session_id: String,
}

impl SessionScope {
    pub fn new(terminal_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        SessionScope {
            terminal_id: terminal_id.into(),
            session_id: session_id.into(),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// The subject (counterparty) of a sales document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub code: String,
    pub name: String,
    pub tax_id: Option<String>,
}

// =============================================================================
// Payment
// =============================================================================

/// A payment as submitted by the caller, before the ledger applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    /// Payment method identifier (e.g. `"CASH"`, `"CARD"`).
    pub method: String,
    /// Amount handed over by the customer.
    pub amount: Money,
}

/// A payment recorded against a placed document.
///
/// `amount` is what was applied to the document; `tendered - amount` is
/// `change` for cash and is always zero for other methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub document_id: String,
    pub method: String,
    pub amount: Money,
    pub tendered: Money,
    pub change: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Held Order
// =============================================================================

/// Snapshot of an in-progress sale suspended for later resumption.
///
/// `document_data` and `line_data` are kept exactly as submitted so a
/// resume hands back the same fields the terminal sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldOrder {
    pub code: String,
    pub scope: SessionScope,
    /// Persisted document backing this hold, if the header was saved.
    pub document_id: Option<String>,
    pub document_data: Map<String, Value>,
    pub line_data: Vec<Value>,
    pub customer_code: Option<String>,
    pub total: Money,
    pub line_count: u32,
    pub created_at: DateTime<Utc>,
}

impl HeldOrder {
    pub fn summary(&self) -> HeldOrderSummary {
        HeldOrderSummary {
            code: self.code.clone(),
            customer_code: self.customer_code.clone(),
            total: self.total,
            line_count: self.line_count,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}

/// List entry for the "orders on hold" picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct HeldOrderSummary {
    pub code: String,
    pub customer_code: Option<String>,
    pub total: Money,
    pub line_count: u32,
    pub created_at: String,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_parse_percentage() {
        assert_eq!(Rate::parse_percentage("21"), Some(Rate::from_bps(2100)));
        assert_eq!(Rate::parse_percentage("10.5"), Some(Rate::from_bps(1050)));
        assert_eq!(Rate::parse_percentage("4,75"), Some(Rate::from_bps(475)));
        assert_eq!(Rate::parse_percentage("-1"), None);
        assert_eq!(Rate::parse_percentage("x"), None);
        assert!((Rate::from_bps(825).percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_document_kind_registry() {
        for kind in DocumentKind::ALL {
            assert_eq!(DocumentKind::from_code(kind.code()).unwrap(), kind);
        }
        assert_eq!(
            DocumentKind::from_code(" Delivery-Note ").unwrap(),
            DocumentKind::DeliveryNote
        );

        let err = DocumentKind::from_code("credit-note").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedDocumentType(code) if code == "credit-note"));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DocumentStatus::default(), DocumentStatus::Draft);
        assert_eq!(DocumentKind::default(), DocumentKind::Invoice);
    }

    #[test]
    fn test_held_order_summary() {
        let held = HeldOrder {
            code: "H-1".to_string(),
            scope: SessionScope::new("T1", "S1"),
            document_id: None,
            document_data: Map::new(),
            line_data: vec![],
            customer_code: Some("C001".to_string()),
            total: Money::from_cents(1250),
            line_count: 3,
            created_at: Utc::now(),
        };

        let summary = held.summary();
        assert_eq!(summary.code, "H-1");
        assert_eq!(summary.total.cents(), 1250);
        assert_eq!(summary.line_count, 3);
    }
}
