//! # Sales Document
//!
//! The header of the record being built: kind, subject, header fields and
//! the totals derived from its lines.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   Document::new(kind)                                                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   load_from_data(header map)    id / subject / discounts / attributes   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   set_subject(customer)         name + tax id copied from directory     │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   apply_totals(recalculated)    totals only ever come from Recalculator │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   persisted by tally-db  →  id + code assigned, status Placed / Held    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::fields;
use crate::money::Money;
use crate::types::{Customer, DocumentKind, DocumentStatus, Rate, SessionScope};
use crate::validation;

// =============================================================================
// Totals
// =============================================================================

/// Monetary totals of a document.
///
/// `total = net + tax + surcharge - withholding`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTotals {
    pub net: Money,
    pub tax: Money,
    pub surcharge: Money,
    pub withholding: Money,
    pub total: Money,
}

// =============================================================================
// Document
// =============================================================================

/// A sales document header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Assigned on the first successful save.
    pub id: Option<String>,
    pub kind: DocumentKind,
    /// Human-facing number, assigned with the id.
    pub code: Option<String>,
    pub series: String,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub customer_tax_id: Option<String>,
    pub payment_method: Option<String>,
    pub workflow_state: Option<String>,
    pub discount1: Rate,
    pub discount2: Rate,
    pub notes: Option<String>,
    /// Header fields with no dedicated column.
    pub attributes: BTreeMap<String, Value>,
    pub totals: DocumentTotals,
    pub status: DocumentStatus,
    pub terminal_id: Option<String>,
    pub session_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Series used when the request names none.
pub const DEFAULT_SERIES: &str = "A";

/// Keys that never land on the header.
const TRANSPORT_KEYS: [&str; 5] = [
    fields::ACTION,
    fields::TOKEN,
    fields::DOCUMENT_TYPE,
    fields::LINES,
    fields::PAYMENTS,
];

impl Document {
    pub fn new(kind: DocumentKind) -> Self {
        Document {
            id: None,
            kind,
            code: None,
            series: DEFAULT_SERIES.to_string(),
            customer_code: None,
            customer_name: None,
            customer_tax_id: None,
            payment_method: None,
            workflow_state: None,
            discount1: Rate::zero(),
            discount2: Rate::zero(),
            notes: None,
            attributes: BTreeMap::new(),
            totals: DocumentTotals::default(),
            status: DocumentStatus::Draft,
            terminal_id: None,
            session_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Loads header fields from a raw map.
    ///
    /// Known keys go to their typed field, transport keys (`token`,
    /// `lines`, ...) are skipped and anything else is kept in
    /// `attributes`. Changing the customer code clears the copied subject
    /// data until [`set_subject`](Self::set_subject) runs again.
    pub fn load_from_data(&mut self, data: &Map<String, Value>) -> Result<(), ValidationError> {
        for (key, value) in data {
            match key.as_str() {
                k if TRANSPORT_KEYS.contains(&k) => {}
                fields::ID => {
                    if let Some(id) = fields::text(Some(value)) {
                        validation::validate_uuid(&id)?;
                        self.id = Some(id);
                    }
                }
                fields::CUSTOMER_CODE => {
                    let code = fields::text(Some(value));
                    if code != self.customer_code {
                        self.customer_name = None;
                        self.customer_tax_id = None;
                    }
                    self.customer_code = code;
                }
                fields::PAYMENT_METHOD => self.payment_method = fields::text(Some(value)),
                fields::SERIES => {
                    self.series =
                        fields::text(Some(value)).unwrap_or_else(|| DEFAULT_SERIES.to_string());
                }
                fields::DISCOUNT1 => {
                    self.discount1 = fields::rate(fields::DISCOUNT1, Some(value))?;
                    validation::validate_rate(fields::DISCOUNT1, self.discount1)?;
                }
                fields::DISCOUNT2 => {
                    self.discount2 = fields::rate(fields::DISCOUNT2, Some(value))?;
                    validation::validate_rate(fields::DISCOUNT2, self.discount2)?;
                }
                fields::STATE => self.workflow_state = fields::text(Some(value)),
                fields::NOTES => self.notes = fields::text(Some(value)),
                _ if value.is_null() => {
                    self.attributes.remove(key);
                }
                _ => {
                    self.attributes.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(())
    }

    /// Attaches (or clears) the subject.
    pub fn set_subject(&mut self, customer: Option<&Customer>) {
        match customer {
            Some(customer) => {
                self.customer_code = Some(customer.code.clone());
                self.customer_name = Some(customer.name.clone());
                self.customer_tax_id = customer.tax_id.clone();
            }
            None => {
                self.customer_code = None;
                self.customer_name = None;
                self.customer_tax_id = None;
            }
        }
    }

    pub fn has_subject(&self) -> bool {
        self.customer_name.is_some()
    }

    pub fn apply_totals(&mut self, totals: DocumentTotals) {
        self.totals = totals;
    }

    pub fn set_scope(&mut self, scope: &SessionScope) {
        self.terminal_id = Some(scope.terminal_id.clone());
        self.session_id = Some(scope.session_id.clone());
    }

    /// True when the document was written under `scope`.
    pub fn belongs_to(&self, scope: &SessionScope) -> bool {
        self.terminal_id.as_deref() == Some(scope.terminal_id.as_str())
            && self.session_id.as_deref() == Some(scope.session_id.as_str())
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_load_from_data() {
        let mut doc = Document::new(DocumentKind::Invoice);
        doc.load_from_data(&map(json!({
            "customer_code": "C001",
            "payment_method": "CASH",
            "series": "B",
            "discount1": "5",
            "state": "open",
            "table": "12",
            "token": "abc",
            "lines": "[]"
        })))
        .unwrap();

        assert_eq!(doc.customer_code.as_deref(), Some("C001"));
        assert_eq!(doc.payment_method.as_deref(), Some("CASH"));
        assert_eq!(doc.series, "B");
        assert_eq!(doc.discount1.bps(), 500);
        assert_eq!(doc.workflow_state.as_deref(), Some("open"));
        assert_eq!(doc.attributes.get("table"), Some(&json!("12")));
        assert!(!doc.attributes.contains_key("token"));
        assert!(!doc.attributes.contains_key("lines"));
    }

    #[test]
    fn test_blank_series_falls_back() {
        let mut doc = Document::new(DocumentKind::Invoice);
        doc.load_from_data(&map(json!({ "series": "" }))).unwrap();
        assert_eq!(doc.series, DEFAULT_SERIES);
    }

    #[test]
    fn test_rejects_bad_id_and_discount() {
        let mut doc = Document::new(DocumentKind::Invoice);
        let err = doc.load_from_data(&map(json!({ "id": "nope" }))).unwrap_err();
        assert_eq!(err.field(), "id");

        let err = doc
            .load_from_data(&map(json!({ "discount2": "101" })))
            .unwrap_err();
        assert_eq!(err.field(), "discount2");
    }

    #[test]
    fn test_changing_customer_clears_subject() {
        let mut doc = Document::new(DocumentKind::Invoice);
        doc.set_subject(Some(&Customer {
            code: "C001".to_string(),
            name: "Ada".to_string(),
            tax_id: Some("X1".to_string()),
        }));
        assert!(doc.has_subject());

        doc.load_from_data(&map(json!({ "customer_code": "C001" }))).unwrap();
        assert!(doc.has_subject());

        doc.load_from_data(&map(json!({ "customer_code": "C002" }))).unwrap();
        assert!(!doc.has_subject());
        assert_eq!(doc.customer_code.as_deref(), Some("C002"));
    }
}
