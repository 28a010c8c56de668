//! # Order Request
//!
//! Normalizes raw field → value input into the buckets an `Order` is
//! built from. Nothing here fails on a missing optional field.
//!
//! ## Build Mode (recalculate, hold)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  flat form fields                                                       │
//! │                                                                         │
//! │  payment_method, series            ──►  custom                          │
//! │  discount1, discount2, state       ──►  closing                         │
//! │  customer_code                     ──►  subject                         │
//! │  lines                             ──►  line list (sort_index stamped)  │
//! │  action, token, document_type      ──►  consumed here                   │
//! │  everything else                   ──►  form                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Save Mode
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  { lines: "[...]", payments: "[...]", token, document_type, ...doc }    │
//! │                                                                         │
//! │  lines / payments  ──►  decoded (JSON text or arrays)                   │
//! │  token, document_type, action  ──►  dropped                             │
//! │  the rest          ──►  document data                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::fields;
use crate::line::LineSet;
use crate::types::{DocumentKind, PaymentDraft};
use crate::validation;

/// Action value that marks a build-mode request as a hold.
pub const HOLD_ACTION: &str = "hold-order";

/// Which of the two input shapes a request was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Build,
    Save,
}

/// Normalized, never-persisted view of one raw request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    mode: RequestMode,
    document_type: Option<String>,
    custom: Map<String, Value>,
    closing: Map<String, Value>,
    form: Map<String, Value>,
    subject: Map<String, Value>,
    line_data: Vec<Value>,
    payment_data: Vec<Value>,
    hold: bool,
}

impl OrderRequest {
    /// Normalizes flat form fields (recalculate / hold).
    pub fn for_build(raw: Map<String, Value>) -> CoreResult<Self> {
        let mut request = OrderRequest::empty(RequestMode::Build);

        for (field, value) in raw {
            match field.as_str() {
                fields::PAYMENT_METHOD | fields::SERIES => {
                    request.custom.insert(field, value);
                }
                fields::DISCOUNT1 | fields::DISCOUNT2 | fields::STATE => {
                    request.closing.insert(field, value);
                }
                fields::CUSTOMER_CODE => {
                    request.subject.insert(field, value);
                }
                fields::LINES => {
                    request.line_data = stamp_lines(decode_list(fields::LINES, value)?);
                }
                fields::DOCUMENT_TYPE => request.document_type = fields::text(Some(&value)),
                fields::ACTION => {
                    request.hold = fields::text(Some(&value)).as_deref() == Some(HOLD_ACTION);
                }
                fields::TOKEN => {}
                _ => {
                    request.form.insert(field, value);
                }
            }
        }

        Ok(request)
    }

    /// Normalizes pre-split `{doc, lines, payments}` input (save).
    pub fn for_save(mut raw: Map<String, Value>) -> CoreResult<Self> {
        let mut request = OrderRequest::empty(RequestMode::Save);

        if let Some(lines) = raw.remove(fields::LINES) {
            request.line_data = stamp_lines(decode_list(fields::LINES, lines)?);
        }
        if let Some(payments) = raw.remove(fields::PAYMENTS) {
            request.payment_data = decode_list(fields::PAYMENTS, payments)?;
        }
        request.document_type = raw
            .remove(fields::DOCUMENT_TYPE)
            .and_then(|value| fields::text(Some(&value)));
        raw.remove(fields::TOKEN);
        raw.remove(fields::ACTION);

        request.form = raw;
        Ok(request)
    }

    fn empty(mode: RequestMode) -> Self {
        OrderRequest {
            mode,
            document_type: None,
            custom: Map::new(),
            closing: Map::new(),
            form: Map::new(),
            subject: Map::new(),
            line_data: Vec::new(),
            payment_data: Vec::new(),
            hold: false,
        }
    }

    /// Marks this request as a hold regardless of its `action` field.
    pub fn with_hold(mut self, hold: bool) -> Self {
        self.hold = hold;
        self
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn is_hold(&self) -> bool {
        self.hold
    }

    pub fn custom(&self) -> &Map<String, Value> {
        &self.custom
    }

    pub fn closing(&self) -> &Map<String, Value> {
        &self.closing
    }

    pub fn form(&self) -> &Map<String, Value> {
        &self.form
    }

    pub fn subject(&self) -> &Map<String, Value> {
        &self.subject
    }

    /// Customer code carried by the request, if any.
    pub fn customer_code(&self) -> Option<String> {
        fields::text(
            self.subject
                .get(fields::CUSTOMER_CODE)
                .or_else(|| self.form.get(fields::CUSTOMER_CODE)),
        )
    }

    /// Header fields, merged in custom → closing → form → subject order.
    pub fn document_data(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for bucket in [&self.custom, &self.closing, &self.form, &self.subject] {
            for (key, value) in bucket {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Raw line entries, each structured entry stamped with its index.
    pub fn line_data(&self) -> &[Value] {
        &self.line_data
    }

    pub fn payment_data(&self) -> &[Value] {
        &self.payment_data
    }

    /// Resolves the document kind, falling back to `default` when unnamed.
    pub fn document_kind(&self, default: DocumentKind) -> CoreResult<DocumentKind> {
        match self.document_type.as_deref() {
            None => Ok(default),
            Some(code) => DocumentKind::from_code(code),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Builds the header and line set this request describes.
    pub fn build_document(&self, default_kind: DocumentKind) -> CoreResult<(Document, LineSet)> {
        let mut document = Document::new(self.document_kind(default_kind)?);
        document.load_from_data(&self.document_data())?;
        let lines = LineSet::from_raw(&self.line_data)?;
        Ok((document, lines))
    }

    /// Parses the payment list.
    ///
    /// A payment without a method takes the document's payment method.
    pub fn payments(&self, fallback_method: Option<&str>) -> CoreResult<Vec<PaymentDraft>> {
        self.payment_data
            .iter()
            .map(|entry| {
                let Value::Object(map) = entry else {
                    return Err(CoreError::InvalidPaymentAmount {
                        reason: "payment entries must be objects".to_string(),
                    });
                };

                let method = fields::text(map.get(fields::METHOD))
                    .or_else(|| fallback_method.map(str::to_string))
                    .ok_or_else(|| ValidationError::Required {
                        field: fields::METHOD.to_string(),
                    })?;
                let amount = fields::money(fields::AMOUNT, map.get(fields::AMOUNT))?;
                validation::validate_payment_amount(amount)?;

                Ok(PaymentDraft { method, amount })
            })
            .collect()
    }
}

/// Accepts a JSON array or a string holding one. Blank means empty.
fn decode_list(field: &str, value: Value) -> Result<Vec<Value>, ValidationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Vec::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(Value::Null) => Ok(Vec::new()),
            _ => Err(ValidationError::invalid_format(field, "must be a JSON list")),
        },
        _ => Err(ValidationError::invalid_format(field, "must be a list")),
    }
}

/// Stamps `sort_index` from `count` down to 1; non-records become
/// index-only placeholders.
fn stamp_lines(entries: Vec<Value>) -> Vec<Value> {
    let mut order = entries.len() as u64;
    let mut stamped = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut record = match entry {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        record.insert(fields::SORT_INDEX.to_string(), Value::from(order));
        stamped.push(Value::Object(record));
        order = order.saturating_sub(1);
    }

    stamped
}

// =============================================================================
// Unit Tests
// =============================================================================
