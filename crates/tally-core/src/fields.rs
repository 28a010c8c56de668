//! # Request Field Names and Value Coercion
//!
//! Raw input arrives as loosely typed JSON (`"12.50"`, `12.5`, `""`, `null`).
//! The helpers here turn those values into typed fields without failing on
//! missing optional data: absent, `null` and empty values fall back to the
//! field's default. Malformed values fail with a field-level
//! [`ValidationError`].

use serde_json::Value;

use crate::error::ValidationError;
use crate::money::{parse_scaled, Money};
use crate::types::Rate;

// =============================================================================
// Field Names
// =============================================================================

pub const ACTION: &str = "action";
pub const TOKEN: &str = "token";
pub const DOCUMENT_TYPE: &str = "document_type";
pub const LINES: &str = "lines";
pub const PAYMENTS: &str = "payments";

// Document header
pub const ID: &str = "id";
pub const CUSTOMER_CODE: &str = "customer_code";
pub const PAYMENT_METHOD: &str = "payment_method";
pub const SERIES: &str = "series";
pub const DISCOUNT1: &str = "discount1";
pub const DISCOUNT2: &str = "discount2";
pub const STATE: &str = "state";
pub const NOTES: &str = "notes";

// Order line
pub const REFERENCE: &str = "reference";
pub const DESCRIPTION: &str = "description";
pub const QUANTITY: &str = "quantity";
pub const UNIT_PRICE: &str = "unit_price";
pub const TAX_RATE: &str = "tax_rate";
pub const SURCHARGE_RATE: &str = "surcharge_rate";
pub const WITHHOLDING_RATE: &str = "withholding_rate";
pub const SORT_INDEX: &str = "sort_index";

// Payment
pub const METHOD: &str = "method";
pub const AMOUNT: &str = "amount";

// =============================================================================
// Coercion
// =============================================================================

/// Returns the value as trimmed text, or `None` when absent or blank.
pub fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };

    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Parses a monetary amount. Blank values become zero.
pub fn money(field: &str, value: Option<&Value>) -> Result<Money, ValidationError> {
    match text(value) {
        None => Ok(Money::zero()),
        Some(s) => {
            Money::parse(&s).ok_or_else(|| ValidationError::invalid_format(field, "must be a decimal amount"))
        }
    }
}

/// Parses a percentage. Blank values become zero.
pub fn rate(field: &str, value: Option<&Value>) -> Result<Rate, ValidationError> {
    match text(value) {
        None => Ok(Rate::zero()),
        Some(s) => Rate::parse_percentage(&s)
            .ok_or_else(|| ValidationError::invalid_format(field, "must be a non-negative percentage")),
    }
}

/// Parses a whole-unit quantity. Blank values become `default`.
pub fn quantity(field: &str, value: Option<&Value>, default: i64) -> Result<i64, ValidationError> {
    let Some(s) = text(value) else {
        return Ok(default);
    };

    let scaled = parse_scaled(&s, 4)
        .ok_or_else(|| ValidationError::invalid_format(field, "must be a number"))?;

    if scaled % 10_000 != 0 {
        return Err(ValidationError::invalid_format(field, "must be a whole number"));
    }

    Ok(scaled / 10_000)
}

// =============================================================================
// Unit Tests
// =============================================================================
