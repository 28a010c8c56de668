//! # Validation Module
//!
//! Business rule validation for documents, lines and payments.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: fields (coercion)                                            │
//! │  ├── "12,50" → Money, "21" → Rate                                      │
//! │  └── malformed values → InvalidFormat                                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── ranges, lengths, required fields                                  │
//! │  └── run by OrderLine / Document / PaymentLedger                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign keys (line → document, payment → document)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_reference, validate_quantity};
//!
//! validate_reference("COFFEE-250").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Rate;
use crate::{MAX_ITEM_QUANTITY, MAX_ORDER_LINES, MAX_PAYMENT_AMOUNT, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product reference code on a line.
///
/// ## Rules
/// - May be empty (free-text lines carry only a description)
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores, dots and slashes only
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_reference;
///
/// assert!(validate_reference("COKE-330").is_ok());
/// assert!(validate_reference("").is_ok());
/// assert!(validate_reference("has space").is_err());
/// ```
pub fn validate_reference(reference: &str) -> ValidationResult<()> {
    let reference = reference.trim();

    if reference.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "reference".to_string(),
            max: 50,
        });
    }

    if !reference
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "reference".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, dots and slashes"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a line description. Empty is allowed, 200 characters max.
pub fn validate_description(description: &str) -> ValidationResult<()> {
    if description.trim().chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates the subject code a document is about to be saved with.
pub fn validate_customer_code(code: Option<&str>) -> ValidationResult<()> {
    match code.map(str::trim) {
        None | Some("") => Err(ValidationError::Required {
            field: "customer_code".to_string(),
        }),
        Some(code) if code.chars().count() > 20 => Err(ValidationError::TooLong {
            field: "customer_code".to_string(),
            max: 20,
        }),
        Some(_) => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ```text
///   quantity ──► <= 0 ?  → MustBePositive
///            ──► > max ? → OutOfRange
///            ──► OK
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - Must not exceed MAX_UNIT_PRICE
///
/// ```rust
/// use tally_core::money::Money;
/// use tally_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(1099)).is_ok());
/// assert!(validate_price(Money::zero()).is_ok());
/// assert!(validate_price(Money::from_cents(-100)).is_err());
/// assert!(validate_price(Money::from_cents(100_000_000_000)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.cents() > MAX_UNIT_PRICE {
        return Err(ValidationError::OutOfRange {
            field: "unit_price".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE,
        });
    }

    Ok(())
}

/// Validates a payment amount: strictly positive, at most MAX_PAYMENT_AMOUNT.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    if amount.cents() > MAX_PAYMENT_AMOUNT {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 1,
            max: MAX_PAYMENT_AMOUNT,
        });
    }

    Ok(())
}

/// Validates a percentage field (tax, surcharge, withholding, discount).
///
/// ## Rules
/// - Between 0% and 100% (0 to 10000 bps)
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines on a document against `max`.
///
/// `max` is capped at [`MAX_ORDER_LINES`].
pub fn validate_line_count(count: usize, max: usize) -> ValidationResult<()> {
    let max = max.min(MAX_ORDER_LINES);

    if count > max {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 0,
            max: max as i64,
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
