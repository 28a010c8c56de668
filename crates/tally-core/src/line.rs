//! # Order Lines
//!
//! An [`OrderLine`] is one row of a sales document. A [`LineSet`] is the
//! ordered collection of rows attached to one document.
//!
//! ## Sort Index
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Input position        sort_index                                       │
//! │  ──────────────        ──────────                                       │
//! │  0  { COFFEE }    →    3      first-added line gets the highest index   │
//! │  1  ""  (blank)   →    2      placeholder: index only                   │
//! │  2  { MUFFIN }    →    1                                                │
//! │                                                                         │
//! │  Lines may be written to storage in any order; reading them back        │
//! │  ordered by sort_index DESC restores the grid exactly.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::fields;
use crate::money::Money;
use crate::types::Rate;
use crate::validation;

// =============================================================================
// Order Line
// =============================================================================

/// A single row of a sales document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Assigned by the store when the line is persisted.
    pub id: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    /// Whole units; zero only on placeholders.
    pub quantity: i64,
    pub unit_price: Money,
    pub discount1: Rate,
    pub discount2: Rate,
    pub tax_rate: Rate,
    pub surcharge_rate: Rate,
    pub withholding_rate: Rate,
    pub sort_index: u32,
    /// Intentionally blank grid row. Carries no amounts.
    pub placeholder: bool,
}

impl OrderLine {
    /// A blank row holding only its position.
    pub fn placeholder(sort_index: u32) -> Self {
        OrderLine {
            id: None,
            reference: None,
            description: String::new(),
            quantity: 0,
            unit_price: Money::zero(),
            discount1: Rate::zero(),
            discount2: Rate::zero(),
            tax_rate: Rate::zero(),
            surcharge_rate: Rate::zero(),
            withholding_rate: Rate::zero(),
            sort_index,
            placeholder: true,
        }
    }

    /// Builds and validates a line from a raw field map.
    ///
    /// Missing quantity defaults to 1; missing amounts and rates to zero.
    pub fn from_map(data: &Map<String, Value>, sort_index: u32) -> Result<Self, ValidationError> {
        let reference = fields::text(data.get(fields::REFERENCE));
        let description = fields::text(data.get(fields::DESCRIPTION)).unwrap_or_default();

        let line = OrderLine {
            id: None,
            reference,
            description,
            quantity: fields::quantity(fields::QUANTITY, data.get(fields::QUANTITY), 1)?,
            unit_price: fields::money(fields::UNIT_PRICE, data.get(fields::UNIT_PRICE))?,
            discount1: fields::rate(fields::DISCOUNT1, data.get(fields::DISCOUNT1))?,
            discount2: fields::rate(fields::DISCOUNT2, data.get(fields::DISCOUNT2))?,
            tax_rate: fields::rate(fields::TAX_RATE, data.get(fields::TAX_RATE))?,
            surcharge_rate: fields::rate(fields::SURCHARGE_RATE, data.get(fields::SURCHARGE_RATE))?,
            withholding_rate: fields::rate(
                fields::WITHHOLDING_RATE,
                data.get(fields::WITHHOLDING_RATE),
            )?,
            sort_index,
            placeholder: false,
        };

        line.validate()?;
        Ok(line)
    }

    /// Checks ranges on a non-placeholder line.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.placeholder {
            return Ok(());
        }

        if let Some(reference) = &self.reference {
            validation::validate_reference(reference)?;
        }
        validation::validate_description(&self.description)?;
        validation::validate_quantity(self.quantity)?;
        validation::validate_price(self.unit_price)?;
        if self.unit_price.checked_mul_quantity(self.quantity).is_none() {
            return Err(ValidationError::invalid_format(
                fields::UNIT_PRICE,
                "price times quantity is too large",
            ));
        }
        validation::validate_rate(fields::DISCOUNT1, self.discount1)?;
        validation::validate_rate(fields::DISCOUNT2, self.discount2)?;
        validation::validate_rate(fields::TAX_RATE, self.tax_rate)?;
        validation::validate_rate(fields::SURCHARGE_RATE, self.surcharge_rate)?;
        validation::validate_rate(fields::WITHHOLDING_RATE, self.withholding_rate)?;

        Ok(())
    }

    /// Price × quantity before any discount.
    pub fn gross(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Amount after both line discounts, each rounded to the cent.
    pub fn net(&self) -> Money {
        self.gross().discounted(self.discount1).discounted(self.discount2)
    }
}

// =============================================================================
// Line Set
// =============================================================================

/// Ordered collection of lines belonging to one document.
///
/// Indices run strictly downward from `len()` to 1 in input order,
/// whatever indices the raw data carried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSet {
    lines: Vec<OrderLine>,
}

impl LineSet {
    pub fn new() -> Self {
        LineSet::default()
    }

    /// Parses raw line entries.
    ///
    /// Structured entries become lines; anything else (an empty slot, a
    /// string, `null`, or a map carrying nothing but an index) becomes a
    /// placeholder so one blank row never rejects the batch.
    pub fn from_raw(entries: &[Value]) -> Result<Self, ValidationError> {
        let mut order = entries.len() as u32;
        let mut lines = Vec::with_capacity(entries.len());

        for entry in entries {
            let line = match entry {
                Value::Object(map) if !is_blank(map) => OrderLine::from_map(map, order)?,
                _ => OrderLine::placeholder(order),
            };
            lines.push(line);
            order = order.saturating_sub(1);
        }

        Ok(LineSet { lines })
    }

    /// Wraps already-built lines and restamps their indices.
    pub fn from_lines(lines: Vec<OrderLine>) -> Self {
        let mut set = LineSet { lines };
        set.reindex();
        set
    }

    /// Appends a line at the bottom of the grid.
    pub fn push(&mut self, line: OrderLine) {
        self.lines.push(line);
        self.reindex();
    }

    fn reindex(&mut self) {
        let count = self.lines.len() as u32;
        for (position, line) in self.lines.iter_mut().enumerate() {
            line.sort_index = count - position as u32;
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OrderLine> {
        self.lines.iter()
    }

    /// Lines that carry data (placeholders excluded).
    pub fn structured(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|line| !line.placeholder)
    }

    pub fn as_slice(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn into_vec(self) -> Vec<OrderLine> {
        self.lines
    }
}

impl<'a> IntoIterator for &'a LineSet {
    type Item = &'a OrderLine;
    type IntoIter = std::slice::Iter<'a, OrderLine>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.iter()
    }
}

/// A map with no fields besides the index is a blank row.
fn is_blank(map: &Map<String, Value>) -> bool {
    map.iter()
        .all(|(key, value)| key == fields::SORT_INDEX || value.is_null())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn indices(set: &LineSet) -> Vec<u32> {
        set.iter().map(|line| line.sort_index).collect()
    }

    #[test]
    fn test_line_from_map() {
        let raw = json!({
            "reference": "COFFEE",
            "description": "Espresso",
            "quantity": "2",
            "unit_price": "1,50",
            "discount1": 10,
            "tax_rate": "21"
        });

        let line = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap();
        assert_eq!(line.reference.as_deref(), Some("COFFEE"));
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price.cents(), 150);
        assert_eq!(line.gross().cents(), 300);
        assert_eq!(line.net().cents(), 270);
        assert_eq!(line.tax_rate.bps(), 2100);
        assert!(!line.placeholder);
    }

    #[test]
    fn test_line_defaults_quantity_to_one() {
        let raw = json!({ "description": "Misc" });
        let line = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap();
        assert_eq!(line.quantity, 1);
        assert!(line.unit_price.is_zero());
    }

    #[test]
    fn test_line_rejects_bad_values() {
        let raw = json!({ "reference": "A", "quantity": 0 });
        let err = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap_err();
        assert_eq!(err.field(), "quantity");

        let raw = json!({ "reference": "A", "quantity": "1.5", "unit_price": "2" });
        let err = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap_err();
        assert_eq!(err.field(), "quantity");
        assert!(err.to_string().contains("whole number"));

        let raw = json!({ "reference": "A", "unit_price": "-1" });
        let err = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap_err();
        assert_eq!(err.field(), "unit_price");

        let raw = json!({ "reference": "A", "quantity": 100, "unit_price": "1000000000000000" });
        let err = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap_err();
        assert_eq!(err.field(), "unit_price");

        let raw = json!({ "reference": "A", "discount2": "150" });
        let err = OrderLine::from_map(raw.as_object().unwrap(), 1).unwrap_err();
        assert_eq!(err.field(), "discount2");
    }

    #[test]
    fn test_indices_descend_with_placeholders() {
        let raw = vec![
            json!({ "reference": "A", "unit_price": "1" }),
            json!(""),
            json!({ "reference": "B", "unit_price": "2" }),
            json!(null),
            json!({ "sort_index": 99 }),
        ];

        let set = LineSet::from_raw(&raw).unwrap();
        assert_eq!(indices(&set), vec![5, 4, 3, 2, 1]);
        assert_eq!(set.structured().count(), 2);
        assert!(set.as_slice()[1].placeholder);
        assert!(set.as_slice()[4].placeholder);
    }

    #[test]
    fn test_indices_ignore_supplied_order() {
        let raw = vec![
            json!({ "reference": "A", "sort_index": 1 }),
            json!({ "reference": "B", "sort_index": 7 }),
            json!({ "reference": "C", "sort_index": 3 }),
        ];

        let set = LineSet::from_raw(&raw).unwrap();
        assert_eq!(indices(&set), vec![3, 2, 1]);
        let refs: Vec<_> = set.iter().map(|l| l.reference.clone().unwrap()).collect();
        assert_eq!(refs, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_push_restamps() {
        let mut set = LineSet::new();
        set.push(OrderLine::placeholder(0));
        set.push(OrderLine::placeholder(0));
        set.push(OrderLine::placeholder(0));
        assert_eq!(indices(&set), vec![3, 2, 1]);
    }

    #[test]
    fn test_empty_set() {
        let set = LineSet::from_raw(&[]).unwrap();
        assert!(set.is_empty());
    }
}
