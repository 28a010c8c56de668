//! # Recalculator
//!
//! Derives document totals from a header and its lines. Pure: no I/O, no
//! clock, no randomness, so it can run on every keystroke.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  per line                                                               │
//! │    gross  = unit_price × quantity                                       │
//! │    net    = gross − d1%  → round                                        │
//! │           = net   − d2%  → round                                        │
//! │                                                                         │
//! │  per (tax, surcharge) group                                             │
//! │    base   = Σ line net                                                  │
//! │           − doc d1%  → round                                            │
//! │           − doc d2%  → round                                            │
//! │    tax       = base × tax%        → round                               │
//! │    surcharge = base × surcharge%  → round                               │
//! │                                                                         │
//! │  per withholding group (same base rule)                                 │
//! │    withholding = base × withholding%  → round                           │
//! │                                                                         │
//! │  total = Σ base + Σ tax + Σ surcharge − Σ withholding                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every "round" is half-to-even to the cent ([`Money::portion`]).
//! Sums only ever add already-rounded cents, so the live recalculation
//! and the saved totals are the same numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::document::{Document, DocumentTotals};
use crate::line::{LineSet, OrderLine};
use crate::money::Money;
use crate::types::Rate;

// =============================================================================
// Output Types
// =============================================================================

/// Display amounts for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineAmounts {
    pub sort_index: u32,
    /// Price × quantity.
    pub gross: Money,
    /// After both line discounts.
    pub net: Money,
}

/// Result of one recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Recalculation {
    pub totals: DocumentTotals,
    pub lines: Vec<LineAmounts>,
}

// =============================================================================
// Recalculator
// =============================================================================

/// Computes totals for a document and its lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recalculator;

impl Recalculator {
    pub fn new() -> Self {
        Recalculator
    }

    /// Runs the pipeline. Placeholder lines contribute nothing.
    pub fn run(&self, document: &Document, lines: &LineSet) -> Recalculation {
        let mut line_amounts = Vec::with_capacity(lines.len());
        let mut tax_groups: BTreeMap<(Rate, Rate), Money> = BTreeMap::new();
        let mut withholding_groups: BTreeMap<Rate, Money> = BTreeMap::new();

        for line in lines {
            let amounts = line_amounts_for(line);
            line_amounts.push(amounts);

            if line.placeholder {
                continue;
            }

            *tax_groups
                .entry((line.tax_rate, line.surcharge_rate))
                .or_default() += amounts.net;

            if !line.withholding_rate.is_zero() {
                *withholding_groups.entry(line.withholding_rate).or_default() += amounts.net;
            }
        }

        let mut totals = DocumentTotals::default();

        for ((tax_rate, surcharge_rate), subtotal) in tax_groups {
            let base = apply_document_discounts(document, subtotal);
            totals.net += base;
            totals.tax += base.portion(tax_rate);
            totals.surcharge += base.portion(surcharge_rate);
        }

        for (withholding_rate, subtotal) in withholding_groups {
            let base = apply_document_discounts(document, subtotal);
            totals.withholding += base.portion(withholding_rate);
        }

        totals.total = totals.net + totals.tax + totals.surcharge - totals.withholding;

        Recalculation {
            totals,
            lines: line_amounts,
        }
    }

    /// Runs the pipeline and writes the totals onto the document.
    pub fn apply(&self, document: &mut Document, lines: &LineSet) -> Recalculation {
        let result = self.run(document, lines);
        document.apply_totals(result.totals);
        result
    }
}

fn line_amounts_for(line: &OrderLine) -> LineAmounts {
    if line.placeholder {
        return LineAmounts {
            sort_index: line.sort_index,
            gross: Money::zero(),
            net: Money::zero(),
        };
    }

    LineAmounts {
        sort_index: line.sort_index,
        gross: line.gross(),
        net: line.net(),
    }
}

fn apply_document_discounts(document: &Document, amount: Money) -> Money {
    amount
        .discounted(document.discount1)
        .discounted(document.discount2)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentKind;
    use serde_json::json;

    fn lines(raw: serde_json::Value) -> LineSet {
        LineSet::from_raw(raw.as_array().unwrap()).unwrap()
    }

    #[test]
    fn test_simple_totals() {
        let doc = Document::new(DocumentKind::Invoice);
        let set = lines(json!([
            { "reference": "A", "quantity": 2, "unit_price": "10.00", "tax_rate": "21" },
            { "reference": "B", "quantity": 1, "unit_price": "5.00", "tax_rate": "10" }
        ]));

        let result = Recalculator::new().run(&doc, &set);
        assert_eq!(result.totals.net.cents(), 2500);
        // 20.00 × 21% = 4.20 ; 5.00 × 10% = 0.50
        assert_eq!(result.totals.tax.cents(), 470);
        assert_eq!(result.totals.total.cents(), 2970);
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].sort_index, 2);
        assert_eq!(result.lines[0].gross.cents(), 2000);
    }

    #[test]
    fn test_discounts_round_per_step() {
        let mut doc = Document::new(DocumentKind::Invoice);
        doc.discount1 = Rate::from_bps(1000);

        // 3 × 3.35 = 10.05 ; line 5% = 0.5025 → 0.50 → 9.55
        // doc 10% of 9.55 = 0.955 → 0.96 (half-even) → 8.59
        // tax 21% of 8.59 = 1.8039 → 1.80
        let set = lines(json!([
            { "reference": "A", "quantity": 3, "unit_price": "3.35", "discount1": "5", "tax_rate": "21" }
        ]));

        let result = Recalculator::new().run(&doc, &set);
        assert_eq!(result.lines[0].net.cents(), 955);
        assert_eq!(result.totals.net.cents(), 859);
        assert_eq!(result.totals.tax.cents(), 180);
        assert_eq!(result.totals.total.cents(), 1039);
    }

    #[test]
    fn test_half_even_tax() {
        let doc = Document::new(DocumentKind::Invoice);
        // 10.00 × 8.25% = 0.825 → 0.82
        let set = lines(json!([
            { "reference": "A", "unit_price": "10.00", "tax_rate": "8.25" }
        ]));

        let result = Recalculator::new().run(&doc, &set);
        assert_eq!(result.totals.tax.cents(), 82);
    }

    #[test]
    fn test_surcharge_and_withholding() {
        let doc = Document::new(DocumentKind::Invoice);
        let set = lines(json!([
            {
                "reference": "SVC",
                "unit_price": "100.00",
                "tax_rate": "21",
                "surcharge_rate": "5.2",
                "withholding_rate": "15"
            }
        ]));

        let totals = Recalculator::new().run(&doc, &set).totals;
        assert_eq!(totals.net.cents(), 10000);
        assert_eq!(totals.tax.cents(), 2100);
        assert_eq!(totals.surcharge.cents(), 520);
        assert_eq!(totals.withholding.cents(), 1500);
        assert_eq!(totals.total.cents(), 10000 + 2100 + 520 - 1500);
    }

    #[test]
    fn test_placeholders_contribute_nothing() {
        let doc = Document::new(DocumentKind::Invoice);
        let set = lines(json!([
            "",
            { "reference": "A", "unit_price": "1.00" },
            null
        ]));

        let result = Recalculator::new().run(&doc, &set);
        assert_eq!(result.totals.total.cents(), 100);
        assert_eq!(result.lines.len(), 3);
        assert!(result.lines[0].net.is_zero());
        assert_eq!(
            result.lines.iter().map(|l| l.sort_index).collect::<Vec<_>>(),
            vec![3, 2, 1]
        );
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::new(DocumentKind::Invoice);
        let result = Recalculator::new().run(&doc, &LineSet::new());
        assert_eq!(result.totals, DocumentTotals::default());
        assert!(result.lines.is_empty());
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut doc = Document::new(DocumentKind::Invoice);
        doc.discount2 = Rate::from_bps(250);
        let set = lines(json!([
            { "reference": "A", "quantity": 7, "unit_price": "0.99", "tax_rate": "21" },
            { "reference": "B", "quantity": 3, "unit_price": "12.49", "tax_rate": "4", "discount2": "12.5" }
        ]));

        let calc = Recalculator::new();
        let first = calc.apply(&mut doc, &set);
        let second = calc.apply(&mut doc, &set);
        assert_eq!(first, second);
        assert_eq!(doc.totals, first.totals);
    }
}
