//! # Payment Ledger
//!
//! Applies a payment list to a placed document and records it.
//!
//! ## Settlement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  due = document total, payments applied in submitted order              │
//! │                                                                         │
//! │  cash method:   applied = min(amount, due)                              │
//! │                 change  = max(0, amount - due)                          │
//! │                                                                         │
//! │  other method:  applied = min(amount, due)                              │
//! │                 change  = 0   (excess is dropped, never returned)       │
//! │                                                                         │
//! │  applied == 0  ──► no row recorded; cash change still counted           │
//! │  due -= applied                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example: due 100.00
//! | Payment        | Applied | Change |
//! |----------------|---------|--------|
//! | CARD 150.00    | 100.00  | 0.00   |
//! | CASH 150.00    | 100.00  | 50.00  |
//!
//! CARD 100.00 then CASH 20.00 records one row and returns 20.00 change.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use tally_core::{fields, Document, DocumentStatus, Money, Payment, PaymentDraft, SessionScope};
use tally_db::PaymentStore;

use crate::error::{PosError, PosResult};

/// Outcome of applying a payment list to one document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settlement {
    /// Rows to record; every one has a positive applied amount.
    pub payments: Vec<Payment>,
    /// Cash handed back, including cash tendered after the total was covered.
    pub change: Money,
}

/// Records payments and answers reconciliation sums.
pub struct PaymentLedger {
    payments: Arc<dyn PaymentStore>,
    cash_method: String,
}

impl PaymentLedger {
    pub fn new(payments: Arc<dyn PaymentStore>, cash_method: impl Into<String>) -> Self {
        PaymentLedger {
            payments,
            cash_method: cash_method.into(),
        }
    }

    pub fn is_cash(&self, method: &str) -> bool {
        method.trim().eq_ignore_ascii_case(self.cash_method.trim())
    }

    /// Works out applied amount and change for each draft. Pure.
    pub fn settle(&self, document_id: &str, due: Money, drafts: &[PaymentDraft]) -> Settlement {
        let mut remaining = due.clamp_non_negative();
        let mut settlement = Settlement {
            payments: Vec::with_capacity(drafts.len()),
            change: Money::zero(),
        };

        for draft in drafts {
            let applied = draft.amount.min(remaining);
            let change = if self.is_cash(&draft.method) {
                (draft.amount - remaining).clamp_non_negative()
            } else {
                Money::zero()
            };
            settlement.change += change;

            if !applied.is_positive() {
                warn!(
                    document_id = %document_id,
                    method = %draft.method,
                    amount = %draft.amount,
                    change = %change,
                    "Payment on a fully paid document not recorded"
                );
                continue;
            }

            if !self.is_cash(&draft.method) && draft.amount > applied {
                warn!(
                    method = %draft.method,
                    tendered = %draft.amount,
                    applied = %applied,
                    "Non-cash payment clamped to amount due"
                );
            }

            remaining -= applied;
            settlement.payments.push(Payment {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                method: draft.method.clone(),
                amount: applied,
                tendered: draft.amount,
                change,
                created_at: Utc::now(),
            });
        }

        settlement
    }

    /// Records payments against a placed document in one transaction.
    pub async fn save_payments(
        &self,
        document: &Document,
        drafts: &[PaymentDraft],
        scope: &SessionScope,
    ) -> PosResult<Settlement> {
        let document_id = match (&document.id, document.status) {
            (Some(id), DocumentStatus::Placed) => id.clone(),
            _ => {
                return Err(PosError::validation(
                    fields::PAYMENTS,
                    "Payments can only be recorded for a placed document",
                ))
            }
        };

        let settlement = self.settle(&document_id, document.totals.total, drafts);
        if !settlement.payments.is_empty() {
            self.payments
                .insert_payments(&settlement.payments, scope)
                .await
                .map_err(PosError::persistence)?;
        }

        info!(
            document_id = %document_id,
            payments = settlement.payments.len(),
            change = %settlement.change,
            "Payments recorded"
        );
        Ok(settlement)
    }

    pub async fn total_for_method(&self, scope: &SessionScope, method: &str) -> PosResult<Money> {
        Ok(self.payments.total_for_method(scope, method).await?)
    }

    pub async fn total_all(&self, scope: &SessionScope) -> PosResult<Money> {
        Ok(self.payments.total_all(scope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::DocumentKind;
    use tally_db::{Database, DbConfig, DocumentStore};

    fn draft(method: &str, cents: i64) -> PaymentDraft {
        PaymentDraft {
            method: method.to_string(),
            amount: Money::from_cents(cents),
        }
    }

    async fn ledger() -> (Database, PaymentLedger) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger = PaymentLedger::new(Arc::new(db.payments()), "CASH");
        (db, ledger)
    }

    #[tokio::test]
    async fn test_non_cash_is_clamped() {
        let (_db, ledger) = ledger().await;
        let settled = ledger.settle("D1", Money::from_cents(10_000), &[draft("CARD", 15_000)]);

        assert_eq!(settled.payments.len(), 1);
        assert_eq!(settled.payments[0].amount.cents(), 10_000);
        assert_eq!(settled.payments[0].change, Money::zero());
        assert_eq!(settled.change, Money::zero());
    }

    #[tokio::test]
    async fn test_cash_returns_change() {
        let (_db, ledger) = ledger().await;
        let settled = ledger.settle("D1", Money::from_cents(10_000), &[draft("cash", 15_000)]);

        assert_eq!(settled.payments[0].amount.cents(), 10_000);
        assert_eq!(settled.payments[0].tendered.cents(), 15_000);
        assert_eq!(settled.payments[0].change.cents(), 5_000);
        assert_eq!(settled.change.cents(), 5_000);
    }

    #[tokio::test]
    async fn test_split_payment_and_skip() {
        let (_db, ledger) = ledger().await;
        let settled = ledger.settle(
            "D1",
            Money::from_cents(10_000),
            &[draft("CARD", 6_000), draft("CASH", 5_000), draft("CARD", 1_000)],
        );

        assert_eq!(settled.payments.len(), 2);
        assert_eq!(settled.payments[0].amount.cents(), 6_000);
        assert_eq!(settled.payments[1].amount.cents(), 4_000);
        assert_eq!(settled.payments[1].change.cents(), 1_000);
        assert_eq!(settled.change.cents(), 1_000);
    }

    #[tokio::test]
    async fn test_cash_after_full_cover_is_all_change() {
        let (_db, ledger) = ledger().await;
        let settled = ledger.settle(
            "D1",
            Money::from_cents(10_000),
            &[draft("CARD", 10_000), draft("CASH", 2_000)],
        );

        assert_eq!(settled.payments.len(), 1);
        assert_eq!(settled.payments[0].method, "CARD");
        assert_eq!(settled.change.cents(), 2_000);
    }

    #[tokio::test]
    async fn test_save_and_totals() {
        let (db, ledger) = ledger().await;
        let scope = SessionScope::new("T1", "S1");

        let mut document = Document::new(DocumentKind::Invoice);
        document.status = DocumentStatus::Placed;
        document.totals.total = Money::from_cents(2_500);
        document.set_scope(&scope);
        db.documents().save_document(&mut document).await.unwrap();

        ledger
            .save_payments(&document, &[draft("CARD", 1_000), draft("CASH", 2_000)], &scope)
            .await
            .unwrap();

        assert_eq!(ledger.total_for_method(&scope, "CARD").await.unwrap().cents(), 1_000);
        assert_eq!(ledger.total_for_method(&scope, "CASH").await.unwrap().cents(), 1_500);
        assert_eq!(ledger.total_all(&scope).await.unwrap().cents(), 2_500);
    }

    #[tokio::test]
    async fn test_rejects_unplaced_document() {
        let (_db, ledger) = ledger().await;
        let document = Document::new(DocumentKind::Invoice);
        let result = ledger
            .save_payments(&document, &[draft("CASH", 100)], &SessionScope::new("T1", "S1"))
            .await;

        assert!(matches!(result, Err(PosError::Validation { .. })));
    }
}
