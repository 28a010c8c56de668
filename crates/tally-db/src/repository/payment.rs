//! # Payment Repository
//!
//! Payments recorded against placed documents, plus the per-scope sums
//! used by closing and reconciliation reports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use tally_core::{Money, Payment, SessionScope};

use crate::error::{DbError, DbResult};
use crate::store::PaymentStore;

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: String,
    document_id: String,
    method: String,
    amount_cents: i64,
    tendered_cents: i64,
    change_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Payment {
            id: row.id,
            document_id: row.document_id,
            method: row.method,
            amount: Money::from_cents(row.amount_cents),
            tendered: Money::from_cents(row.tendered_cents),
            change: Money::from_cents(row.change_cents),
            created_at: row.created_at,
        }
    }
}

/// Repository for payment operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    /// Creates a new PaymentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }
}

#[async_trait]
impl PaymentStore for PaymentRepository {
    async fn insert_payments(&self, payments: &[Payment], scope: &SessionScope) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for payment in payments {
            debug!(
                id = %payment.id,
                document_id = %payment.document_id,
                method = %payment.method,
                amount = %payment.amount,
                "Inserting payment"
            );

            sqlx::query(
                r#"
                INSERT INTO payments (
                    id, document_id, method, amount_cents, tendered_cents, change_cents,
                    terminal_id, session_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.document_id)
            .bind(&payment.method)
            .bind(payment.amount.cents())
            .bind(payment.tendered.cents())
            .bind(payment.change.cents())
            .bind(&scope.terminal_id)
            .bind(&scope.session_id)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    async fn payments_for_document(&self, document_id: &str) -> DbResult<Vec<Payment>> {
        let rows: Vec<PaymentRow> = sqlx::query_as(
            r#"
            SELECT id, document_id, method, amount_cents, tendered_cents, change_cents, created_at
            FROM payments
            WHERE document_id = ?1
            ORDER BY created_at, rowid
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Payment::from).collect())
    }

    async fn total_for_method(&self, scope: &SessionScope, method: &str) -> DbResult<Money> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents)
            FROM payments
            WHERE terminal_id = ?1 AND session_id = ?2 AND method = ?3
            "#,
        )
        .bind(&scope.terminal_id)
        .bind(&scope.session_id)
        .bind(method)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total.unwrap_or(0)))
    }

    async fn total_all(&self, scope: &SessionScope) -> DbResult<Money> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount_cents)
            FROM payments
            WHERE terminal_id = ?1 AND session_id = ?2
            "#,
        )
        .bind(&scope.terminal_id)
        .bind(&scope.session_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total.unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::DocumentStore;
    use tally_core::{Document, DocumentKind};

    fn payment(document_id: &str, method: &str, cents: i64) -> Payment {
        Payment {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            method: method.to_string(),
            amount: Money::from_cents(cents),
            tendered: Money::from_cents(cents),
            change: Money::zero(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_totals_by_scope_and_method() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut doc = Document::new(DocumentKind::Invoice);
        db.documents().save_document(&mut doc).await.unwrap();
        let id = doc.id.unwrap();

        let here = SessionScope::new("T1", "S1");
        let elsewhere = SessionScope::new("T2", "S1");
        let repo = db.payments();

        repo.insert_payments(&[payment(&id, "CASH", 1000), payment(&id, "CARD", 250)], &here)
            .await
            .unwrap();
        repo.insert_payments(&[payment(&id, "CASH", 999)], &elsewhere)
            .await
            .unwrap();

        assert_eq!(repo.total_for_method(&here, "CASH").await.unwrap().cents(), 1000);
        assert_eq!(repo.total_for_method(&here, "VOUCHER").await.unwrap().cents(), 0);
        assert_eq!(repo.total_all(&here).await.unwrap().cents(), 1250);
        assert_eq!(repo.payments_for_document(&id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut doc = Document::new(DocumentKind::Invoice);
        db.documents().save_document(&mut doc).await.unwrap();
        let id = doc.id.unwrap();

        let scope = SessionScope::new("T1", "S1");
        let repo = db.payments();

        // Second row breaks the amount check, so the first is rolled back too.
        let batch = [payment(&id, "CARD", 500), payment(&id, "CASH", 0)];
        assert!(repo.insert_payments(&batch, &scope).await.is_err());

        assert!(repo.payments_for_document(&id).await.unwrap().is_empty());
        assert_eq!(repo.total_all(&scope).await.unwrap(), Money::zero());
    }
}
