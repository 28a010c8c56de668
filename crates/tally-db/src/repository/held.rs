//! # Held Order Repository
//!
//! Snapshots of suspended sales, keyed by an opaque code and always
//! filtered by `(terminal_id, session_id)`.
//!
//! ## Scoping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  held_orders                                                            │
//! │  ┌──────────┬─────────────┬────────────┬───────────────────────────┐    │
//! │  │ code     │ terminal_id │ session_id │ document_data / line_data │    │
//! │  ├──────────┼─────────────┼────────────┼───────────────────────────┤    │
//! │  │ HOLD-1A  │ T1          │ S1         │ {...} / [...]             │    │
//! │  │ HOLD-9F  │ T2          │ S7         │ {...} / [...]             │    │
//! │  └──────────┴─────────────┴────────────┴───────────────────────────┘    │
//! │                                                                         │
//! │  Every read and delete carries the scope in its WHERE clause: T1 can    │
//! │  never see, resume or discard HOLD-9F even if it knows the code.        │
//! │                                                                         │
//! │  Removing a snapshot also deletes its document while that document is   │
//! │  still 'held' and no other snapshot points at it.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use tally_core::{HeldOrder, HeldOrderSummary, Money, SessionScope};

use crate::error::{DbError, DbResult};
use crate::store::HeldOrderStore;

const HELD_COLUMNS: &str = r#"
    code, terminal_id, session_id, document_id, document_data, line_data,
    customer_code, total_cents, line_count, created_at
"#;

#[derive(Debug, FromRow)]
struct HeldRow {
    code: String,
    terminal_id: String,
    session_id: String,
    document_id: Option<String>,
    document_data: String,
    line_data: String,
    customer_code: Option<String>,
    total_cents: i64,
    line_count: i64,
    created_at: DateTime<Utc>,
}

impl HeldRow {
    fn into_held(self) -> DbResult<HeldOrder> {
        let document_data: Map<String, Value> = serde_json::from_str(&self.document_data)?;
        let line_data: Vec<Value> = serde_json::from_str(&self.line_data)?;

        Ok(HeldOrder {
            code: self.code,
            scope: SessionScope::new(self.terminal_id, self.session_id),
            document_id: self.document_id,
            document_data,
            line_data,
            customer_code: self.customer_code,
            total: Money::from_cents(self.total_cents),
            line_count: self.line_count.clamp(0, u32::MAX as i64) as u32,
            created_at: self.created_at,
        })
    }
}

/// Repository for held-order snapshots.
#[derive(Debug, Clone)]
pub struct HeldOrderRepository {
    pool: SqlitePool,
}

impl HeldOrderRepository {
    /// Creates a new HeldOrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        HeldOrderRepository { pool }
    }
}

#[async_trait]
impl HeldOrderStore for HeldOrderRepository {
    async fn insert_held(&self, held: &HeldOrder) -> DbResult<()> {
        debug!(
            code = %held.code,
            terminal_id = %held.scope.terminal_id,
            lines = held.line_count,
            "Inserting held order"
        );

        let document_data = serde_json::to_string(&held.document_data)?;
        let line_data = serde_json::to_string(&held.line_data)?;

        sqlx::query(
            r#"
            INSERT INTO held_orders (
                code, terminal_id, session_id, document_id, document_data, line_data,
                customer_code, total_cents, line_count, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&held.code)
        .bind(&held.scope.terminal_id)
        .bind(&held.scope.session_id)
        .bind(&held.document_id)
        .bind(&document_data)
        .bind(&line_data)
        .bind(&held.customer_code)
        .bind(held.total.cents())
        .bind(held.line_count as i64)
        .bind(held.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_held(&self, scope: &SessionScope, code: &str) -> DbResult<Option<HeldOrder>> {
        let sql = format!(
            "SELECT {HELD_COLUMNS} FROM held_orders WHERE code = ?1 AND terminal_id = ?2 AND session_id = ?3"
        );
        let row: Option<HeldRow> = sqlx::query_as(&sql)
            .bind(code)
            .bind(&scope.terminal_id)
            .bind(&scope.session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(HeldRow::into_held).transpose()
    }

    async fn list_held(&self, scope: &SessionScope) -> DbResult<Vec<HeldOrderSummary>> {
        let sql = format!(
            r#"
            SELECT {HELD_COLUMNS} FROM held_orders
            WHERE terminal_id = ?1 AND session_id = ?2
            ORDER BY created_at DESC, rowid DESC
            "#
        );
        let rows: Vec<HeldRow> = sqlx::query_as(&sql)
            .bind(&scope.terminal_id)
            .bind(&scope.session_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.into_held().map(|held| held.summary()))
            .collect()
    }

    async fn remove_held(&self, scope: &SessionScope, code: &str) -> DbResult<Option<HeldOrder>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {HELD_COLUMNS} FROM held_orders WHERE code = ?1 AND terminal_id = ?2 AND session_id = ?3"
        );
        let row: Option<HeldRow> = sqlx::query_as(&sql)
            .bind(code)
            .bind(&scope.terminal_id)
            .bind(&scope.session_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let held = row.into_held()?;

        sqlx::query("DELETE FROM held_orders WHERE code = ?1")
            .bind(code)
            .execute(&mut *tx)
            .await?;

        if let Some(document_id) = &held.document_id {
            let removed = sqlx::query(
                r#"
                DELETE FROM documents
                WHERE id = ?1
                  AND status = 'held'
                  AND NOT EXISTS (SELECT 1 FROM held_orders WHERE document_id = ?1)
                "#,
            )
            .bind(document_id)
            .execute(&mut *tx)
            .await?;
            debug!(
                code = %code,
                document_id = %document_id,
                document_removed = removed.rows_affected() > 0,
                "Discarding held document"
            );
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(Some(held))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::store::DocumentStore;
    use serde_json::json;
    use tally_core::{Document, DocumentKind, DocumentStatus};

    fn held(code: &str, scope: &SessionScope, document_id: Option<String>) -> HeldOrder {
        HeldOrder {
            code: code.to_string(),
            scope: scope.clone(),
            document_id,
            document_data: json!({ "customer_code": "C001", "table": 4 })
                .as_object()
                .cloned()
                .unwrap(),
            line_data: vec![json!({ "reference": "A", "sort_index": 1 })],
            customer_code: Some("C001".to_string()),
            total: Money::from_cents(450),
            line_count: 1,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.held_orders();
        let scope = SessionScope::new("T1", "S1");

        let original = held("HOLD-1", &scope, None);
        repo.insert_held(&original).await.unwrap();

        let loaded = repo.get_held(&scope, "HOLD-1").await.unwrap().unwrap();
        assert_eq!(loaded.document_data, original.document_data);
        assert_eq!(loaded.line_data, original.line_data);
        assert_eq!(loaded.total.cents(), 450);
    }

    #[tokio::test]
    async fn test_scope_isolation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.held_orders();
        let a = SessionScope::new("A", "S1");
        let b = SessionScope::new("B", "S1");

        repo.insert_held(&held("HOLD-A", &a, None)).await.unwrap();

        assert_eq!(repo.list_held(&a).await.unwrap().len(), 1);
        assert!(repo.list_held(&b).await.unwrap().is_empty());
        assert!(repo.get_held(&b, "HOLD-A").await.unwrap().is_none());
        assert!(repo.remove_held(&b, "HOLD-A").await.unwrap().is_none());
        assert!(repo.get_held(&a, "HOLD-A").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_discards_held_document_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let documents = db.documents();
        let repo = db.held_orders();
        let scope = SessionScope::new("T1", "S1");

        let mut on_hold = Document::new(DocumentKind::Invoice);
        on_hold.status = DocumentStatus::Held;
        documents.save_document(&mut on_hold).await.unwrap();

        let mut placed = Document::new(DocumentKind::Invoice);
        placed.status = DocumentStatus::Placed;
        documents.save_document(&mut placed).await.unwrap();

        repo.insert_held(&held("HOLD-1", &scope, on_hold.id.clone())).await.unwrap();
        repo.insert_held(&held("HOLD-2", &scope, placed.id.clone())).await.unwrap();

        assert!(repo.remove_held(&scope, "HOLD-1").await.unwrap().is_some());
        assert!(repo.remove_held(&scope, "HOLD-2").await.unwrap().is_some());
        assert!(repo.remove_held(&scope, "HOLD-2").await.unwrap().is_none());

        assert!(documents.get_document(on_hold.id.as_deref().unwrap()).await.unwrap().is_none());
        assert!(documents.get_document(placed.id.as_deref().unwrap()).await.unwrap().is_some());
        assert!(repo.list_held(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_document_shared_by_newer_hold() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let documents = db.documents();
        let repo = db.held_orders();
        let scope = SessionScope::new("T1", "S1");

        let mut doc = Document::new(DocumentKind::Invoice);
        doc.status = DocumentStatus::Held;
        documents.save_document(&mut doc).await.unwrap();

        repo.insert_held(&held("HOLD-OLD", &scope, doc.id.clone())).await.unwrap();
        repo.insert_held(&held("HOLD-NEW", &scope, doc.id.clone())).await.unwrap();

        repo.remove_held(&scope, "HOLD-OLD").await.unwrap();
        assert!(documents.get_document(doc.id.as_deref().unwrap()).await.unwrap().is_some());

        repo.remove_held(&scope, "HOLD-NEW").await.unwrap();
        assert!(documents.get_document(doc.id.as_deref().unwrap()).await.unwrap().is_none());
    }
}
