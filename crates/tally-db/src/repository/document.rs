//! # Document Repository
//!
//! Document headers, order lines and document numbering.
//!
//! ## Header Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save_document(doc)                                                     │
//! │       │                                                                 │
//! │       ├── doc.id == None  ──► BEGIN                                     │
//! │       │                       bump document_counters (kind, series)     │
//! │       │                       INSERT documents (new UUID, new code)     │
//! │       │                       COMMIT                                    │
//! │       │                                                                 │
//! │       └── doc.id == Some  ──► UPDATE documents ... RETURNING code       │
//! │                               no row → NotFound                         │
//! │                                                                         │
//! │  Code format: {PREFIX}{series}-{YYYYMMDD}-{seq:04}                      │
//! │               INVA-20261016-0001                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a document cascades to its lines and payments
//! (`ON DELETE CASCADE`, foreign keys are enabled on every connection).

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::debug;
use uuid::Uuid;

use tally_core::{
    Document, DocumentKind, DocumentStatus, DocumentTotals, Money, OrderLine, Rate, SessionScope,
};

use crate::error::{DbError, DbResult};
use crate::store::DocumentStore;

const DOCUMENT_COLUMNS: &str = r#"
    id, kind, code, series, status,
    customer_code, customer_name, customer_tax_id,
    payment_method, workflow_state,
    discount1_bps, discount2_bps, notes, attributes,
    net_cents, tax_cents, surcharge_cents, withholding_cents, total_cents,
    terminal_id, session_id, created_at, updated_at
"#;

const LINE_COLUMNS: &str = r#"
    id, reference, description, quantity, unit_price_cents,
    discount1_bps, discount2_bps, tax_rate_bps, surcharge_rate_bps, withholding_rate_bps,
    sort_index, is_placeholder
"#;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    kind: DocumentKind,
    code: String,
    series: String,
    status: DocumentStatus,
    customer_code: Option<String>,
    customer_name: Option<String>,
    customer_tax_id: Option<String>,
    payment_method: Option<String>,
    workflow_state: Option<String>,
    discount1_bps: i64,
    discount2_bps: i64,
    notes: Option<String>,
    attributes: String,
    net_cents: i64,
    tax_cents: i64,
    surcharge_cents: i64,
    withholding_cents: i64,
    total_cents: i64,
    terminal_id: Option<String>,
    session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl DocumentRow {
    fn into_document(self) -> DbResult<Document> {
        let attributes: BTreeMap<String, Value> = serde_json::from_str(&self.attributes)?;

        Ok(Document {
            id: Some(self.id),
            kind: self.kind,
            code: Some(self.code),
            series: self.series,
            customer_code: self.customer_code,
            customer_name: self.customer_name,
            customer_tax_id: self.customer_tax_id,
            payment_method: self.payment_method,
            workflow_state: self.workflow_state,
            discount1: rate(self.discount1_bps),
            discount2: rate(self.discount2_bps),
            notes: self.notes,
            attributes,
            totals: DocumentTotals {
                net: Money::from_cents(self.net_cents),
                tax: Money::from_cents(self.tax_cents),
                surcharge: Money::from_cents(self.surcharge_cents),
                withholding: Money::from_cents(self.withholding_cents),
                total: Money::from_cents(self.total_cents),
            },
            status: self.status,
            terminal_id: self.terminal_id,
            session_id: self.session_id,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    id: String,
    reference: Option<String>,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
    discount1_bps: i64,
    discount2_bps: i64,
    tax_rate_bps: i64,
    surcharge_rate_bps: i64,
    withholding_rate_bps: i64,
    sort_index: i64,
    is_placeholder: bool,
}

impl From<LineRow> for OrderLine {
    fn from(row: LineRow) -> Self {
        OrderLine {
            id: Some(row.id),
            reference: row.reference,
            description: row.description,
            quantity: row.quantity,
            unit_price: Money::from_cents(row.unit_price_cents),
            discount1: rate(row.discount1_bps),
            discount2: rate(row.discount2_bps),
            tax_rate: rate(row.tax_rate_bps),
            surcharge_rate: rate(row.surcharge_rate_bps),
            withholding_rate: rate(row.withholding_rate_bps),
            sort_index: row.sort_index.clamp(0, u32::MAX as i64) as u32,
            placeholder: row.is_placeholder,
        }
    }
}

fn rate(bps: i64) -> Rate {
    Rate::from_bps(bps.clamp(0, u32::MAX as i64) as u32)
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for document and order line operations.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Creates a new DocumentRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DocumentRepository { pool }
    }

    async fn insert_document(&self, document: &mut Document) -> DbResult<()> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let attributes = serde_json::to_string(&document.attributes)?;

        let mut tx = self.pool.begin().await?;
        let seq = next_sequence(&mut tx, document.kind, &document.series).await?;
        let code = format_document_code(document.kind, &document.series, now, seq);

        debug!(id = %id, code = %code, kind = %document.kind, "Inserting document header");

        sqlx::query(
            r#"
            INSERT INTO documents (
                id, kind, code, series, status,
                customer_code, customer_name, customer_tax_id,
                payment_method, workflow_state,
                discount1_bps, discount2_bps, notes, attributes,
                net_cents, tax_cents, surcharge_cents, withholding_cents, total_cents,
                terminal_id, session_id, created_at, updated_at, placed_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19,
                ?20, ?21, ?22, ?22,
                CASE WHEN ?5 = 'placed' THEN ?22 ELSE NULL END
            )
            "#,
        )
        .bind(&id)
        .bind(document.kind)
        .bind(&code)
        .bind(&document.series)
        .bind(document.status)
        .bind(&document.customer_code)
        .bind(&document.customer_name)
        .bind(&document.customer_tax_id)
        .bind(&document.payment_method)
        .bind(&document.workflow_state)
        .bind(document.discount1.bps() as i64)
        .bind(document.discount2.bps() as i64)
        .bind(&document.notes)
        .bind(&attributes)
        .bind(document.totals.net.cents())
        .bind(document.totals.tax.cents())
        .bind(document.totals.surcharge.cents())
        .bind(document.totals.withholding.cents())
        .bind(document.totals.total.cents())
        .bind(&document.terminal_id)
        .bind(&document.session_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        document.id = Some(id);
        document.code = Some(code);
        document.created_at = Some(now);
        document.updated_at = Some(now);
        Ok(())
    }

    async fn update_document(&self, id: &str, document: &mut Document) -> DbResult<()> {
        let now = Utc::now();
        let attributes = serde_json::to_string(&document.attributes)?;

        debug!(id = %id, status = ?document.status, "Updating document header");

        let row: Option<(String, DateTime<Utc>)> = sqlx::query_as(
            r#"
            UPDATE documents SET
                kind = ?2,
                series = ?3,
                status = ?4,
                customer_code = ?5,
                customer_name = ?6,
                customer_tax_id = ?7,
                payment_method = ?8,
                workflow_state = ?9,
                discount1_bps = ?10,
                discount2_bps = ?11,
                notes = ?12,
                attributes = ?13,
                net_cents = ?14,
                tax_cents = ?15,
                surcharge_cents = ?16,
                withholding_cents = ?17,
                total_cents = ?18,
                terminal_id = COALESCE(?19, terminal_id),
                session_id = COALESCE(?20, session_id),
                updated_at = ?21,
                placed_at = CASE WHEN ?4 = 'placed' THEN COALESCE(placed_at, ?21) ELSE NULL END
            WHERE id = ?1
            RETURNING code, created_at
            "#,
        )
        .bind(id)
        .bind(document.kind)
        .bind(&document.series)
        .bind(document.status)
        .bind(&document.customer_code)
        .bind(&document.customer_name)
        .bind(&document.customer_tax_id)
        .bind(&document.payment_method)
        .bind(&document.workflow_state)
        .bind(document.discount1.bps() as i64)
        .bind(document.discount2.bps() as i64)
        .bind(&document.notes)
        .bind(&attributes)
        .bind(document.totals.net.cents())
        .bind(document.totals.tax.cents())
        .bind(document.totals.surcharge.cents())
        .bind(document.totals.withholding.cents())
        .bind(document.totals.total.cents())
        .bind(&document.terminal_id)
        .bind(&document.session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let (code, created_at) = row.ok_or_else(|| DbError::not_found("Document", id))?;
        document.code = Some(code);
        document.created_at = Some(created_at);
        document.updated_at = Some(now);
        Ok(())
    }

    /// Counts document headers (for diagnostics and tests).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Counts all order lines (for diagnostics and tests).
    pub async fn count_lines(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_lines")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl DocumentStore for DocumentRepository {
    async fn save_document(&self, document: &mut Document) -> DbResult<()> {
        match document.id.clone() {
            Some(id) => self.update_document(&id, document).await,
            None => self.insert_document(document).await,
        }
    }

    async fn save_line(&self, document_id: &str, line: &mut OrderLine) -> DbResult<()> {
        let id = Uuid::new_v4().to_string();

        debug!(
            document_id = %document_id,
            line_id = %id,
            sort_index = line.sort_index,
            "Inserting order line"
        );

        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, document_id, reference, description, quantity, unit_price_cents,
                discount1_bps, discount2_bps, tax_rate_bps, surcharge_rate_bps,
                withholding_rate_bps, sort_index, is_placeholder, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&id)
        .bind(document_id)
        .bind(&line.reference)
        .bind(&line.description)
        .bind(line.quantity)
        .bind(line.unit_price.cents())
        .bind(line.discount1.bps() as i64)
        .bind(line.discount2.bps() as i64)
        .bind(line.tax_rate.bps() as i64)
        .bind(line.surcharge_rate.bps() as i64)
        .bind(line.withholding_rate.bps() as i64)
        .bind(line.sort_index as i64)
        .bind(line.placeholder)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        line.id = Some(id);
        Ok(())
    }

    async fn delete_lines(&self, document_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM order_lines WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        debug!(document_id = %document_id, removed = result.rows_affected(), "Deleted order lines");
        Ok(result.rows_affected())
    }

    async fn delete_document(&self, document_id: &str) -> DbResult<()> {
        debug!(document_id = %document_id, "Deleting document");

        sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> DbResult<Option<Document>> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn get_lines(&self, document_id: &str) -> DbResult<Vec<OrderLine>> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM order_lines WHERE document_id = ?1 ORDER BY sort_index DESC"
        );
        let rows: Vec<LineRow> = sqlx::query_as(&sql)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(OrderLine::from).collect())
    }

    async fn latest_placed(&self, scope: &SessionScope) -> DbResult<Option<Document>> {
        let sql = format!(
            r#"
            SELECT {DOCUMENT_COLUMNS} FROM documents
            WHERE terminal_id = ?1 AND session_id = ?2 AND status = 'placed'
            ORDER BY placed_at DESC, rowid DESC
            LIMIT 1
            "#
        );
        let row: Option<DocumentRow> = sqlx::query_as(&sql)
            .bind(&scope.terminal_id)
            .bind(&scope.session_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(DocumentRow::into_document).transpose()
    }
}

// =============================================================================
// Numbering
// =============================================================================

/// Bumps and returns the counter for `(kind, series)`.
async fn next_sequence(
    tx: &mut Transaction<'_, Sqlite>,
    kind: DocumentKind,
    series: &str,
) -> DbResult<i64> {
    let value: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_counters (kind, series, last_value) VALUES (?1, ?2, 1)
        ON CONFLICT (kind, series) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(kind)
    .bind(series)
    .fetch_one(&mut **tx)
    .await?;

    Ok(value)
}

/// Formats a document number: `{PREFIX}{series}-{YYYYMMDD}-{seq:04}`.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use tally_core::DocumentKind;
/// use tally_db::repository::document::format_document_code;
///
/// let at = Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap();
/// assert_eq!(format_document_code(DocumentKind::Invoice, "A", at, 7), "INVA-20261016-0007");
/// ```
pub fn format_document_code(kind: DocumentKind, series: &str, at: DateTime<Utc>, seq: i64) -> String {
    format!(
        "{}{}-{}-{:04}",
        kind.number_prefix(),
        series,
        at.format("%Y%m%d"),
        seq
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tally_core::LineSet;

    async fn setup() -> DocumentRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.documents()
    }

    fn scoped_document(kind: DocumentKind) -> Document {
        let mut doc = Document::new(kind);
        doc.set_scope(&SessionScope::new("T1", "S1"));
        doc
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_and_code() {
        let repo = setup().await;

        let mut first = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut first).await.unwrap();
        let mut second = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut second).await.unwrap();
        let mut note = scoped_document(DocumentKind::DeliveryNote);
        repo.save_document(&mut note).await.unwrap();

        assert!(first.id.is_some());
        let first_code = first.code.unwrap();
        assert!(first_code.starts_with("INVA-"));
        assert!(first_code.ends_with("-0001"));
        assert!(second.code.unwrap().ends_with("-0002"));
        assert!(note.code.unwrap().starts_with("DNA-"));
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_roundtrip() {
        let repo = setup().await;

        let mut doc = scoped_document(DocumentKind::Estimate);
        doc.attributes.insert("table".to_string(), serde_json::json!("4"));
        repo.save_document(&mut doc).await.unwrap();
        let id = doc.id.clone().unwrap();
        let code = doc.code.clone();

        doc.status = DocumentStatus::Placed;
        doc.totals.total = Money::from_cents(1234);
        repo.save_document(&mut doc).await.unwrap();
        assert_eq!(doc.code, code);

        let loaded = repo.get_document(&id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Placed);
        assert_eq!(loaded.totals.total.cents(), 1234);
        assert_eq!(loaded.kind, DocumentKind::Estimate);
        assert_eq!(loaded.attributes.get("table"), Some(&serde_json::json!("4")));
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let repo = setup().await;

        let mut doc = scoped_document(DocumentKind::Invoice);
        doc.id = Some(Uuid::new_v4().to_string());
        let err = repo.save_document(&mut doc).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_lines_come_back_in_display_order() {
        let repo = setup().await;

        let mut doc = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut doc).await.unwrap();
        let id = doc.id.clone().unwrap();

        let set = LineSet::from_raw(&[
            serde_json::json!({ "reference": "A" }),
            serde_json::json!(""),
            serde_json::json!({ "reference": "C" }),
        ])
        .unwrap();

        // Write in reverse to prove the read order does not depend on it.
        let mut lines = set.into_vec();
        for line in lines.iter_mut().rev() {
            repo.save_line(&id, line).await.unwrap();
        }

        let loaded = repo.get_lines(&id).await.unwrap();
        let indices: Vec<u32> = loaded.iter().map(|l| l.sort_index).collect();
        assert_eq!(indices, vec![3, 2, 1]);
        assert_eq!(loaded[0].reference.as_deref(), Some("A"));
        assert!(loaded[1].placeholder);
    }

    #[tokio::test]
    async fn test_delete_document_cascades_to_lines() {
        let repo = setup().await;

        let mut doc = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut doc).await.unwrap();
        let id = doc.id.clone().unwrap();

        let mut line = OrderLine::placeholder(1);
        repo.save_line(&id, &mut line).await.unwrap();
        assert_eq!(repo.count_lines().await.unwrap(), 1);

        repo.delete_document(&id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(repo.count_lines().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_lines() {
        let repo = setup().await;

        let mut doc = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut doc).await.unwrap();
        let id = doc.id.clone().unwrap();

        for index in 1..=3 {
            let mut line = OrderLine::placeholder(index);
            repo.save_line(&id, &mut line).await.unwrap();
        }

        assert_eq!(repo.delete_lines(&id).await.unwrap(), 3);
        assert!(repo.get_lines(&id).await.unwrap().is_empty());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_latest_placed_is_scoped() {
        let repo = setup().await;

        let mut draft = scoped_document(DocumentKind::Invoice);
        repo.save_document(&mut draft).await.unwrap();
        assert!(repo
            .latest_placed(&SessionScope::new("T1", "S1"))
            .await
            .unwrap()
            .is_none());

        let mut placed = scoped_document(DocumentKind::Invoice);
        placed.status = DocumentStatus::Placed;
        repo.save_document(&mut placed).await.unwrap();

        let latest = repo
            .latest_placed(&SessionScope::new("T1", "S1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, placed.id);

        assert!(repo
            .latest_placed(&SessionScope::new("T2", "S1"))
            .await
            .unwrap()
            .is_none());
    }
}
