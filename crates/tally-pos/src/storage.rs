//! # Order Storage
//!
//! Places orders, puts them on hold, and manages the held-order snapshots
//! of one terminal session.
//!
//! ## Held Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  place_on_hold(order)                                                   │
//! │     ├── order.hold()           header + lines, status held              │
//! │     └── insert snapshot        HOLD-XXXXXXXXXXXX  (scope T1/S1)         │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  get_orders_on_hold()  ──► [summary, ...]   (only T1/S1 entries)        │
//! │  get_order_on_hold(code) ──► snapshot | NotFound                        │
//! │              │                                                          │
//! │              ▼                                                          │
//! │  update_order_on_hold(code) ──► snapshot removed                        │
//! │                                 held document discarded                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Safety
//! Snapshot operations run under one `tokio::sync::Mutex`: a resume sees
//! either the whole snapshot or `NotFound`, never one half-written.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tally_core::{Document, HeldOrder, HeldOrderSummary, SessionScope};
use tally_db::{DocumentStore, HeldOrderStore};

use crate::error::{PosError, PosResult};
use crate::order::Order;

/// Prefix of every held-order code.
pub const HOLD_CODE_PREFIX: &str = "HOLD-";

/// Keyed store of held orders, scoped per terminal session.
pub struct OrderStorage {
    documents: Arc<dyn DocumentStore>,
    held: Arc<dyn HeldOrderStore>,
    lock: Mutex<()>,
}

impl OrderStorage {
    pub fn new(documents: Arc<dyn DocumentStore>, held: Arc<dyn HeldOrderStore>) -> Self {
        OrderStorage {
            documents,
            held,
            lock: Mutex::new(()),
        }
    }

    /// Saves the order as a placed document.
    pub async fn place(&self, order: &mut Order, scope: &SessionScope) -> PosResult<()> {
        order.save(scope).await
    }

    /// Holds the order and stores its snapshot under a fresh code.
    ///
    /// The snapshot keeps the request's document and line data exactly as
    /// submitted. If the snapshot cannot be stored the held document is
    /// deleted again.
    pub async fn place_on_hold(
        &self,
        order: &mut Order,
        scope: &SessionScope,
    ) -> PosResult<HeldOrderSummary> {
        let _guard = self.lock.lock().await;

        order.hold(scope).await?;

        let request = order.request();
        let held = HeldOrder {
            code: new_hold_code(),
            scope: scope.clone(),
            document_id: order.document().id.clone(),
            document_data: request.document_data(),
            line_data: request.line_data().to_vec(),
            customer_code: request.customer_code(),
            total: order.preview().totals.total,
            line_count: order.lines().structured().count() as u32,
            created_at: Utc::now(),
        };

        if let Err(e) = self.held.insert_held(&held).await {
            if let Some(document_id) = &held.document_id {
                warn!(document_id = %document_id, "Snapshot failed, discarding held document");
                if let Err(cleanup) = self.documents.delete_document(document_id).await {
                    warn!(document_id = %document_id, error = %cleanup, "Cleanup failed");
                }
            }
            return Err(PosError::persistence(e));
        }

        info!(
            code = %held.code,
            terminal_id = %scope.terminal_id,
            lines = held.line_count,
            "Order put on hold"
        );
        Ok(held.summary())
    }

    /// Held orders visible to this session, newest first.
    pub async fn get_orders_on_hold(&self, scope: &SessionScope) -> PosResult<Vec<HeldOrderSummary>> {
        let _guard = self.lock.lock().await;
        Ok(self.held.list_held(scope).await?)
    }

    pub async fn get_order_on_hold(&self, scope: &SessionScope, code: &str) -> PosResult<HeldOrder> {
        let _guard = self.lock.lock().await;

        self.held
            .get_held(scope, code.trim())
            .await?
            .ok_or_else(|| PosError::not_found("Order on hold", code))
    }

    /// Removes a held entry once it was completed or discarded.
    ///
    /// The backing document goes too while it is still on hold; a document
    /// placed in the meantime is kept.
    pub async fn update_order_on_hold(&self, scope: &SessionScope, code: &str) -> PosResult<HeldOrder> {
        let _guard = self.lock.lock().await;

        let removed = self
            .held
            .remove_held(scope, code.trim())
            .await?
            .ok_or_else(|| PosError::not_found("Order on hold", code))?;

        debug!(code = %removed.code, "Held order removed");
        Ok(removed)
    }

    /// The most recently placed document of this session.
    pub async fn get_current_order(&self, scope: &SessionScope) -> PosResult<Document> {
        self.documents
            .latest_placed(scope)
            .await?
            .ok_or_else(|| PosError::not_found("Current order", &scope.session_id))
    }
}

/// `HOLD-` followed by twelve uppercase hex digits.
fn new_hold_code() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}{}", HOLD_CODE_PREFIX, &id[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::tests::{context, raw, test_db};
    use serde_json::json;
    use tally_core::{DocumentStatus, OrderRequest};
    use tally_db::Database;

    fn storage(db: &Database) -> Arc<OrderStorage> {
        Arc::new(OrderStorage::new(
            Arc::new(db.documents()),
            Arc::new(db.held_orders()),
        ))
    }

    fn hold_request() -> OrderRequest {
        OrderRequest::for_build(raw(json!({
            "customer_code": "C001",
            "table": "7",
            "lines": [
                { "reference": "A", "description": "Tea", "quantity": 2, "unit_price": "2.00", "tax_rate": 10 },
                {},
            ],
            "action": "hold-order",
        })))
        .unwrap()
    }

    #[test]
    fn test_hold_code_format() {
        let code = new_hold_code();
        assert!(code.starts_with(HOLD_CODE_PREFIX));
        assert_eq!(code.len(), HOLD_CODE_PREFIX.len() + 12);
        assert!(code[HOLD_CODE_PREFIX.len()..]
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn test_hold_resume_round_trip() {
        let db = test_db().await;
        let ctx = context(&db, Arc::new(db.documents()));
        let storage = storage(&db);
        let scope = SessionScope::new("T1", "S1");

        let request = hold_request();
        let mut order = Order::new(request.clone(), &ctx).unwrap();
        let summary = storage.place_on_hold(&mut order, &scope).await.unwrap();

        assert_eq!(summary.line_count, 1);
        assert_eq!(summary.total.cents(), 440);
        assert_eq!(summary.customer_code.as_deref(), Some("C001"));

        let resumed = storage.get_order_on_hold(&scope, &summary.code).await.unwrap();
        assert_eq!(resumed.document_data, request.document_data());
        assert_eq!(resumed.line_data, request.line_data().to_vec());
        assert_eq!(resumed.document_id, order.document().id);

        let removed = storage.update_order_on_hold(&scope, &summary.code).await.unwrap();
        assert_eq!(removed.code, summary.code);
        assert!(matches!(
            storage.get_order_on_hold(&scope, &summary.code).await,
            Err(PosError::NotFound { .. })
        ));
        assert_eq!(db.documents().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_held_orders_are_scoped() {
        let db = test_db().await;
        let ctx = context(&db, Arc::new(db.documents()));
        let storage = storage(&db);
        let terminal_a = SessionScope::new("A", "S1");
        let terminal_b = SessionScope::new("B", "S1");

        let mut order = Order::new(hold_request(), &ctx).unwrap();
        let summary = storage.place_on_hold(&mut order, &terminal_a).await.unwrap();

        assert_eq!(storage.get_orders_on_hold(&terminal_a).await.unwrap().len(), 1);
        assert!(storage.get_orders_on_hold(&terminal_b).await.unwrap().is_empty());
        assert!(storage.get_order_on_hold(&terminal_b, &summary.code).await.is_err());
        assert!(storage.update_order_on_hold(&terminal_b, &summary.code).await.is_err());
    }

    #[tokio::test]
    async fn test_other_terminal_cannot_take_over_held_document() {
        let db = test_db().await;
        let ctx = context(&db, Arc::new(db.documents()));
        let storage = storage(&db);
        let terminal_a = SessionScope::new("A", "S1");
        let terminal_b = SessionScope::new("B", "S1");

        let mut order = Order::new(hold_request(), &ctx).unwrap();
        storage.place_on_hold(&mut order, &terminal_a).await.unwrap();
        let id = order.document().id.clone().unwrap();

        let takeover = OrderRequest::for_save(raw(json!({
            "id": id,
            "customer_code": "C001",
            "lines": [{ "description": "Tea", "unit_price": "0.01" }],
        })))
        .unwrap();
        let mut saved_by_b = Order::new(takeover.clone(), &ctx).unwrap();
        assert!(matches!(
            storage.place(&mut saved_by_b, &terminal_b).await,
            Err(PosError::NotFound { .. })
        ));

        let mut held_by_b = Order::new(takeover, &ctx).unwrap();
        assert!(matches!(
            storage.place_on_hold(&mut held_by_b, &terminal_b).await,
            Err(PosError::NotFound { .. })
        ));

        let stored = db.documents().get_document(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Held);
        assert_eq!(stored.terminal_id.as_deref(), Some("A"));
        assert_eq!(db.documents().get_lines(&id).await.unwrap().len(), 2);
        assert_eq!(storage.get_orders_on_hold(&terminal_a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_discard_removes_once() {
        let db = test_db().await;
        let ctx = context(&db, Arc::new(db.documents()));
        let storage = storage(&db);
        let scope = SessionScope::new("T1", "S1");

        let mut order = Order::new(hold_request(), &ctx).unwrap();
        let code = storage.place_on_hold(&mut order, &scope).await.unwrap().code;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let scope = scope.clone();
                let code = code.clone();
                tokio::spawn(async move { storage.update_order_on_hold(&scope, &code).await.is_ok() })
            })
            .collect();

        let mut removed = 0;
        for task in tasks {
            if task.await.unwrap() {
                removed += 1;
            }
        }
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_current_order() {
        let db = test_db().await;
        let ctx = context(&db, Arc::new(db.documents()));
        let storage = storage(&db);
        let scope = SessionScope::new("T1", "S1");

        assert!(matches!(
            storage.get_current_order(&scope).await,
            Err(PosError::NotFound { .. })
        ));

        let request = OrderRequest::for_save(raw(json!({
            "customer_code": "C001",
            "lines": [{ "description": "Tea", "unit_price": "2.00" }],
        })))
        .unwrap();
        let mut order = Order::new(request, &ctx).unwrap();
        storage.place(&mut order, &scope).await.unwrap();

        let current = storage.get_current_order(&scope).await.unwrap();
        assert_eq!(current.id, order.document().id);
        assert_eq!(current.status, DocumentStatus::Placed);
        assert!(storage
            .get_current_order(&SessionScope::new("T2", "S1"))
            .await
            .is_err());
    }
}
