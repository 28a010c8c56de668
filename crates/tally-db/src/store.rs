//! # Persistence Ports
//!
//! The traits the order workflow talks to. Repositories in
//! [`crate::repository`] implement them over SQLite; tests wrap or replace
//! them to inject faults.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tally-pos                         tally-db                             │
//! │                                                                         │
//! │  Order ───────────► DocumentStore ◄──── DocumentRepository             │
//! │  OrderStorage ────► HeldOrderStore ◄─── HeldOrderRepository            │
//! │  PaymentLedger ───► PaymentStore ◄───── PaymentRepository              │
//! │  Order ───────────► CustomerDirectory ◄ CustomerRepository             │
//! │                                                                         │
//! │  All injected as Arc<dyn Trait>                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use tally_core::{
    Customer, Document, HeldOrder, HeldOrderSummary, Money, OrderLine, Payment, SessionScope,
};

use crate::error::DbResult;

/// Document headers and their lines.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts the header, or updates it when `document.id` is set.
    ///
    /// On insert the store assigns `id`, `code` and the timestamps.
    async fn save_document(&self, document: &mut Document) -> DbResult<()>;

    /// Persists one line under `document_id`, assigning its `id`.
    async fn save_line(&self, document_id: &str, line: &mut OrderLine) -> DbResult<()>;

    /// Removes every line of a document. Returns the number removed.
    async fn delete_lines(&self, document_id: &str) -> DbResult<u64>;

    /// Removes a document together with its lines and payments.
    async fn delete_document(&self, document_id: &str) -> DbResult<()>;

    async fn get_document(&self, document_id: &str) -> DbResult<Option<Document>>;

    /// Lines ordered by `sort_index` descending.
    async fn get_lines(&self, document_id: &str) -> DbResult<Vec<OrderLine>>;

    /// Most recently placed document in the scope.
    async fn latest_placed(&self, scope: &SessionScope) -> DbResult<Option<Document>>;
}

/// Recorded payments and their reconciliation totals.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Records all payments of one document, or none of them.
    async fn insert_payments(&self, payments: &[Payment], scope: &SessionScope) -> DbResult<()>;

    async fn payments_for_document(&self, document_id: &str) -> DbResult<Vec<Payment>>;

    async fn total_for_method(&self, scope: &SessionScope, method: &str) -> DbResult<Money>;

    async fn total_all(&self, scope: &SessionScope) -> DbResult<Money>;
}

/// Held-order snapshots, always addressed within a scope.
#[async_trait]
pub trait HeldOrderStore: Send + Sync {
    async fn insert_held(&self, held: &HeldOrder) -> DbResult<()>;

    async fn get_held(&self, scope: &SessionScope, code: &str) -> DbResult<Option<HeldOrder>>;

    /// Newest first.
    async fn list_held(&self, scope: &SessionScope) -> DbResult<Vec<HeldOrderSummary>>;

    /// Removes a snapshot in one transaction. The backing document is
    /// deleted too while it is still in `held` status and no other
    /// snapshot refers to it.
    ///
    /// Returns the removed snapshot, or `None` if the code is unknown in
    /// this scope.
    async fn remove_held(&self, scope: &SessionScope, code: &str) -> DbResult<Option<HeldOrder>>;
}

/// Subject lookup.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_customer(&self, code: &str) -> DbResult<Option<Customer>>;
}
