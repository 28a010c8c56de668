//! # Action Surface
//!
//! The operations a terminal front end calls. Each state-changing action
//! is gated by a single-use token and a permission check, and every
//! outcome is returned as a response, never as an unhandled fault.
//!
//! ## Actions
//! ```text
//! ┌──────────────────────────┬──────────┬───────────────────────────────────┐
//! │ Action                   │ Gate     │ Returns                           │
//! ├──────────────────────────┼──────────┼───────────────────────────────────┤
//! │ recalculate_order        │ -        │ totals + per-line amounts         │
//! │ save_order               │ token    │ messages + next token             │
//! │ hold_order               │ token    │ messages + next token + summary   │
//! │ resume_order             │ -        │ document/line data + token        │
//! │ delete_order_on_hold     │ perm     │ messages + token                  │
//! │ get_orders_on_hold       │ -        │ [summary]                         │
//! │ get_current_order        │ -        │ last placed document              │
//! └──────────────────────────┴──────────┴───────────────────────────────────┘
//! ```
//!
//! ## Save Flow
//! ```text
//! permission ──► token.begin ──► OrderRequest::for_save ──► Order::new
//!     │              │                                         │
//!     ▼              ▼                                         ▼
//!  denied:        invalid/dup:                        payments cover total?
//!  messages       messages                                     │
//!  only           only                                         ▼
//!                                 storage.place ──► ledger (same document)
//! ```
//!
//! Once the document is placed the response always carries its code. A
//! failed payment step adds a warning instead of hiding the sale.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use ts_rs::TS;

use tally_core::{
    fields, Document, DocumentTotals, HeldOrderSummary, LineAmounts, Money, OrderRequest,
};
use tally_db::{
    migrations, CustomerDirectory, Database, DbConfig, DocumentStore, HeldOrderStore,
    PaymentStore,
};

use crate::config::PosConfig;
use crate::error::{PosError, PosResult};
use crate::ledger::{PaymentLedger, Settlement};
use crate::order::{Order, OrderContext};
use crate::session::{AllowAll, Permission, PermissionChecker, SalesSession};
use crate::storage::OrderStorage;
use crate::token::TokenGuard;

// =============================================================================
// Action Names
// =============================================================================

pub const RECALCULATE_ORDER: &str = "recalculate-order";
pub const SAVE_ORDER: &str = "save-order";
pub const HOLD_ORDER: &str = tally_core::request::HOLD_ACTION;
pub const RESUME_ORDER: &str = "resume-order";
pub const DELETE_ORDER_ON_HOLD: &str = "delete-order-on-hold";
pub const GET_ORDERS_ON_HOLD: &str = "get-orders-on-hold";
pub const GET_CURRENT_ORDER: &str = "get-current-order";

/// Field carrying a held-order code.
const HELD_CODE: &str = "code";

fn to_json<T: Serialize>(result: PosResult<T>) -> Value {
    let serialized = match result {
        Ok(value) => serde_json::to_value(value),
        Err(e) => Ok(json!({ "code": e.code(), "message": e.user_message() })),
    };
    serialized.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Response serialization failed");
        json!({ "code": "INTERNAL", "message": "Response could not be encoded" })
    })
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Warning,
}

/// One line of operator feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub message: String,
}

/// Result of a gated action.
///
/// `token` is `None` when the request was rejected at the gate; the
/// terminal has to fetch a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub messages: Vec<Message>,
    pub token: Option<String>,
    /// Code of the placed document (save).
    pub document_code: Option<String>,
    /// The new held entry (hold).
    pub held: Option<HeldOrderSummary>,
}

impl ActionResponse {
    fn with_token(token: String) -> Self {
        ActionResponse {
            token: Some(token),
            ..Default::default()
        }
    }

    fn rejected(err: PosError) -> Self {
        let mut response = ActionResponse::default();
        response.warning(err.user_message());
        response
    }

    fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(message = %message, "Action message");
        self.messages.push(Message {
            kind: MessageKind::Info,
            message,
        });
    }

    fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(message = %message, "Action message");
        self.messages.push(Message {
            kind: MessageKind::Warning,
            message,
        });
    }

    pub fn has_warnings(&self) -> bool {
        self.messages.iter().any(|m| m.kind == MessageKind::Warning)
    }
}

/// Totals for live display while an order is edited.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateResponse {
    pub totals: DocumentTotals,
    pub lines: Vec<LineAmounts>,
    pub customer_name: Option<String>,
    /// `totals.total` in the configured currency format.
    pub formatted_total: String,
}

/// A held order handed back for editing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeResponse {
    pub code: String,
    pub document_id: Option<String>,
    pub document_data: Map<String, Value>,
    pub line_data: Vec<Value>,
    pub token: String,
}

// =============================================================================
// Service
// =============================================================================

/// Entry point for every terminal action.
pub struct PosService {
    config: PosConfig,
    tokens: TokenGuard,
    storage: OrderStorage,
    ledger: PaymentLedger,
    context: OrderContext,
    permissions: Arc<dyn PermissionChecker>,
    /// Set when the service opened the database itself.
    database: Option<Database>,
}

impl PosService {
    /// Wires the service to the SQLite repositories of `db`.
    pub fn new(config: PosConfig, db: &Database) -> Self {
        PosService::from_parts(
            config,
            Arc::new(db.documents()),
            Arc::new(db.customers()),
            Arc::new(db.payments()),
            Arc::new(db.held_orders()),
        )
    }

    /// Opens the configured database (running migrations) and wires the service.
    pub async fn connect(config: PosConfig) -> PosResult<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PosError::Config(format!("{}: {}", parent.display(), e)))?;
        }

        info!(path = %path.display(), "Opening database");
        let db = Database::new(DbConfig::new(path)).await?;
        if !db.health_check().await {
            return Err(PosError::Persistence("database is not responding".to_string()));
        }
        let (total, applied) = migrations::migration_status(db.pool()).await?;
        info!(total, applied, "Schema ready");

        let mut service = PosService::new(config, &db);
        service.database = Some(db);
        Ok(service)
    }

    /// Closes the database opened by [`PosService::connect`].
    pub async fn shutdown(&self) {
        if let Some(db) = &self.database {
            db.close().await;
        }
    }

    pub fn from_parts(
        config: PosConfig,
        documents: Arc<dyn DocumentStore>,
        customers: Arc<dyn CustomerDirectory>,
        payments: Arc<dyn PaymentStore>,
        held: Arc<dyn HeldOrderStore>,
    ) -> Self {
        let context = OrderContext {
            documents: Arc::clone(&documents),
            customers,
            default_kind: config.default_kind(),
            max_lines: config.sales.max_lines,
        };

        PosService {
            tokens: TokenGuard::new(config.security.token_history),
            storage: OrderStorage::new(documents, held),
            ledger: PaymentLedger::new(payments, config.sales.cash_method.clone()),
            context,
            permissions: Arc::new(AllowAll),
            database: None,
            config,
        }
    }

    /// Replaces the permission checker (allow-all by default).
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn config(&self) -> &PosConfig {
        &self.config
    }

    pub fn ledger(&self) -> &PaymentLedger {
        &self.ledger
    }

    /// Token for the first action of a session.
    pub fn issue_token(&self, session: &SalesSession) -> String {
        self.tokens.issue(&session.session_id)
    }

    /// Drops the session's tokens.
    pub fn close_session(&self, session: &SalesSession) {
        self.tokens.end_session(&session.session_id);
        info!(session_id = %session.session_id, "Session closed");
    }

    // =========================================================================
    // recalculate-order
    // =========================================================================

    /// Computes totals from flat form fields. Writes nothing.
    pub async fn recalculate_order(&self, raw: Map<String, Value>) -> PosResult<RecalculateResponse> {
        let request = OrderRequest::for_build(raw)?;
        let mut order = Order::new(request, &self.context)?;
        let result = order.recalculate().await?;

        Ok(RecalculateResponse {
            formatted_total: self.config.format_currency(result.totals.total),
            customer_name: order.document().customer_name.clone(),
            totals: result.totals,
            lines: result.lines,
        })
    }

    // =========================================================================
    // save-order
    // =========================================================================

    /// Places an order and records its payments.
    ///
    /// `raw` carries the document fields plus `token`, `lines` and
    /// `payments` (arrays or JSON text).
    pub async fn save_order(&self, session: &SalesSession, raw: Map<String, Value>) -> ActionResponse {
        let next = match self.gate(session, &raw, Permission::Update) {
            Ok(next) => next,
            Err(e) => return ActionResponse::rejected(e),
        };

        let mut response = ActionResponse::with_token(next);
        match self.place_order(session, raw).await {
            Ok((code, payments)) => {
                response.info(format!("Order {} saved", code));
                match payments {
                    Ok(settlement) if settlement.change.is_positive() => {
                        let change = self.config.format_currency(settlement.change);
                        response.info(format!("Change: {}", change));
                    }
                    Ok(_) => {}
                    Err(_) => response.warning(format!(
                        "Payments for order {} could not be recorded",
                        code
                    )),
                }
                response.document_code = Some(code);
            }
            Err(e) => response.warning(e.user_message()),
        }
        response
    }

    /// Places the order, then records its payments against that same
    /// document. The inner result is the payment step's outcome.
    async fn place_order(
        &self,
        session: &SalesSession,
        raw: Map<String, Value>,
    ) -> PosResult<(String, PosResult<Settlement>)> {
        let request = OrderRequest::for_save(raw)?;
        let mut order = Order::new(request, &self.context)?;

        let drafts = order
            .request()
            .payments(order.document().payment_method.as_deref())?;
        if let Some(draft) = drafts.iter().find(|d| !self.config.accepts_method(&d.method)) {
            return Err(PosError::validation(
                fields::METHOD,
                format!("Payment method {} is not accepted", draft.method),
            ));
        }

        if !drafts.is_empty() {
            let due = order.preview().totals.total;
            let tendered = Money::checked_sum(drafts.iter().map(|d| d.amount))
                .ok_or_else(|| PosError::validation(fields::PAYMENTS, "Payment total is too large"))?;
            if tendered < due {
                return Err(PosError::validation(
                    fields::PAYMENTS,
                    format!(
                        "Payments of {} do not cover the total of {}",
                        self.config.format_currency(tendered),
                        self.config.format_currency(due)
                    ),
                ));
            }
        }

        let scope = session.scope();
        self.storage.place(&mut order, &scope).await?;

        let document = order.document();
        let code = document.code.clone().unwrap_or_default();
        let payments = self.ledger.save_payments(document, &drafts, &scope).await;

        Ok((code, payments))
    }

    // =========================================================================
    // hold-order
    // =========================================================================

    /// Suspends an order under a new hold code.
    pub async fn hold_order(&self, session: &SalesSession, raw: Map<String, Value>) -> ActionResponse {
        let next = match self.gate(session, &raw, Permission::Update) {
            Ok(next) => next,
            Err(e) => return ActionResponse::rejected(e),
        };

        let mut response = ActionResponse::with_token(next);
        match self.hold(session, raw).await {
            Ok(summary) => {
                response.info(format!("Order put on hold as {}", summary.code));
                response.held = Some(summary);
            }
            Err(e) => response.warning(e.user_message()),
        }
        response
    }

    async fn hold(&self, session: &SalesSession, raw: Map<String, Value>) -> PosResult<HeldOrderSummary> {
        let request = OrderRequest::for_build(raw)?.with_hold(true);
        let mut order = Order::new(request, &self.context)?;
        self.storage.place_on_hold(&mut order, &session.scope()).await
    }

    // =========================================================================
    // Held orders
    // =========================================================================

    /// Hands back a held order's data for editing. The entry stays listed
    /// until it is deleted.
    pub async fn resume_order(&self, session: &SalesSession, code: &str) -> PosResult<ResumeResponse> {
        let held = self.storage.get_order_on_hold(&session.scope(), code).await?;
        info!(code = %held.code, "Resuming held order");

        Ok(ResumeResponse {
            code: held.code,
            document_id: held.document_id,
            document_data: held.document_data,
            line_data: held.line_data,
            token: self.tokens.issue(&session.session_id),
        })
    }

    /// Removes a held entry (completed elsewhere or discarded).
    pub async fn delete_order_on_hold(&self, session: &SalesSession, code: &str) -> ActionResponse {
        if let Err(e) = self.permissions.require(session, Permission::Delete) {
            return ActionResponse::rejected(e);
        }

        let mut response = ActionResponse::with_token(self.tokens.issue(&session.session_id));
        match self.storage.update_order_on_hold(&session.scope(), code).await {
            Ok(_) => response.info(format!("Order on hold {} deleted", code.trim())),
            Err(e) => response.warning(e.user_message()),
        }
        response
    }

    pub async fn get_orders_on_hold(&self, session: &SalesSession) -> PosResult<Vec<HeldOrderSummary>> {
        self.storage.get_orders_on_hold(&session.scope()).await
    }

    /// The document this session placed last.
    pub async fn get_current_order(&self, session: &SalesSession) -> PosResult<Document> {
        self.storage.get_current_order(&session.scope()).await
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Runs the action named by the `action` field and returns its JSON
    /// response. Errors come back as `{ code, message }`.
    pub async fn handle(&self, session: &SalesSession, raw: Map<String, Value>) -> Value {
        let action = fields::text(raw.get(fields::ACTION)).unwrap_or_default();
        let code = fields::text(raw.get(HELD_CODE)).unwrap_or_default();

        match action.as_str() {
            RECALCULATE_ORDER => to_json(self.recalculate_order(raw).await),
            SAVE_ORDER => to_json(Ok(self.save_order(session, raw).await)),
            HOLD_ORDER => to_json(Ok(self.hold_order(session, raw).await)),
            RESUME_ORDER => to_json(self.resume_order(session, &code).await),
            DELETE_ORDER_ON_HOLD => to_json(Ok(self.delete_order_on_hold(session, &code).await)),
            GET_ORDERS_ON_HOLD => to_json(self.get_orders_on_hold(session).await),
            GET_CURRENT_ORDER => to_json(self.get_current_order(session).await),
            other => {
                warn!(action = %other, "Unknown action");
                json!({ "code": "UNKNOWN_ACTION", "message": format!("Unknown action: {}", other) })
            }
        }
    }

    // =========================================================================
    // Gate
    // =========================================================================

    /// Permission first, then the token. Returns the next token.
    fn gate(
        &self,
        session: &SalesSession,
        raw: &Map<String, Value>,
        permission: Permission,
    ) -> PosResult<String> {
        self.permissions.require(session, permission)?;

        let token = fields::text(raw.get(fields::TOKEN)).unwrap_or_default();
        self.tokens.begin(&session.session_id, &token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::tests::{raw, test_db};
    use crate::session::StaticPermissions;
    use serde_json::json;

    fn session(terminal: &str) -> SalesSession {
        SalesSession::new(terminal, "S1", "clerk")
    }

    fn sale(token: &str, payments: Value) -> Map<String, Value> {
        raw(json!({
            "token": token,
            "customer_code": "C001",
            "lines": [{ "reference": "X1", "description": "Headphones", "unit_price": "100.00" }],
            "payments": payments,
        }))
    }

    #[tokio::test]
    async fn test_token_replay_is_rejected() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let first = service.save_order(&clerk, sale(&token, json!([]))).await;
        assert!(!first.has_warnings(), "{:?}", first.messages);
        assert!(first.document_code.is_some());
        assert!(first.token.is_some());

        let replay = service.save_order(&clerk, sale(&token, json!([]))).await;
        assert!(replay.has_warnings());
        assert!(replay.token.is_none());
        assert!(replay.document_code.is_none());
        assert_eq!(db.documents().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_token_fails_closed() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");

        let response = service.save_order(&clerk, sale("made-up", json!([]))).await;
        assert!(response.has_warnings());
        assert!(response.token.is_none());

        let response = service.save_order(&clerk, sale("", json!([]))).await;
        assert!(response.token.is_none());
        assert_eq!(db.documents().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_permission_denied_leaves_token_unused() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db)
            .with_permissions(Arc::new(StaticPermissions::read_only()));
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let response = service.save_order(&clerk, sale(&token, json!([]))).await;
        assert!(response.has_warnings());
        assert!(response.token.is_none());
        assert!(service.tokens.validate(&clerk.session_id, &token));
        assert_eq!(db.documents().count().await.unwrap(), 0);

        let response = service.delete_order_on_hold(&clerk, "HOLD-ANY").await;
        assert!(response.has_warnings());
    }

    #[tokio::test]
    async fn test_card_payment_is_clamped() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let response = service
            .save_order(&clerk, sale(&token, json!([{ "method": "CARD", "amount": "150.00" }])))
            .await;
        assert!(!response.has_warnings(), "{:?}", response.messages);

        let scope = clerk.scope();
        assert_eq!(service.ledger().total_all(&scope).await.unwrap().cents(), 10_000);
        assert_eq!(response.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_cash_payment_returns_change() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let response = service
            .save_order(&clerk, sale(&token, json!("[{\"method\":\"CASH\",\"amount\":150}]")))
            .await;

        assert!(response
            .messages
            .iter()
            .any(|m| m.message == "Change: $50.00"));
        let scope = clerk.scope();
        assert_eq!(
            service.ledger().total_for_method(&scope, "CASH").await.unwrap().cents(),
            10_000
        );
    }

    #[tokio::test]
    async fn test_uncovered_payment_writes_nothing() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let response = service
            .save_order(&clerk, sale(&token, json!([{ "method": "CARD", "amount": "50.00" }])))
            .await;

        assert!(response.has_warnings());
        assert!(response.token.is_some());
        assert_eq!(db.documents().count().await.unwrap(), 0);

        let response = service
            .save_order(
                &clerk,
                sale(
                    response.token.as_deref().unwrap(),
                    json!([{ "method": "BITCOIN", "amount": "100.00" }]),
                ),
            )
            .await;
        assert!(response.has_warnings());
        assert_eq!(db.documents().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_hold_resume_delete() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let form = raw(json!({
            "token": token,
            "customer_code": "C001",
            "notes": "window seat",
            "lines": [{ "reference": "X1", "description": "Headphones", "unit_price": "100.00" }],
        }));
        let response = service.hold_order(&clerk, form).await;
        let summary = response.held.clone().expect("held summary");
        assert!(!response.has_warnings());

        let listed = service.get_orders_on_hold(&clerk).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].code, summary.code);
        assert_eq!(listed[0].total.cents(), 10_000);
        assert!(service.get_orders_on_hold(&session("T2")).await.unwrap().is_empty());

        let resumed = service.resume_order(&clerk, &summary.code).await.unwrap();
        assert_eq!(resumed.document_data["notes"], json!("window seat"));
        assert_eq!(resumed.line_data.len(), 1);
        assert!(resumed.document_id.is_some());

        let deleted = service.delete_order_on_hold(&clerk, &summary.code).await;
        assert!(!deleted.has_warnings());
        assert!(matches!(
            service.resume_order(&clerk, &summary.code).await,
            Err(PosError::NotFound { .. })
        ));

        let again = service.delete_order_on_hold(&clerk, &summary.code).await;
        assert!(again.has_warnings());
    }

    #[tokio::test]
    async fn test_resumed_hold_can_be_placed() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");

        let token = service.issue_token(&clerk);
        let mut form = sale(&token, json!([]));
        form.remove("payments");
        let held = service.hold_order(&clerk, form).await.held.unwrap();

        let resumed = service.resume_order(&clerk, &held.code).await.unwrap();
        let mut doc = resumed.document_data.clone();
        doc.insert("id".to_string(), json!(resumed.document_id));
        doc.insert("token".to_string(), json!(resumed.token));
        doc.insert("lines".to_string(), Value::Array(resumed.line_data.clone()));

        let response = service.save_order(&clerk, doc).await;
        assert!(!response.has_warnings(), "{:?}", response.messages);
        assert_eq!(db.documents().count().await.unwrap(), 1);

        service.delete_order_on_hold(&clerk, &held.code).await;
        assert_eq!(db.documents().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recalculate_order() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);

        let response = service
            .recalculate_order(raw(json!({
                "customer_code": "C001",
                "lines": [
                    { "description": "Cable", "quantity": 3, "unit_price": "3.33", "tax_rate": "21" },
                    null,
                ],
            })))
            .await
            .unwrap();

        assert_eq!(response.totals.net.cents(), 999);
        assert_eq!(response.totals.tax.cents(), 210);
        assert_eq!(response.formatted_total, "$12.09");
        assert_eq!(response.lines.len(), 2);
        assert_eq!(response.customer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(db.documents().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_dispatches_by_action() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let held = service
            .handle(
                &clerk,
                raw(json!({
                    "action": "hold-order",
                    "token": token,
                    "lines": [{ "description": "Tea", "unit_price": "2.00" }],
                })),
            )
            .await;
        let code = held["held"]["code"].as_str().unwrap().to_string();
        assert_eq!(held["messages"][0]["type"], json!("info"));

        let listed = service
            .handle(&clerk, raw(json!({ "action": "get-orders-on-hold" })))
            .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let resumed = service
            .handle(&clerk, raw(json!({ "action": "resume-order", "code": code })))
            .await;
        assert_eq!(resumed["lineData"].as_array().unwrap().len(), 1);

        let missing = service
            .handle(&clerk, raw(json!({ "action": "resume-order", "code": "HOLD-NOPE" })))
            .await;
        assert_eq!(missing["code"], json!("NOT_FOUND"));

        let unknown = service.handle(&clerk, raw(json!({ "action": "print-cashup" }))).await;
        assert_eq!(unknown["code"], json!("UNKNOWN_ACTION"));
    }

    #[tokio::test]
    async fn test_unsupported_document_type() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let mut form = sale(&token, json!([]));
        form.insert("document_type".to_string(), json!("refund"));
        let response = service.save_order(&clerk, form).await;

        assert!(response.messages[0].message.contains("refund"));
        assert!(service.recalculate_order(raw(json!({ "document_type": "refund" }))).await.is_err());
    }

    struct RejectingPayments {
        inner: tally_db::PaymentRepository,
    }

    #[async_trait::async_trait]
    impl PaymentStore for RejectingPayments {
        async fn insert_payments(
            &self,
            _payments: &[tally_core::Payment],
            _scope: &tally_core::SessionScope,
        ) -> tally_db::DbResult<()> {
            Err(tally_db::DbError::QueryFailed("payments table locked".to_string()))
        }

        async fn payments_for_document(
            &self,
            document_id: &str,
        ) -> tally_db::DbResult<Vec<tally_core::Payment>> {
            self.inner.payments_for_document(document_id).await
        }

        async fn total_for_method(
            &self,
            scope: &tally_core::SessionScope,
            method: &str,
        ) -> tally_db::DbResult<Money> {
            self.inner.total_for_method(scope, method).await
        }

        async fn total_all(&self, scope: &tally_core::SessionScope) -> tally_db::DbResult<Money> {
            self.inner.total_all(scope).await
        }
    }

    #[tokio::test]
    async fn test_placed_order_survives_payment_failure() {
        let db = test_db().await;
        let service = PosService::from_parts(
            PosConfig::default(),
            Arc::new(db.documents()),
            Arc::new(db.customers()),
            Arc::new(RejectingPayments { inner: db.payments() }),
            Arc::new(db.held_orders()),
        );
        let clerk = session("T1");
        let token = service.issue_token(&clerk);

        let response = service
            .save_order(&clerk, sale(&token, json!([{ "method": "CASH", "amount": "120.00" }])))
            .await;

        let code = response.document_code.clone().expect("placed code");
        assert!(response.token.is_some());
        assert!(response.has_warnings());
        assert!(response
            .messages
            .iter()
            .any(|m| m.message == format!("Payments for order {} could not be recorded", code)));
        assert_eq!(db.documents().count().await.unwrap(), 1);
        assert_eq!(db.payments().total_all(&clerk.scope()).await.unwrap(), Money::zero());
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_validation_errors() {
        let db = test_db().await;
        let service = PosService::new(PosConfig::default(), &db);
        let clerk = session("T1");

        let result = service
            .recalculate_order(raw(json!({
                "lines": [{ "description": "Yacht", "quantity": 100, "unit_price": "1000000000000000" }],
            })))
            .await;
        assert!(matches!(result, Err(PosError::Validation { .. })));

        let token = service.issue_token(&clerk);
        let response = service
            .save_order(
                &clerk,
                sale(
                    &token,
                    json!([{ "method": "CASH", "amount": "2000000000" }]),
                ),
            )
            .await;
        assert!(response.has_warnings());
        assert!(response.document_code.is_none());
        assert_eq!(db.documents().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_connect_opens_and_shuts_down() {
        let path = std::env::temp_dir()
            .join(format!("tally-{}", uuid::Uuid::new_v4()))
            .join("tally.db");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let seeded = Database::new(DbConfig::new(path.clone())).await.unwrap();
        seeded
            .customers()
            .insert(&tally_core::Customer {
                code: "C001".to_string(),
                name: "Ada Lovelace".to_string(),
                tax_id: None,
            })
            .await
            .unwrap();
        seeded.close().await;

        let mut config = PosConfig::default();
        config.storage.database_path = Some(path.clone());

        let service = PosService::connect(config).await.unwrap();
        let clerk = session("T1");
        let token = service.issue_token(&clerk);
        let response = service.save_order(&clerk, sale(&token, json!([]))).await;
        assert!(!response.has_warnings(), "{:?}", response.messages);
        assert!(path.exists());

        service.shutdown().await;
        let reopened = Database::new(DbConfig::new(path.clone())).await.unwrap();
        assert!(reopened.health_check().await);
        assert_eq!(reopened.documents().count().await.unwrap(), 1);
        reopened.close().await;

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
