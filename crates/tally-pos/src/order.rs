//! # Order
//!
//! Builds a document and its lines from an [`OrderRequest`] and drives the
//! recalculate, save and hold workflows.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Building ──recalculate()──► Recalculated ──save()──► Placed           │
//! │      │                            │                                     │
//! │      │                            └──hold()──► Held                     │
//! │      ├──save()──► Placed                                                │
//! │      ├──hold()──► Held                                                  │
//! │      └──any write fails──► Failed  (nothing left in storage)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Save
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  a. header (draft)          fail ──► Persistence, nothing written       │
//! │  b. line 1..N in order      fail ──► delete document, Persistence       │
//! │  c. Recalculator over the lines just written                            │
//! │  d. header (totals, placed) fail ──► delete document, Persistence       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting the document cascades to every line already written, so a
//! failed save leaves no header and no lines behind.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use tally_core::{
    fields, validation, Document, DocumentKind, DocumentStatus, DocumentTotals, LineSet,
    OrderRequest, Recalculation, Recalculator, SessionScope, ValidationError,
};
use tally_db::{CustomerDirectory, DocumentStore};

use crate::error::{PosError, PosResult};

/// Where an order is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Building,
    Recalculated,
    Placed,
    Held,
    Failed,
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderState::Building => "building",
            OrderState::Recalculated => "recalculated",
            OrderState::Placed => "placed",
            OrderState::Held => "held",
            OrderState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Collaborators an order needs. Built once per request.
#[derive(Clone)]
pub struct OrderContext {
    pub documents: Arc<dyn DocumentStore>,
    pub customers: Arc<dyn CustomerDirectory>,
    /// Kind used when the request names none.
    pub default_kind: DocumentKind,
    pub max_lines: usize,
}

/// One sale being built from a request.
pub struct Order {
    request: OrderRequest,
    document: Document,
    lines: LineSet,
    state: OrderState,
    documents: Arc<dyn DocumentStore>,
    customers: Arc<dyn CustomerDirectory>,
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Order")
            .field("document", &self.document)
            .field("lines", &self.lines.len())
            .field("state", &self.state)
            .finish()
    }
}

impl Order {
    /// Builds the document header and line set from a normalized request.
    pub fn new(request: OrderRequest, context: &OrderContext) -> PosResult<Self> {
        let (document, lines) = request.build_document(context.default_kind)?;
        validation::validate_line_count(lines.len(), context.max_lines)?;

        Ok(Order {
            request,
            document,
            lines,
            state: OrderState::Building,
            documents: Arc::clone(&context.documents),
            customers: Arc::clone(&context.customers),
        })
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn lines(&self) -> &LineSet {
        &self.lines
    }

    pub fn request(&self) -> &OrderRequest {
        &self.request
    }

    /// Totals for the current lines without touching the order.
    pub fn preview(&self) -> Recalculation {
        Recalculator::new().run(&self.document, &self.lines)
    }

    // =========================================================================
    // Recalculate
    // =========================================================================

    /// Refreshes the subject and computes totals. Never persists.
    ///
    /// An unknown customer code clears the subject instead of failing.
    pub async fn recalculate(&mut self) -> PosResult<Recalculation> {
        self.refresh_subject(false).await?;
        let result = Recalculator::new().apply(&mut self.document, &self.lines);

        if self.state == OrderState::Building {
            self.state = OrderState::Recalculated;
        }
        Ok(result)
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Persists header and lines, recalculates, and places the document.
    ///
    /// Either everything is written or nothing is.
    pub async fn save(&mut self, scope: &SessionScope) -> PosResult<()> {
        self.ensure_open()?;

        validation::validate_customer_code(self.document.customer_code.as_deref())?;
        self.refresh_subject(true).await?;
        if !self.document.has_subject() {
            return Err(ValidationError::Required {
                field: fields::CUSTOMER_CODE.to_string(),
            }
            .into());
        }

        self.prepare_existing(scope).await?;
        self.document.set_scope(scope);
        self.document.status = DocumentStatus::Draft;

        if let Err(e) = self.documents.save_document(&mut self.document).await {
            self.state = OrderState::Failed;
            return Err(PosError::persistence(e));
        }
        let document_id = self.persisted_id()?;

        if let Err(e) = self.persist_lines(&document_id).await {
            self.rollback(&document_id).await;
            return Err(e);
        }

        let result = Recalculator::new().apply(&mut self.document, &self.lines);
        self.document.status = DocumentStatus::Placed;

        if let Err(e) = self.documents.save_document(&mut self.document).await {
            self.rollback(&document_id).await;
            return Err(PosError::persistence(e));
        }

        self.state = OrderState::Placed;
        info!(
            document_id = %document_id,
            code = self.document.code.as_deref().unwrap_or_default(),
            total = %result.totals.total,
            lines = self.lines.len(),
            "Order placed"
        );
        Ok(())
    }

    // =========================================================================
    // Hold
    // =========================================================================

    /// Persists header and lines with status `held`. No totals, no payments.
    pub async fn hold(&mut self, scope: &SessionScope) -> PosResult<()> {
        self.ensure_open()?;

        self.prepare_existing(scope).await?;
        self.document.set_scope(scope);
        self.document.status = DocumentStatus::Held;
        self.document.apply_totals(DocumentTotals::default());

        if let Err(e) = self.documents.save_document(&mut self.document).await {
            self.state = OrderState::Failed;
            return Err(PosError::persistence(e));
        }
        let document_id = self.persisted_id()?;

        if let Err(e) = self.persist_lines(&document_id).await {
            self.rollback(&document_id).await;
            return Err(e);
        }

        self.state = OrderState::Held;
        info!(document_id = %document_id, lines = self.lines.len(), "Order held");
        Ok(())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    fn ensure_open(&self) -> PosResult<()> {
        match self.state {
            OrderState::Building | OrderState::Recalculated => Ok(()),
            state => Err(PosError::validation(
                fields::ID,
                format!("Order is already {}", state),
            )),
        }
    }

    fn persisted_id(&mut self) -> PosResult<String> {
        match self.document.id.clone() {
            Some(id) => Ok(id),
            None => {
                self.state = OrderState::Failed;
                Err(PosError::Persistence(
                    "document store did not assign an id".to_string(),
                ))
            }
        }
    }

    /// Copies name and tax id of the customer named by the document.
    async fn refresh_subject(&mut self, strict: bool) -> PosResult<()> {
        let Some(code) = self.document.customer_code.clone() else {
            return Ok(());
        };

        let customer = self
            .customers
            .find_customer(&code)
            .await
            .map_err(PosError::persistence)?;

        match customer {
            Some(customer) => self.document.set_subject(Some(&customer)),
            None if strict => {
                return Err(ValidationError::UnknownReference {
                    field: fields::CUSTOMER_CODE.to_string(),
                    value: code,
                }
                .into());
            }
            None => {
                debug!(customer_code = %code, "Unknown customer ignored during recalculation");
                self.document.set_subject(None);
            }
        }
        Ok(())
    }

    /// For a document saved before (draft or held): checks it belongs to
    /// `scope` and may still change, then clears its stale lines.
    ///
    /// A document of another terminal or session reads as not found.
    async fn prepare_existing(&mut self, scope: &SessionScope) -> PosResult<()> {
        let Some(id) = self.document.id.clone() else {
            return Ok(());
        };

        let stored = self
            .documents
            .get_document(&id)
            .await
            .map_err(PosError::persistence)?
            .ok_or_else(|| PosError::not_found("Document", &id))?;

        if !stored.belongs_to(scope) {
            warn!(
                document_id = %id,
                terminal_id = %scope.terminal_id,
                "Document of another session referenced"
            );
            return Err(PosError::not_found("Document", &id));
        }

        if stored.status == DocumentStatus::Placed {
            return Err(PosError::validation(
                fields::ID,
                format!(
                    "Document {} is already placed",
                    stored.code.as_deref().unwrap_or(&id)
                ),
            ));
        }

        let removed = self
            .documents
            .delete_lines(&id)
            .await
            .map_err(PosError::persistence)?;
        debug!(document_id = %id, removed, "Cleared stale lines");
        Ok(())
    }

    /// Writes every line, one after another, in index order.
    async fn persist_lines(&mut self, document_id: &str) -> PosResult<()> {
        let mut lines = std::mem::take(&mut self.lines).into_vec();

        let mut outcome = Ok(());
        for line in lines.iter_mut() {
            if let Err(e) = self.documents.save_line(document_id, line).await {
                warn!(
                    document_id = %document_id,
                    sort_index = line.sort_index,
                    "Line write failed"
                );
                outcome = Err(PosError::persistence(e));
                break;
            }
        }

        self.lines = LineSet::from_lines(lines);
        outcome
    }

    /// Deletes everything written for this order.
    async fn rollback(&mut self, document_id: &str) {
        self.state = OrderState::Failed;

        match self.documents.delete_document(document_id).await {
            Ok(()) => warn!(document_id = %document_id, "Order rolled back"),
            Err(e) => error!(document_id = %document_id, error = %e, "Rollback failed"),
        }

        self.document.id = None;
        self.document.code = None;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
