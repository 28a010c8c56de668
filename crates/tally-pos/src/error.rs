//! # POS Error Type
//!
//! Unified error type for the order pipeline.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally POS                              │
//! │                                                                         │
//! │  Terminal                     Rust Backend                              │
//! │  ────────                     ────────────                              │
//! │                                                                         │
//! │  save-order                                                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  PosService action                                               │  │
//! │  │  PosResult<T>                                                    │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Token rejected? ─── InvalidToken / DuplicateRequest ──┐        │  │
//! │  │         │                                              │        │  │
//! │  │         ▼                                              ▼        │  │
//! │  │  Bad input? ──── CoreError::Validation ──────────── PosError ──►│  │
//! │  │         │                                              ▲        │  │
//! │  │         ▼                                              │        │  │
//! │  │  Write failed? ── DbError (rolled back) ───────────────┘        │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  ◄──── { messages: [{ type: "warning", message }], token } ──────────   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No kind is fatal: every action turns its error into a message list.

use serde::Serialize;
use thiserror::Error;

use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

/// Errors surfaced by the order pipeline.
#[derive(Debug, Error)]
pub enum PosError {
    /// Malformed or missing input, tied to one field.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Token empty, unknown for this session, or expired.
    #[error("Invalid or expired request token")]
    InvalidToken,

    /// Token already consumed by an accepted request.
    #[error("This request has already been processed")]
    DuplicateRequest,

    /// A header or line write failed. Partial writes were rolled back.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The session user may not perform this action.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidToken,
    DuplicateRequest,
    PersistenceError,
    NotFound,
    PermissionDenied,
    UnsupportedDocumentType,
    ConfigError,
}

impl PosError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PosError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PosError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Wraps a failed write. The database detail is logged, not returned.
    pub fn persistence(err: DbError) -> Self {
        tracing::error!(error = %err, "Persistence step failed");
        PosError::Persistence(err.to_string())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PosError::Validation { .. } => ErrorCode::ValidationError,
            PosError::InvalidToken => ErrorCode::InvalidToken,
            PosError::DuplicateRequest => ErrorCode::DuplicateRequest,
            PosError::Persistence(_) => ErrorCode::PersistenceError,
            PosError::NotFound { .. } => ErrorCode::NotFound,
            PosError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            PosError::UnsupportedDocumentType(_) => ErrorCode::UnsupportedDocumentType,
            PosError::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Text shown to the operator.
    ///
    /// Persistence failures get a generic message; the cause stays in the log.
    pub fn user_message(&self) -> String {
        match self {
            PosError::Persistence(_) => "The order could not be saved".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ValidationError> for PosError {
    fn from(err: ValidationError) -> Self {
        PosError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for PosError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedDocumentType(kind) => PosError::UnsupportedDocumentType(kind),
            CoreError::TooManyLines { max } => PosError::validation(
                tally_core::fields::LINES,
                format!("Order cannot have more than {} lines", max),
            ),
            CoreError::InvalidPaymentAmount { reason } => PosError::validation(
                tally_core::fields::PAYMENTS,
                format!("Invalid payment amount: {}", reason),
            ),
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for PosError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PosError::NotFound { entity, id },
            other => PosError::persistence(other),
        }
    }
}

/// Result type alias for pipeline operations.
pub type PosResult<T> = Result<T, PosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_keeps_field() {
        let err: PosError = ValidationError::Required {
            field: "customer_code".to_string(),
        }
        .into();

        match &err {
            PosError::Validation { field, .. } => assert_eq!(field, "customer_code"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_db_not_found_stays_not_found() {
        let err: PosError = DbError::not_found("Document", "abc").into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: PosError = DbError::QueryFailed("disk I/O error".to_string()).into();
        assert_eq!(err.code(), ErrorCode::PersistenceError);
        assert_eq!(err.user_message(), "The order could not be saved");
    }

    #[test]
    fn test_unsupported_document_type() {
        let err: PosError = CoreError::UnsupportedDocumentType("refund".to_string()).into();
        assert_eq!(err.code(), ErrorCode::UnsupportedDocumentType);
        assert!(err.user_message().contains("refund"));
    }

    #[test]
    fn test_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::DuplicateRequest).unwrap();
        assert_eq!(json, "\"DUPLICATE_REQUEST\"");
    }
}
