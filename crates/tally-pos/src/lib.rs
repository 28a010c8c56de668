//! # tally-pos: Order Pipeline for Tally POS
//!
//! Turns raw terminal input into placed sales documents, holds and resumes
//! sales in progress, and guards every state-changing action against
//! duplicate submission.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  raw fields ──► PosService ──► TokenGuard.begin()                       │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │               OrderRequest ──► Order ──► Recalculator (tally-core)      │
//! │                                  │                                      │
//! │                     ┌────────────┴────────────┐                         │
//! │                     ▼                         ▼                         │
//! │              OrderStorage.place      OrderStorage.place_on_hold         │
//! │                     │                         │                         │
//! │                     ▼                         ▼                         │
//! │              PaymentLedger            HeldOrder snapshot                │
//! │                     │                         │                         │
//! │                     └──────────┬──────────────┘                         │
//! │                                ▼                                        │
//! │                     tally-db ports (SQLite)                             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`actions`] - `PosService`, the action surface and response types
//! - [`order`] - `Order` state machine with all-or-nothing save and hold
//! - [`storage`] - `OrderStorage`, held orders scoped per terminal session
//! - [`ledger`] - `PaymentLedger`, change and clamping rules
//! - [`token`] - `TokenGuard`, single-use anti-replay tokens
//! - [`session`] - sales session and permission checks
//! - [`config`] - `PosConfig` (defaults, `pos.toml`, `TALLY_*` env)
//! - [`error`] - `PosError`
//!
//! ## Usage
//! ```rust,ignore
//! tally_pos::init_tracing();
//!
//! let config = PosConfig::load(None)?;
//! let service = PosService::connect(config).await?;
//! let clerk = SalesSession::new("T1", "S-2026-10-16", "ada");
//!
//! let token = service.issue_token(&clerk);
//! let response = service.save_order(&clerk, raw_fields_with(token)).await;
//! ```

pub mod actions;
pub mod config;
pub mod error;
pub mod ledger;
pub mod order;
pub mod session;
pub mod storage;
pub mod token;

pub use actions::{ActionResponse, Message, MessageKind, PosService, RecalculateResponse, ResumeResponse};
pub use config::PosConfig;
pub use error::{ErrorCode, PosError, PosResult};
pub use ledger::{PaymentLedger, Settlement};
pub use order::{Order, OrderContext, OrderState};
pub use session::{AllowAll, Permission, PermissionChecker, SalesSession, StaticPermissions};
pub use storage::OrderStorage;
pub use token::TokenGuard;

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally=trace` - Show trace for tally crates only
/// - Default: INFO, DEBUG for tally crates, WARN for sqlx
///
/// Calling it twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
