//! # Sales Session
//!
//! Who is selling, where, and what they are allowed to do.
//!
//! The `(terminal_id, session_id)` pair scopes held orders, the current
//! order and ledger totals. Permissions are checked through an injected
//! [`PermissionChecker`] so the hosting application decides the rules.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use tally_core::SessionScope;

use crate::error::{PosError, PosResult};

/// The active sales session at one terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSession {
    pub terminal_id: String,
    pub session_id: String,
    /// Login name of the operator.
    pub user: String,
}

impl SalesSession {
    pub fn new(
        terminal_id: impl Into<String>,
        session_id: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        SalesSession {
            terminal_id: terminal_id.into(),
            session_id: session_id.into(),
            user: user.into(),
        }
    }

    pub fn scope(&self) -> SessionScope {
        SessionScope::new(self.terminal_id.clone(), self.session_id.clone())
    }
}

/// Actions gated by permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Save or hold an order.
    Update,
    /// Discard an order on hold.
    Delete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Update => "update",
            Permission::Delete => "delete",
        }
    }
}

/// Decides whether a session user may perform an action.
pub trait PermissionChecker: Send + Sync {
    fn allows(&self, session: &SalesSession, permission: Permission) -> bool;

    /// `Ok` when allowed, `PermissionDenied` otherwise.
    fn require(&self, session: &SalesSession, permission: Permission) -> PosResult<()> {
        if self.allows(session, permission) {
            Ok(())
        } else {
            tracing::warn!(
                user = %session.user,
                terminal_id = %session.terminal_id,
                permission = permission.as_str(),
                "Permission denied"
            );
            Err(PosError::PermissionDenied(format!(
                "{} may not {}",
                session.user,
                permission.as_str()
            )))
        }
    }
}

/// Grants everything. Used when the host has no role model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn allows(&self, _session: &SalesSession, _permission: Permission) -> bool {
        true
    }
}

/// Grants a fixed set of permissions to every user.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    granted: HashSet<Permission>,
}

impl StaticPermissions {
    pub fn new(granted: impl IntoIterator<Item = Permission>) -> Self {
        StaticPermissions {
            granted: granted.into_iter().collect(),
        }
    }

    /// No mutating actions at all.
    pub fn read_only() -> Self {
        StaticPermissions::default()
    }
}

impl PermissionChecker for StaticPermissions {
    fn allows(&self, _session: &SalesSession, permission: Permission) -> bool {
        self.granted.contains(&permission)
    }
}
