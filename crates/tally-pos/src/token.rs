//! # Token Guard
//!
//! Single-use anti-replay tokens for state-changing actions.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   issue() ──► t1 ──► terminal                                           │
//! │                                                                         │
//! │   save(t1) ──► begin(t1)                                                │
//! │                 │                                                       │
//! │                 ├── empty / unknown ─────────► InvalidToken             │
//! │                 ├── already consumed ────────► DuplicateRequest         │
//! │                 └── issued ──► consumed += t1                           │
//! │                                issue() ──► t2 ──► response              │
//! │                                                                         │
//! │   save(t1) again (network retry) ──► DuplicateRequest                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The whole check-and-consume step runs under one `std::sync::Mutex`, so
//! two submissions carrying the same token cannot both pass. The lock is
//! never held across an `.await`.
//!
//! Both sets are bounded per session: the oldest entries are forgotten
//! once `history` is exceeded.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PosError, PosResult};

/// Insertion-ordered set with a size cap.
#[derive(Debug, Default)]
struct BoundedSet {
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl BoundedSet {
    fn insert(&mut self, value: String, cap: usize) {
        if self.members.insert(value.clone()) {
            self.order.push_back(value);
        }
        while self.order.len() > cap {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }

    fn remove(&mut self, value: &str) -> bool {
        if self.members.remove(value) {
            self.order.retain(|v| v != value);
            true
        } else {
            false
        }
    }

    fn contains(&self, value: &str) -> bool {
        self.members.contains(value)
    }
}

/// Issued and consumed tokens of one session.
#[derive(Debug, Default)]
struct TokenBook {
    issued: BoundedSet,
    consumed: BoundedSet,
}

/// Issues and checks single-use tokens, per session.
#[derive(Debug)]
pub struct TokenGuard {
    books: Mutex<HashMap<String, TokenBook>>,
    history: usize,
}

impl TokenGuard {
    pub fn new(history: usize) -> Self {
        TokenGuard {
            books: Mutex::new(HashMap::new()),
            history: history.max(1),
        }
    }

    /// Issues a fresh token for `session_id`.
    pub fn issue(&self, session_id: &str) -> String {
        let mut books = self.lock();
        let book = books.entry(session_id.to_string()).or_default();
        Self::issue_into(book, self.history)
    }

    /// True when `token` was issued for this session and not yet consumed.
    pub fn validate(&self, session_id: &str, token: &str) -> bool {
        if token.trim().is_empty() {
            return false;
        }
        let books = self.lock();
        books.get(session_id).is_some_and(|book| {
            book.issued.contains(token) && !book.consumed.contains(token)
        })
    }

    /// True when `token` was already accepted once in this session.
    pub fn consumed(&self, session_id: &str, token: &str) -> bool {
        let books = self.lock();
        books
            .get(session_id)
            .is_some_and(|book| book.consumed.contains(token))
    }

    /// Accepts `token` for one state-changing action.
    ///
    /// Marks it consumed and returns the token for the next action.
    pub fn begin(&self, session_id: &str, token: &str) -> PosResult<String> {
        let token = token.trim();
        if token.is_empty() {
            warn!(session_id = %session_id, "Rejected request without token");
            return Err(PosError::InvalidToken);
        }

        let mut books = self.lock();
        let book = books.entry(session_id.to_string()).or_default();

        if book.consumed.contains(token) {
            warn!(session_id = %session_id, "Rejected replayed token");
            return Err(PosError::DuplicateRequest);
        }

        if !book.issued.remove(token) {
            warn!(session_id = %session_id, "Rejected unknown token");
            return Err(PosError::InvalidToken);
        }

        book.consumed.insert(token.to_string(), self.history);
        let next = Self::issue_into(book, self.history);
        debug!(session_id = %session_id, "Token consumed");

        Ok(next)
    }

    /// Forgets every token of a closed session.
    pub fn end_session(&self, session_id: &str) {
        self.lock().remove(session_id);
    }

    fn issue_into(book: &mut TokenBook, history: usize) -> String {
        let token = Uuid::new_v4().simple().to_string();
        book.issued.insert(token.clone(), history);
        token
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TokenBook>> {
        self.books
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TokenGuard {
    fn default() -> Self {
        TokenGuard::new(256)
    }
}
