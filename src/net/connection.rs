//! Session identity and connect state machine.
//!
//! # Responsibilities
//! - Generate unique session IDs for tracing
//! - Model the ordered connect sequence as explicit states
//! - Remember which states a connect attempt passed through

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SetupError;

/// Relaxed ordering is enough: IDs only need to be unique.
static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Where a session is in the connect sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    SocketConnecting,
    SocketConnected,
    EngineConfigured,
    Handshaking,
    /// The peer chain verified with no flags.
    Verified,
    /// Verification is disabled for this session.
    VerificationSkipped,
    Ready,
    /// Connect failed. The session must be destroyed.
    Failed(SetupError),
}

impl SessionState {
    /// Whether `next` directly follows this state.
    pub fn permits(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Failed(_), _) | (Ready, _) => false,
            (_, Failed(_)) => true,
            (Uninitialized, SocketConnecting)
            | (SocketConnecting, SocketConnected)
            | (SocketConnected, EngineConfigured)
            | (EngineConfigured, Handshaking)
            | (Handshaking, Verified)
            | (Handshaking, VerificationSkipped)
            | (Verified, Ready)
            | (VerificationSkipped, Ready) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Failed(_))
    }
}

/// The states one connect attempt has visited, oldest first.
#[derive(Debug, Clone)]
pub struct StateTrail {
    visited: Vec<SessionState>,
}

impl StateTrail {
    pub fn new() -> Self {
        Self {
            visited: vec![SessionState::Uninitialized],
        }
    }

    pub fn current(&self) -> &SessionState {
        // Never empty: constructed and reset with the initial state.
        &self.visited[self.visited.len() - 1]
    }

    pub fn visited(&self) -> &[SessionState] {
        &self.visited
    }

    pub(crate) fn advance(&mut self, next: SessionState) {
        debug_assert!(
            self.current().permits(&next),
            "illegal transition {:?} -> {:?}",
            self.current(),
            next
        );
        tracing::trace!(from = ?self.current(), to = ?next, "Session state change");
        self.visited.push(next);
    }

    pub(crate) fn fail(&mut self, reason: SetupError) {
        if !matches!(self.current(), SessionState::Failed(_)) {
            self.advance(SessionState::Failed(reason));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.visited.clear();
        self.visited.push(SessionState::Uninitialized);
    }
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}
