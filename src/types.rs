//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Core types for the POP3 server

use std::fmt;

/// Unique identifier for a session (monotonically increasing, never reused)
///
/// Internal to the server's registry; sessions surface in logs through the
/// `Display` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct SessionId(u64);

impl SessionId {
    /// Create a new session ID
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// POP3 protocol state (RFC 1939 §3)
///
/// A session starts in AUTHORIZATION, moves to TRANSACTION on a successful
/// USER/PASS pair or APOP exchange, and reaches UPDATE on QUIT. UPDATE is
/// terminal: the commit sequence runs and the session exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the client to authenticate
    Authorization,
    /// Authenticated; maildrop operations are available
    Transaction,
    /// QUIT received; deletions are being committed
    Update,
}

impl SessionState {
    /// Check if the state is terminal
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Update)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "authorization"),
            Self::Transaction => write!(f, "transaction"),
            Self::Update => write!(f, "update"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id() {
        let id1 = SessionId::new(1);
        let id2 = SessionId::new(2);

        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id1.to_string(), "session-1");
    }

    #[test]
    fn test_session_state_terminal() {
        assert!(!SessionState::Authorization.is_terminal());
        assert!(!SessionState::Transaction.is_terminal());
        assert!(SessionState::Update.is_terminal());
    }
}
