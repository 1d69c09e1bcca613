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

//! Error types for the POP3 server
//!
//! The `Display` strings of the protocol-level variants are part of the wire
//! format: they are sent verbatim after `-ERR ` and POP3 clients match on
//! them. Do not reword them.

use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, Pop3Error>;

/// POP3 server error types
#[derive(Debug, Error)]
pub enum Pop3Error {
    /// I/O error from the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the connection mid-session
    #[error("connection closed")]
    ConnectionClosed,

    /// A line read exceeded the configured idle timeout
    #[error("operation timed out")]
    Timeout,

    /// PASS was sent before USER
    #[error("user not specified")]
    UserNotSpecified,

    /// USER was sent twice
    #[error("user already specified")]
    UserAlreadySpecified,

    /// Unknown verb, or a verb not valid in the current state
    #[error("invalid command")]
    InvalidCommand,

    /// Malformed or out-of-range command arguments
    #[error("invalid arguments")]
    InvalidArguments,

    /// The message index is in the session's deletion set
    #[error("message marked as deleted")]
    MessageMarkedAsDeleted,

    /// The authorizer does not implement this authentication method
    #[error("not supported authorization method")]
    AuthMethodNotSupported,

    /// The server has been shut down or closed
    #[error("server closed")]
    ServerClosed,

    /// The concurrent-session cap has been reached
    #[error("too many connections")]
    TooManyConnections,

    /// Failure reported by a mailbox, provider or authorizer backend
    #[error("{0}")]
    Backend(String),
}

impl Pop3Error {
    /// Wrap a backend failure message.
    ///
    /// Mailbox and authorizer implementations use this for failures that
    /// should reach the client as `-ERR <message>`.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Check if the error terminates the session
    ///
    /// Session-fatal errors abort the worker without running the commit
    /// sequence; everything else is reported inline as `-ERR` and the
    /// session continues.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Pop3Error::Io(_) | Pop3Error::ConnectionClosed | Pop3Error::Timeout
        )
    }
}
