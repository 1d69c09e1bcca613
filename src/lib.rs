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

//! Embeddable POP3 server (RFC 1939, with the CAPA extension of RFC 2449)
//!
//! This crate implements the server side of the POP3 mail-retrieval
//! protocol: the line-oriented request/response engine, the
//! AUTHORIZATION → TRANSACTION → UPDATE state machine with its
//! commit-on-QUIT deletion semantics, the APOP challenge, and a concurrent
//! accept loop with a session cap and graceful shutdown. Message storage
//! and credential checking are pluggable: the embedder supplies a
//! [`MailboxProvider`] and an [`Authorizer`].
//!
//! # Overview
//!
//! - [`Server`]: accept loop, session registry, shutdown.
//! - [`Session`]: one client connection; public for custom accept loops
//!   and non-TCP transports.
//! - [`Mailbox`] / [`MailboxProvider`]: the storage seam. All indexes
//!   crossing this seam are 0-based and range-checked by the session.
//! - [`Authorizer`]: USER/PASS and APOP verification, with
//!   [`apop_verify`] as a digest helper and the [`UserPassOnly`] /
//!   [`ApopOnly`] wrappers to disable one method.
//! - [`DotWriter`] / [`copy_headers_and_body`]: multi-line response
//!   plumbing (byte-stuffing, CRLF normalization, TOP truncation).
//!
//! # Quick Start
//!
//! ```no_run
//! use pop3d::{AllowAllAuthorizer, EmptyMailboxProvider, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> pop3d::Result<()> {
//!     let server = Server::new(
//!         Arc::new(AllowAllAuthorizer),
//!         Arc::new(EmptyMailboxProvider),
//!     );
//!     server.listen_and_serve("127.0.0.1:110").await
//! }
//! ```
//!
//! # Deletion semantics
//!
//! DELE only marks a message; the mark set is applied to the mailbox when
//! the client ends the session with QUIT, and discarded on any other exit
//! (EOF, timeout, forced close during shutdown). This matches RFC 1939's
//! requirement that the maildrop is only modified by a clean UPDATE.

mod auth;
mod codec;
mod command;
mod config;
mod error;
mod mailbox;
mod server;
mod session;
mod types;

pub use auth::{apop_verify, AllowAllAuthorizer, ApopOnly, Authorizer, UserPassOnly};
pub use codec::{copy_headers_and_body, DotWriter};
pub use config::{ServerConfig, DEFAULT_CONNECTIONS_LIMIT};
pub use error::{Pop3Error, Result};
pub use mailbox::{EmptyMailbox, EmptyMailboxProvider, Mailbox, MailboxProvider, MessageReader};
pub use server::Server;
pub use session::Session;
pub use types::SessionState;
