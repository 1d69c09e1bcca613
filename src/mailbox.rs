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

//! Mailbox storage seam
//!
//! The session drives a [`Mailbox`] obtained from a [`MailboxProvider`]
//! after successful authentication. Message storage is entirely the
//! embedder's concern; the crate only defines the contract.

use crate::error::{Pop3Error, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte stream over a single message. Closed by drop.
pub type MessageReader = Box<dyn AsyncRead + Send + Unpin>;

/// Backend for a single user's maildrop.
///
/// All `msg` arguments are 0-based indexes. The session range-checks them
/// against the message count cached at authentication time, so
/// implementations only ever see values in `[0, count)`.
///
/// A mailbox instance is driven by exactly one session worker; no internal
/// locking is required.
#[async_trait]
pub trait Mailbox: Send {
    /// Message count and total maildrop size in bytes.
    async fn stat(&mut self) -> Result<(usize, u64)>;

    /// Sizes of all messages, indexed by message number.
    async fn list(&mut self) -> Result<Vec<u64>>;

    /// Size of one message.
    async fn list_one(&mut self, msg: usize) -> Result<u64>;

    /// Open one message for reading.
    async fn message(&mut self, msg: usize) -> Result<MessageReader>;

    /// Delete one message. Called only from the commit sequence on QUIT.
    async fn dele(&mut self, msg: usize) -> Result<()>;

    /// Unique-id listing for all messages.
    async fn uidl(&mut self) -> Result<Vec<String>>;

    /// Unique id of one message.
    async fn uidl_one(&mut self, msg: usize) -> Result<String>;

    /// Release the maildrop. Called exactly once when the session ends with
    /// QUIT; its error becomes the final status of the QUIT response.
    async fn close(&mut self) -> Result<()>;
}

/// Factory opening a [`Mailbox`] for an authenticated user.
#[async_trait]
pub trait MailboxProvider: Send + Sync {
    /// Open the mailbox for `user`. Called after the authorizer accepted
    /// the credentials.
    async fn provide(&self, user: &str) -> Result<Box<dyn Mailbox>>;
}

/// Trivial [`Mailbox`] holding no messages.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMailbox;

#[async_trait]
impl Mailbox for EmptyMailbox {
    async fn stat(&mut self) -> Result<(usize, u64)> {
        Ok((0, 0))
    }

    async fn list(&mut self) -> Result<Vec<u64>> {
        Ok(Vec::new())
    }

    async fn list_one(&mut self, _msg: usize) -> Result<u64> {
        Ok(0)
    }

    async fn message(&mut self, _msg: usize) -> Result<MessageReader> {
        Err(Pop3Error::backend("no such message"))
    }

    async fn dele(&mut self, _msg: usize) -> Result<()> {
        Ok(())
    }

    async fn uidl(&mut self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn uidl_one(&mut self, _msg: usize) -> Result<String> {
        Err(Pop3Error::backend("no such message"))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Trivial [`MailboxProvider`] returning an [`EmptyMailbox`] for every user.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyMailboxProvider;

#[async_trait]
impl MailboxProvider for EmptyMailboxProvider {
    async fn provide(&self, _user: &str) -> Result<Box<dyn Mailbox>> {
        Ok(Box::new(EmptyMailbox))
    }
}
