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

//! Scripted test doubles: in-memory transport, mailbox and authorizer.

#![allow(dead_code)]

use async_trait::async_trait;
use pop3d::{Authorizer, Mailbox, MailboxProvider, MessageReader, Pop3Error, Result};
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// In-memory transport scripted with client lines.
///
/// Reads deliver the scripted lines (each CRLF-terminated) and then either
/// EOF, a configured error, or hang forever. Writes and the shutdown call
/// are observable through the paired [`ConnHandle`].
pub struct MockConn {
    input: io::Cursor<Vec<u8>>,
    read_error: Option<io::ErrorKind>,
    hang_after_input: bool,
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

/// Observer half of a [`MockConn`].
pub struct ConnHandle {
    written: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicBool>,
}

impl MockConn {
    pub fn script(lines: &[&str]) -> (Self, ConnHandle) {
        let mut input = Vec::new();
        for line in lines {
            input.extend_from_slice(line.as_bytes());
            input.extend_from_slice(b"\r\n");
        }
        let written = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let handle = ConnHandle {
            written: Arc::clone(&written),
            closed: Arc::clone(&closed),
        };
        let conn = Self {
            input: io::Cursor::new(input),
            read_error: None,
            hang_after_input: false,
            written,
            closed,
        };
        (conn, handle)
    }

    /// Fail reads with `kind` once the scripted input is consumed.
    pub fn with_read_error(mut self, kind: io::ErrorKind) -> Self {
        self.read_error = Some(kind);
        self
    }

    /// Never complete a read once the scripted input is consumed.
    pub fn with_hang(mut self) -> Self {
        self.hang_after_input = true;
        self
    }
}

impl ConnHandle {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    /// Everything written so far, split into CRLF-terminated lines.
    pub fn lines(&self) -> Vec<String> {
        let written = self.written();
        let text = String::from_utf8(written).unwrap();
        text.split_terminator("\r\n").map(str::to_owned).collect()
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AsyncRead for MockConn {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let pos = this.input.position() as usize;
        let data = this.input.get_ref();
        if pos >= data.len() {
            if let Some(kind) = this.read_error.take() {
                return Poll::Ready(Err(io::Error::from(kind)));
            }
            if this.hang_after_input {
                return Poll::Pending;
            }
            return Poll::Ready(Ok(()));
        }
        let n = buf.remaining().min(data.len() - pos);
        buf.put_slice(&data[pos..pos + n]);
        this.input.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockConn {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Shared call recorder for a [`ScriptedMailbox`].
#[derive(Clone, Default)]
pub struct MailboxCalls {
    pub deleted: Arc<Mutex<Vec<usize>>>,
    pub closes: Arc<AtomicUsize>,
}

impl MailboxCalls {
    pub fn deleted(&self) -> Vec<usize> {
        let mut deleted = self.deleted.lock().unwrap().clone();
        deleted.sort_unstable();
        deleted
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Scripted [`Mailbox`] with fixed contents and observable calls.
pub struct ScriptedMailbox {
    stat: (usize, u64),
    sizes: Vec<u64>,
    uidls: Vec<String>,
    messages: HashMap<usize, Vec<u8>>,
    stat_error: Option<String>,
    dele_error: Option<String>,
    close_error: Option<String>,
    calls: MailboxCalls,
}

impl ScriptedMailbox {
    pub fn new(count: usize, total_size: u64) -> Self {
        Self {
            stat: (count, total_size),
            sizes: Vec::new(),
            uidls: Vec::new(),
            messages: HashMap::new(),
            stat_error: None,
            dele_error: None,
            close_error: None,
            calls: MailboxCalls::default(),
        }
    }

    pub fn with_sizes(mut self, sizes: &[u64]) -> Self {
        self.sizes = sizes.to_vec();
        self
    }

    pub fn with_uidls(mut self, uidls: &[&str]) -> Self {
        self.uidls = uidls.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_message(mut self, msg: usize, content: &[u8]) -> Self {
        self.messages.insert(msg, content.to_vec());
        self
    }

    pub fn with_stat_error(mut self, message: &str) -> Self {
        self.stat_error = Some(message.to_string());
        self
    }

    pub fn with_dele_error(mut self, message: &str) -> Self {
        self.dele_error = Some(message.to_string());
        self
    }

    pub fn with_close_error(mut self, message: &str) -> Self {
        self.close_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> MailboxCalls {
        self.calls.clone()
    }
}

#[async_trait]
impl Mailbox for ScriptedMailbox {
    async fn stat(&mut self) -> Result<(usize, u64)> {
        if let Some(message) = &self.stat_error {
            return Err(Pop3Error::backend(message.clone()));
        }
        Ok(self.stat)
    }

    async fn list(&mut self) -> Result<Vec<u64>> {
        Ok(self.sizes.clone())
    }

    async fn list_one(&mut self, msg: usize) -> Result<u64> {
        self.sizes
            .get(msg)
            .copied()
            .ok_or_else(|| Pop3Error::backend("no such message"))
    }

    async fn message(&mut self, msg: usize) -> Result<MessageReader> {
        let content = self
            .messages
            .get(&msg)
            .cloned()
            .ok_or_else(|| Pop3Error::backend("no such message"))?;
        Ok(Box::new(io::Cursor::new(content)))
    }

    async fn dele(&mut self, msg: usize) -> Result<()> {
        if let Some(message) = &self.dele_error {
            return Err(Pop3Error::backend(message.clone()));
        }
        self.calls.deleted.lock().unwrap().push(msg);
        Ok(())
    }

    async fn uidl(&mut self) -> Result<Vec<String>> {
        Ok(self.uidls.clone())
    }

    async fn uidl_one(&mut self, msg: usize) -> Result<String> {
        self.uidls
            .get(msg)
            .cloned()
            .ok_or_else(|| Pop3Error::backend("no such message"))
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.close_error {
            return Err(Pop3Error::backend(message.clone()));
        }
        Ok(())
    }
}

/// Provider handing out one scripted mailbox, then failing.
pub struct ScriptedProvider {
    mailbox: Mutex<Option<ScriptedMailbox>>,
}

impl ScriptedProvider {
    pub fn new(mailbox: ScriptedMailbox) -> Self {
        Self {
            mailbox: Mutex::new(Some(mailbox)),
        }
    }

    /// Provider with nothing to provide; `provide` always fails.
    pub fn empty() -> Self {
        Self {
            mailbox: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MailboxProvider for ScriptedProvider {
    async fn provide(&self, _user: &str) -> Result<Box<dyn Mailbox>> {
        self.mailbox
            .lock()
            .unwrap()
            .take()
            .map(|mailbox| Box::new(mailbox) as Box<dyn Mailbox>)
            .ok_or_else(|| Pop3Error::backend("mailbox unavailable"))
    }
}

/// Scripted [`Authorizer`] with observable (non-probe) calls.
pub struct ScriptedAuthorizer {
    user_pass_supported: bool,
    apop_supported: bool,
    deny_user_pass: Option<String>,
    pub user_pass_calls: Arc<Mutex<Vec<(String, String)>>>,
    pub apop_calls: Arc<Mutex<Vec<(String, String, String)>>>,
}

impl ScriptedAuthorizer {
    pub fn allow_all() -> Self {
        Self {
            user_pass_supported: true,
            apop_supported: true,
            deny_user_pass: None,
            user_pass_calls: Arc::default(),
            apop_calls: Arc::default(),
        }
    }

    pub fn with_user_pass_denied(mut self, message: &str) -> Self {
        self.deny_user_pass = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Authorizer for ScriptedAuthorizer {
    async fn user_pass(&self, user: &str, pass: &str) -> Result<()> {
        if !self.user_pass_supported {
            return Err(Pop3Error::AuthMethodNotSupported);
        }
        if user.is_empty() {
            // construction probe
            return Ok(());
        }
        self.user_pass_calls
            .lock()
            .unwrap()
            .push((user.to_string(), pass.to_string()));
        match &self.deny_user_pass {
            Some(message) => Err(Pop3Error::backend(message.clone())),
            None => Ok(()),
        }
    }

    async fn apop(&self, user: &str, banner: &str, digest: &str) -> Result<()> {
        if !self.apop_supported {
            return Err(Pop3Error::AuthMethodNotSupported);
        }
        if user.is_empty() {
            return Ok(());
        }
        self.apop_calls.lock().unwrap().push((
            user.to_string(),
            banner.to_string(),
            digest.to_string(),
        ));
        Ok(())
    }
}
