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

//! POP3 session state machine
//!
//! One [`Session`] drives one client connection from the greeting through
//! the AUTHORIZATION and TRANSACTION states to the UPDATE commit on QUIT.
//! It is used internally by [`Server`](crate::Server) but is public so a
//! custom accept loop (or a non-TCP transport) can drive it directly.
//!
//! Message numbers are 1-based on the wire and 0-based everywhere inside
//! the session; the parser converts on the way in and the response
//! formatters convert on the way out.

use crate::auth::Authorizer;
use crate::codec::{copy_headers_and_body, DotWriter};
use crate::command::Command;
use crate::error::{Pop3Error, Result};
use crate::mailbox::{Mailbox, MailboxProvider};
use crate::types::SessionState;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

/// Read chunk size for streaming message bodies.
const BODY_CHUNK: usize = 4096;

/// One POP3 session over a byte-stream transport.
///
/// Constructing the session probes the authorizer, generates the APOP
/// timestamp banner and sends the greeting; [`serve`](Self::serve) then
/// runs the command loop until QUIT, a transport error, or the idle
/// timeout. Deletions accumulated with DELE are applied only when the
/// session ends with QUIT from the TRANSACTION state; every other exit
/// discards them (RFC 1939 §6).
pub struct Session<S> {
    conn: BufReader<S>,
    authorizer: Arc<dyn Authorizer>,
    provider: Arc<dyn MailboxProvider>,
    connection_timeout: Option<Duration>,
    banner: String,
    state: SessionState,
    user: String,
    mailbox: Option<Box<dyn Mailbox>>,
    msg_count: usize,
    to_delete: HashSet<usize>,
    user_pass_enabled: bool,
    apop_enabled: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> Session<S> {
    /// Create a session over `conn` and send the greeting.
    ///
    /// Both authorizer methods are probed once with empty arguments to
    /// discover which authentication methods are available;
    /// [`Pop3Error::AuthMethodNotSupported`] disables the method for the
    /// whole session. The greeting carries the APOP banner only when APOP
    /// is available. The returned error is the greeting write's error.
    pub async fn new(
        conn: S,
        provider: Arc<dyn MailboxProvider>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        let user_pass_enabled = !matches!(
            authorizer.user_pass("", "").await,
            Err(Pop3Error::AuthMethodNotSupported)
        );
        let apop_enabled = !matches!(
            authorizer.apop("", "", "").await,
            Err(Pop3Error::AuthMethodNotSupported)
        );

        let mut session = Self {
            conn: BufReader::new(conn),
            authorizer,
            provider,
            connection_timeout: None,
            banner: generate_timestamp_banner(),
            state: SessionState::Authorization,
            user: String::new(),
            mailbox: None,
            msg_count: 0,
            to_delete: HashSet::new(),
            user_pass_enabled,
            apop_enabled,
        };

        let greeting = if session.apop_enabled {
            format!("+OK POP3 server ready {}\r\n", session.banner)
        } else {
            String::from("+OK POP3 server ready\r\n")
        };
        session.write_line(&greeting).await?;
        Ok(session)
    }

    /// Bind the idle timeout applied to each command-line read.
    ///
    /// `None` (the default) waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Current protocol state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Main loop: read commands and write responses until the session ends.
    ///
    /// Mailbox, provider and authorizer failures are reported to the client
    /// as `-ERR` responses and are not fatal. A transport read or write
    /// error, EOF, or an expired idle timeout ends the session with the
    /// corresponding error and without committing deletions.
    pub async fn serve(&mut self) -> Result<()> {
        while self.state != SessionState::Update {
            let cmd = self.read_command().await?;
            self.dispatch(cmd).await?;
        }
        Ok(())
    }

    /// Write a refusal status line and close the transport without running
    /// the command loop. Used by the server when the session cap is hit.
    pub(crate) async fn refuse(mut self, err: &Pop3Error) {
        let _ = self.write_line(&format!("-ERR {err}\r\n")).await;
        let _ = self.conn.shutdown().await;
    }

    async fn read_command(&mut self) -> Result<Command> {
        let mut line = Vec::new();
        let n = match self.connection_timeout {
            Some(limit) => match timeout(limit, self.conn.read_until(b'\n', &mut line)).await {
                Ok(read) => read?,
                Err(_) => return Err(Pop3Error::Timeout),
            },
            None => self.conn.read_until(b'\n', &mut line).await?,
        };
        if n == 0 {
            return Err(Pop3Error::ConnectionClosed);
        }

        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end_matches(['\r', '\n']);
        tracing::trace!(line, "C->S");
        Ok(Command::parse(line))
    }

    async fn dispatch(&mut self, cmd: Command) -> Result<()> {
        match self.state {
            SessionState::Authorization => match cmd.verb.as_str() {
                "USER" => self.handle_user(&cmd).await,
                "PASS" => self.handle_pass(&cmd).await,
                "APOP" => self.handle_apop(&cmd).await,
                "QUIT" => self.handle_quit().await,
                "CAPA" => self.handle_capa().await,
                _ => self.write_err(&Pop3Error::InvalidCommand).await,
            },
            SessionState::Transaction => match cmd.verb.as_str() {
                "QUIT" => self.handle_quit().await,
                "CAPA" => self.handle_capa().await,
                "STAT" => self.handle_stat().await,
                "LIST" => self.handle_list(&cmd).await,
                "RETR" => self.handle_retr(&cmd).await,
                "DELE" => self.handle_dele(&cmd).await,
                "RSET" => self.handle_rset().await,
                "NOOP" => self.handle_noop().await,
                "TOP" => self.handle_top(&cmd).await,
                "UIDL" => self.handle_uidl(&cmd).await,
                _ => self.write_err(&Pop3Error::InvalidCommand).await,
            },
            SessionState::Update => Ok(()),
        }
    }

    async fn handle_user(&mut self, cmd: &Command) -> Result<()> {
        if !self.user.is_empty() {
            return self.write_err(&Pop3Error::UserAlreadySpecified).await;
        }
        let [name] = cmd.args.as_slice() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        self.user = name.clone();
        self.write_ok("send PASS").await
    }

    async fn handle_pass(&mut self, cmd: &Command) -> Result<()> {
        if self.user.is_empty() {
            return self.write_err(&Pop3Error::UserNotSpecified).await;
        }
        let [pass] = cmd.args.as_slice() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        if let Err(e) = self.authorizer.user_pass(&self.user, pass).await {
            // user name is retained; the client may retry PASS
            return self.write_err(&e).await;
        }
        let user = self.user.clone();
        self.open_mailbox(&user).await
    }

    async fn handle_apop(&mut self, cmd: &Command) -> Result<()> {
        let [user, digest] = cmd.args.as_slice() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        if let Err(e) = self.authorizer.apop(user, &self.banner, digest).await {
            return self.write_err(&e).await;
        }
        self.open_mailbox(user).await
    }

    /// Shared tail of PASS and APOP: open the maildrop, cache the message
    /// count and enter TRANSACTION. A provider or stat failure leaves the
    /// session in AUTHORIZATION with no mailbox.
    async fn open_mailbox(&mut self, user: &str) -> Result<()> {
        let mut mailbox = match self.provider.provide(user).await {
            Ok(mailbox) => mailbox,
            Err(e) => return self.write_err(&e).await,
        };
        let count = match mailbox.stat().await {
            Ok((count, _)) => count,
            Err(e) => return self.write_err(&e).await,
        };

        self.mailbox = Some(mailbox);
        self.msg_count = count;
        self.state = SessionState::Transaction;
        tracing::debug!(user, count, "authenticated");
        self.write_ok("logged in").await
    }

    async fn handle_capa(&mut self) -> Result<()> {
        self.write_ok("Capability list follows").await?;
        let mut body = String::new();
        if self.user_pass_enabled {
            body.push_str("USER\r\n");
        }
        body.push_str("TOP\r\nUIDL\r\n.\r\n");
        self.write_line(&body).await
    }

    async fn handle_stat(&mut self) -> Result<()> {
        let result = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.stat().await,
            None => Err(Pop3Error::InvalidCommand),
        };
        match result {
            Ok((count, size)) => self.write_ok(&format!("{count} {size}")).await,
            Err(e) => self.write_err(&e).await,
        }
    }

    async fn handle_list(&mut self, cmd: &Command) -> Result<()> {
        if !cmd.args.is_empty() {
            let Some(msg) = cmd.one_num_arg() else {
                return self.write_err(&Pop3Error::InvalidArguments).await;
            };
            if let Some(e) = self.check_msg_index(msg) {
                return self.write_err(&e).await;
            }
            let result = match self.mailbox.as_mut() {
                Some(mailbox) => mailbox.list_one(msg).await,
                None => Err(Pop3Error::InvalidCommand),
            };
            return match result {
                Ok(size) => self.write_ok(&format!("{} {}", msg + 1, size)).await,
                Err(e) => self.write_err(&e).await,
            };
        }

        let result = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.list().await,
            None => Err(Pop3Error::InvalidCommand),
        };
        let sizes = match result {
            Ok(sizes) => sizes,
            Err(e) => return self.write_err(&e).await,
        };
        self.write_ok(&format!("{} messages in mailbox", sizes.len()))
            .await?;
        let mut body = String::new();
        for (i, size) in sizes.iter().enumerate() {
            body.push_str(&format!("{} {}\r\n", i + 1, size));
        }
        body.push_str(".\r\n");
        self.write_line(&body).await
    }

    async fn handle_uidl(&mut self, cmd: &Command) -> Result<()> {
        if !cmd.args.is_empty() {
            let Some(msg) = cmd.one_num_arg() else {
                return self.write_err(&Pop3Error::InvalidArguments).await;
            };
            if let Some(e) = self.check_msg_index(msg) {
                return self.write_err(&e).await;
            }
            let result = match self.mailbox.as_mut() {
                Some(mailbox) => mailbox.uidl_one(msg).await,
                None => Err(Pop3Error::InvalidCommand),
            };
            return match result {
                Ok(uidl) => self.write_ok(&format!("{} {}", msg + 1, uidl)).await,
                Err(e) => self.write_err(&e).await,
            };
        }

        let result = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.uidl().await,
            None => Err(Pop3Error::InvalidCommand),
        };
        let uidls = match result {
            Ok(uidls) => uidls,
            Err(e) => return self.write_err(&e).await,
        };
        self.write_ok(&format!("{} messages in mailbox", uidls.len()))
            .await?;
        let mut body = String::new();
        for (i, uidl) in uidls.iter().enumerate() {
            body.push_str(&format!("{} {}\r\n", i + 1, uidl));
        }
        body.push_str(".\r\n");
        self.write_line(&body).await
    }

    async fn handle_retr(&mut self, cmd: &Command) -> Result<()> {
        let Some(msg) = cmd.one_num_arg() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        if let Some(e) = self.check_msg_index(msg) {
            return self.write_err(&e).await;
        }
        let result = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.message(msg).await,
            None => Err(Pop3Error::InvalidCommand),
        };
        let mut reader = match result {
            Ok(reader) => reader,
            Err(e) => return self.write_err(&e).await,
        };

        self.write_ok(&format!("message body #{}", msg + 1)).await?;
        let mut writer = DotWriter::new(&mut self.conn);
        let mut chunk = [0u8; BODY_CHUNK];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            writer.write(&chunk[..n]).await?;
        }
        writer.close().await?;
        Ok(())
    }

    async fn handle_top(&mut self, cmd: &Command) -> Result<()> {
        let Some((msg, lines)) = cmd.two_num_args() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        if let Some(e) = self.check_msg_index(msg) {
            return self.write_err(&e).await;
        }
        let result = match self.mailbox.as_mut() {
            Some(mailbox) => mailbox.message(msg).await,
            None => Err(Pop3Error::InvalidCommand),
        };
        let reader = match result {
            Ok(reader) => reader,
            Err(e) => return self.write_err(&e).await,
        };

        self.write_ok("message body").await?;
        copy_headers_and_body(&mut self.conn, reader, lines).await?;
        self.write_line(".\r\n").await
    }

    async fn handle_dele(&mut self, cmd: &Command) -> Result<()> {
        let Some(msg) = cmd.one_num_arg() else {
            return self.write_err(&Pop3Error::InvalidArguments).await;
        };
        if let Some(e) = self.check_msg_index(msg) {
            return self.write_err(&e).await;
        }
        self.to_delete.insert(msg);
        self.write_ok("message deleted").await
    }

    async fn handle_rset(&mut self) -> Result<()> {
        self.to_delete.clear();
        self.write_ok("maildrop has been reset").await
    }

    async fn handle_noop(&mut self) -> Result<()> {
        self.write_ok("noop").await
    }

    async fn handle_quit(&mut self) -> Result<()> {
        self.state = SessionState::Update;
        if self.mailbox.is_none() {
            self.write_ok("POP3 server signing off").await?;
            let _ = self.conn.shutdown().await;
            return Ok(());
        }
        self.commit().await
    }

    /// UPDATE phase: apply pending deletions, release the mailbox, send the
    /// final status line, close the transport.
    ///
    /// The first `dele` failure stops the loop; `close` always runs and its
    /// error supersedes a remembered `dele` error.
    async fn commit(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(mut mailbox) = self.mailbox.take() {
            for &msg in &self.to_delete {
                if let Err(e) = mailbox.dele(msg).await {
                    result = Err(e);
                    break;
                }
            }
            if let Err(e) = mailbox.close().await {
                result = Err(e);
            }
        }

        match &result {
            Ok(()) => self.write_ok("server signing off").await?,
            Err(e) => self.write_err(e).await?,
        }
        let _ = self.conn.shutdown().await;
        Ok(())
    }

    /// Deletion-set and range precheck shared by every index-bearing
    /// operation. A hit stops the handler before it touches the mailbox.
    fn check_msg_index(&self, msg: usize) -> Option<Pop3Error> {
        if self.to_delete.contains(&msg) {
            Some(Pop3Error::MessageMarkedAsDeleted)
        } else if msg >= self.msg_count {
            Some(Pop3Error::InvalidArguments)
        } else {
            None
        }
    }

    async fn write_ok(&mut self, message: &str) -> Result<()> {
        self.write_line(&format!("+OK {message}\r\n")).await
    }

    async fn write_err(&mut self, err: &Pop3Error) -> Result<()> {
        self.write_line(&format!("-ERR {err}\r\n")).await
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        tracing::trace!(line = line.trim_end(), "S->C");
        self.conn.write_all(line.as_bytes()).await?;
        self.conn.flush().await?;
        Ok(())
    }

}

/// RFC 1939 §7 APOP challenge: `<pid.microseconds@host>`.
///
/// Falls back to `localhost` when the host name cannot be determined.
fn generate_timestamp_banner() -> String {
    let host = nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| String::from("localhost"));
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros())
        .unwrap_or_default();
    format!("<{}.{}@{}>", std::process::id(), micros, host)
}
