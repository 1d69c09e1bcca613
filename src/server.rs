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

//! POP3 server: accept loop, session registry, shutdown coordination
//!
//! The server owns the accept loops and a capped registry of live
//! sessions. Each accepted connection gets its own worker task driving one
//! [`Session`]; shutdown first stops the accept loops, then waits for the
//! registry to drain within a grace window, and finally force-closes
//! whatever is left. Force-closed sessions never commit their deletions.

use crate::auth::Authorizer;
use crate::config::ServerConfig;
use crate::error::{Pop3Error, Result};
use crate::mailbox::MailboxProvider;
use crate::session::Session;
use crate::types::SessionId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Listen address used by [`Server::listen_and_serve`] for a blank address.
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:110";

/// POP3 server instance
///
/// Cheap to clone; every clone drives the same listener set, session
/// registry and shutdown state, so one clone can serve while another
/// shuts down.
///
/// # Example
///
/// ```no_run
/// use pop3d::{AllowAllAuthorizer, EmptyMailboxProvider, Server};
/// use std::sync::Arc;
///
/// # async fn example() -> pop3d::Result<()> {
/// let server = Server::new(
///     Arc::new(AllowAllAuthorizer),
///     Arc::new(EmptyMailboxProvider),
/// );
/// server.listen_and_serve("127.0.0.1:110").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    authorizer: Arc<dyn Authorizer>,
    provider: Arc<dyn MailboxProvider>,
    /// Set once by the first shutdown/close call
    in_shutdown: AtomicBool,
    /// Fired once to stop every accept loop
    shutdown: CancellationToken,
    /// Live sessions with their force-close handles
    sessions: Mutex<HashMap<SessionId, CancellationToken>>,
    next_session_id: AtomicU64,
    /// Fired once when shutting down and the last session deregisters
    drained: CancellationToken,
    /// Accept loops currently inside [`Server::serve`]
    active_listeners: AtomicUsize,
    listeners_idle: Notify,
}

impl Server {
    /// Create a server with the default configuration.
    pub fn new(authorizer: Arc<dyn Authorizer>, provider: Arc<dyn MailboxProvider>) -> Self {
        Self::with_config(authorizer, provider, ServerConfig::default())
    }

    /// Create a server with an explicit configuration.
    pub fn with_config(
        authorizer: Arc<dyn Authorizer>,
        provider: Arc<dyn MailboxProvider>,
        config: ServerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                authorizer,
                provider,
                in_shutdown: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                sessions: Mutex::new(HashMap::new()),
                next_session_id: AtomicU64::new(1),
                drained: CancellationToken::new(),
                active_listeners: AtomicUsize::new(0),
                listeners_idle: Notify::new(),
            }),
        }
    }

    /// Accept connections on `listener` until the server shuts down.
    ///
    /// Each accepted connection is wrapped in a [`Session`], registered
    /// against the concurrent-session cap (past the cap it is refused
    /// with `-ERR too many connections`) and handed to its own worker
    /// task. After [`shutdown`](Self::shutdown) or [`close`](Self::close)
    /// the call returns [`Pop3Error::ServerClosed`]; any other accept
    /// failure is returned as-is.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        if self.shutting_down() {
            return Err(Pop3Error::ServerClosed);
        }
        let _guard = ListenerGuard::new(&self.inner);

        if let Ok(local_addr) = listener.local_addr() {
            tracing::info!(%local_addr, "POP3 server listening");
        }

        loop {
            let accepted = tokio::select! {
                _ = self.inner.shutdown.cancelled() => return Err(Pop3Error::ServerClosed),
                accepted = listener.accept() => accepted,
            };
            let (stream, peer_addr) = match accepted {
                Ok(connection) => connection,
                Err(_) if self.shutting_down() => return Err(Pop3Error::ServerClosed),
                Err(e) => return Err(e.into()),
            };
            tracing::info!(%peer_addr, "new connection");

            let session = match Session::new(
                stream,
                Arc::clone(&self.inner.provider),
                Arc::clone(&self.inner.authorizer),
            )
            .await
            {
                Ok(session) => session.with_timeout(self.inner.config.connection_timeout),
                Err(e) => {
                    tracing::warn!(%peer_addr, error = %e, "greeting failed");
                    continue;
                }
            };

            let Some((id, token)) = self.register_session().await else {
                tracing::warn!(%peer_addr, "connection limit reached, refusing");
                session.refuse(&Pop3Error::TooManyConnections).await;
                continue;
            };

            let server = self.clone();
            tokio::spawn(async move {
                server.run_session(id, token, session, peer_addr).await;
            });
        }
    }

    /// Listen on the TCP address `addr` and serve on the bound listener.
    ///
    /// A blank address listens on `0.0.0.0:110`.
    pub async fn listen_and_serve(&self, addr: &str) -> Result<()> {
        let addr = if addr.is_empty() {
            DEFAULT_LISTEN_ADDR
        } else {
            addr
        };
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Gracefully shut down the server.
    ///
    /// Stops every accept loop (their `serve` calls return
    /// [`Pop3Error::ServerClosed`]), then waits up to `grace` for live
    /// sessions to finish on their own. When the grace window expires the
    /// remaining sessions are force-closed, discarding their deletions,
    /// and [`Pop3Error::Timeout`] is returned. A second shutdown or
    /// close returns [`Pop3Error::ServerClosed`].
    pub async fn shutdown(&self, grace: Duration) -> Result<()> {
        if self.inner.in_shutdown.swap(true, Ordering::SeqCst) {
            return Err(Pop3Error::ServerClosed);
        }
        tracing::info!("shutting down POP3 server");

        self.inner.shutdown.cancel();
        self.wait_listeners_idle().await;

        if self.inner.sessions.lock().await.is_empty() {
            self.inner.drained.cancel();
        }

        tokio::select! {
            _ = self.inner.drained.cancelled() => {
                tracing::info!("all sessions drained");
                Ok(())
            }
            _ = sleep(grace) => {
                tracing::warn!("grace window expired, force-closing sessions");
                self.force_close_all_sessions().await;
                Err(Pop3Error::Timeout)
            }
        }
    }

    /// Immediately close the server: stop the accept loops and force-close
    /// every live session without waiting. For a graceful variant use
    /// [`shutdown`](Self::shutdown).
    pub async fn close(&self) -> Result<()> {
        if self.inner.in_shutdown.swap(true, Ordering::SeqCst) {
            return Err(Pop3Error::ServerClosed);
        }
        tracing::info!("closing POP3 server");

        self.inner.shutdown.cancel();
        self.wait_listeners_idle().await;
        self.force_close_all_sessions().await;
        Ok(())
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.sessions.lock().await.len()
    }

    fn shutting_down(&self) -> bool {
        self.inner.in_shutdown.load(Ordering::SeqCst)
    }

    /// Test-and-insert against the session cap.
    async fn register_session(&self) -> Option<(SessionId, CancellationToken)> {
        let mut sessions = self.inner.sessions.lock().await;
        if sessions.len() >= self.inner.config.connections_limit {
            return None;
        }
        let id = SessionId::new(self.inner.next_session_id.fetch_add(1, Ordering::SeqCst));
        let token = CancellationToken::new();
        sessions.insert(id, token.clone());
        Some((id, token))
    }

    async fn deregister_session(&self, id: SessionId) {
        let drained = {
            let mut sessions = self.inner.sessions.lock().await;
            sessions.remove(&id);
            sessions.is_empty() && self.shutting_down()
        };
        if drained {
            self.inner.drained.cancel();
        }
    }

    /// Worker body: drive the session until it finishes or the force-close
    /// token fires. Dropping a cancelled session closes its transport
    /// without running the commit sequence.
    async fn run_session<S>(
        &self,
        id: SessionId,
        token: CancellationToken,
        mut session: Session<S>,
        peer_addr: SocketAddr,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        tokio::select! {
            result = session.serve() => match result {
                Ok(()) => tracing::info!(%id, %peer_addr, "session finished"),
                Err(e) => tracing::info!(%id, %peer_addr, error = %e, "session ended"),
            },
            _ = token.cancelled() => {
                tracing::debug!(%id, %peer_addr, "session force-closed");
            }
        }
        drop(session);
        self.deregister_session(id).await;
    }

    async fn force_close_all_sessions(&self) {
        let sessions = self.inner.sessions.lock().await;
        for token in sessions.values() {
            token.cancel();
        }
    }

    async fn wait_listeners_idle(&self) {
        loop {
            let notified = self.inner.listeners_idle.notified();
            if self.inner.active_listeners.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("connections_limit", &self.inner.config.connections_limit)
            .field("shutting_down", &self.shutting_down())
            .finish()
    }
}

/// Tracks an accept loop inside [`Server::serve`] so shutdown can wait for
/// all of them to return.
struct ListenerGuard<'a> {
    inner: &'a ServerInner,
}

impl<'a> ListenerGuard<'a> {
    fn new(inner: &'a ServerInner) -> Self {
        inner.active_listeners.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        if self.inner.active_listeners.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.listeners_idle.notify_waiters();
        }
    }
}
