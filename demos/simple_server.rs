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

//! Minimal POP3 server: accepts any credentials and serves empty
//! mailboxes. Talk to it with `telnet 127.0.0.1 1100` or any mail client.

use pop3d::{AllowAllAuthorizer, EmptyMailboxProvider, Pop3Error, Server, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> pop3d::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let config = ServerConfig::new().with_connection_timeout(Some(Duration::from_secs(600)));
    let server = Server::with_config(
        Arc::new(AllowAllAuthorizer),
        Arc::new(EmptyMailboxProvider),
        config,
    );

    let shutdown_handle = server.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_handle.shutdown(Duration::from_secs(5)).await;
    });

    match server.listen_and_serve("127.0.0.1:1100").await {
        Err(Pop3Error::ServerClosed) => Ok(()),
        other => other,
    }
}
