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

//! Server configuration types
//!
//! # Example
//!
//! ```
//! use pop3d::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::new()
//!     .with_connections_limit(500)
//!     .with_connection_timeout(Some(Duration::from_secs(600)));
//! ```

use std::time::Duration;

/// Default cap on concurrent sessions.
pub const DEFAULT_CONNECTIONS_LIMIT: usize = 100;

/// POP3 server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of concurrent sessions. A connection accepted past
    /// the cap is refused with `-ERR too many connections` and closed
    /// without running a session.
    pub connections_limit: usize,

    /// Idle timeout applied to each command-line read. `None` waits
    /// forever.
    pub connection_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            connections_limit: DEFAULT_CONNECTIONS_LIMIT,
            connection_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrent-session cap
    pub fn with_connections_limit(mut self, limit: usize) -> Self {
        self.connections_limit = limit;
        self
    }

    /// Set the idle command-read timeout
    pub fn with_connection_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connection_timeout = timeout;
        self
    }
}
