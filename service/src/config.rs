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

//! Server configuration

use crate::{LobbyError, NicknameStrategy, Result};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Default address the server binds to
pub const DEFAULT_BIND_ADDRESS: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));

/// Default longest accepted inbound line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Server configuration
///
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use lobbycast_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_max_connections(500)
///     .with_write_timeout(Duration::from_secs(5))
///     .with_outbound_queue_size(128);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Timeout for a single queued write to a peer
    ///
    /// A peer that cannot absorb a line within this duration is treated as
    /// a transport failure and disconnected.
    pub write_timeout: Duration,

    /// Number of lines buffered per connection before new lines are dropped
    pub outbound_queue_size: usize,

    /// Longest accepted inbound line in bytes; longer lines are discarded
    pub max_line_length: usize,

    /// Timeout for graceful shutdown
    ///
    /// Bounds both the drain of a closing connection's outbound queue and the
    /// wait for all workers when the server shuts down.
    pub shutdown_timeout: Duration,

    /// How nicknames are generated for new connections
    pub nickname_strategy: NicknameStrategy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            max_connections: 1000,
            write_timeout: Duration::from_secs(10),
            outbound_queue_size: 64,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            shutdown_timeout: Duration::from_secs(5),
            nickname_strategy: NicknameStrategy::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the per-connection outbound queue capacity
    pub fn with_outbound_queue_size(mut self, size: usize) -> Self {
        self.outbound_queue_size = size;
        self
    }

    /// Set the maximum inbound line length
    pub fn with_max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the nickname generation strategy
    pub fn with_nickname_strategy(mut self, strategy: NicknameStrategy) -> Self {
        self.nickname_strategy = strategy;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(invalid("max_connections must be greater than 0"));
        }

        if self.outbound_queue_size == 0 {
            return Err(invalid("outbound_queue_size must be greater than 0"));
        }

        if self.max_line_length == 0 {
            return Err(invalid("max_line_length must be greater than 0"));
        }

        if self.write_timeout.is_zero() {
            return Err(invalid("write_timeout must be greater than 0"));
        }

        if self.shutdown_timeout.is_zero() {
            return Err(invalid("shutdown_timeout must be greater than 0"));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> LobbyError {
    LobbyError::InvalidConfig(reason.to_string())
}
