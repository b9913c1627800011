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

//! Error types for the lobby server

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, LobbyError>;

/// Lobby server error types
#[derive(Debug, Error)]
pub enum LobbyError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Connection with the given ID is already registered
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    AlreadyRunning,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LobbyError {
    /// Check if the error is scoped to a single connection
    ///
    /// Connection errors close the affected connection and never reach the
    /// registry or other connections.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            LobbyError::ConnectionNotFound(_)
                | LobbyError::ConnectionClosed
                | LobbyError::Timeout
                | LobbyError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_connection_error() {
        assert!(LobbyError::ConnectionNotFound(ConnectionId::new(1)).is_connection_error());
        assert!(LobbyError::ConnectionClosed.is_connection_error());
        assert!(LobbyError::Timeout.is_connection_error());
        assert!(!LobbyError::ServerNotRunning.is_connection_error());
        assert!(!LobbyError::InvalidConfig("x".into()).is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = LobbyError::ConnectionNotFound(ConnectionId::new(42));
        assert_eq!(err.to_string(), "Connection conn-42 not found");

        let err = LobbyError::DuplicateConnection(ConnectionId::new(7));
        assert_eq!(err.to_string(), "Connection conn-7 is already registered");
    }
}
