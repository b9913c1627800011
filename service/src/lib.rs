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

//! Lobby Broadcast Server
//!
//! A line-oriented TCP lobby. Every accepted connection is given a generated
//! nickname, greeted with the list of players online, and announced to
//! everyone else. Each non-empty line a player sends is relayed to all other
//! players as `{nickname}: {message}`, and a player that disconnects is
//! announced as having left.
//!
//! # Architecture
//!
//! ```text
//! LobbyServer
//!     ↓
//! ConnectionManager
//!     ↓
//! ConnectionWorker → LobbyConnection (reader + writer task)
//!     ↓
//! Lobby → Registry
//! ```
//!
//! Broadcasts never wait on a peer: each connection has a bounded outbound
//! queue drained by its own writer task, and a line for a full queue is
//! dropped for that peer only.
//!
//! # Example
//!
//! ```no_run
//! use lobbycast_service::{ConnectionId, LobbyServer, Nickname, ServerConfig, ServerHandler};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct ChatLog;
//!
//! #[async_trait]
//! impl ServerHandler for ChatLog {
//!     async fn on_message(&self, _id: ConnectionId, nickname: &Nickname, message: &str) {
//!         println!("{nickname}: {message}");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = LobbyServer::new(ServerConfig::default()).await?;
//!     server.start(Arc::new(ChatLog)).await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod codec;
mod config;
mod connection;
mod error;
mod handler;
mod lobby;
mod manager;
pub mod message;
mod metrics;
mod nickname;
mod registry;
mod server;
mod types;
mod worker;

pub use codec::LineCodec;
pub use config::{DEFAULT_BIND_ADDRESS, DEFAULT_MAX_LINE_LENGTH, ServerConfig};
pub use connection::{Delivery, LobbyConnection, Outbound};
pub use error::{LobbyError, Result};
pub use handler::{CallbackHandler, NoopHandler, ServerHandler};
pub use lobby::{BroadcastResult, Departure, Lobby};
pub use manager::ConnectionManager;
pub use message::Line;
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use nickname::{NICKNAME_PREFIX, NicknameStrategy, timestamp_fragment};
pub use registry::{Registry, RegistryEntry};
pub use server::LobbyServer;
pub use types::{ConnectionId, ConnectionInfo, ConnectionState, Nickname, ServerSnapshot};
pub use worker::{ConnectionWorker, ControlMessage, WorkerConfig};
