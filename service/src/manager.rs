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

//! Connection manager implementation
//!
//! The ConnectionManager is responsible for:
//! - Assigning connection IDs and nicknames
//! - Spawning and tracking connection workers
//! - Per-connection disconnects
//! - Graceful shutdown coordination
//!
//! Who is in the lobby is tracked by the [`Registry`](crate::Registry); the
//! manager tracks worker tasks, including ones still connecting or already
//! closing.

use crate::{
    ConnectionId, ConnectionInfo, ConnectionState, ConnectionWorker, ControlMessage, Lobby,
    LobbyConnection, LobbyError, Nickname, NicknameStrategy, Result, ServerHandler,
    ServerMetrics, WorkerConfig,
};
use dashmap::DashMap;
use futures_util::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Managed connection entry
struct ManagedConnection {
    /// Connection ID
    id: ConnectionId,
    /// Assigned nickname
    nickname: Nickname,
    /// Peer address
    peer_addr: SocketAddr,
    /// Control channel sender
    control_tx: mpsc::Sender<ControlMessage>,
    /// Worker task handle, taken on shutdown
    worker_handle: Option<JoinHandle<()>>,
    /// Current state (atomic for lock-free access)
    state: Arc<AtomicU8>,
    /// When the connection was accepted
    created_at: Instant,
}

impl ManagedConnection {
    /// Get connection info snapshot
    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            nickname: self.nickname.clone(),
            state: ConnectionState::from_u8(self.state.load(Ordering::Acquire)),
            peer_addr: self.peer_addr,
            created_at: self.created_at,
        }
    }
}

/// Connection manager
pub struct ConnectionManager {
    /// Live workers (lock-free concurrent map)
    connections: Arc<DashMap<ConnectionId, ManagedConnection>>,
    /// Next connection ID (monotonically increasing)
    next_id: Arc<AtomicU64>,
    /// Shared lobby
    lobby: Arc<Lobby>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Worker configuration
    worker_config: WorkerConfig,
    /// How new players are named
    nickname_strategy: NicknameStrategy,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(
        lobby: Arc<Lobby>,
        metrics: Arc<ServerMetrics>,
        worker_config: WorkerConfig,
        nickname_strategy: NicknameStrategy,
    ) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            lobby,
            metrics,
            worker_config,
            nickname_strategy,
        }
    }

    /// Get the next connection ID
    fn next_connection_id(&self) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        ConnectionId::new(id)
    }

    /// Get the shared lobby
    pub fn lobby(&self) -> &Arc<Lobby> {
        &self.lobby
    }

    /// Add a new connection
    ///
    /// Assigns an ID and nickname, then spawns a worker task that registers
    /// the player and serves it until it closes.
    pub fn add_connection(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        handler: Arc<dyn ServerHandler>,
    ) -> Result<ConnectionId> {
        let id = self.next_connection_id();
        let nickname = self.nickname_strategy.generate();
        let connection = LobbyConnection::wrap(socket, id, peer_addr, &self.worker_config)?;
        let state = connection.state_flag();
        let created_at = connection.created_at();

        let (worker, control_tx) = ConnectionWorker::new(
            nickname.clone(),
            connection,
            self.lobby.clone(),
            handler,
            self.metrics.clone(),
            self.worker_config.clone(),
        );

        // Track before spawning so a worker that finishes immediately still
        // finds its entry to remove.
        self.connections.insert(
            id,
            ManagedConnection {
                id,
                nickname,
                peer_addr,
                control_tx,
                worker_handle: None,
                state,
                created_at,
            },
        );
        self.metrics.connection_opened();

        let connections = self.connections.clone();
        let metrics = self.metrics.clone();
        let worker_handle = tokio::spawn(async move {
            worker.run().await;

            // Cleanup after worker finishes
            metrics.connection_closed(created_at.elapsed());
            connections.remove(&id);
        });

        if let Some(mut entry) = self.connections.get_mut(&id) {
            entry.worker_handle = Some(worker_handle);
        }

        Ok(id)
    }

    /// Ask one connection to close
    ///
    /// The worker unregisters the player, announces the departure, flushes
    /// pending writes and closes the socket. Waits up to `timeout` for that
    /// to finish.
    pub async fn disconnect(&self, id: ConnectionId, timeout: Duration) -> Result<()> {
        let (control_tx, worker_handle) = match self.connections.get_mut(&id) {
            Some(mut entry) => (entry.control_tx.clone(), entry.worker_handle.take()),
            None => return Err(LobbyError::ConnectionNotFound(id)),
        };

        // A full or closed channel means the worker is already stopping.
        let _ = control_tx.try_send(ControlMessage::Close);

        if let Some(handle) = worker_handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!(connection_id = %id, "Worker did not stop in time, aborting");
                abort.abort();
                self.force_remove(id);
                return Err(LobbyError::Timeout);
            }
        }
        Ok(())
    }

    /// Drop bookkeeping for a worker that was aborted
    fn force_remove(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            self.metrics.connection_closed(Duration::ZERO);
        }
        self.lobby.depart(id);
    }

    /// Get connection info
    pub fn get_connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(&id).map(|entry| entry.info())
    }

    /// Get all connection IDs
    pub fn get_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// Get all connection infos
    pub fn get_all_connection_infos(&self) -> Vec<ConnectionInfo> {
        let mut infos = self
            .connections
            .iter()
            .map(|entry| entry.value().info())
            .collect::<Vec<_>>();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Get the number of live workers
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of workers in a given state
    pub fn count_in_state(&self, state: ConnectionState) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.info().state == state)
            .count()
    }

    /// Shutdown all connections gracefully
    ///
    /// Every worker is asked to close and given `timeout` to finish; any
    /// still running after that are aborted.
    pub async fn shutdown(&self, timeout: Duration) {
        let mut handles = Vec::new();
        for mut entry in self.connections.iter_mut() {
            let _ = entry.control_tx.try_send(ControlMessage::Close);
            if let Some(handle) = entry.worker_handle.take() {
                handles.push(handle);
            }
        }
        debug!(workers = handles.len(), "Waiting for workers to stop");

        let aborts = handles
            .iter()
            .map(JoinHandle::abort_handle)
            .collect::<Vec<_>>();
        if tokio::time::timeout(timeout, join_all(handles)).await.is_err() {
            warn!(timeout = ?timeout, "Workers did not stop in time, aborting");
            for abort in aborts {
                abort.abort();
            }
        }

        let stragglers = self.get_connection_ids();
        for id in stragglers {
            self.force_remove(id);
        }
        let orphaned = self.lobby.registry().clear();
        if orphaned > 0 {
            warn!(orphaned, "Cleared registry entries left by aborted workers");
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
