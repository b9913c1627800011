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

//! Connection worker implementation
//!
//! The ConnectionWorker drives one player through its lifecycle:
//! - Registration, welcome and join announcement
//! - Relaying inbound lines to the lobby
//! - Control message handling
//! - Removal, leave announcement and transport close

use crate::{
    ConnectionId, ConnectionState, Lobby, LobbyConnection, Nickname, Result, ServerConfig,
    ServerHandler, ServerMetrics,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace};

/// Control messages for the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Gracefully close the connection
    Close,
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Write timeout (max time for one queued line to reach the socket)
    pub write_timeout: Duration,
    /// Outbound queue capacity in lines
    pub outbound_queue_size: usize,
    /// Longest accepted inbound line in bytes
    pub max_line_length: usize,
    /// Max time to flush pending writes when closing
    pub close_timeout: Duration,
    /// Control channel buffer size
    pub control_buffer_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for WorkerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            write_timeout: config.write_timeout,
            outbound_queue_size: config.outbound_queue_size,
            max_line_length: config.max_line_length,
            close_timeout: config.shutdown_timeout,
            control_buffer_size: 4,
        }
    }
}

/// Why the event loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    /// Peer closed its side
    PeerClosed,
    /// Close requested through the control channel
    Requested,
    /// Control channel dropped by the manager
    ControlDropped,
}

/// Connection worker that manages a single player's lifecycle
pub struct ConnectionWorker {
    /// Connection ID
    id: ConnectionId,
    /// Assigned nickname
    nickname: Nickname,
    /// The connection being managed
    connection: LobbyConnection,
    /// Shared lobby
    lobby: Arc<Lobby>,
    /// Event handler
    handler: Arc<dyn ServerHandler>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Configuration
    config: WorkerConfig,
    /// Control message receiver
    control_rx: mpsc::Receiver<ControlMessage>,
}

impl ConnectionWorker {
    /// Create a new connection worker
    pub fn new(
        nickname: Nickname,
        connection: LobbyConnection,
        lobby: Arc<Lobby>,
        handler: Arc<dyn ServerHandler>,
        metrics: Arc<ServerMetrics>,
        config: WorkerConfig,
    ) -> (Self, mpsc::Sender<ControlMessage>) {
        let (control_tx, control_rx) = mpsc::channel(config.control_buffer_size);

        let worker = Self {
            id: connection.id(),
            nickname,
            connection,
            lobby,
            handler,
            metrics,
            config,
            control_rx,
        };

        (worker, control_tx)
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Run the worker until the connection closes
    #[instrument(skip(self), fields(connection_id = %self.id, nickname = %self.nickname))]
    pub async fn run(mut self) {
        self.connection.set_state(ConnectionState::Open);
        if let Err(e) = self
            .lobby
            .admit(self.id, self.nickname.clone(), self.connection.outbound())
        {
            error!(error = %e, "Failed to register player");
            self.metrics.connection_error();
            self.connection.close(self.config.close_timeout).await;
            return;
        }
        info!(peer_addr = %self.connection.peer_addr(), "Player joined");
        self.handler.on_join(self.id, &self.nickname).await;

        match self.event_loop().await {
            Ok(reason) => debug!(?reason, "Connection closing"),
            Err(e) => {
                error!(error = %e, "Connection error");
                self.metrics.connection_error();
                self.handler.on_error(self.id, &self.nickname, &e).await;
            }
        }

        self.cleanup().await;
    }

    /// Main event processing loop
    async fn event_loop(&mut self) -> Result<CloseReason> {
        loop {
            select! {
                line = self.connection.next_line() => {
                    match line? {
                        Some(line) => self.on_line(&line).await,
                        None => return Ok(CloseReason::PeerClosed),
                    }
                }

                msg = self.control_rx.recv() => {
                    match msg {
                        Some(ControlMessage::Close) => return Ok(CloseReason::Requested),
                        None => return Ok(CloseReason::ControlDropped),
                    }
                }
            }
        }
    }

    async fn on_line(&self, line: &str) {
        match self.lobby.relay(self.id, &self.nickname, line) {
            Some(result) => {
                trace!(
                    delivered = result.delivered,
                    skipped = result.skipped,
                    "Relayed message"
                );
                if let Some(message) = crate::message::normalize(line) {
                    self.handler.on_message(self.id, &self.nickname, message).await;
                }
            }
            None => trace!("Ignored empty line"),
        }
    }

    /// Unregister, announce, and close the transport
    async fn cleanup(self) {
        let Self {
            id,
            nickname,
            connection,
            lobby,
            handler,
            config,
            mut control_rx,
            ..
        } = self;

        // Stop accepting broadcasts before the entry goes away.
        connection.set_state(ConnectionState::Closing);

        if let Some(departure) = lobby.depart(id) {
            info!(
                notified = departure.announced.delivered,
                "Player left"
            );
            handler.on_leave(id, &nickname).await;
        }

        connection.close(config.close_timeout).await;

        // Drain any remaining control messages
        while control_rx.try_recv().is_ok() {}
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("id", &self.id)
            .field("nickname", &self.nickname)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServerHandler;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;

    #[derive(Default)]
    struct TestHandler {
        joins: AtomicUsize,
        messages: AtomicUsize,
        leaves: AtomicUsize,
    }

    #[async_trait]
    impl ServerHandler for TestHandler {
        async fn on_join(&self, _id: ConnectionId, _nickname: &Nickname) {
            self.joins.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_message(&self, _id: ConnectionId, _nickname: &Nickname, _message: &str) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_leave(&self, _id: ConnectionId, _nickname: &Nickname) {
            self.leaves.fetch_add(1, Ordering::SeqCst);
        }
    }

    async fn spawn_worker(
        lobby: Arc<Lobby>,
        handler: Arc<TestHandler>,
        id: u64,
    ) -> (
        TcpStream,
        mpsc::Sender<ControlMessage>,
        tokio::task::JoinHandle<()>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move { listener.accept().await.unwrap() });
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, peer_addr) = server_task.await.unwrap();

        let config = WorkerConfig::default();
        let connection =
            LobbyConnection::wrap(server, ConnectionId::new(id), peer_addr, &config).unwrap();
        let (worker, control_tx) = ConnectionWorker::new(
            Nickname::new(format!("Player_00000{id}")),
            connection,
            lobby,
            handler,
            Arc::new(ServerMetrics::new()),
            config,
        );

        let worker_task = tokio::spawn(worker.run());
        (client, control_tx, worker_task)
    }

    #[tokio::test]
    async fn test_worker_lifecycle() {
        let lobby = Arc::new(Lobby::new(Arc::new(ServerMetrics::new())));
        let handler = Arc::new(TestHandler::default());

        let (client, control_tx, worker_task) = spawn_worker(lobby.clone(), handler.clone(), 1).await;
        let mut lines = BufReader::new(client).lines();

        let welcome = lines.next_line().await.unwrap().unwrap();
        assert_eq!(welcome, "Welcome, Player_000001! Currently online: Player_000001");
        assert_eq!(lobby.registry().len(), 1);
        assert_eq!(handler.joins.load(Ordering::SeqCst), 1);

        control_tx.send(ControlMessage::Close).await.unwrap();
        timeout(Duration::from_secs(5), worker_task).await.unwrap().unwrap();

        assert!(lobby.registry().is_empty());
        assert_eq!(handler.leaves.load(Ordering::SeqCst), 1);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_worker_relays_between_players() {
        let lobby = Arc::new(Lobby::new(Arc::new(ServerMetrics::new())));
        let handler = Arc::new(TestHandler::default());

        let (a, _a_ctl, _a_task) = spawn_worker(lobby.clone(), handler.clone(), 1).await;
        let mut a = BufReader::new(a);
        let mut line = String::new();
        a.read_line(&mut line).await.unwrap();

        let (b, _b_ctl, b_task) = spawn_worker(lobby.clone(), handler.clone(), 2).await;
        let mut b = BufReader::new(b);
        line.clear();
        b.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("Welcome, Player_000002!"));

        line.clear();
        a.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Player_000002 joined the game!\n");

        b.get_mut().write_all(b"\n  \nhello there\n").await.unwrap();
        line.clear();
        a.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Player_000002: hello there\n");

        drop(b);
        timeout(Duration::from_secs(5), b_task).await.unwrap().unwrap();
        line.clear();
        a.read_line(&mut line).await.unwrap();
        assert_eq!(line, "Player_000002 left the game!\n");
        assert_eq!(handler.messages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_exits_when_control_dropped() {
        let lobby = Arc::new(Lobby::new(Arc::new(ServerMetrics::new())));
        let handler = Arc::new(TestHandler::default());

        let (_client, control_tx, worker_task) = spawn_worker(lobby.clone(), handler, 1).await;
        drop(control_tx);

        timeout(Duration::from_secs(5), worker_task).await.unwrap().unwrap();
        assert!(lobby.registry().is_empty());
    }
}
