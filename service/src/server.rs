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

//! Lobby server implementation
//!
//! The LobbyServer owns the TCP listener, accepts connections, and hands
//! them to the ConnectionManager.

use crate::{
    ConnectionManager, Lobby, LobbyError, Nickname, Result, ServerConfig, ServerHandler,
    ServerMetrics, ServerSnapshot, WorkerConfig,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Running accept loop
struct AcceptLoop {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Lobby broadcast server
///
/// # Example
///
/// ```no_run
/// use lobbycast_service::{LobbyServer, NoopHandler, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = LobbyServer::new(ServerConfig::default()).await?;
///     server.start(Arc::new(NoopHandler)).await?;
///
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct LobbyServer {
    /// Server configuration
    config: ServerConfig,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// TCP listener (shared with the accept loop)
    listener: Arc<Mutex<TcpListener>>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: AtomicBool,
    /// Accept loop, present while running
    accept_loop: Mutex<Option<AcceptLoop>>,
}

impl LobbyServer {
    /// Create a new server with the given configuration
    ///
    /// Validates the configuration and binds the listener, but does not
    /// accept connections until `start()` is called. A bind failure is
    /// returned here.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let bind_address = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let lobby = Arc::new(Lobby::new(metrics.clone()));
        let manager = Arc::new(ConnectionManager::new(
            lobby,
            metrics.clone(),
            WorkerConfig::from(&config),
            config.nickname_strategy,
        ));

        info!(%bind_address, "Lobby server bound");

        Ok(Self {
            config,
            manager,
            metrics,
            listener: Arc::new(Mutex::new(listener)),
            bind_address,
            started_at: Instant::now(),
            running: AtomicBool::new(false),
            accept_loop: Mutex::new(None),
        })
    }

    /// Start accepting connections
    ///
    /// Returns immediately; the accept loop runs on its own task until
    /// `shutdown()` is called.
    pub async fn start(&self, handler: Arc<dyn ServerHandler>) -> Result<()> {
        let mut accept_loop = self.accept_loop.lock().await;
        if accept_loop.is_some() {
            return Err(LobbyError::AlreadyRunning);
        }

        info!(bind_address = %self.bind_address, "Starting lobby server");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_accept_loop(
            self.listener.clone(),
            self.manager.clone(),
            self.metrics.clone(),
            self.config.max_connections,
            handler,
            cancel.clone(),
        ));
        *accept_loop = Some(AcceptLoop { handle, cancel });
        self.running.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Shutdown the server gracefully
    ///
    /// Stops accepting, then closes every connection. Each player is
    /// unregistered and announced as having left before its socket closes.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(AcceptLoop { handle, cancel }) = self.accept_loop.lock().await.take() else {
            return Err(LobbyError::ServerNotRunning);
        };
        self.running.store(false, Ordering::SeqCst);

        info!("Shutting down lobby server");

        cancel.cancel();
        if tokio::time::timeout(self.config.shutdown_timeout, handle)
            .await
            .is_err()
        {
            warn!("Accept loop did not stop in time");
        }

        self.manager.shutdown(self.config.shutdown_timeout).await;

        info!("Lobby server shutdown complete");
        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of live connections
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get the nicknames of everyone in the lobby
    pub fn online_players(&self) -> Vec<Nickname> {
        self.manager.lobby().registry().all_nicknames()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            online_players: self.manager.lobby().registry().len(),
            live_connections: self.manager.connection_count(),
            total_connections: self.metrics.total_connections(),
            bind_address: self.bind_address,
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }
}

async fn run_accept_loop(
    listener: Arc<Mutex<TcpListener>>,
    manager: Arc<ConnectionManager>,
    metrics: Arc<ServerMetrics>,
    max_connections: usize,
    handler: Arc<dyn ServerHandler>,
    cancel: CancellationToken,
) {
    let listener = listener.lock().await;
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => result,
        };

        match accepted {
            Ok((socket, peer_addr)) => {
                debug!(%peer_addr, "Accepted connection");

                if manager.connection_count() >= max_connections {
                    warn!(
                        %peer_addr,
                        max_connections,
                        "Connection limit reached, rejecting connection"
                    );
                    metrics.connection_error();
                    drop(socket);
                    continue;
                }

                match manager.add_connection(socket, peer_addr, handler.clone()) {
                    Ok(id) => debug!(connection_id = %id, %peer_addr, "Connection established"),
                    Err(e) => {
                        error!(%peer_addr, error = %e, "Failed to add connection");
                        metrics.connection_error();
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
                metrics.connection_error();

                // Back off on errors to avoid tight loop
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }

    info!("Accept loop terminated");
}

impl std::fmt::Debug for LobbyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for LobbyServer {
    fn drop(&mut self) {
        if let Some(accept_loop) = self.accept_loop.get_mut().take() {
            warn!("LobbyServer dropped while still running");
            accept_loop.cancel.cancel();
        }
    }
}
