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

//! Lobby connection implementation
//!
//! A connection is split into two halves. Inbound lines are read by the
//! owning [`ConnectionWorker`](crate::ConnectionWorker). Outbound lines go
//! through a bounded queue drained by a dedicated writer task, so a slow
//! peer never blocks a broadcast: when its queue is full the line is dropped
//! for that peer only.

use crate::{ConnectionId, ConnectionState, LineCodec, LobbyError, Result, WorkerConfig};
use crate::message::Line;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, trace, warn};

/// Outcome of queuing one line for one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The line was queued for the writer task
    Queued,
    /// The recipient's queue was full; the line was dropped
    Full,
    /// The recipient is not open or its writer has stopped
    NotWritable,
}

/// Sending side of a connection's outbound queue
///
/// Clones share the queue and the connection's state flag.
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Line>,
    state: Arc<AtomicU8>,
}

impl Outbound {
    /// Create an outbound queue in the `Connecting` state
    ///
    /// The receiver is normally owned by the connection's writer task.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Line>) {
        let (tx, rx) = mpsc::channel(capacity);
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8()));
        (Self { tx, state }, rx)
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Set the connection state
    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Check if the connection accepts new lines
    pub fn is_writable(&self) -> bool {
        self.state().is_writable() && !self.tx.is_closed()
    }

    /// Queue a line without waiting
    pub fn deliver(&self, line: Line) -> Delivery {
        if !self.is_writable() {
            return Delivery::NotWritable;
        }
        match self.tx.try_send(line) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                debug!("Outbound queue full, dropping line");
                Delivery::Full
            }
            Err(TrySendError::Closed(_)) => Delivery::NotWritable,
        }
    }
}

/// An accepted lobby connection
pub struct LobbyConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    created_at: Instant,
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    outbound: Outbound,
    writer: Option<JoinHandle<Result<()>>>,
}

impl LobbyConnection {
    /// Wrap an accepted TCP stream and start its writer task
    #[instrument(skip(socket, config), fields(connection_id = %id))]
    pub fn wrap(
        socket: TcpStream,
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: &WorkerConfig,
    ) -> Result<Self> {
        socket.set_nodelay(true)?;
        let (read_half, write_half) = socket.into_split();

        let reader = FramedRead::new(read_half, LineCodec::with_max_length(config.max_line_length));
        let sink = FramedWrite::new(write_half, LineCodec::new());
        let (outbound, rx) = Outbound::channel(config.outbound_queue_size);
        let writer = tokio::spawn(write_loop(id, sink, rx, config.write_timeout));

        debug!(peer_addr = %peer_addr, "Connection wrapped");

        Ok(Self {
            id,
            peer_addr,
            created_at: Instant::now(),
            reader,
            outbound,
            writer: Some(writer),
        })
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get when the connection was accepted
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get a handle to the outbound queue
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        self.outbound.state()
    }

    /// Set the current state
    pub fn set_state(&self, state: ConnectionState) {
        self.outbound.set_state(state);
    }

    /// Shared state flag, without holding the outbound queue open
    pub(crate) fn state_flag(&self) -> Arc<AtomicU8> {
        self.outbound.state.clone()
    }

    /// Receive the next inbound line
    ///
    /// Returns `Ok(None)` once the peer has closed its side. A writer task
    /// that stops on its own (write error or timeout) is reported here as an
    /// error, since the connection can no longer be served.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let id = self.id;
        let Self { reader, writer, .. } = self;
        tokio::select! {
            line = reader.next() => {
                let line = line.transpose()?;
                if line.is_none() {
                    debug!(connection_id = %id, "Connection stream ended");
                }
                Ok(line)
            }
            stopped = writer_stopped(writer) => {
                stopped?;
                Err(LobbyError::ConnectionClosed)
            }
        }
    }

    /// Flush pending writes and close the transport
    ///
    /// The connection must already be out of the registry, otherwise the
    /// registry's queue handle keeps the writer alive until `close_timeout`.
    #[instrument(skip(self), fields(connection_id = %self.id))]
    pub async fn close(self, close_timeout: Duration) {
        let Self {
            reader,
            outbound,
            writer,
            ..
        } = self;
        outbound.set_state(ConnectionState::Closing);
        drop(reader);

        let state = outbound.state.clone();
        drop(outbound);

        if let Some(handle) = writer {
            let abort = handle.abort_handle();
            match timeout(close_timeout, handle).await {
                Ok(Ok(Ok(()))) => trace!("Pending writes flushed"),
                Ok(Ok(Err(e))) => debug!(error = %e, "Writer stopped with error"),
                Ok(Err(e)) => warn!(error = %e, "Writer task failed"),
                Err(_) => {
                    warn!(timeout = ?close_timeout, "Timed out flushing connection");
                    abort.abort();
                }
            }
        }

        state.store(ConnectionState::Closed.as_u8(), Ordering::Release);
        info!("Connection closed");
    }
}

impl std::fmt::Debug for LobbyConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LobbyConnection")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}

/// Wait for the writer task to stop; pending forever once it has been reaped
async fn writer_stopped(writer: &mut Option<JoinHandle<Result<()>>>) -> Result<()> {
    let Some(handle) = writer.as_mut() else {
        return std::future::pending().await;
    };
    let joined = handle.await;
    *writer = None;
    match joined {
        Ok(result) => result,
        Err(e) => Err(LobbyError::Io(std::io::Error::other(e))),
    }
}

/// Drain the outbound queue into the socket
///
/// Ends cleanly, shutting down the write half, once every [`Outbound`] clone
/// has been dropped and the queue is empty.
async fn write_loop(
    id: ConnectionId,
    mut sink: FramedWrite<OwnedWriteHalf, LineCodec>,
    mut rx: mpsc::Receiver<Line>,
    write_timeout: Duration,
) -> Result<()> {
    while let Some(line) = rx.recv().await {
        match timeout(write_timeout, sink.send(line)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(connection_id = %id, error = %e, "Write failed");
                return Err(e);
            }
            Err(_) => {
                warn!(connection_id = %id, timeout = ?write_timeout, "Write timed out");
                return Err(LobbyError::Timeout);
            }
        }
    }

    timeout(write_timeout, SinkExt::<Line>::close(&mut sink))
        .await
        .map_err(|_| LobbyError::Timeout)??;
    trace!(connection_id = %id, "Writer finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    async fn connected_pair() -> (TcpStream, TcpStream, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (server, peer_addr) = listener.accept().await.unwrap();
        let client = client_task.await.unwrap();

        (server, client, peer_addr)
    }

    #[test]
    fn test_outbound_requires_open_state() {
        let (outbound, mut rx) = Outbound::channel(4);
        assert_eq!(outbound.state(), ConnectionState::Connecting);
        assert_eq!(outbound.deliver(Line::from("early")), Delivery::NotWritable);

        outbound.set_state(ConnectionState::Open);
        assert_eq!(outbound.deliver(Line::from("hello")), Delivery::Queued);
        assert_eq!(rx.try_recv().unwrap().as_ref(), "hello");

        outbound.set_state(ConnectionState::Closing);
        assert_eq!(outbound.deliver(Line::from("late")), Delivery::NotWritable);
    }

    #[test]
    fn test_outbound_drops_when_full() {
        let (outbound, _rx) = Outbound::channel(2);
        outbound.set_state(ConnectionState::Open);

        assert_eq!(outbound.deliver(Line::from("1")), Delivery::Queued);
        assert_eq!(outbound.deliver(Line::from("2")), Delivery::Queued);
        assert_eq!(outbound.deliver(Line::from("3")), Delivery::Full);
    }

    #[test]
    fn test_outbound_not_writable_after_receiver_dropped() {
        let (outbound, rx) = Outbound::channel(2);
        outbound.set_state(ConnectionState::Open);
        drop(rx);

        assert!(!outbound.is_writable());
        assert_eq!(outbound.deliver(Line::from("gone")), Delivery::NotWritable);
    }

    #[tokio::test]
    async fn test_connection_reads_and_writes_lines() {
        let (server, mut client, peer_addr) = connected_pair().await;
        let mut connection =
            LobbyConnection::wrap(server, ConnectionId::new(1), peer_addr, &WorkerConfig::default())
                .unwrap();
        connection.set_state(ConnectionState::Open);

        client.write_all(b"first\r\nsec").await.unwrap();
        client.write_all(b"ond\n").await.unwrap();
        assert_eq!(connection.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(connection.next_line().await.unwrap().as_deref(), Some("second"));

        assert_eq!(connection.outbound().deliver(Line::from("reply")), Delivery::Queued);
        let mut reader = BufReader::new(&mut client);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "reply\n");
    }

    #[tokio::test]
    async fn test_close_flushes_pending_lines() {
        let (server, client, peer_addr) = connected_pair().await;
        let connection =
            LobbyConnection::wrap(server, ConnectionId::new(2), peer_addr, &WorkerConfig::default())
                .unwrap();
        connection.set_state(ConnectionState::Open);

        let outbound = connection.outbound();
        for i in 0..3 {
            assert_eq!(outbound.deliver(Line::from(format!("line {i}"))), Delivery::Queued);
        }
        drop(outbound);
        connection.close(Duration::from_secs(1)).await;

        let mut lines = BufReader::new(client).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line 0"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line 1"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("line 2"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (server, client, peer_addr) = connected_pair().await;
        let mut connection =
            LobbyConnection::wrap(server, ConnectionId::new(3), peer_addr, &WorkerConfig::default())
                .unwrap();
        connection.set_state(ConnectionState::Open);

        drop(client);
        assert_eq!(connection.next_line().await.unwrap(), None);
    }
}
