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


//! Bridge between local input/output and one lobby connection
//!
//! Every non-empty trimmed input line is sent to the server as one chat
//! line, and every line from the server is written to the output. The
//! session ends when the user types an exit command, local input ends, or
//! the server closes the connection.

use crate::{ClientConfig, ClientError, Command, Result};
use futures_util::{SinkExt, StreamExt};
use lobbycast_service::LineCodec;
use std::net::SocketAddr;
use std::process::ExitCode;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, instrument, warn};

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeExit {
    /// The user typed an exit command
    UserQuit,
    /// Local input reached end of file
    InputClosed,
    /// The server closed the connection
    ServerClosed,
}

impl BridgeExit {
    /// Process exit status for this outcome
    pub fn exit_code(self) -> ExitCode {
        ExitCode::SUCCESS
    }
}

/// Connected lobby client
pub struct ChatBridge {
    peer_addr: SocketAddr,
    close_timeout: Duration,
    reader: FramedRead<OwnedReadHalf, LineCodec>,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
}

impl ChatBridge {
    /// Connect to the server named in `config`
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let address = config.address();
        debug!(%address, "Connecting");

        let stream = match timeout(config.connect_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(ClientError::ConnectionTimeout),
        };
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;
        info!(%peer_addr, "Connected to lobby");

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer_addr,
            close_timeout: config.close_timeout,
            reader: FramedRead::new(
                read_half,
                LineCodec::with_max_length(config.max_line_length),
            ),
            writer: FramedWrite::new(write_half, LineCodec::new()),
        })
    }

    /// Address of the server
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Run the session until it ends
    ///
    /// On an exit command or end of input, pending writes are flushed and
    /// the write side is shut down. The server then closes its side; lines
    /// it sends meanwhile are discarded. Transport errors are returned as
    /// [`ClientError`].
    #[instrument(skip_all, fields(peer_addr = %self.peer_addr))]
    pub async fn run<I, O>(mut self, input: I, mut output: O) -> Result<BridgeExit>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin,
    {
        let mut input = input.lines();

        let exit = loop {
            tokio::select! {
                received = self.reader.next() => match received {
                    Some(line) => {
                        let line = line?;
                        output.write_all(line.as_bytes()).await?;
                        output.write_all(b"\n").await?;
                        output.flush().await?;
                    }
                    None => {
                        info!("Server closed the connection");
                        return Ok(BridgeExit::ServerClosed);
                    }
                },
                typed = input.next_line() => match typed? {
                    Some(typed) => match Command::parse(&typed) {
                        Command::Exit => break BridgeExit::UserQuit,
                        Command::Empty => {}
                        Command::Message(message) => {
                            SinkExt::<&str>::send(&mut self.writer, message).await?;
                        }
                    },
                    None => break BridgeExit::InputClosed,
                },
            }
        };

        info!(?exit, "Leaving the lobby");
        SinkExt::<&str>::close(&mut self.writer).await?;

        // Closing with unread input would reset the connection.
        let drained = timeout(self.close_timeout, async {
            while let Some(Ok(_)) = self.reader.next().await {}
        })
        .await;
        if drained.is_err() {
            warn!(timeout = ?self.close_timeout, "Server did not close the connection");
        }
        Ok(exit)
    }
}

impl std::fmt::Debug for ChatBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatBridge")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}
