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


//! # Lobbycast Client
//!
//! Bridges a terminal to a lobbycast server: each line typed is sent to the
//! lobby and each line from the lobby is printed.
//!
//! ## Quick Start
//!
//! ```no_run
//! use lobbycast_client::{ChatBridge, ClientConfig};
//! use tokio::io::BufReader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("127.0.0.1", 3000);
//!     let bridge = ChatBridge::connect(&config).await?;
//!
//!     let exit = bridge
//!         .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
//!         .await?;
//!     println!("session ended: {exit:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Leaving
//!
//! Typing `quit`, `exit` or `退出连接` ends the session without sending the
//! line. So does closing local input. Either way pending lines are flushed
//! before the connection is shut down.

mod args;
mod bridge;
mod command;
mod config;
mod error;

pub use args::ClientArgs;
pub use bridge::{BridgeExit, ChatBridge};
pub use command::{Command, EXIT_COMMANDS};
pub use config::{ClientConfig, DEFAULT_HOST, DEFAULT_MAX_SERVER_LINE_LENGTH, DEFAULT_PORT};
pub use error::{ClientError, Result};
