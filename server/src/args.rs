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


use clap::Parser;
use lobbycast_service::{LobbyError, Result, ServerConfig};
use std::net::SocketAddr;

/// Lobby broadcast server
#[derive(Debug, Clone, Parser)]
#[command(name = "lobbycast-server")]
#[command(about = "Relay chat lines between everyone connected to the lobby")]
#[command(version)]
pub struct ServerArgs {
    /// Address to listen on
    #[arg(long, env = "LOBBYCAST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "LOBBYCAST_PORT", default_value_t = 3000)]
    pub port: u16,
}

impl ServerArgs {
    /// Resolve the listen address and build a validated configuration
    ///
    /// Everything other than the address keeps its [`ServerConfig`] default.
    pub async fn to_config(&self) -> Result<ServerConfig> {
        let bind_address = resolve(&self.host, self.port).await?;
        let config = ServerConfig::new(bind_address);
        config.validate()?;
        Ok(config)
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| LobbyError::InvalidConfig(format!("{host} did not resolve to an address")))
}
