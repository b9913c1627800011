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


use crate::ClientConfig;
use clap::Parser;

/// Terminal client for a lobbycast server
#[derive(Debug, Clone, Parser)]
#[command(name = "lobbycast-client")]
#[command(about = "Chat with everyone in the lobby; type quit, exit or 退出连接 to leave")]
#[command(version)]
pub struct ClientArgs {
    /// Server host
    #[arg(long, env = "LOBBYCAST_HOST", default_value = crate::config::DEFAULT_HOST)]
    pub host: String,

    /// Server port
    #[arg(long, env = "LOBBYCAST_PORT", default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,
}

impl ClientArgs {
    /// Build the client configuration
    ///
    /// Everything other than the address keeps its [`ClientConfig`] default.
    pub fn to_config(&self) -> ClientConfig {
        ClientConfig::new(self.host.clone(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let args = ClientArgs::try_parse_from([
            "lobbycast-client",
            "--host",
            "lobby.local",
            "--port",
            "4000",
        ])
        .unwrap();

        let config = args.to_config();
        assert_eq!(config.address(), "lobby.local:4000");
        assert_eq!(config.connect_timeout, ClientConfig::default().connect_timeout);
    }

    #[test]
    fn test_only_host_and_port_are_accepted() {
        let result = ClientArgs::try_parse_from(["lobbycast-client", "--connect-timeout", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(ClientArgs::try_parse_from(["lobbycast-client", "--port", "-1"]).is_err());
    }
}
