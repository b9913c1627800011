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

//! Command line front end for the lobby server
//!
//! [`ServerArgs`] turns flags and environment variables into a
//! [`ServerConfig`](lobbycast_service::ServerConfig); [`serve`] runs a
//! server until a shutdown future resolves.

mod args;

pub use args::ServerArgs;

use lobbycast_service::{LobbyServer, NoopHandler, Result, ServerConfig};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Bind, serve, and shut down once `shutdown` resolves
///
/// A bind failure is returned before anything is served.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let server = LobbyServer::new(config).await?;
    server.start(Arc::new(NoopHandler)).await?;
    info!(bind_address = %server.bind_address(), "Lobby server started");

    shutdown.await;

    info!(snapshot = %server.snapshot(), "Stopping lobby server");
    server.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_serve_logs_lobby_lifecycle() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
        serve(config, std::future::ready(())).await.unwrap();

        assert!(logs_contain("Lobby server started"));
        assert!(logs_contain("Stopping lobby server"));
        assert!(!logs_contain("Game server"));
    }
}
