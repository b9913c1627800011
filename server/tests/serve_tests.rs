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


//! Running the server front end end to end

use clap::Parser;
use lobbycast_server::{ServerArgs, serve};
use lobbycast_service::LobbyError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn connect_with_retry(port: u16) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(("127.0.0.1", port)).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never accepted on port {port}");
}

#[tokio::test]
async fn test_serve_until_shutdown() {
    let port = free_port().await;
    let args = ServerArgs::try_parse_from([
        "lobbycast-server",
        "--host",
        "127.0.0.1",
        "--port",
        &port.to_string(),
    ])
    .unwrap();
    let config = args.to_config().await.unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(config, async {
        let _ = stop_rx.await;
    }));

    let client = connect_with_retry(port).await;
    let mut lines = BufReader::new(client).lines();
    let welcome = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(welcome.starts_with("Welcome, Player_"));

    stop_tx.send(()).unwrap();
    timeout(Duration::from_secs(10), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let closed = timeout(Duration::from_secs(5), lines.next_line())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closed, None);
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = occupied.local_addr().unwrap().port();

    let args = ServerArgs::try_parse_from([
        "lobbycast-server",
        "--host",
        "127.0.0.1",
        "--port",
        &port.to_string(),
    ])
    .unwrap();
    let config = args.to_config().await.unwrap();

    let result = serve(config, std::future::pending()).await;
    assert!(matches!(result, Err(LobbyError::Io(_))));
}
