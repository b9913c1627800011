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


//! `lobbycast-client` binary

use clap::Parser;
use lobbycast_client::{ChatBridge, ClientArgs};
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::error;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only lobby lines.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = ClientArgs::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(run(args));
    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_background();
    code
}

async fn run(args: ClientArgs) -> ExitCode {
    let config = args.to_config();
    let bridge = match ChatBridge::connect(&config).await {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(address = %config.address(), error = %e, "Unable to connect to the lobby");
            return ExitCode::FAILURE;
        }
    };

    let input = BufReader::new(tokio::io::stdin());
    match bridge.run(input, tokio::io::stdout()).await {
        Ok(exit) => exit.exit_code(),
        Err(e) => {
            error!(error = %e, "Connection error");
            ExitCode::FAILURE
        }
    }
}
