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

//! Observer hooks for lobby events

use crate::{ConnectionId, LobbyError, Nickname};
use async_trait::async_trait;

/// Server event handler trait
///
/// Hooks observe the lobby; they cannot change what is broadcast. Each hook
/// runs on the connection's worker task after the corresponding lines have
/// been queued. All methods have default implementations that do nothing.
///
/// # Example
///
/// ```no_run
/// use lobbycast_service::{ConnectionId, Nickname, ServerHandler};
/// use async_trait::async_trait;
///
/// struct ChatLog;
///
/// #[async_trait]
/// impl ServerHandler for ChatLog {
///     async fn on_message(&self, _id: ConnectionId, nickname: &Nickname, message: &str) {
///         println!("{nickname}: {message}");
///     }
/// }
/// ```
#[async_trait]
pub trait ServerHandler: Send + Sync + 'static {
    /// Called once a player is registered and announced
    async fn on_join(&self, _id: ConnectionId, _nickname: &Nickname) {}

    /// Called for each relayed chat message, already trimmed
    async fn on_message(&self, _id: ConnectionId, _nickname: &Nickname, _message: &str) {}

    /// Called when a connection fails
    ///
    /// The player is removed and announced as having left after this returns.
    async fn on_error(&self, _id: ConnectionId, _nickname: &Nickname, _error: &LobbyError) {}

    /// Called once the departure has been announced
    async fn on_leave(&self, _id: ConnectionId, _nickname: &Nickname) {}
}

/// Handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

#[async_trait]
impl ServerHandler for NoopHandler {}

type LifecycleFn = Box<dyn Fn(ConnectionId, &Nickname) + Send + Sync + 'static>;
type MessageFn = Box<dyn Fn(ConnectionId, &Nickname, &str) + Send + Sync + 'static>;
type ErrorFn = Box<dyn Fn(ConnectionId, &Nickname, &LobbyError) + Send + Sync + 'static>;

/// Callback-based handler implementation
///
/// Closures instead of a `ServerHandler` impl; unset callbacks are skipped.
///
/// ```no_run
/// use lobbycast_service::CallbackHandler;
/// use std::sync::Arc;
///
/// let handler = Arc::new(CallbackHandler {
///     on_join: Some(Box::new(|id, nickname| println!("{id} is {nickname}"))),
///     ..Default::default()
/// });
/// ```
#[derive(Default)]
pub struct CallbackHandler {
    /// Called when a player joins
    pub on_join: Option<LifecycleFn>,
    /// Called for each relayed chat message
    pub on_message: Option<MessageFn>,
    /// Called on error
    pub on_error: Option<ErrorFn>,
    /// Called when a player leaves
    pub on_leave: Option<LifecycleFn>,
}

#[async_trait]
impl ServerHandler for CallbackHandler {
    async fn on_join(&self, id: ConnectionId, nickname: &Nickname) {
        if let Some(ref f) = self.on_join {
            f(id, nickname);
        }
    }

    async fn on_message(&self, id: ConnectionId, nickname: &Nickname, message: &str) {
        if let Some(ref f) = self.on_message {
            f(id, nickname, message);
        }
    }

    async fn on_error(&self, id: ConnectionId, nickname: &Nickname, error: &LobbyError) {
        if let Some(ref f) = self.on_error {
            f(id, nickname, error);
        }
    }

    async fn on_leave(&self, id: ConnectionId, nickname: &Nickname) {
        if let Some(ref f) = self.on_leave {
            f(id, nickname);
        }
    }
}
