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

//! Broadcast engine
//!
//! The lobby turns connection lifecycle events into lines for the registered
//! players:
//!
//! - a new player gets a welcome listing everyone online, and everyone else
//!   learns that the player joined
//! - a non-empty chat line is relayed to everyone except its sender
//! - a player that leaves is announced to everyone still registered
//!
//! A broadcast walks the registry once and queues the line for each
//! writable recipient. Recipients that are closing, closed, or backed up are
//! skipped without affecting the rest.

use crate::connection::Delivery;
use crate::message::{self, Line};
use crate::{ConnectionId, Nickname, Outbound, Registry, Result, ServerMetrics};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Per-recipient outcome of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Number of recipients considered
    pub total: usize,
    /// Number of recipients the line was queued for
    pub delivered: usize,
    /// Number of recipients skipped (not writable or queue full)
    pub skipped: usize,
}

impl BroadcastResult {
    /// Check if every recipient received the line
    pub fn all_delivered(&self) -> bool {
        self.skipped == 0
    }
}

/// A player that has left the lobby
#[derive(Debug, Clone)]
pub struct Departure {
    /// Nickname of the player that left
    pub nickname: Nickname,
    /// Outcome of the leave announcement
    pub announced: BroadcastResult,
}

/// Registry plus the broadcast rules that operate on it
#[derive(Debug)]
pub struct Lobby {
    registry: Registry,
    metrics: Arc<ServerMetrics>,
}

impl Lobby {
    /// Create an empty lobby
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            registry: Registry::new(),
            metrics,
        }
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Queue `line` for every registered player except `exclude`
    pub fn broadcast(&self, line: Line, exclude: Option<ConnectionId>) -> BroadcastResult {
        let mut result = BroadcastResult::default();
        self.registry.for_each_except(exclude, |id, entry| {
            result.total += 1;
            match entry.outbound().deliver(line.clone()) {
                Delivery::Queued => result.delivered += 1,
                Delivery::Full | Delivery::NotWritable => {
                    trace!(connection_id = %id, "Skipped broadcast recipient");
                    result.skipped += 1;
                }
            }
        });
        self.metrics.deliveries(result.delivered, result.skipped);
        result
    }

    /// Queue `line` for one registered player
    pub fn send_to(&self, id: ConnectionId, line: Line) -> Option<Delivery> {
        self.registry
            .with_entry(id, |entry| entry.outbound().deliver(line))
    }

    /// Register a new player, greet them, and announce them to everyone else
    ///
    /// The welcome is queued under the registry write lock, so it is always
    /// the first line the new player receives.
    pub fn admit(
        &self,
        id: ConnectionId,
        nickname: Nickname,
        outbound: Outbound,
    ) -> Result<BroadcastResult> {
        let announcement = message::joined(&nickname);
        let greeted = nickname.clone();
        self.registry.add_with(id, nickname, outbound, |online, entry| {
            let welcome = message::welcome(&greeted, online);
            if entry.outbound().deliver(welcome) != Delivery::Queued {
                warn!(connection_id = %id, "Failed to queue welcome");
            }
        })?;
        debug!(connection_id = %id, online = self.registry.len(), "Player admitted");
        Ok(self.broadcast(announcement, Some(id)))
    }

    /// Relay a chat line from `from` to everyone else
    ///
    /// Returns `None` when the line is empty after trimming; nothing is sent.
    pub fn relay(&self, from: ConnectionId, nickname: &Nickname, raw: &str) -> Option<BroadcastResult> {
        self.metrics.line_received();
        let Some(text) = message::normalize(raw) else {
            self.metrics.empty_line();
            return None;
        };
        self.metrics.message_relayed();
        debug!(connection_id = %from, %nickname, text, "Relaying message");
        Some(self.broadcast(message::chat(nickname, text), Some(from)))
    }

    /// Unregister a player and announce the departure to everyone left
    ///
    /// Returns `None` if the player was not registered, in which case
    /// nothing is announced. Calling this twice announces once.
    pub fn depart(&self, id: ConnectionId) -> Option<Departure> {
        let entry = self.registry.remove(id)?;
        let nickname = entry.nickname().clone();
        drop(entry);
        let announced = self.broadcast(message::left(&nickname), None);
        debug!(connection_id = %id, online = self.registry.len(), "Player departed");
        Some(Departure { nickname, announced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionState;
    use tokio::sync::mpsc;
    use tracing_test::traced_test;

    struct Player {
        id: ConnectionId,
        nickname: Nickname,
        outbound: Outbound,
        rx: mpsc::Receiver<Line>,
    }

    impl Player {
        fn new(id: u64, capacity: usize) -> Self {
            let (outbound, rx) = Outbound::channel(capacity);
            outbound.set_state(ConnectionState::Open);
            Self {
                id: ConnectionId::new(id),
                nickname: Nickname::new(format!("Player_00000{id}")),
                outbound,
                rx,
            }
        }

        fn join(&self, lobby: &Lobby) -> BroadcastResult {
            lobby
                .admit(self.id, self.nickname.clone(), self.outbound.clone())
                .unwrap()
        }

        fn received(&mut self) -> Vec<String> {
            let mut lines = Vec::new();
            while let Ok(line) = self.rx.try_recv() {
                lines.push(line.to_string());
            }
            lines
        }
    }

    fn lobby() -> Lobby {
        Lobby::new(Arc::new(ServerMetrics::new()))
    }

    #[test]
    fn test_three_player_session() {
        let lobby = lobby();
        let mut a = Player::new(1, 16);
        let mut b = Player::new(2, 16);
        let mut c = Player::new(3, 16);

        a.join(&lobby);
        b.join(&lobby);
        c.join(&lobby);
        lobby.relay(b.id, &b.nickname, "hi");
        lobby.depart(a.id);

        assert_eq!(
            a.received(),
            vec![
                "Welcome, Player_000001! Currently online: Player_000001",
                "Player_000002 joined the game!",
                "Player_000003 joined the game!",
                "Player_000002: hi",
            ]
        );
        assert_eq!(
            b.received(),
            vec![
                "Welcome, Player_000002! Currently online: Player_000001, Player_000002",
                "Player_000003 joined the game!",
                "Player_000001 left the game!",
            ]
        );
        assert_eq!(
            c.received(),
            vec![
                "Welcome, Player_000003! Currently online: Player_000001, Player_000002, Player_000003",
                "Player_000002: hi",
                "Player_000001 left the game!",
            ]
        );
    }

    #[test]
    fn test_join_excludes_new_player() {
        let lobby = lobby();
        let a = Player::new(1, 4);
        let b = Player::new(2, 4);

        assert_eq!(a.join(&lobby).total, 0);
        let result = b.join(&lobby);
        assert_eq!(result.total, 1);
        assert_eq!(result.delivered, 1);
    }

    #[test]
    fn test_empty_lines_are_not_relayed() {
        let lobby = lobby();
        let a = Player::new(1, 4);
        let mut b = Player::new(2, 4);
        a.join(&lobby);
        b.join(&lobby);
        b.received();

        assert!(lobby.relay(a.id, &a.nickname, "").is_none());
        assert!(lobby.relay(a.id, &a.nickname, "   \r").is_none());
        assert!(b.received().is_empty());

        let result = lobby.relay(a.id, &a.nickname, "  padded  ").unwrap();
        assert_eq!(result.delivered, 1);
        assert_eq!(b.received(), vec!["Player_000001: padded"]);
    }

    #[test]
    #[traced_test]
    fn test_relay_logs_sender_and_text() {
        let lobby = lobby();
        let a = Player::new(1, 16);
        a.join(&lobby);

        lobby.relay(a.id, &a.nickname, "  where is everyone  ");
        assert!(logs_contain("Relaying message"));
        assert!(logs_contain("nickname=Player_000001"));
        assert!(logs_contain("where is everyone"));
    }

    #[test]
    fn test_depart_announces_once() {
        let lobby = lobby();
        let a = Player::new(1, 4);
        let mut b = Player::new(2, 4);
        a.join(&lobby);
        b.join(&lobby);
        b.received();

        let departure = lobby.depart(a.id).unwrap();
        assert_eq!(departure.nickname.as_str(), "Player_000001");
        assert!(lobby.depart(a.id).is_none());
        assert_eq!(b.received(), vec!["Player_000001 left the game!"]);
    }

    #[test]
    fn test_slow_recipient_does_not_block_others() {
        let lobby = lobby();
        let mut slow = Player::new(1, 1);
        let mut fast = Player::new(2, 16);
        let sender = Player::new(3, 16);
        slow.join(&lobby);
        fast.join(&lobby);
        sender.join(&lobby);
        // `slow` still holds its welcome; its queue is full.
        fast.received();

        let result = lobby.relay(sender.id, &sender.nickname, "burst").unwrap();
        assert_eq!(result.total, 2);
        assert_eq!(result.delivered, 1);
        assert_eq!(result.skipped, 1);
        assert!(!result.all_delivered());
        assert_eq!(fast.received(), vec!["Player_000003: burst"]);
        assert_eq!(slow.received().len(), 1);
    }

    #[test]
    fn test_closing_recipient_is_skipped() {
        let lobby = lobby();
        let mut a = Player::new(1, 4);
        let b = Player::new(2, 4);
        a.join(&lobby);
        b.join(&lobby);
        a.received();

        a.outbound.set_state(ConnectionState::Closing);
        let result = lobby.relay(b.id, &b.nickname, "anyone?").unwrap();
        assert_eq!(result.skipped, 1);
        assert!(a.received().is_empty());
    }

    #[test]
    fn test_send_to_single_player() {
        let lobby = lobby();
        let mut a = Player::new(1, 4);
        a.join(&lobby);
        a.received();

        assert_eq!(
            lobby.send_to(a.id, Line::from("direct")),
            Some(Delivery::Queued)
        );
        assert_eq!(lobby.send_to(ConnectionId::new(9), Line::from("nobody")), None);
        assert_eq!(a.received(), vec!["direct"]);
    }
}
