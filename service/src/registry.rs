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

//! Registry of players currently in the lobby
//!
//! The registry is the single source of truth for who is online. Mutations
//! take the write lock, iteration takes the read lock, and nothing awaits
//! while a guard is held: delivering a line only enqueues it on the
//! recipient's bounded queue. Entries iterate in connection order.

use crate::{ConnectionId, LobbyError, Nickname, Outbound, Result};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A registered player
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    nickname: Nickname,
    outbound: Outbound,
}

impl RegistryEntry {
    /// Get the player's nickname
    pub fn nickname(&self) -> &Nickname {
        &self.nickname
    }

    /// Get the player's outbound queue
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }
}

/// Concurrent map of connection ID to registered player
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<ConnectionId, RegistryEntry>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ConnectionId, RegistryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<ConnectionId, RegistryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a player
    pub fn add(&self, id: ConnectionId, nickname: Nickname, outbound: Outbound) -> Result<()> {
        self.add_with(id, nickname, outbound, |_, _| ())
    }

    /// Register a player and run `on_insert` before any other task can
    /// observe the new entry
    ///
    /// `on_insert` receives the nicknames of everyone now registered
    /// (including the new player) and the new entry. It runs under the write
    /// lock, so anything it queues on the entry precedes every broadcast that
    /// could reach the new player.
    pub fn add_with<F, R>(
        &self,
        id: ConnectionId,
        nickname: Nickname,
        outbound: Outbound,
        on_insert: F,
    ) -> Result<R>
    where
        F: FnOnce(&[Nickname], &RegistryEntry) -> R,
    {
        let mut entries = self.write();
        if entries.contains_key(&id) {
            return Err(LobbyError::DuplicateConnection(id));
        }
        entries.insert(id, RegistryEntry { nickname, outbound });

        let online = entries
            .values()
            .map(|entry| entry.nickname.clone())
            .collect::<Vec<_>>();
        Ok(on_insert(&online, &entries[&id]))
    }

    /// Unregister a player
    ///
    /// Returns the removed entry, or `None` if the player was not registered.
    /// Repeated calls for the same ID are harmless.
    pub fn remove(&self, id: ConnectionId) -> Option<RegistryEntry> {
        self.write().remove(&id)
    }

    /// Unregister everyone, returning how many entries were dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Check if a connection is registered
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.read().contains_key(&id)
    }

    /// Get a registered player's nickname
    pub fn nickname(&self, id: ConnectionId) -> Option<Nickname> {
        self.read().get(&id).map(|entry| entry.nickname.clone())
    }

    /// Get the number of registered players
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if nobody is registered
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Point-in-time list of registered players
    pub fn snapshot(&self) -> Vec<(ConnectionId, Nickname)> {
        self.read()
            .iter()
            .map(|(id, entry)| (*id, entry.nickname.clone()))
            .collect()
    }

    /// Point-in-time list of registered nicknames
    pub fn all_nicknames(&self) -> Vec<Nickname> {
        self.read()
            .values()
            .map(|entry| entry.nickname.clone())
            .collect()
    }

    /// Visit every entry except `exclude` under one read lock
    pub(crate) fn for_each_except<F>(&self, exclude: Option<ConnectionId>, mut f: F)
    where
        F: FnMut(ConnectionId, &RegistryEntry),
    {
        for (id, entry) in self.read().iter() {
            if Some(*id) != exclude {
                f(*id, entry);
            }
        }
    }

    /// Run `f` on one entry under the read lock
    pub(crate) fn with_entry<F, R>(&self, id: ConnectionId, f: F) -> Option<R>
    where
        F: FnOnce(&RegistryEntry) -> R,
    {
        self.read().get(&id).map(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionState;

    fn open_outbound() -> Outbound {
        let (outbound, rx) = Outbound::channel(8);
        outbound.set_state(ConnectionState::Open);
        // Keep the queue open for the test's lifetime.
        std::mem::forget(rx);
        outbound
    }

    #[test]
    fn test_add_and_lookup() {
        let registry = Registry::new();
        assert!(registry.is_empty());

        registry
            .add(ConnectionId::new(1), Nickname::new("Player_000001"), open_outbound())
            .unwrap();
        registry
            .add(ConnectionId::new(2), Nickname::new("Player_000002"), open_outbound())
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(ConnectionId::new(1)));
        assert_eq!(
            registry.nickname(ConnectionId::new(2)).unwrap().as_str(),
            "Player_000002"
        );
        assert_eq!(registry.nickname(ConnectionId::new(3)), None);
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let registry = Registry::new();
        let id = ConnectionId::new(7);
        registry.add(id, Nickname::new("first"), open_outbound()).unwrap();

        let err = registry
            .add(id, Nickname::new("second"), open_outbound())
            .unwrap_err();
        assert!(matches!(err, LobbyError::DuplicateConnection(dup) if dup == id));
        assert_eq!(registry.nickname(id).unwrap().as_str(), "first");
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = Registry::new();
        let id = ConnectionId::new(1);
        registry.add(id, Nickname::new("Player_000001"), open_outbound()).unwrap();

        let removed = registry.remove(id).unwrap();
        assert_eq!(removed.nickname().as_str(), "Player_000001");
        assert!(registry.remove(id).is_none());
        assert!(registry.remove(ConnectionId::new(99)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_add_with_sees_everyone_including_new_entry() {
        let registry = Registry::new();
        registry
            .add(ConnectionId::new(1), Nickname::new("A"), open_outbound())
            .unwrap();

        let online = registry
            .add_with(
                ConnectionId::new(2),
                Nickname::new("B"),
                open_outbound(),
                |online, entry| {
                    assert_eq!(entry.nickname().as_str(), "B");
                    online
                        .iter()
                        .map(|n| n.as_str().to_string())
                        .collect::<Vec<_>>()
                },
            )
            .unwrap();

        assert_eq!(online, vec!["A", "B"]);
    }

    #[test]
    fn test_snapshot_in_connection_order() {
        let registry = Registry::new();
        for id in [3, 1, 2] {
            registry
                .add(ConnectionId::new(id), Nickname::new(format!("P{id}")), open_outbound())
                .unwrap();
        }

        let ids = registry
            .snapshot()
            .into_iter()
            .map(|(id, _)| id.as_u64())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);

        let names = registry.all_nicknames();
        assert_eq!(names.len(), 3);
        assert_eq!(names[0].as_str(), "P1");
    }

    #[test]
    fn test_for_each_except_skips_excluded() {
        let registry = Registry::new();
        for id in 1..=3 {
            registry
                .add(ConnectionId::new(id), Nickname::new(format!("P{id}")), open_outbound())
                .unwrap();
        }

        let mut seen = Vec::new();
        registry.for_each_except(Some(ConnectionId::new(2)), |id, _| seen.push(id.as_u64()));
        assert_eq!(seen, vec![1, 3]);

        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
    }
}
