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

//! Nickname generation
//!
//! Nicknames are `Player_` followed by the last six decimal digits of the
//! current Unix time in milliseconds. Two connections accepted in the same
//! millisecond (or exactly 1000 seconds apart) receive the same nickname.
//! [`NicknameStrategy::TimestampWithSequence`] appends a process-wide
//! sequence number for deployments that need unambiguous attribution.

use crate::Nickname;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of every generated nickname
pub const NICKNAME_PREFIX: &str = "Player_";

static SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// How nicknames are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NicknameStrategy {
    /// `Player_` + last 6 digits of epoch milliseconds; may collide
    #[default]
    Timestamp,
    /// `Player_` + last 6 digits of epoch milliseconds + `-{sequence}`
    TimestampWithSequence,
}

impl NicknameStrategy {
    /// Generate a nickname from the current wall clock
    pub fn generate(self) -> Nickname {
        self.generate_at(epoch_millis())
    }

    /// Generate a nickname for the given Unix time in milliseconds
    pub fn generate_at(self, epoch_millis: u128) -> Nickname {
        let fragment = timestamp_fragment(epoch_millis);
        match self {
            NicknameStrategy::Timestamp => Nickname::from(format!("{NICKNAME_PREFIX}{fragment}")),
            NicknameStrategy::TimestampWithSequence => {
                let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
                Nickname::from(format!("{NICKNAME_PREFIX}{fragment}-{seq}"))
            }
        }
    }
}

/// Last six decimal digits of a millisecond timestamp, zero padded
pub fn timestamp_fragment(epoch_millis: u128) -> String {
    format!("{:06}", epoch_millis % 1_000_000)
}

fn epoch_millis() -> u128 {
    // A clock set before 1970 degrades to a constant fragment.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
