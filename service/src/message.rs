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

//! Lobby message formats
//!
//! Every server-originated line is produced here. Lines are returned without
//! the trailing newline; the [`LineCodec`](crate::LineCodec) appends it.

use crate::Nickname;
use std::sync::Arc;

/// A formatted line shared by every recipient of a broadcast
pub type Line = Arc<str>;

/// Trim an inbound line, returning `None` when nothing is left
pub fn normalize(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Greeting sent only to a newly registered connection
pub fn welcome<'a, I>(nickname: &Nickname, online: I) -> Line
where
    I: IntoIterator<Item = &'a Nickname>,
{
    let online = online
        .into_iter()
        .map(Nickname::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    Line::from(format!("Welcome, {nickname}! Currently online: {online}"))
}

/// Announcement broadcast to everyone except the joining connection
pub fn joined(nickname: &Nickname) -> Line {
    Line::from(format!("{nickname} joined the game!"))
}

/// Chat relay broadcast to everyone except the sender
pub fn chat(nickname: &Nickname, message: &str) -> Line {
    Line::from(format!("{nickname}: {message}"))
}

/// Announcement broadcast to everyone once a connection has left
pub fn left(nickname: &Nickname) -> Line {
    Line::from(format!("{nickname} left the game!"))
}
