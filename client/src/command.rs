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


//! Local input commands

/// Inputs that end the session instead of being sent (case-sensitive)
pub const EXIT_COMMANDS: [&str; 3] = ["退出连接", "exit", "quit"];

/// One line of local input, classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Leave the lobby
    Exit,
    /// Nothing to send
    Empty,
    /// Chat message, already trimmed
    Message(&'a str),
}

impl<'a> Command<'a> {
    /// Classify a line of input
    pub fn parse(input: &'a str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            Command::Empty
        } else if EXIT_COMMANDS.contains(&trimmed) {
            Command::Exit
        } else {
            Command::Message(trimmed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_commands() {
        assert_eq!(Command::parse("quit"), Command::Exit);
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("退出连接"), Command::Exit);
        assert_eq!(Command::parse("  quit \r"), Command::Exit);
    }

    #[test]
    fn test_exit_commands_are_case_sensitive() {
        assert_eq!(Command::parse("QUIT"), Command::Message("QUIT"));
        assert_eq!(Command::parse("Exit"), Command::Message("Exit"));
        assert_eq!(Command::parse("quit now"), Command::Message("quit now"));
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse(" \t "), Command::Empty);
    }

    #[test]
    fn test_messages_are_trimmed() {
        assert_eq!(Command::parse("  hello there \n"), Command::Message("hello there"));
    }
}
