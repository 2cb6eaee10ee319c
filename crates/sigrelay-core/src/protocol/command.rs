//! Command names carried in `Message::cmd`.

use std::fmt;

/// Every command the relay knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SessionStart,
    SessionAccept,
    SessionReject,
    SessionCancel,
    Ice,
    Offer,
    Answer,
    /// Server-originated identity announcement.
    Welcome,
}

impl Command {
    /// Commands a client may send to another peer.
    pub const RELAYED: [Command; 7] = [
        Command::SessionStart,
        Command::SessionAccept,
        Command::SessionReject,
        Command::SessionCancel,
        Command::Ice,
        Command::Offer,
        Command::Answer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Command::SessionStart => "session-start",
            Command::SessionAccept => "session-accept",
            Command::SessionReject => "session-reject",
            Command::SessionCancel => "session-cancel",
            Command::Ice => "ice",
            Command::Offer => "offer",
            Command::Answer => "answer",
            Command::Welcome => "welcome",
        }
    }

    pub fn parse(s: &str) -> Option<Command> {
        match s {
            "session-start" => Some(Command::SessionStart),
            "session-accept" => Some(Command::SessionAccept),
            "session-reject" => Some(Command::SessionReject),
            "session-cancel" => Some(Command::SessionCancel),
            "ice" => Some(Command::Ice),
            "offer" => Some(Command::Offer),
            "answer" => Some(Command::Answer),
            "welcome" => Some(Command::Welcome),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
