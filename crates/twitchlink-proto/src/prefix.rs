//! Message origin.

use std::fmt;

use crate::error::MessageParseError;

/// Where a message came from: a server (`tmi.twitch.tv`) or a user mask
/// (`nick!user@nick.tmi.twitch.tv`), kept as received.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Prefix {
    ServerName(String),
    User(String),
}

impl Prefix {
    /// Classify a raw prefix, without the leading `:`. A dotted name with no
    /// `!` or `@` is a server; anything else is a user.
    pub fn parse(s: &str) -> Result<Self, MessageParseError> {
        if s.is_empty() || s.chars().any(|c| c == ' ' || c.is_control()) {
            return Err(MessageParseError::InvalidPrefix(s.to_owned()));
        }
        if s.contains('.') && !s.contains(['!', '@']) {
            Ok(Prefix::ServerName(s.to_owned()))
        } else {
            Ok(Prefix::User(s.to_owned()))
        }
    }

    /// Nickname of a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::User(mask) => mask.split(['!', '@']).next().filter(|n| !n.is_empty()),
            Prefix::ServerName(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(s) | Prefix::User(s) => f.write_str(s),
        }
    }
}
