//! Numeric replies sent by the chat server.

#![allow(missing_docs)]

/// Registration succeeded; the session is ready.
pub const RPL_WELCOME: &str = "001";
pub const RPL_YOURHOST: &str = "002";
pub const RPL_CREATED: &str = "003";
pub const RPL_MYINFO: &str = "004";
/// Start of the message of the day.
pub const RPL_MOTDSTART: &str = "375";
pub const RPL_MOTD: &str = "372";
pub const RPL_ENDOFMOTD: &str = "376";
/// One batch of names for a joined channel.
pub const RPL_NAMREPLY: &str = "353";
/// End of the names list for a channel.
pub const RPL_ENDOFNAMES: &str = "366";
/// Unknown command; chat sends this for anything it does not support.
pub const ERR_UNKNOWNCOMMAND: &str = "421";

/// Whether `command` is part of the welcome burst that carries no
/// information for clients.
pub fn is_welcome_noise(command: &str) -> bool {
    matches!(
        command,
        RPL_YOURHOST | RPL_CREATED | RPL_MYINFO | RPL_MOTDSTART | RPL_MOTD | RPL_ENDOFMOTD
    )
}
