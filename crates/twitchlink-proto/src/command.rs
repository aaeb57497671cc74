//! Outgoing chat commands.
//!
//! Constructors for the lines a chat client sends, plus the slash-command
//! moderation actions chat accepts inside a `PRIVMSG`.

use std::fmt;

use crate::message::Message;

/// Capabilities requested during the chat handshake.
pub const DEFAULT_CAPABILITIES: &[&str] = &[
    "twitch.tv/tags",
    "twitch.tv/commands",
    "twitch.tv/membership",
];

/// Normalise a channel name to its `#lowercase` wire form.
///
/// ```
/// use twitchlink_proto::normalize_channel;
///
/// assert_eq!(normalize_channel("Dallas"), "#dallas");
/// assert_eq!(normalize_channel("#Dallas"), "#dallas");
/// ```
pub fn normalize_channel(name: &str) -> String {
    let bare = name.trim().trim_start_matches('#');
    format!("#{}", bare.to_ascii_lowercase())
}

impl Message {
    /// `PASS oauth:<token>`; an existing `oauth:` prefix is kept as is.
    pub fn pass(token: &str) -> Self {
        let token = if token.starts_with("oauth:") {
            token.to_owned()
        } else {
            format!("oauth:{}", token)
        };
        Message::from_parts("PASS", [token])
    }

    /// `NICK <login>`
    pub fn nick(login: &str) -> Self {
        Message::from_parts("NICK", [login.to_ascii_lowercase()])
    }

    /// `CAP REQ :<caps...>`
    pub fn cap_req<S: AsRef<str>>(caps: &[S]) -> Self {
        let caps = caps
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(" ");
        Message::from_parts("CAP", ["REQ".to_owned(), caps])
    }

    /// `JOIN #channel`
    pub fn join(channel: &str) -> Self {
        Message::from_parts("JOIN", [normalize_channel(channel)])
    }

    /// `PART #channel`
    pub fn part(channel: &str) -> Self {
        Message::from_parts("PART", [normalize_channel(channel)])
    }

    /// `PRIVMSG #channel :text`
    pub fn privmsg(channel: &str, text: &str) -> Self {
        Message::from_parts("PRIVMSG", [normalize_channel(channel), text.to_owned()])
    }

    /// A threaded reply to the message with id `parent_id`.
    pub fn reply(channel: &str, parent_id: &str, text: &str) -> Self {
        Message::privmsg(channel, text).with_tag("reply-parent-msg-id", Some(parent_id.to_owned()))
    }

    /// `PING :<token>`
    pub fn ping(token: &str) -> Self {
        Message::from_parts("PING", [token])
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Self {
        Message::from_parts("PONG", [token])
    }

    /// A moderation action in `channel`.
    pub fn moderation(channel: &str, action: &ModAction) -> Self {
        Message::privmsg(channel, &action.to_string())
    }
}

/// A slash command understood by chat.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ModAction {
    Ban { user: String, reason: Option<String> },
    Unban { user: String },
    Timeout {
        user: String,
        seconds: u32,
        reason: Option<String>,
    },
    Untimeout { user: String },
    /// Clear the chat history of the channel.
    Clear,
    /// Delete a single message by id.
    Delete { message_id: String },
    Mod { user: String },
    Unmod { user: String },
    Vip { user: String },
    Unvip { user: String },
    /// Slow mode; `None` turns it off.
    Slow(Option<u32>),
    /// Followers-only mode with a minimum follow age in minutes; `None` turns it off.
    Followers(Option<u32>),
    EmoteOnly(bool),
    SubscribersOnly(bool),
    Color(String),
    Announce(String),
    Whisper { user: String, text: String },
}

impl fmt::Display for ModAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn with_reason(f: &mut fmt::Formatter<'_>, reason: &Option<String>) -> fmt::Result {
            match reason {
                Some(r) if !r.is_empty() => write!(f, " {}", r),
                _ => Ok(()),
            }
        }

        match self {
            ModAction::Ban { user, reason } => {
                write!(f, "/ban {}", user)?;
                with_reason(f, reason)
            }
            ModAction::Unban { user } => write!(f, "/unban {}", user),
            ModAction::Timeout {
                user,
                seconds,
                reason,
            } => {
                write!(f, "/timeout {} {}", user, seconds)?;
                with_reason(f, reason)
            }
            ModAction::Untimeout { user } => write!(f, "/untimeout {}", user),
            ModAction::Clear => f.write_str("/clear"),
            ModAction::Delete { message_id } => write!(f, "/delete {}", message_id),
            ModAction::Mod { user } => write!(f, "/mod {}", user),
            ModAction::Unmod { user } => write!(f, "/unmod {}", user),
            ModAction::Vip { user } => write!(f, "/vip {}", user),
            ModAction::Unvip { user } => write!(f, "/unvip {}", user),
            ModAction::Slow(Some(secs)) => write!(f, "/slow {}", secs),
            ModAction::Slow(None) => f.write_str("/slowoff"),
            ModAction::Followers(Some(mins)) => write!(f, "/followers {}", mins),
            ModAction::Followers(None) => f.write_str("/followersoff"),
            ModAction::EmoteOnly(true) => f.write_str("/emoteonly"),
            ModAction::EmoteOnly(false) => f.write_str("/emoteonlyoff"),
            ModAction::SubscribersOnly(true) => f.write_str("/subscribers"),
            ModAction::SubscribersOnly(false) => f.write_str("/subscribersoff"),
            ModAction::Color(color) => write!(f, "/color {}", color),
            ModAction::Announce(text) => write!(f, "/announce {}", text),
            ModAction::Whisper { user, text } => write!(f, "/w {} {}", user, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_lines() {
        assert_eq!(Message::pass("abc123").to_string(), "PASS oauth:abc123");
        assert_eq!(Message::pass("oauth:abc123").to_string(), "PASS oauth:abc123");
        assert_eq!(Message::nick("Ronni").to_string(), "NICK ronni");
        assert_eq!(
            Message::cap_req(DEFAULT_CAPABILITIES).to_string(),
            "CAP REQ :twitch.tv/tags twitch.tv/commands twitch.tv/membership"
        );
        assert_eq!(
            Message::cap_req(&["twitch.tv/tags"]).to_string(),
            "CAP REQ twitch.tv/tags"
        );
    }

    #[test]
    fn test_channel_commands_normalise() {
        assert_eq!(Message::join("Dallas").to_string(), "JOIN #dallas");
        assert_eq!(Message::part("#DALLAS").to_string(), "PART #dallas");
        assert_eq!(
            Message::privmsg("dallas", "hello chat").to_string(),
            "PRIVMSG #dallas :hello chat"
        );
    }

    #[test]
    fn test_reply_carries_parent_tag() {
        let msg = Message::reply("dallas", "885196de-cb67-427a-baa8-82f9b0fcd05f", "thanks!");
        assert_eq!(
            msg.to_string(),
            "@reply-parent-msg-id=885196de-cb67-427a-baa8-82f9b0fcd05f PRIVMSG #dallas thanks!"
        );
    }

    #[test]
    fn test_moderation_actions() {
        let timeout = ModAction::Timeout {
            user: "spammer".into(),
            seconds: 600,
            reason: Some("links".into()),
        };
        assert_eq!(
            Message::moderation("dallas", &timeout).to_string(),
            "PRIVMSG #dallas :/timeout spammer 600 links"
        );
        assert_eq!(ModAction::Slow(None).to_string(), "/slowoff");
        assert_eq!(ModAction::Clear.to_string(), "/clear");
        assert_eq!(
            ModAction::Ban {
                user: "x".into(),
                reason: None
            }
            .to_string(),
            "/ban x"
        );
    }
}
