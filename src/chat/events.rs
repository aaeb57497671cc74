//! Typed chat events.
//!
//! Each known command becomes a record built from the parsed [`Message`];
//! anything else surfaces as [`ChatEvent::Unsupported`] with the raw line.

use chrono::{DateTime, Utc};
use twitchlink_proto::Message;

/// A typed notification from the chat connection.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// `001`: the server accepted the login.
    Welcome { login: String },
    Privmsg(ChatMessage),
    Whisper(Whisper),
    Join { channel: String, user: String },
    Part { channel: String, user: String },
    /// A complete membership listing (`353` batches flushed by `366`).
    Names { channel: String, users: Vec<String> },
    Notice(Notice),
    UserNotice(UserNotice),
    ClearChat(ClearChat),
    ClearMsg(ClearMsg),
    RoomState(RoomState),
    UserState { channel: String, user: UserTags },
    GlobalUserState(UserTags),
    HostTarget(HostTarget),
    CapAck(Vec<String>),
    CapNak(Vec<String>),
    /// A line with no typed handler.
    Unsupported { command: String, raw: String },
}

/// A chat badge, e.g. `subscriber/12`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub name: String,
    pub version: String,
}

/// Parse a `badges` tag value (`name/version,name/version`).
pub fn parse_badges(value: Option<&str>) -> Vec<Badge> {
    let Some(value) = value else {
        return Vec::new();
    };
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|badge| match badge.split_once('/') {
            Some((name, version)) => Badge {
                name: name.to_owned(),
                version: version.to_owned(),
            },
            None => Badge {
                name: badge.to_owned(),
                version: String::new(),
            },
        })
        .collect()
}

fn sent_at(msg: &Message) -> Option<DateTime<Utc>> {
    msg.tag_value("tmi-sent-ts")
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn tag_owned(msg: &Message, key: &str) -> Option<String> {
    msg.non_empty_tag(key).map(str::to_owned)
}

fn tag_flag(msg: &Message, key: &str) -> Option<bool> {
    msg.tag_value(key).map(|v| v != "0" && !v.is_empty())
}

fn tag_number<T: std::str::FromStr>(msg: &Message, key: &str) -> Option<T> {
    msg.tag_value(key).and_then(|v| v.parse().ok())
}

fn sender(msg: &Message) -> String {
    msg.source_nickname().unwrap_or_default().to_owned()
}

/// Split a CTCP `ACTION` (`/me`) out of a message body.
fn strip_action(text: &str) -> (&str, bool) {
    match text
        .strip_prefix("\u{1}ACTION ")
        .map(|rest| rest.strip_suffix('\u{1}').unwrap_or(rest))
    {
        Some(body) => (body, true),
        None => (text, false),
    }
}

/// A channel message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub channel: String,
    pub login: String,
    pub display_name: Option<String>,
    pub user_id: Option<String>,
    pub id: Option<String>,
    pub text: String,
    pub is_action: bool,
    pub emote_only: bool,
    pub bits: Option<u32>,
    pub color: Option<String>,
    pub badges: Vec<Badge>,
    pub reply_parent_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.param(0)?.to_owned();
        let (text, is_action) = strip_action(msg.param(1).unwrap_or_default());
        Some(Self {
            channel,
            login: sender(msg),
            display_name: tag_owned(msg, "display-name"),
            user_id: tag_owned(msg, "user-id"),
            id: tag_owned(msg, "id"),
            text: text.to_owned(),
            is_action,
            emote_only: tag_flag(msg, "emote-only").unwrap_or(false),
            bits: tag_number(msg, "bits"),
            color: tag_owned(msg, "color"),
            badges: parse_badges(msg.tag_value("badges")),
            reply_parent_id: tag_owned(msg, "reply-parent-msg-id"),
            sent_at: sent_at(msg),
        })
    }

    /// Name to show for the sender.
    pub fn author(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.login)
    }
}

/// A private message to the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whisper {
    pub from: String,
    pub to: String,
    pub text: String,
    pub thread_id: Option<String>,
    pub message_id: Option<String>,
}

impl Whisper {
    pub fn from_message(msg: &Message) -> Option<Self> {
        Some(Self {
            from: sender(msg),
            to: msg.param(0)?.to_owned(),
            text: msg.param(1).unwrap_or_default().to_owned(),
            thread_id: tag_owned(msg, "thread-id"),
            message_id: tag_owned(msg, "message-id"),
        })
    }
}

/// A server notice, optionally scoped to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// `None` for global notices (`*`).
    pub channel: Option<String>,
    pub msg_id: Option<String>,
    pub text: String,
}

impl Notice {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            channel: msg
                .param(0)
                .filter(|c| c.starts_with('#'))
                .map(str::to_owned),
            msg_id: tag_owned(msg, "msg-id"),
            text: msg.trailing().unwrap_or_default().to_owned(),
        }
    }
}

/// Subscriptions, raids, and other channel announcements.
#[derive(Debug, Clone, PartialEq)]
pub struct UserNotice {
    pub channel: String,
    pub msg_id: Option<String>,
    pub login: Option<String>,
    pub display_name: Option<String>,
    pub system_msg: Option<String>,
    /// The user's own message, if they attached one.
    pub text: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl UserNotice {
    pub fn from_message(msg: &Message) -> Option<Self> {
        Some(Self {
            channel: msg.param(0)?.to_owned(),
            msg_id: tag_owned(msg, "msg-id"),
            login: tag_owned(msg, "login"),
            display_name: tag_owned(msg, "display-name"),
            system_msg: tag_owned(msg, "system-msg"),
            text: msg.param(1).map(str::to_owned),
            sent_at: sent_at(msg),
        })
    }
}

/// What a `CLEARCHAT` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearChatAction {
    /// The whole chat was cleared.
    Clear,
    Ban { user: String },
    Timeout { user: String, seconds: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearChat {
    pub channel: String,
    pub action: ClearChatAction,
    pub target_user_id: Option<String>,
}

impl ClearChat {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.param(0)?.to_owned();
        let action = match msg.param(1) {
            None => ClearChatAction::Clear,
            Some(user) => match tag_number(msg, "ban-duration") {
                Some(seconds) => ClearChatAction::Timeout {
                    user: user.to_owned(),
                    seconds,
                },
                None => ClearChatAction::Ban {
                    user: user.to_owned(),
                },
            },
        };
        Some(Self {
            channel,
            action,
            target_user_id: tag_owned(msg, "target-user-id"),
        })
    }
}

/// A single deleted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearMsg {
    pub channel: String,
    pub login: Option<String>,
    pub target_msg_id: Option<String>,
    pub text: String,
}

impl ClearMsg {
    pub fn from_message(msg: &Message) -> Option<Self> {
        Some(Self {
            channel: msg.param(0)?.to_owned(),
            login: tag_owned(msg, "login"),
            target_msg_id: tag_owned(msg, "target-msg-id"),
            text: msg.param(1).unwrap_or_default().to_owned(),
        })
    }
}

/// Channel settings. Fields are `None` when the update did not carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    pub channel: String,
    pub room_id: Option<String>,
    pub emote_only: Option<bool>,
    /// Minimum follow age in minutes; `-1` means off.
    pub followers_only: Option<i32>,
    pub unique_chat: Option<bool>,
    pub slow: Option<u32>,
    pub subs_only: Option<bool>,
}

impl RoomState {
    pub fn from_message(msg: &Message) -> Option<Self> {
        Some(Self {
            channel: msg.param(0)?.to_owned(),
            room_id: tag_owned(msg, "room-id"),
            emote_only: tag_flag(msg, "emote-only"),
            followers_only: tag_number(msg, "followers-only"),
            unique_chat: tag_flag(msg, "r9k"),
            slow: tag_number(msg, "slow"),
            subs_only: tag_flag(msg, "subs-only"),
        })
    }
}

/// Identity tags of the logged-in user (`USERSTATE`, `GLOBALUSERSTATE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserTags {
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub color: Option<String>,
    pub badges: Vec<Badge>,
    pub is_mod: bool,
    pub emote_sets: Vec<String>,
}

impl UserTags {
    pub fn from_message(msg: &Message) -> Self {
        Self {
            user_id: tag_owned(msg, "user-id"),
            display_name: tag_owned(msg, "display-name"),
            color: tag_owned(msg, "color"),
            badges: parse_badges(msg.tag_value("badges")),
            is_mod: tag_flag(msg, "mod").unwrap_or(false),
            emote_sets: msg
                .tag_value("emote-sets")
                .map(|sets| {
                    sets.split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// Host mode change: `HOSTTARGET #channel :<target|-> [viewers]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostTarget {
    pub channel: String,
    /// `None` when host mode ended.
    pub target: Option<String>,
    pub viewers: Option<u32>,
}

impl HostTarget {
    pub fn from_message(msg: &Message) -> Option<Self> {
        let channel = msg.param(0)?.to_owned();
        let mut parts = msg.param(1).unwrap_or_default().split_whitespace();
        let target = parts.next().filter(|t| *t != "-").map(str::to_owned);
        let viewers = parts.next().and_then(|v| v.parse().ok());
        Some(Self {
            channel,
            target,
            viewers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[test]
    fn privmsg_fields() {
        let msg = parse(
            "@badges=broadcaster/1,subscriber/12;bits=100;color=#0D4200;display-name=Ronni;\
             id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;tmi-sent-ts=1507246572675;user-id=1337 \
             :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :cheer100 hi",
        );
        let chat = ChatMessage::from_message(&msg).unwrap();
        assert_eq!(chat.channel, "#dallas");
        assert_eq!(chat.login, "ronni");
        assert_eq!(chat.author(), "Ronni");
        assert_eq!(chat.bits, Some(100));
        assert_eq!(chat.text, "cheer100 hi");
        assert!(!chat.is_action);
        assert_eq!(chat.badges.len(), 2);
        assert_eq!(chat.badges[1].version, "12");
        assert_eq!(
            chat.sent_at.map(|t| t.timestamp_millis()),
            Some(1_507_246_572_675)
        );
    }

    #[test]
    fn action_is_unwrapped() {
        let msg = parse(":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :\u{1}ACTION waves\u{1}");
        let chat = ChatMessage::from_message(&msg).unwrap();
        assert!(chat.is_action);
        assert_eq!(chat.text, "waves");
    }

    #[test]
    fn clearchat_variants() {
        let clear = ClearChat::from_message(&parse(":tmi.twitch.tv CLEARCHAT #dallas")).unwrap();
        assert_eq!(clear.action, ClearChatAction::Clear);

        let timeout = ClearChat::from_message(&parse(
            "@ban-duration=350;target-user-id=1 :tmi.twitch.tv CLEARCHAT #dallas :ronni",
        ))
        .unwrap();
        assert_eq!(
            timeout.action,
            ClearChatAction::Timeout {
                user: "ronni".into(),
                seconds: 350
            }
        );

        let ban = ClearChat::from_message(&parse(":tmi.twitch.tv CLEARCHAT #dallas :ronni")).unwrap();
        assert_eq!(ban.action, ClearChatAction::Ban { user: "ronni".into() });
    }

    #[test]
    fn roomstate_partial_update() {
        let state =
            RoomState::from_message(&parse("@room-id=1;slow=10 :tmi.twitch.tv ROOMSTATE #dallas"))
                .unwrap();
        assert_eq!(state.slow, Some(10));
        assert_eq!(state.emote_only, None);
        assert_eq!(state.room_id.as_deref(), Some("1"));
    }

    #[test]
    fn hosttarget_end() {
        let host =
            HostTarget::from_message(&parse(":tmi.twitch.tv HOSTTARGET #dallas :- 0")).unwrap();
        assert_eq!(host.target, None);
        assert_eq!(host.viewers, Some(0));
    }

    #[test]
    fn global_notice_has_no_channel() {
        let notice = Notice::from_message(&parse(
            "@msg-id=msg_banned :tmi.twitch.tv NOTICE * :Login authentication failed",
        ));
        assert_eq!(notice.channel, None);
        assert_eq!(notice.msg_id.as_deref(), Some("msg_banned"));
    }
}
