//! Chat wire dialect: handshake, keepalive, and line classification.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use twitchlink_proto::response::{self, RPL_ENDOFNAMES, RPL_NAMREPLY, RPL_WELCOME};
use twitchlink_proto::{MAX_LINE_LEN, Message, normalize_channel};

use super::events::{
    ChatEvent, ChatMessage, ClearChat, ClearMsg, HostTarget, Notice, RoomState, UserNotice,
    UserTags, Whisper,
};
use super::membership::NamesCache;
use crate::connection::{Control, Dispatched, Dispatcher, Protocol};

/// Server name chat uses in pings and prefixes.
pub const SERVER_NAME: &str = "tmi.twitch.tv";

/// Channels the client wants to be in, shared between the client (join/part)
/// and the protocol (replay after ready).
#[derive(Debug, Clone, Default)]
pub struct ChannelSet {
    inner: Arc<Mutex<BTreeSet<String>>>,
}

impl ChannelSet {
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = channels
            .into_iter()
            .map(|c| normalize_channel(c.as_ref()))
            .filter(|c| c.len() > 1)
            .collect();
        Self {
            inner: Arc::new(Mutex::new(set)),
        }
    }

    /// Returns `true` if the channel was not already present.
    pub fn insert(&self, channel: &str) -> bool {
        self.inner.lock().insert(normalize_channel(channel))
    }

    /// Returns `true` if the channel was present.
    pub fn remove(&self, channel: &str) -> bool {
        self.inner.lock().remove(&normalize_channel(channel))
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.inner.lock().contains(&normalize_channel(channel))
    }

    /// Sorted copy of the set.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner.lock().iter().cloned().collect()
    }
}

/// Login used when no OAuth token is configured.
pub fn anonymous_login() -> String {
    let n = uuid::Uuid::new_v4().as_u128() % 100_000;
    format!("justinfan{}", n)
}

/// Chat over IRC.
pub struct ChatProtocol {
    login: String,
    token: Option<String>,
    capabilities: Vec<String>,
    channels: ChannelSet,
    replay: bool,
}

impl ChatProtocol {
    /// `login` is ignored without a token; anonymous sessions use a
    /// `justinfan` login.
    pub fn new(
        login: Option<String>,
        token: Option<String>,
        capabilities: Vec<String>,
        channels: ChannelSet,
        replay: bool,
    ) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        let login = match (&token, login) {
            (Some(_), Some(login)) => login.to_ascii_lowercase(),
            _ => anonymous_login(),
        };
        Self {
            login,
            token,
            capabilities,
            channels,
            replay,
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn is_anonymous(&self) -> bool {
        self.token.is_none()
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }
}

impl Protocol for ChatProtocol {
    type Event = ChatEvent;
    type Dispatcher = ChatDispatcher;

    fn name(&self) -> &'static str {
        "chat"
    }

    fn max_line_len(&self) -> Option<usize> {
        Some(MAX_LINE_LEN)
    }

    fn ping(&self) -> String {
        format!("PING :{}", SERVER_NAME)
    }

    fn handshake(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if !self.capabilities.is_empty() {
            lines.push(Message::cap_req(&self.capabilities).to_string());
        }
        if let Some(token) = &self.token {
            lines.push(Message::pass(token).to_string());
        }
        lines.push(Message::nick(&self.login).to_string());
        lines
    }

    fn awaits_ready(&self) -> bool {
        true
    }

    fn dispatcher(&self) -> ChatDispatcher {
        ChatDispatcher::new()
    }

    fn after_ready(&self, resumed: bool) -> Vec<String> {
        if resumed && !self.replay {
            debug!("channel replay disabled, leaving joins to the caller");
            return Vec::new();
        }
        self.channels
            .snapshot()
            .iter()
            .map(|channel| Message::join(channel).to_string())
            .collect()
    }
}

/// Classifies chat lines for one transport.
#[derive(Debug, Default)]
pub struct ChatDispatcher {
    names: NamesCache,
}

impl ChatDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn classify(&mut self, msg: &Message, raw: &str) -> Dispatched<ChatEvent> {
        let unsupported = || {
            Dispatched::event(ChatEvent::Unsupported {
                command: msg.command.clone(),
                raw: raw.to_owned(),
            })
        };
        // Typed records return None when required params are missing
        let typed = |event: Option<ChatEvent>| match event {
            Some(event) => Dispatched::event(event),
            None => unsupported(),
        };

        match msg.command.as_str() {
            RPL_WELCOME => Dispatched::control(Control::Ready).with_event(ChatEvent::Welcome {
                login: msg.param(0).unwrap_or_default().to_owned(),
            }),
            "PING" => {
                let token = msg.trailing().unwrap_or(SERVER_NAME);
                Dispatched::control(Control::Reply(Message::pong(token).to_string()))
            }
            "PONG" => Dispatched::control(Control::Pong),
            "RECONNECT" => Dispatched::control(Control::Reconnect),
            "PRIVMSG" => typed(ChatMessage::from_message(msg).map(ChatEvent::Privmsg)),
            "WHISPER" => typed(Whisper::from_message(msg).map(ChatEvent::Whisper)),
            "JOIN" | "PART" => {
                let Some(channel) = msg.param(0) else {
                    return unsupported();
                };
                let channel = channel.to_owned();
                let user = msg.source_nickname().unwrap_or_default().to_owned();
                Dispatched::event(if msg.command == "JOIN" {
                    ChatEvent::Join { channel, user }
                } else {
                    ChatEvent::Part { channel, user }
                })
            }
            RPL_NAMREPLY => {
                // <nick> <type> <channel> :<names>
                let len = msg.params.len();
                if len >= 2 {
                    self.names.extend(&msg.params[len - 2], &msg.params[len - 1]);
                }
                Dispatched::none()
            }
            RPL_ENDOFNAMES => match msg.param(1) {
                Some(channel) => Dispatched::event(ChatEvent::Names {
                    channel: channel.to_owned(),
                    users: self.names.flush(channel),
                }),
                None => Dispatched::none(),
            },
            "NOTICE" => Dispatched::event(ChatEvent::Notice(Notice::from_message(msg))),
            "USERNOTICE" => typed(UserNotice::from_message(msg).map(ChatEvent::UserNotice)),
            "CLEARCHAT" => typed(ClearChat::from_message(msg).map(ChatEvent::ClearChat)),
            "CLEARMSG" => typed(ClearMsg::from_message(msg).map(ChatEvent::ClearMsg)),
            "ROOMSTATE" => typed(RoomState::from_message(msg).map(ChatEvent::RoomState)),
            "USERSTATE" => typed(msg.param(0).map(|channel| ChatEvent::UserState {
                channel: channel.to_owned(),
                user: UserTags::from_message(msg),
            })),
            "GLOBALUSERSTATE" => {
                Dispatched::event(ChatEvent::GlobalUserState(UserTags::from_message(msg)))
            }
            "HOSTTARGET" => typed(HostTarget::from_message(msg).map(ChatEvent::HostTarget)),
            "CAP" => {
                let caps = || {
                    msg.trailing()
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(str::to_owned)
                        .collect()
                };
                match msg.param(1) {
                    Some("ACK") => Dispatched::event(ChatEvent::CapAck(caps())),
                    Some("NAK") => Dispatched::event(ChatEvent::CapNak(caps())),
                    _ => unsupported(),
                }
            }
            cmd if response::is_welcome_noise(cmd) => Dispatched::none(),
            _ => unsupported(),
        }
    }
}

impl Dispatcher<ChatEvent> for ChatDispatcher {
    fn dispatch(&mut self, line: &str) -> Dispatched<ChatEvent> {
        match line.parse::<Message>() {
            Ok(msg) => self.classify(&msg, line),
            Err(e) => {
                warn!(error = %e, "unparseable chat line");
                Dispatched::event(ChatEvent::Unsupported {
                    command: String::new(),
                    raw: line.to_owned(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(token: Option<&str>, channels: &[&str], replay: bool) -> ChatProtocol {
        ChatProtocol::new(
            Some("Ronni".into()),
            token.map(str::to_owned),
            vec!["twitch.tv/tags".into(), "twitch.tv/commands".into()],
            ChannelSet::new(channels),
            replay,
        )
    }

    #[test]
    fn handshake_with_token() {
        let p = protocol(Some("abc"), &[], true);
        assert_eq!(
            p.handshake(),
            vec![
                "CAP REQ :twitch.tv/tags twitch.tv/commands",
                "PASS oauth:abc",
                "NICK ronni",
            ]
        );
        assert!(!p.is_anonymous());
    }

    #[test]
    fn anonymous_handshake_skips_pass() {
        let p = protocol(None, &[], true);
        let lines = p.handshake();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("NICK justinfan"));
        assert!(p.is_anonymous());
    }

    #[test]
    fn after_ready_replays_unless_disabled() {
        let p = protocol(Some("abc"), &["Dallas", "#ronni"], false);
        assert_eq!(p.after_ready(false), vec!["JOIN #dallas", "JOIN #ronni"]);
        assert!(p.after_ready(true).is_empty());

        let p = protocol(Some("abc"), &["dallas"], true);
        assert_eq!(p.after_ready(true), vec!["JOIN #dallas"]);
    }

    #[test]
    fn control_lines() {
        let mut d = ChatDispatcher::new();
        let ping = d.dispatch("PING :tmi.twitch.tv");
        assert_eq!(
            ping.control,
            Some(Control::Reply("PONG tmi.twitch.tv".into()))
        );
        assert!(ping.event.is_none());

        assert_eq!(
            d.dispatch(":tmi.twitch.tv PONG tmi.twitch.tv :tmi.twitch.tv").control,
            Some(Control::Pong)
        );
        assert_eq!(
            d.dispatch(":tmi.twitch.tv RECONNECT").control,
            Some(Control::Reconnect)
        );

        let welcome = d.dispatch(":tmi.twitch.tv 001 ronni :Welcome, GLHF!");
        assert_eq!(welcome.control, Some(Control::Ready));
        assert_eq!(
            welcome.event,
            Some(ChatEvent::Welcome {
                login: "ronni".into()
            })
        );
    }

    #[test]
    fn names_flush_on_end() {
        let mut d = ChatDispatcher::new();
        let line = ":ronni.tmi.twitch.tv 353 ronni = #dallas :ronni fred";
        assert_eq!(d.dispatch(line), Dispatched::none());
        d.dispatch(":ronni.tmi.twitch.tv 353 ronni = #dallas :wilma");
        let end = d.dispatch(":ronni.tmi.twitch.tv 366 ronni #dallas :End of /NAMES list");
        assert_eq!(
            end.event,
            Some(ChatEvent::Names {
                channel: "#dallas".into(),
                users: vec!["ronni".into(), "fred".into(), "wilma".into()],
            })
        );
    }

    #[test]
    fn unknown_and_noise() {
        let mut d = ChatDispatcher::new();
        assert_eq!(d.dispatch(":tmi.twitch.tv 372 ronni :You are in a maze"), Dispatched::none());
        let odd = d.dispatch(":tmi.twitch.tv FUTURECMD #dallas :x");
        assert_eq!(
            odd.event,
            Some(ChatEvent::Unsupported {
                command: "FUTURECMD".into(),
                raw: ":tmi.twitch.tv FUTURECMD #dallas :x".into(),
            })
        );
        let cap = d.dispatch(":tmi.twitch.tv CAP * ACK :twitch.tv/tags twitch.tv/commands");
        assert_eq!(
            cap.event,
            Some(ChatEvent::CapAck(vec![
                "twitch.tv/tags".into(),
                "twitch.tv/commands".into()
            ]))
        );
    }

    #[test]
    fn join_part_events() {
        let mut d = ChatDispatcher::new();
        let join = d.dispatch(":ronni!ronni@ronni.tmi.twitch.tv JOIN #dallas");
        assert_eq!(
            join.event,
            Some(ChatEvent::Join {
                channel: "#dallas".into(),
                user: "ronni".into()
            })
        );
    }
}
