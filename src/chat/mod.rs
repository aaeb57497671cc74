//! Chat client.
//!
//! [`ChatClient`] wraps a [`Connection`] running [`ChatProtocol`]. The set
//! of wanted channels lives outside the transport: `join`/`part` update it
//! even while disconnected, and it is joined whenever a session becomes
//! ready.

mod events;
mod membership;
mod protocol;

pub use events::{
    Badge, ChatEvent, ChatMessage, ClearChat, ClearChatAction, ClearMsg, HostTarget, Notice,
    RoomState, UserNotice, UserTags, Whisper, parse_badges,
};
pub use membership::NamesCache;
pub use protocol::{ChannelSet, ChatDispatcher, ChatProtocol, SERVER_NAME, anonymous_login};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use twitchlink_proto::{Message, ModAction, normalize_channel};

use crate::api::{ApiClient, resolve_identity};
use crate::config::{ChatConfig, ReconnectConfig};
use crate::connection::{
    Connection, ConnectionSettings, ConnectionState, HeartbeatSettings, SessionEvent,
    TransitionOutcome,
};
use crate::error::{ClientError, SendError};
use crate::telemetry::redact;
use crate::transport::{Connector, TcpConnector};

/// Connection settings derived from the chat and reconnect sections.
pub fn connection_settings(config: &ChatConfig, reconnect: &ReconnectConfig) -> ConnectionSettings {
    ConnectionSettings {
        heartbeat: HeartbeatSettings::from(&config.heartbeat),
        reconnect_on_remote_close: reconnect.on_remote_close,
        ready_timeout: config.ready_timeout(),
    }
}

/// A chat session.
#[derive(Clone)]
pub struct ChatClient {
    connection: Connection<ChatProtocol>,
}

impl ChatClient {
    /// Client for the configured server.
    pub fn from_config(config: &ChatConfig, reconnect: &ReconnectConfig) -> Self {
        let connector = if config.tls {
            TcpConnector::tls(config.host.clone(), config.port)
        } else {
            TcpConnector::plain(config.host.clone(), config.port)
        }
        .connect_timeout(config.connect_timeout());
        Self::with_connector(config, reconnect, connector)
    }

    /// Client over a caller-supplied transport.
    pub fn with_connector<C: Connector>(
        config: &ChatConfig,
        reconnect: &ReconnectConfig,
        connector: C,
    ) -> Self {
        let protocol = ChatProtocol::new(
            config.login.clone(),
            config.oauth_token.clone(),
            config.capabilities.clone(),
            ChannelSet::new(&config.channels),
            reconnect.replay_subscriptions,
        );
        info!(
            login = protocol.login(),
            anonymous = protocol.is_anonymous(),
            token = %config.oauth_token.as_deref().map(redact).unwrap_or_default(),
            "chat client created"
        );
        Self {
            connection: Connection::new(
                protocol,
                connector,
                connection_settings(config, reconnect),
            ),
        }
    }

    /// Like [`ChatClient::from_config`], but a token without a login is
    /// resolved to its owner through the API first.
    pub async fn resolve<A>(
        config: &ChatConfig,
        reconnect: &ReconnectConfig,
        api: &A,
    ) -> Result<Self, ClientError>
    where
        A: ApiClient + ?Sized,
    {
        if config.oauth_token.is_none() || config.login.is_some() {
            return Ok(Self::from_config(config, reconnect));
        }
        let identity = resolve_identity(api, None).await?;
        info!(login = %identity.login, id = %identity.id, "resolved chat login");
        let config = ChatConfig {
            login: Some(identity.login),
            ..config.clone()
        };
        Ok(Self::from_config(&config, reconnect))
    }

    pub fn connection(&self) -> &Connection<ChatProtocol> {
        &self.connection
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent<ChatEvent>> {
        self.connection.subscribe()
    }

    pub fn login(&self) -> &str {
        self.connection.protocol().login()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub async fn connect(&self) -> TransitionOutcome {
        self.connection.connect().await
    }

    pub async fn disconnect(&self) -> TransitionOutcome {
        self.connection.disconnect().await
    }

    pub async fn reconnect(&self) -> TransitionOutcome {
        self.connection.reconnect().await
    }

    /// Channels joined on every ready session.
    pub fn channels(&self) -> Vec<String> {
        self.connection.protocol().channels().snapshot()
    }

    /// Join `channel` now if the session is ready, and on every later
    /// session. Before the welcome the join is left to the ready replay.
    pub async fn join(&self, channel: &str) -> Result<(), SendError> {
        let channel = normalize_channel(channel);
        if channel.len() < 2 {
            return Err(SendError::Empty);
        }
        self.connection.protocol().channels().insert(&channel);
        if !self.connection.is_ready() {
            debug!(%channel, state = %self.state(), "session not ready, join deferred");
            return Ok(());
        }
        self.send(Message::join(&channel)).await
    }

    /// Leave `channel` and stop joining it.
    pub async fn part(&self, channel: &str) -> Result<(), SendError> {
        let was_joined = self.connection.protocol().channels().remove(channel);
        if !was_joined || !self.connection.is_ready() {
            return Ok(());
        }
        self.send(Message::part(channel)).await
    }

    pub async fn say(&self, channel: &str, text: &str) -> Result<(), SendError> {
        self.send(Message::privmsg(channel, non_empty(text)?)).await
    }

    /// Threaded reply to the message with id `parent_id`.
    pub async fn reply(&self, channel: &str, parent_id: &str, text: &str) -> Result<(), SendError> {
        self.send(Message::reply(channel, parent_id, non_empty(text)?))
            .await
    }

    /// Whisper via the client's own channel.
    pub async fn whisper(&self, user: &str, text: &str) -> Result<(), SendError> {
        let text = non_empty(text)?;
        let action = ModAction::Whisper {
            user: user.to_owned(),
            text: text.to_owned(),
        };
        self.send(Message::moderation(self.login(), &action)).await
    }

    pub async fn moderate(&self, channel: &str, action: &ModAction) -> Result<(), SendError> {
        self.send(Message::moderation(channel, action)).await
    }

    /// Send a prebuilt line.
    pub async fn send_raw(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.connection.send(line).await
    }

    async fn send(&self, message: Message) -> Result<(), SendError> {
        self.connection.send(message.to_string()).await
    }
}

/// Message text must carry something visible.
fn non_empty(text: &str) -> Result<&str, SendError> {
    if text.trim().is_empty() {
        warn!(reason = SendError::Empty.reason(), "send refused");
        return Err(SendError::Empty);
    }
    Ok(text)
}
