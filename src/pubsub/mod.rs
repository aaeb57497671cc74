//! PubSub client.
//!
//! LISTEN/UNLISTEN requests are correlated to their RESPONSE by nonce. The
//! topics the caller asked for are kept across reconnects and, unless
//! replay is disabled, re-LISTENed on every new transport before
//! `Reconnected` is raised.

mod protocol;
mod subscriptions;

pub use protocol::{PubSubDispatcher, PubSubEvent, PubSubProtocol};
pub use subscriptions::{Resolution, SubscriptionSet, SubscriptionSnapshot};

use tokio::sync::mpsc;
use tracing::{debug, info};
use twitchlink_proto::pubsub::{Request, RequestKind, generate_nonce};

use crate::config::{PubSubConfig, ReconnectConfig};
use crate::connection::{
    Connection, ConnectionSettings, ConnectionState, HeartbeatSettings, SessionEvent,
    TransitionOutcome,
};
use crate::error::PubSubError;
use crate::transport::{Connector, WebSocketConnector};

/// Connection settings derived from the pubsub and reconnect sections.
pub fn connection_settings(config: &PubSubConfig, reconnect: &ReconnectConfig) -> ConnectionSettings {
    ConnectionSettings {
        heartbeat: HeartbeatSettings::from(&config.heartbeat),
        reconnect_on_remote_close: reconnect.on_remote_close,
        ..ConnectionSettings::default()
    }
}

/// A PubSub session.
#[derive(Clone)]
pub struct PubSubClient {
    connection: Connection<PubSubProtocol>,
}

impl PubSubClient {
    pub fn from_config(config: &PubSubConfig, reconnect: &ReconnectConfig) -> Self {
        Self::with_connector(config, reconnect, WebSocketConnector::new(config.url.clone()))
    }

    pub fn with_connector<C: Connector>(
        config: &PubSubConfig,
        reconnect: &ReconnectConfig,
        connector: C,
    ) -> Self {
        let protocol = PubSubProtocol::new(
            config.auth_token.clone(),
            SubscriptionSet::new(config.topics.iter().cloned()),
            reconnect.replay_subscriptions,
        );
        info!(topics = config.topics.len(), "pubsub client created");
        Self {
            connection: Connection::new(protocol, connector, connection_settings(config, reconnect)),
        }
    }

    pub fn connection(&self) -> &Connection<PubSubProtocol> {
        &self.connection
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent<PubSubEvent>> {
        self.connection.subscribe()
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

    pub fn subscriptions(&self) -> SubscriptionSnapshot {
        self.connection.protocol().subscriptions().snapshot()
    }

    /// Subscribe to `topics`. Returns the nonce the RESPONSE will carry; a
    /// fresh one is generated when `nonce` is `None`.
    ///
    /// Duplicate topics are sent once. An empty list fails with
    /// [`PubSubError::NoTopics`] without touching the connection.
    pub async fn listen<I, S>(&self, topics: I, nonce: Option<&str>) -> Result<String, PubSubError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nonce = nonce.map_or_else(generate_nonce, str::to_owned);
        let protocol = self.connection.protocol();
        let request = Request::listen(topics, protocol.auth_token(), &nonce)?;
        self.send_request(request, RequestKind::Listen, nonce).await
    }

    /// Unsubscribe from `topics`. Same contract as [`PubSubClient::listen`].
    pub async fn unlisten<I, S>(&self, topics: I, nonce: Option<&str>) -> Result<String, PubSubError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let nonce = nonce.map_or_else(generate_nonce, str::to_owned);
        let protocol = self.connection.protocol();
        let request = Request::unlisten(topics, protocol.auth_token(), &nonce)?;
        self.send_request(request, RequestKind::Unlisten, nonce).await
    }

    async fn send_request(
        &self,
        request: Request,
        kind: RequestKind,
        nonce: String,
    ) -> Result<String, PubSubError> {
        let json = request.to_json()?;
        let subscriptions = self.connection.protocol().subscriptions();

        // Recorded before sending so a fast RESPONSE always finds it
        subscriptions.record(&nonce, kind, request.topics());
        if let Err(e) = self.connection.send(json).await {
            subscriptions.abandon(&nonce);
            return Err(e.into());
        }
        debug!(?kind, %nonce, topics = ?request.topics(), "request sent");
        Ok(nonce)
    }
}
