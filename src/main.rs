//! twitchlink - connect to chat and PubSub and log what happens.

use tokio::sync::mpsc;
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::EnvFilter;
use twitchlink::api::HelixClient;
use twitchlink::chat::{ChatClient, ChatEvent};
use twitchlink::config::Config;
use twitchlink::connection::SessionEvent;
use twitchlink::pubsub::{PubSubClient, PubSubEvent};
use twitchlink::telemetry::spans;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "twitchlink.toml".to_string());

    let config = Config::load_validated(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        chat = %config.chat.address(),
        tls = config.chat.tls,
        channels = config.chat.channels.len(),
        pubsub = config.pubsub.is_some(),
        "Starting twitchlink"
    );

    let chat = match &config.api {
        Some(api) => {
            let helix = HelixClient::from_config(api, config.chat.oauth_token.as_deref())?;
            ChatClient::resolve(&config.chat, &config.reconnect, &helix)
                .await
                .map_err(|e| {
                    error!(code = e.error_code(), error = %e, "Failed to resolve chat identity");
                    e
                })?
        }
        None => ChatClient::from_config(&config.chat, &config.reconnect),
    };
    let pubsub = config
        .pubsub
        .as_ref()
        .map(|ps| PubSubClient::from_config(ps, &config.reconnect));

    tokio::spawn(
        log_chat(chat.subscribe()).instrument(spans::session("chat", Some(chat.login()))),
    );
    if let Some(pubsub) = &pubsub {
        tokio::spawn(log_pubsub(pubsub.subscribe()).instrument(spans::session("pubsub", None)));
    }

    chat.connect().await;
    if let Some(pubsub) = &pubsub {
        pubsub.connect().await;
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    chat.disconnect().await;
    if let Some(pubsub) = &pubsub {
        pubsub.disconnect().await;
    }
    Ok(())
}

async fn log_chat(mut events: mpsc::UnboundedReceiver<SessionEvent<ChatEvent>>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Protocol(ChatEvent::Privmsg(msg)) => {
                info!(channel = %msg.channel, user = %msg.author(), "{}", msg.text);
            }
            SessionEvent::Protocol(ChatEvent::Notice(notice)) => {
                info!(channel = ?notice.channel, msg_id = ?notice.msg_id, "{}", notice.text);
            }
            SessionEvent::Protocol(ChatEvent::Unsupported { command, .. }) => {
                tracing::debug!(%command, "unsupported chat line");
            }
            SessionEvent::Protocol(other) => tracing::debug!(event = ?other, "chat event"),
            SessionEvent::Error { reason } | SessionEvent::ConnectFailed { reason } => {
                warn!(%reason, "chat connection problem");
            }
            lifecycle => info!(event = ?lifecycle, "chat lifecycle"),
        }
    }
}

async fn log_pubsub(mut events: mpsc::UnboundedReceiver<SessionEvent<PubSubEvent>>) {
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Protocol(PubSubEvent::Message { topic, message }) => {
                info!(%topic, %message, "pubsub message");
            }
            SessionEvent::Protocol(PubSubEvent::Response {
                nonce,
                error: Some(error),
            }) => {
                warn!(?nonce, %error, "pubsub request failed");
            }
            SessionEvent::Protocol(other) => tracing::debug!(event = ?other, "pubsub event"),
            SessionEvent::Error { reason } | SessionEvent::ConnectFailed { reason } => {
                warn!(%reason, "pubsub connection problem");
            }
            lifecycle => info!(event = ?lifecycle, "pubsub lifecycle"),
        }
    }
}
