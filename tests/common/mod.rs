//! Integration test common infrastructure.
//!
//! Provides an in-memory connector whose remote ends are driven by the
//! test, a scripted TCP chat server, and helpers for waiting on events.

pub mod memory;
pub mod server;

#[allow(unused_imports)]
pub use memory::{MemoryConnector, RemoteEnd, Remotes};
#[allow(unused_imports)]
pub use server::{ScriptedServer, ServerConn};

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use twitchlink::config::{ChatConfig, ReconnectConfig};
use twitchlink::connection::SessionEvent;

/// How long helpers wait before failing a test.
pub const WAIT: Duration = Duration::from_secs(5);

/// Next event of any kind.
#[allow(dead_code)]
pub async fn next_event<E>(events: &mut UnboundedReceiver<SessionEvent<E>>) -> SessionEvent<E> {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

/// Next lifecycle event, skipping protocol events.
#[allow(dead_code)]
pub async fn next_lifecycle<E>(
    events: &mut UnboundedReceiver<SessionEvent<E>>,
) -> SessionEvent<E> {
    loop {
        let event = next_event(events).await;
        if event.is_lifecycle() {
            return event;
        }
    }
}

/// Assert nothing but protocol events arrives within `window`.
#[allow(dead_code)]
pub async fn assert_no_lifecycle<E: std::fmt::Debug>(
    events: &mut UnboundedReceiver<SessionEvent<E>>,
    window: Duration,
) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Err(_) | Ok(None) => return,
            Ok(Some(event)) if event.is_lifecycle() => {
                panic!("unexpected lifecycle event: {:?}", event)
            }
            Ok(Some(_)) => {}
        }
    }
}

/// Chat config for a test account.
#[allow(dead_code)]
pub fn chat_config(channels: &[&str]) -> ChatConfig {
    ChatConfig {
        host: "127.0.0.1".to_string(),
        tls: false,
        login: Some("ronni".to_string()),
        oauth_token: Some("oauth:testtoken".to_string()),
        channels: channels.iter().map(|c| c.to_string()).collect(),
        ..ChatConfig::default()
    }
}

#[allow(dead_code)]
pub fn reconnect_config() -> ReconnectConfig {
    ReconnectConfig::default()
}
