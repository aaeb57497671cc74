//! twitchlink - realtime Twitch chat and PubSub client.
//!
//! Both clients share one connection layer: a guarded lifecycle state
//! machine, a heartbeat monitor that forces a reconnect when pongs stop,
//! reconnect cycles that replay joined channels and LISTENed topics, and a
//! single reader task per transport that decodes and dispatches lines in
//! order.
//!
//! ```no_run
//! use twitchlink::chat::ChatClient;
//! use twitchlink::config::Config;
//! use twitchlink::connection::SessionEvent;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load_validated("twitchlink.toml")?;
//! let chat = ChatClient::from_config(&config.chat, &config.reconnect);
//! let mut events = chat.subscribe();
//! chat.connect().await;
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::Protocol(event) = event {
//!         println!("{:?}", event);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod connection;
pub mod error;
pub mod pubsub;
pub mod telemetry;
pub mod transport;

pub use chat::{ChatClient, ChatEvent};
pub use connection::{Connection, ConnectionState, SessionEvent, TransitionOutcome};
pub use error::{ClientError, SendError};
pub use pubsub::{PubSubClient, PubSubEvent};
