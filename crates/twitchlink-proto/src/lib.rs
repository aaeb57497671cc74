//! # twitchlink-proto
//!
//! Sans-IO protocol layer for Twitch chat and PubSub.
//!
//! ## Features
//!
//! - Line framing over arbitrary byte chunks (CRLF or LF in, CRLF out)
//! - IRC message parsing with IRCv3 tags, prefixes and trailing parameters
//! - Outgoing chat command and moderation builders
//! - PubSub request/response envelopes
//! - Optional Tokio codec integration

#![deny(clippy::all)]
#![warn(missing_docs)]

//! ## Quick Start
//!
//! ```rust
//! use twitchlink_proto::Message;
//!
//! let raw = "@display-name=Ronni :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :hi";
//! let message: Message = raw.parse().expect("valid line");
//! assert_eq!(message.tag_value("display-name"), Some("Ronni"));
//!
//! let join = Message::join("Dallas");
//! assert_eq!(join.to_string(), "JOIN #dallas");
//! ```

pub mod command;
pub mod error;
#[cfg(feature = "tokio")]
pub mod line;
pub mod message;
pub mod prefix;
pub mod pubsub;
pub mod response;

pub use self::command::{normalize_channel, ModAction, DEFAULT_CAPABILITIES};
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::line::{LineCodec, DEFAULT_MAX_INBOUND_LEN, MAX_LINE_LEN};
pub use self::message::{Message, Tag};
pub use self::prefix::Prefix;
