//! IRC message type, parsing and serialization.
//!
//! Lines are parsed with a nom grammar into [`Message`]; the [`std::fmt::Display`]
//! impl renders a message back to its wire form (terminator excluded).

mod nom_parser;
mod parse;
mod serialize;
mod tags;
mod types;

pub use self::tags::{escape_tag_value, unescape_tag_value, Tag};
pub use self::types::Message;
