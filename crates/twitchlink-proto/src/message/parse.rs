use std::str::FromStr;

use crate::error::ProtocolError;

use super::nom_parser::ParsedLine;
use super::tags::parse_tags_string;
use super::types::Message;

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let invalid = |cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        };

        let parsed = ParsedLine::parse(s).map_err(invalid)?;
        let tags = parsed.tags.map(parse_tags_string);

        Message::with_tags(tags, parsed.prefix, parsed.command, parsed.params.to_vec())
            .map_err(invalid)
    }
}
