use crate::error::MessageParseError;
use crate::prefix::Prefix;

use super::tags::Tag;

/// An owned IRC message.
///
/// # Example
///
/// ```
/// use twitchlink_proto::Message;
///
/// let msg: Message = ":ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :hello".parse().unwrap();
/// assert_eq!(msg.command, "PRIVMSG");
/// assert_eq!(msg.param(1), Some("hello"));
///
/// let out = Message::privmsg("#dallas", "hi there");
/// assert_eq!(out.to_string(), "PRIVMSG #dallas :hi there");
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    /// IRCv3 message tags.
    pub tags: Option<Vec<Tag>>,
    /// Message source.
    pub prefix: Option<Prefix>,
    /// Command name, upper-cased for letter commands.
    pub command: String,
    /// Parameters, the trailing one included.
    pub params: Vec<String>,
}

impl Message {
    /// Create a new message from raw components.
    pub fn new(
        prefix: Option<&str>,
        command: &str,
        params: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        Message::with_tags(None, prefix, command, params)
    }

    /// Create a new message with tags from raw components.
    pub fn with_tags(
        tags: Option<Vec<Tag>>,
        prefix: Option<&str>,
        command: &str,
        params: Vec<&str>,
    ) -> Result<Message, MessageParseError> {
        if command.is_empty() || command.contains(' ') {
            return Err(MessageParseError::InvalidCommand);
        }
        let prefix = prefix.map(Prefix::parse).transpose()?;

        Ok(Message {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params: params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Build a message with no prefix or tags.
    pub fn from_parts<C, I, S>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Message {
            tags: None,
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a tag to this message.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: Option<String>) -> Self {
        self.tags
            .get_or_insert_with(Vec::new)
            .push(Tag(key.into(), value));
        self
    }

    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Get the value of an IRCv3 tag by key.
    ///
    /// Returns `None` both for a missing tag and for a tag without a value.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// Like [`Message::tag_value`], but treats an empty value as missing.
    pub fn non_empty_tag(&self, key: &str) -> Option<&str> {
        self.tag_value(key).filter(|v| !v.is_empty())
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which carries free text for most commands.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Whether the command is a three digit numeric reply.
    pub fn is_numeric(&self) -> bool {
        self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit())
    }
}
