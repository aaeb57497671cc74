//! IRCv3 message tags and tag value escaping.

use std::fmt::{Result as FmtResult, Write};

/// A single IRCv3 message tag: key plus optional value.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Tag(pub String, pub Option<String>);

impl Tag {
    /// Create a new tag.
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Tag(key.into(), value)
    }
}

/// Escape a tag value for serialization.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Parse a raw tags string (without the leading `@`) into tags.
///
/// Empty values (`key=`) are kept as `Some("")`, which is how chat
/// reports unset fields such as an empty `color`.
pub(crate) fn parse_tags_string(tags_str: &str) -> Vec<Tag> {
    tags_str
        .split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| {
            let mut iter = tag.splitn(2, '=');
            let key = iter.next().unwrap_or("");
            let value = iter.next().map(unescape_tag_value);
            Tag(key.to_owned(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescape_combined() {
        let input = "a\\:b\\sc\\\\d\\re\\nf";
        assert_eq!(unescape_tag_value(input), "a;b c\\d\re\nf");
    }

    #[test]
    fn test_unescape_trailing_backslash() {
        assert_eq!(unescape_tag_value("test\\"), "test");
    }

    #[test]
    fn test_escape_system_msg() {
        let mut out = String::new();
        escape_tag_value(&mut out, "ronni has subscribed; welcome").unwrap();
        assert_eq!(out, "ronni\\shas\\ssubscribed\\:\\swelcome");
        assert_eq!(unescape_tag_value(&out), "ronni has subscribed; welcome");
    }

    #[test]
    fn test_parse_tags_keeps_empty_values() {
        let tags = parse_tags_string("badge-info=;color=#0D4200;emote-only");
        assert_eq!(tags[0], Tag("badge-info".into(), Some(String::new())));
        assert_eq!(tags[1], Tag("color".into(), Some("#0D4200".into())));
        assert_eq!(tags[2], Tag("emote-only".into(), None));
    }
}
