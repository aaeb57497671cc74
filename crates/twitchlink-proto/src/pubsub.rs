//! PubSub JSON envelopes.
//!
//! Client requests (`LISTEN`, `UNLISTEN`, `PING`) and the frames the
//! server sends back. Every envelope is one JSON object per WebSocket
//! text frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// Request type of an outgoing envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestKind {
    /// Subscribe to topics.
    Listen,
    /// Unsubscribe from topics.
    Unlisten,
    /// Liveness probe.
    Ping,
}

/// Payload of a LISTEN/UNLISTEN request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestData {
    /// Topics, de-duplicated in first-seen order.
    pub topics: Vec<String>,
    /// OAuth token authorising the topics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// An outgoing PubSub envelope.
///
/// ```
/// use twitchlink_proto::pubsub::Request;
///
/// let req = Request::listen(["a", "b", "a"], Some("tok"), "n1").unwrap();
/// assert_eq!(
///     req.to_json().unwrap(),
///     r#"{"type":"LISTEN","nonce":"n1","data":{"topics":["a","b"],"auth_token":"tok"}}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Envelope type.
    #[serde(rename = "type")]
    pub kind: RequestKind,
    /// Correlation id echoed by the server's RESPONSE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Topic payload for LISTEN/UNLISTEN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RequestData>,
}

impl Request {
    /// Build a LISTEN request.
    ///
    /// Fails with [`ProtocolError::NoTopics`] when nothing is left after
    /// de-duplication.
    pub fn listen<I, S>(topics: I, auth_token: Option<&str>, nonce: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::topics_request(RequestKind::Listen, topics, auth_token, nonce)
    }

    /// Build an UNLISTEN request.
    pub fn unlisten<I, S>(topics: I, auth_token: Option<&str>, nonce: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::topics_request(RequestKind::Unlisten, topics, auth_token, nonce)
    }

    /// `{"type":"PING"}`
    pub fn ping() -> Self {
        Request {
            kind: RequestKind::Ping,
            nonce: None,
            data: None,
        }
    }

    fn topics_request<I, S>(
        kind: RequestKind,
        topics: I,
        auth_token: Option<&str>,
        nonce: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let topics = dedup_topics(topics);
        if topics.is_empty() {
            return Err(ProtocolError::NoTopics);
        }
        Ok(Request {
            kind,
            nonce: Some(nonce.to_owned()),
            data: Some(RequestData {
                topics,
                auth_token: auth_token.filter(|t| !t.is_empty()).map(str::to_owned),
            }),
        })
    }

    /// Topics carried by this request.
    pub fn topics(&self) -> &[String] {
        self.data
            .as_ref()
            .map(|d| d.topics.as_slice())
            .unwrap_or(&[])
    }

    /// Serialize to a single-line JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// De-duplicate topics preserving first-seen order. Blank topics are dropped.
pub fn dedup_topics<I, S>(topics: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for topic in topics {
        let topic = topic.as_ref().trim();
        if !topic.is_empty() && !out.iter().any(|t| t == topic) {
            out.push(topic.to_owned());
        }
    }
    out
}

/// Generate a fresh request nonce.
pub fn generate_nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A frame received from the PubSub server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Reply to a client PING.
    Pong,
    /// The server is about to restart; the client should reconnect.
    Reconnect,
    /// Result of a LISTEN/UNLISTEN request.
    Response {
        /// Nonce of the request being answered.
        nonce: Option<String>,
        /// Error string; `None` means success.
        error: Option<String>,
    },
    /// A message published on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Decoded payload. Servers send it as a JSON string; if that
        /// string is not itself JSON it is kept as a plain string value.
        message: Value,
    },
    /// Any other frame type.
    Unsupported {
        /// The `type` field, if there was one.
        kind: Option<String>,
        /// The raw frame.
        raw: String,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    nonce: Option<String>,
    error: Option<String>,
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    topic: Option<String>,
    message: Option<Value>,
}

impl ServerMessage {
    /// Classify one inbound frame.
    ///
    /// Malformed JSON is an error; well-formed JSON of an unknown type
    /// becomes [`ServerMessage::Unsupported`].
    pub fn parse(line: &str) -> Result<Self> {
        let frame: RawFrame = serde_json::from_str(line)?;
        let unsupported = |kind: Option<String>| ServerMessage::Unsupported {
            kind,
            raw: line.to_owned(),
        };

        Ok(match frame.kind.as_deref() {
            Some("PONG") => ServerMessage::Pong,
            Some("RECONNECT") => ServerMessage::Reconnect,
            Some("RESPONSE") => ServerMessage::Response {
                nonce: frame.nonce,
                error: frame.error.filter(|e| !e.is_empty()),
            },
            Some("MESSAGE") => match frame.data {
                Some(RawData {
                    topic: Some(topic),
                    message,
                }) => ServerMessage::Message {
                    topic,
                    message: decode_payload(message.unwrap_or(Value::Null)),
                },
                _ => unsupported(frame.kind),
            },
            _ => unsupported(frame.kind),
        })
    }
}

fn decode_payload(message: Value) -> Value {
    match message {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listen_dedups_preserving_order() {
        let req = Request::listen(["a", "b", "a"], Some("tok"), "n1").unwrap();
        assert_eq!(req.topics(), &["a".to_string(), "b".to_string()]);
        assert_eq!(req.nonce.as_deref(), Some("n1"));
    }

    #[test]
    fn test_empty_topics_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            Request::listen(empty, None, "n"),
            Err(ProtocolError::NoTopics)
        ));
        assert!(matches!(
            Request::unlisten(["", "  "], None, "n"),
            Err(ProtocolError::NoTopics)
        ));
    }

    #[test]
    fn test_ping_envelope() {
        assert_eq!(Request::ping().to_json().unwrap(), r#"{"type":"PING"}"#);
    }

    #[test]
    fn test_unlisten_without_token_omits_field() {
        let req = Request::unlisten(["x"], None, "n2").unwrap();
        assert_eq!(
            req.to_json().unwrap(),
            r#"{"type":"UNLISTEN","nonce":"n2","data":{"topics":["x"]}}"#
        );
    }

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(ServerMessage::parse(r#"{"type":"PONG"}"#).unwrap(), ServerMessage::Pong);
        assert_eq!(
            ServerMessage::parse(r#"{"type":"RECONNECT"}"#).unwrap(),
            ServerMessage::Reconnect
        );
    }

    #[test]
    fn test_parse_response_empty_error_is_success() {
        let ok = ServerMessage::parse(r#"{"type":"RESPONSE","nonce":"n1","error":""}"#).unwrap();
        assert_eq!(
            ok,
            ServerMessage::Response {
                nonce: Some("n1".into()),
                error: None
            }
        );

        let bad =
            ServerMessage::parse(r#"{"type":"RESPONSE","nonce":"n2","error":"ERR_BADAUTH"}"#)
                .unwrap();
        assert_eq!(
            bad,
            ServerMessage::Response {
                nonce: Some("n2".into()),
                error: Some("ERR_BADAUTH".into())
            }
        );
    }

    #[test]
    fn test_parse_message_decodes_inner_json() {
        let raw = r#"{"type":"MESSAGE","data":{"topic":"channel-points-channel-v1.44322889","message":"{\"type\":\"reward-redeemed\",\"data\":{\"id\":1}}"}}"#;
        let msg = ServerMessage::parse(raw).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Message {
                topic: "channel-points-channel-v1.44322889".into(),
                message: json!({"type": "reward-redeemed", "data": {"id": 1}}),
            }
        );
    }

    #[test]
    fn test_parse_message_keeps_plain_string() {
        let raw = r#"{"type":"MESSAGE","data":{"topic":"t","message":"not json"}}"#;
        assert_eq!(
            ServerMessage::parse(raw).unwrap(),
            ServerMessage::Message {
                topic: "t".into(),
                message: Value::String("not json".into()),
            }
        );
    }

    #[test]
    fn test_parse_unknown_and_malformed() {
        let msg = ServerMessage::parse(r#"{"type":"AUTH_REVOKED","data":{}}"#).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Unsupported { kind: Some(ref k), .. } if k == "AUTH_REVOKED"
        ));
        assert!(matches!(
            ServerMessage::parse("not json"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_nonce_is_unique() {
        assert_ne!(generate_nonce(), generate_nonce());
        assert_eq!(generate_nonce().len(), 32);
    }
}
