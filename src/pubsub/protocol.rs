//! PubSub wire dialect over WebSocket text frames.

use serde_json::Value;
use tracing::{debug, warn};
use twitchlink_proto::pubsub::{Request, RequestKind, ServerMessage, generate_nonce};

use super::subscriptions::{Resolution, SubscriptionSet};
use crate::connection::{Control, Dispatched, Dispatcher, Protocol};

/// A typed notification from the PubSub connection.
#[derive(Debug, Clone, PartialEq)]
pub enum PubSubEvent {
    /// Answer to a LISTEN/UNLISTEN. `error` is `None` on success.
    Response {
        nonce: Option<String>,
        error: Option<String>,
    },
    /// A message published on a subscribed topic.
    Message { topic: String, message: Value },
    /// A frame with no typed handler, or one that was not valid JSON.
    Unsupported { kind: Option<String>, raw: String },
}

/// PubSub over WebSocket.
pub struct PubSubProtocol {
    auth_token: Option<String>,
    subscriptions: SubscriptionSet,
    replay: bool,
}

impl PubSubProtocol {
    pub fn new(auth_token: Option<String>, subscriptions: SubscriptionSet, replay: bool) -> Self {
        Self {
            auth_token: auth_token
                .filter(|t| !t.is_empty())
                .map(|t| t.trim_start_matches("oauth:").to_owned()),
            subscriptions,
            replay,
        }
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub fn subscriptions(&self) -> &SubscriptionSet {
        &self.subscriptions
    }
}

impl Protocol for PubSubProtocol {
    type Event = PubSubEvent;
    type Dispatcher = PubSubDispatcher;

    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn max_line_len(&self) -> Option<usize> {
        None
    }

    fn ping(&self) -> String {
        r#"{"type":"PING"}"#.to_owned()
    }

    fn handshake(&self) -> Vec<String> {
        Vec::new()
    }

    fn awaits_ready(&self) -> bool {
        false
    }

    fn dispatcher(&self) -> PubSubDispatcher {
        PubSubDispatcher {
            subscriptions: self.subscriptions.clone(),
        }
    }

    fn after_ready(&self, resumed: bool) -> Vec<String> {
        self.subscriptions.reset_transport();
        if resumed && !self.replay {
            debug!("topic replay disabled, leaving LISTEN to the caller");
            return Vec::new();
        }

        let topics = self.subscriptions.desired();
        if topics.is_empty() {
            return Vec::new();
        }
        let nonce = generate_nonce();
        let request = match Request::listen(&topics, self.auth_token(), &nonce) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "could not build LISTEN for desired topics");
                return Vec::new();
            }
        };
        match request.to_json() {
            Ok(json) => {
                self.subscriptions
                    .record(&nonce, RequestKind::Listen, request.topics());
                debug!(topics = request.topics().len(), %nonce, resumed, "listening to desired topics");
                vec![json]
            }
            Err(e) => {
                warn!(error = %e, "could not encode LISTEN");
                Vec::new()
            }
        }
    }
}

/// Classifies PubSub frames for one transport.
pub struct PubSubDispatcher {
    subscriptions: SubscriptionSet,
}

impl Dispatcher<PubSubEvent> for PubSubDispatcher {
    fn dispatch(&mut self, line: &str) -> Dispatched<PubSubEvent> {
        let message = match ServerMessage::parse(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "unparseable pubsub frame");
                return Dispatched::event(PubSubEvent::Unsupported {
                    kind: None,
                    raw: line.to_owned(),
                });
            }
        };

        match message {
            ServerMessage::Pong => Dispatched::control(Control::Pong),
            ServerMessage::Reconnect => Dispatched::control(Control::Reconnect),
            ServerMessage::Response { nonce, error } => {
                if let Some(n) = nonce.as_deref() {
                    match self.subscriptions.resolve(n, error.as_deref()) {
                        Resolution::Unknown => debug!(nonce = n, "response for unknown nonce"),
                        Resolution::Rejected { kind, topics } => {
                            warn!(nonce = n, ?kind, ?topics, error = ?error, "request rejected");
                        }
                        Resolution::Confirmed { .. } => {}
                    }
                }
                Dispatched::event(PubSubEvent::Response { nonce, error })
            }
            ServerMessage::Message { topic, message } => {
                Dispatched::event(PubSubEvent::Message { topic, message })
            }
            ServerMessage::Unsupported { kind, raw } => {
                Dispatched::event(PubSubEvent::Unsupported { kind, raw })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ping_and_control_frames() {
        let p = PubSubProtocol::new(None, SubscriptionSet::default(), true);
        assert_eq!(p.ping(), r#"{"type":"PING"}"#);
        assert!(p.handshake().is_empty());

        let mut d = p.dispatcher();
        assert_eq!(d.dispatch(r#"{"type":"PONG"}"#).control, Some(Control::Pong));
        assert_eq!(
            d.dispatch(r#"{"type":"RECONNECT"}"#).control,
            Some(Control::Reconnect)
        );
    }

    #[test]
    fn after_ready_listens_to_desired_topics() {
        let subs = SubscriptionSet::new(["b", "a"]);
        let p = PubSubProtocol::new(Some("oauth:tok".into()), subs.clone(), true);
        let lines = p.after_ready(false);
        assert_eq!(lines.len(), 1);

        let sent: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(sent["type"], "LISTEN");
        assert_eq!(sent["data"]["topics"], json!(["a", "b"]));
        assert_eq!(sent["data"]["auth_token"], "tok");
        assert_eq!(subs.snapshot().pending, 1);
    }

    #[test]
    fn resumed_without_replay_sends_nothing() {
        let subs = SubscriptionSet::new(["a"]);
        let p = PubSubProtocol::new(None, subs, false);
        assert!(p.after_ready(true).is_empty());
        assert_eq!(p.after_ready(false).len(), 1);
    }

    #[test]
    fn response_resolves_pending_request() {
        let subs = SubscriptionSet::default();
        subs.record("n1", RequestKind::Listen, &["t".to_string()]);
        let p = PubSubProtocol::new(None, subs.clone(), true);
        let mut d = p.dispatcher();

        let out = d.dispatch(r#"{"type":"RESPONSE","nonce":"n1","error":""}"#);
        assert_eq!(
            out.event,
            Some(PubSubEvent::Response {
                nonce: Some("n1".into()),
                error: None
            })
        );
        assert!(subs.is_active("t"));
    }

    #[test]
    fn message_and_unknown_frames() {
        let p = PubSubProtocol::new(None, SubscriptionSet::default(), true);
        let mut d = p.dispatcher();

        let frame = r#"{"type":"MESSAGE","data":{"topic":"video-playback.x","message":"{\"type\":\"viewcount\",\"viewers\":3}"}}"#;
        assert_eq!(
            d.dispatch(frame).event,
            Some(PubSubEvent::Message {
                topic: "video-playback.x".into(),
                message: json!({"type": "viewcount", "viewers": 3}),
            })
        );

        let odd = d.dispatch(r#"{"type":"SOMETHING_NEW"}"#);
        assert!(matches!(
            odd.event,
            Some(PubSubEvent::Unsupported { kind: Some(ref k), .. }) if k == "SOMETHING_NEW"
        ));

        let garbage = d.dispatch("not json");
        assert!(matches!(
            garbage.event,
            Some(PubSubEvent::Unsupported { kind: None, .. })
        ));
    }
}
