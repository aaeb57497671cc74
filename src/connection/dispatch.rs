//! Protocol seam between a connection and the lines it carries.
//!
//! A [`Protocol`] describes the wire dialect (handshake, ping, replay after
//! reconnect); its [`Dispatcher`] classifies each inbound line into an
//! optional lifecycle [`Control`] action, applied in-line by the reader, and
//! an optional typed event, published to observers.

use std::fmt;

/// Lifecycle action carried by an inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// Answers our heartbeat ping.
    Pong,
    /// Must be answered immediately with this line (server PING).
    Reply(String),
    /// The protocol-level session is ready.
    Ready,
    /// The server asked us to reconnect.
    Reconnect,
}

/// Result of classifying one line.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched<E> {
    pub control: Option<Control>,
    pub event: Option<E>,
}

impl<E> Dispatched<E> {
    pub fn none() -> Self {
        Self {
            control: None,
            event: None,
        }
    }

    pub fn event(event: E) -> Self {
        Self {
            control: None,
            event: Some(event),
        }
    }

    pub fn control(control: Control) -> Self {
        Self {
            control: Some(control),
            event: None,
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: E) -> Self {
        self.event = Some(event);
        self
    }
}

/// Per-connection line classifier.
///
/// Owned by the reader task, so it sees lines strictly in decode order and
/// may keep state (for example partial membership listings) without locking.
pub trait Dispatcher<E>: Send + 'static {
    fn dispatch(&mut self, line: &str) -> Dispatched<E>;
}

/// A wire dialect carried over a [`crate::connection::Connection`].
pub trait Protocol: Send + Sync + 'static {
    type Event: Clone + fmt::Debug + Send + 'static;
    type Dispatcher: Dispatcher<Self::Event>;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Maximum outgoing line length, terminator included.
    fn max_line_len(&self) -> Option<usize>;

    /// Heartbeat ping line.
    fn ping(&self) -> String;

    /// Lines sent right after the transport opens.
    fn handshake(&self) -> Vec<String>;

    /// Whether the session is ready only after the dispatcher reports
    /// [`Control::Ready`]; otherwise it is ready once the transport opens.
    fn awaits_ready(&self) -> bool;

    /// A fresh dispatcher for a new transport.
    fn dispatcher(&self) -> Self::Dispatcher;

    /// Lines sent once the session is ready, before `Connected` or
    /// `Reconnected` is raised. `resumed` is true after a reconnect cycle.
    fn after_ready(&self, resumed: bool) -> Vec<String>;
}
