//! Lifecycle and protocol notifications.
//!
//! Observers register with [`EventBus::subscribe`] and receive every event
//! through their own unbounded channel, in publish order. Publishing never
//! waits on an observer; receivers that were dropped are pruned.

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A notification raised by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent<E> {
    /// First session is ready.
    Connected,
    /// A reconnect cycle finished and the new session is ready.
    Reconnected,
    /// Terminal disconnect; no reconnect follows.
    Disconnected,
    /// Opening the transport failed.
    ConnectFailed { reason: String },
    /// A transient error that did not end the session, or ended it with a
    /// reconnect still to come.
    Error { reason: String },
    /// A typed protocol event.
    Protocol(E),
}

impl<E> SessionEvent<E> {
    /// Map the protocol payload, keeping lifecycle variants.
    pub fn map<F, T>(self, f: F) -> SessionEvent<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            Self::Connected => SessionEvent::Connected,
            Self::Reconnected => SessionEvent::Reconnected,
            Self::Disconnected => SessionEvent::Disconnected,
            Self::ConnectFailed { reason } => SessionEvent::ConnectFailed { reason },
            Self::Error { reason } => SessionEvent::Error { reason },
            Self::Protocol(e) => SessionEvent::Protocol(f(e)),
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, Self::Protocol(_))
    }
}

/// Fan-out of events to registered observers.
pub struct EventBus<E> {
    observers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent<E>>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent<E>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().push(tx);
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Deliver `event` to every live observer.
    pub fn publish(&self, event: SessionEvent<E>) {
        let mut observers = self.observers.lock();
        match observers.len() {
            0 => {}
            1 => {
                if observers[0].send(event).is_err() {
                    observers.clear();
                }
            }
            _ => observers.retain(|tx| tx.send(event.clone()).is_ok()),
        }
    }
}
