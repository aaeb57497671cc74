//! Topic subscription bookkeeping.
//!
//! Three views of the same topics:
//! - `desired`: what the caller asked for. Replayed after a reconnect.
//! - `active`: what the server confirmed on the current transport.
//! - `pending`: requests sent but not yet answered, keyed by nonce.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use twitchlink_proto::pubsub::RequestKind;

#[derive(Debug, Clone)]
struct PendingRequest {
    kind: RequestKind,
    topics: Vec<String>,
    /// Topics whose desired state this request flipped.
    changed: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    desired: BTreeSet<String>,
    active: BTreeSet<String>,
    pending: HashMap<String, PendingRequest>,
}

/// How a server response was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The nonce matched no pending request.
    Unknown,
    Confirmed { kind: RequestKind, topics: Vec<String> },
    Rejected { kind: RequestKind, topics: Vec<String> },
}

/// Shared subscription state. Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSet {
    inner: Arc<Mutex<Inner>>,
}

/// Point-in-time copy for callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub desired: Vec<String>,
    pub active: Vec<String>,
    pub pending: usize,
}

impl SubscriptionSet {
    pub fn new<I, S>(initial: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let desired = initial
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                desired,
                ..Inner::default()
            })),
        }
    }

    /// Track a request about to be sent.
    pub fn record(&self, nonce: &str, kind: RequestKind, topics: &[String]) {
        let mut inner = self.inner.lock();
        let changed: Vec<String> = topics
            .iter()
            .filter(|topic| match kind {
                RequestKind::Listen => inner.desired.insert((*topic).clone()),
                RequestKind::Unlisten => inner.desired.remove(*topic),
                _ => false,
            })
            .cloned()
            .collect();
        inner.pending.insert(
            nonce.to_owned(),
            PendingRequest {
                kind,
                topics: topics.to_vec(),
                changed,
            },
        );
    }

    /// A recorded request was never sent; undo it.
    pub fn abandon(&self, nonce: &str) {
        let mut inner = self.inner.lock();
        if let Some(request) = inner.pending.remove(nonce) {
            revert(&mut inner.desired, &request);
        }
    }

    /// Apply the server's answer for `nonce`.
    pub fn resolve(&self, nonce: &str, error: Option<&str>) -> Resolution {
        let mut inner = self.inner.lock();
        let Some(request) = inner.pending.remove(nonce) else {
            return Resolution::Unknown;
        };

        if error.is_some() {
            revert(&mut inner.desired, &request);
            return Resolution::Rejected {
                kind: request.kind,
                topics: request.topics,
            };
        }

        match request.kind {
            RequestKind::Listen => inner.active.extend(request.topics.iter().cloned()),
            RequestKind::Unlisten => {
                for topic in &request.topics {
                    inner.active.remove(topic);
                }
            }
            _ => {}
        }
        Resolution::Confirmed {
            kind: request.kind,
            topics: request.topics,
        }
    }

    /// A new transport has no subscriptions and will never answer old
    /// requests.
    pub fn reset_transport(&self) {
        let mut inner = self.inner.lock();
        inner.active.clear();
        inner.pending.clear();
    }

    pub fn desired(&self) -> Vec<String> {
        self.inner.lock().desired.iter().cloned().collect()
    }

    pub fn is_active(&self, topic: &str) -> bool {
        self.inner.lock().active.contains(topic)
    }

    pub fn snapshot(&self) -> SubscriptionSnapshot {
        let inner = self.inner.lock();
        SubscriptionSnapshot {
            desired: inner.desired.iter().cloned().collect(),
            active: inner.active.iter().cloned().collect(),
            pending: inner.pending.len(),
        }
    }
}

fn revert(desired: &mut BTreeSet<String>, request: &PendingRequest) {
    for topic in &request.changed {
        match request.kind {
            RequestKind::Listen => {
                desired.remove(topic);
            }
            RequestKind::Unlisten => {
                desired.insert(topic.clone());
            }
            _ => {}
        }
    }
}
