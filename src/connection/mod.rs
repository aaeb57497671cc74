//! Realtime connection management shared by the chat and PubSub clients.
//!
//! A [`Connection`] owns one transport session at a time and drives it
//! through the lifecycle state machine:
//!
//! - `connect` opens the transport, starts the reader task and sends the
//!   protocol handshake. The session is ready either immediately or when
//!   the dispatcher reports the protocol ack.
//! - `disconnect` detaches the sink, closes it, cancels the reader and joins
//!   it before the transport is dropped.
//! - `reconnect` sets the `reconnecting` flag and disconnects; the
//!   disconnect completion sees the flag and connects again. The next ready
//!   session raises `Reconnected` instead of `Connected`.
//!
//! A caller's `disconnect` always ends in `Disconnected`, even when it lands
//! in the middle of a reconnect cycle. Cycles the connection starts itself
//! (server request, lost liveness, remote close) only ever cycle a live
//! session.
//!
//! The reader task is the only decoder and dispatcher. Lifecycle control
//! (pong, server ping, ready ack, reconnect request) is applied in-line;
//! typed events are published to observers without waiting on them.

pub mod dispatch;
pub mod events;
pub mod heartbeat;
pub mod state;
pub mod writer;

pub use dispatch::{Control, Dispatched, Dispatcher, Protocol};
pub use events::{EventBus, SessionEvent};
pub use heartbeat::{HeartbeatMonitor, HeartbeatSettings, PendingHeartbeat};
pub use state::{ConnectionState, DisconnectStep, TransitionRejected};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::error::SendError;
use crate::telemetry::spans;
use crate::transport::{Connector, LineStream};
use heartbeat::HeartbeatLink;
use state::{ReconnectStep, StateMachine};
use writer::{Outbound, close_sink};

/// How long a close may take before the transport is abandoned.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-connection behaviour.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub heartbeat: HeartbeatSettings,
    /// Start a reconnect cycle when the remote end closes the stream.
    pub reconnect_on_remote_close: bool,
    /// How long an open transport may wait for the protocol ready ack.
    pub ready_timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            heartbeat: HeartbeatSettings::default(),
            reconnect_on_remote_close: true,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }
}

/// Result of a lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition ran to completion.
    Applied,
    /// The transition started but the transport operation failed; the
    /// matching event was raised.
    Failed,
    /// Not legal from the current state; nothing happened.
    Rejected(ConnectionState),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

struct ReaderHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner<P: Protocol> {
    me: Weak<Inner<P>>,
    protocol: P,
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
    state: StateMachine,
    outbound: Outbound,
    events: EventBus<P::Event>,
    heartbeat: HeartbeatMonitor,
    reader: Mutex<Option<ReaderHandle>>,
    /// Bumped for every opened transport.
    generation: AtomicU64,
    /// Generation whose session has been announced ready.
    ready_generation: AtomicU64,
}

/// One protocol session over a reconnectable transport.
pub struct Connection<P: Protocol> {
    inner: Arc<Inner<P>>,
}

impl<P: Protocol> Clone for Connection<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Protocol> Connection<P> {
    pub fn new<C: Connector>(protocol: P, connector: C, settings: ConnectionSettings) -> Self {
        let max_line_len = protocol.max_line_len();
        let name = protocol.name();
        let inner = Arc::new_cyclic(|me| Inner {
            me: me.clone(),
            protocol,
            connector: Arc::new(connector),
            settings,
            state: StateMachine::new(),
            outbound: Outbound::new(max_line_len),
            events: EventBus::new(),
            heartbeat: HeartbeatMonitor::new(name, settings.heartbeat),
            reader: Mutex::new(None),
            generation: AtomicU64::new(0),
            ready_generation: AtomicU64::new(0),
        });
        Self { inner }
    }

    /// Register an observer for lifecycle and protocol events.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent<P::Event>> {
        self.inner.events.subscribe()
    }

    pub fn protocol(&self) -> &P {
        &self.inner.protocol
    }

    pub fn endpoint(&self) -> String {
        self.inner.connector.endpoint()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.state()
    }

    /// Connected, and the protocol session on this transport is acknowledged.
    pub fn is_ready(&self) -> bool {
        let inner = &self.inner;
        inner.state.state() == ConnectionState::Connected
            && inner.ready_generation.load(Ordering::SeqCst) == inner.generation.load(Ordering::SeqCst)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.state.is_reconnecting()
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.inner.heartbeat
    }

    pub fn set_heartbeat_enabled(&self, enabled: bool) {
        self.inner.heartbeat.set_enabled(enabled);
    }

    /// Open the transport. Only legal from `Disconnected`.
    pub async fn connect(&self) -> TransitionOutcome {
        if let Err(rejected) = self.inner.state.begin_connect() {
            warn!(endpoint = %self.endpoint(), %rejected, "connect ignored");
            return TransitionOutcome::Rejected(rejected.state);
        }
        self.inner.open().await
    }

    /// Close the transport for good. Legal from `Connected`, or while a
    /// reconnect cycle is tearing down, which then stops there.
    pub async fn disconnect(&self) -> TransitionOutcome {
        match self.inner.state.begin_disconnect() {
            Ok(DisconnectStep::Teardown) => self.inner.finish_disconnect(false).await,
            Ok(DisconnectStep::CancelReconnect) => {
                info!(endpoint = %self.endpoint(), "reconnect cancelled by disconnect");
                TransitionOutcome::Applied
            }
            Err(rejected) => {
                warn!(endpoint = %self.endpoint(), %rejected, "disconnect ignored");
                TransitionOutcome::Rejected(rejected.state)
            }
        }
    }

    /// Run a disconnect-then-connect cycle, or connect directly when already
    /// disconnected.
    pub async fn reconnect(&self) -> TransitionOutcome {
        self.inner.reconnect().await
    }

    /// Send one line. Refused lines are logged and never touch the wire.
    pub async fn send(&self, line: impl Into<String>) -> Result<(), SendError> {
        self.inner.send(line.into()).await
    }
}

impl<P: Protocol> Inner<P> {
    fn endpoint(&self) -> String {
        self.connector.endpoint()
    }

    async fn send(&self, line: String) -> Result<(), SendError> {
        let result = if self.state.state() == ConnectionState::Connected {
            self.outbound.send(line).await
        } else {
            Err(SendError::NotConnected)
        };
        if let Err(e) = &result {
            warn!(
                protocol = self.protocol.name(),
                reason = e.reason(),
                error = %e,
                "send refused"
            );
        }
        result
    }

    /// Open a transport; the state is already `Connecting`.
    async fn open(&self) -> TransitionOutcome {
        let endpoint = self.endpoint();
        info!(endpoint = %endpoint, reconnecting = self.state.is_reconnecting(), "connecting");

        let parts = match self.connector.connect().await {
            Ok(parts) => parts,
            Err(e) => {
                let was_reconnecting = self.state.connect_failed();
                warn!(
                    endpoint = %endpoint,
                    error = %e,
                    reconnecting = was_reconnecting,
                    "connect failed"
                );
                self.events.publish(SessionEvent::ConnectFailed {
                    reason: e.to_string(),
                });
                return TransitionOutcome::Failed;
            }
        };

        self.outbound.install(parts.writer).await;
        if let Err(rejected) = self.state.connect_succeeded() {
            warn!(endpoint = %endpoint, %rejected, "connect completed in unexpected state");
            if let Some(mut sink) = self.outbound.take().await {
                let _ = close_sink(&mut sink).await;
            }
            return TransitionOutcome::Rejected(rejected.state);
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        // Armed before the reader runs so an early ack always finds it
        if self.protocol.awaits_ready() {
            let link: Weak<dyn HeartbeatLink> = self.me.clone();
            self.heartbeat.expect_ready(link, self.settings.ready_timeout);
        }
        self.spawn_reader(parts.reader, generation);
        info!(endpoint = %endpoint, generation, "transport open");

        for line in self.protocol.handshake() {
            if let Err(e) = self.outbound.send(line).await {
                warn!(endpoint = %endpoint, error = %e, "handshake line not sent");
            }
        }

        if !self.protocol.awaits_ready() {
            self.on_ready(generation).await;
        }
        TransitionOutcome::Applied
    }

    /// The protocol session is up.
    async fn on_ready(&self, generation: u64) {
        if self.ready_generation.swap(generation, Ordering::SeqCst) == generation {
            debug!(generation, "duplicate ready ack ignored");
            return;
        }

        let resumed = self.state.finish_reconnect();
        let link: Weak<dyn HeartbeatLink> = self.me.clone();
        self.heartbeat.start(link);

        for line in self.protocol.after_ready(resumed) {
            if let Err(e) = self.outbound.send(line).await {
                warn!(error = %e, "replay line not sent");
            }
        }

        if resumed {
            info!(endpoint = %self.endpoint(), "reconnected");
            self.events.publish(SessionEvent::Reconnected);
        } else {
            info!(endpoint = %self.endpoint(), "connected");
            self.events.publish(SessionEvent::Connected);
        }
    }

    /// Complete a disconnect; the state is already `Disconnecting`.
    ///
    /// With `transport_dead` the close is best effort: the remote end is gone
    /// or unresponsive, so a failed close still completes the disconnect.
    async fn finish_disconnect(&self, transport_dead: bool) -> TransitionOutcome {
        let endpoint = self.endpoint();
        self.heartbeat.stop();

        if let Some(mut sink) = self.outbound.take().await {
            let closed = tokio::time::timeout(CLOSE_TIMEOUT, close_sink(&mut sink)).await;
            let failure = match closed {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(_) => Some(format!("close timed out after {:?}", CLOSE_TIMEOUT)),
            };
            if let Some(reason) = failure {
                if transport_dead {
                    debug!(endpoint = %endpoint, reason = %reason, "close of dead transport failed");
                } else {
                    warn!(endpoint = %endpoint, reason = %reason, "disconnect failed, keeping connection");
                    self.outbound.install(sink).await;
                    self.state.disconnect_failed();
                    self.resume_liveness();
                    self.events.publish(SessionEvent::Error { reason });
                    return TransitionOutcome::Failed;
                }
            }
        }

        self.stop_reader().await;

        if self.state.disconnect_succeeded() {
            info!(endpoint = %endpoint, "disconnected, reconnecting");
            if let Err(rejected) = self.state.begin_connect() {
                warn!(endpoint = %endpoint, %rejected, "reconnect could not start");
                return TransitionOutcome::Rejected(rejected.state);
            }
            return self.open().await;
        }

        info!(endpoint = %endpoint, "disconnected");
        self.events.publish(SessionEvent::Disconnected);
        TransitionOutcome::Applied
    }

    /// Restart liveness tracking for a session that stays up after a failed
    /// close.
    fn resume_liveness(&self) {
        let link: Weak<dyn HeartbeatLink> = self.me.clone();
        let generation = self.generation.load(Ordering::SeqCst);
        if self.ready_generation.load(Ordering::SeqCst) == generation {
            self.heartbeat.start(link);
        } else if self.protocol.awaits_ready() {
            self.heartbeat.expect_ready(link, self.settings.ready_timeout);
        }
    }

    /// Caller-requested reconnect.
    async fn reconnect(&self) -> TransitionOutcome {
        match self.state.begin_reconnect() {
            ReconnectStep::Disconnect => {
                info!(endpoint = %self.endpoint(), "reconnect: disconnecting");
                self.finish_disconnect(false).await
            }
            ReconnectStep::Connect => self.open().await,
            ReconnectStep::InFlight(state) => {
                warn!(endpoint = %self.endpoint(), %state, "reconnect ignored, transition in flight");
                TransitionOutcome::Rejected(state)
            }
        }
    }

    /// Reconnect the session of `generation` because the connection itself
    /// found it unusable. A stale generation, or a session that is no longer
    /// live, is left alone.
    async fn recover(&self, generation: u64, transport_dead: bool) -> TransitionOutcome {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "recovery for a previous transport ignored");
            return TransitionOutcome::Rejected(self.state.state());
        }
        if let Err(rejected) = self.state.begin_recovery() {
            debug!(endpoint = %self.endpoint(), %rejected, "recovery not needed");
            return TransitionOutcome::Rejected(rejected.state);
        }
        info!(endpoint = %self.endpoint(), generation, "reconnect: disconnecting");
        self.finish_disconnect(transport_dead).await
    }

    /// The reader saw the stream end or fail.
    async fn on_remote_close(&self, generation: u64, error: Option<String>) {
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(generation, "close of a previous transport ignored");
            return;
        }
        if self.state.state() != ConnectionState::Connected {
            // A local transition owns the teardown
            return;
        }

        warn!(
            endpoint = %self.endpoint(),
            error = error.as_deref().unwrap_or("eof"),
            "connection closed by remote"
        );
        if let Some(reason) = error {
            self.events.publish(SessionEvent::Error { reason });
        }

        if self.settings.reconnect_on_remote_close {
            self.recover(generation, true).await;
        } else if let Ok(DisconnectStep::Teardown) = self.state.begin_disconnect() {
            self.finish_disconnect(true).await;
        }
    }

    async fn handle_line(&self, dispatcher: &mut P::Dispatcher, line: &str, generation: u64) {
        let Dispatched { control, event } = dispatcher.dispatch(line);

        match control {
            Some(Control::Pong) => {
                self.heartbeat.acknowledge();
            }
            Some(Control::Reply(reply)) => {
                if let Err(e) = self.outbound.send(reply).await {
                    debug!(error = %e, "control reply not sent");
                }
            }
            Some(Control::Ready) => self.on_ready(generation).await,
            Some(Control::Reconnect) => {
                info!(endpoint = %self.endpoint(), "server requested reconnect");
                self.spawn_recovery(generation, false);
            }
            None => {}
        }

        if let Some(event) = event {
            self.events.publish(SessionEvent::Protocol(event));
        }
    }

    fn spawn_reader(&self, reader: LineStream, generation: u64) {
        let token = CancellationToken::new();
        let span = spans::connection(self.protocol.name(), &self.endpoint(), generation);
        let handle = tokio::spawn(
            run_reader(
                self.me.clone(),
                reader,
                self.protocol.dispatcher(),
                token.clone(),
                generation,
            )
            .instrument(span),
        );

        let previous = self.reader.lock().replace(ReaderHandle { token, handle });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
    }

    /// Cancel the reader and wait for it to exit.
    async fn stop_reader(&self) {
        let reader = self.reader.lock().take();
        let Some(ReaderHandle { token, handle }) = reader else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await
            && e.is_panic()
        {
            warn!(endpoint = %self.endpoint(), "reader task panicked");
        }
    }

    fn spawn_recovery(&self, generation: u64, transport_dead: bool) {
        let Some(inner) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            inner.recover(generation, transport_dead).await;
        });
    }

    fn spawn_remote_close(&self, generation: u64, error: Option<String>) {
        let Some(inner) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            inner.on_remote_close(generation, error).await;
        });
    }
}

#[async_trait]
impl<P: Protocol> HeartbeatLink for Inner<P> {
    async fn send_ping(&self) -> bool {
        self.outbound.send(self.protocol.ping()).await.is_ok()
    }

    fn liveness_lost(&self) {
        warn!(endpoint = %self.endpoint(), "liveness lost, reconnecting");
        self.spawn_recovery(self.generation.load(Ordering::SeqCst), true);
    }
}

async fn run_reader<P: Protocol>(
    inner: Weak<Inner<P>>,
    mut reader: LineStream,
    mut dispatcher: P::Dispatcher,
    token: CancellationToken,
    generation: u64,
) {
    let error = loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            item = reader.next() => item,
        };
        let Some(conn) = inner.upgrade() else {
            return;
        };
        match item {
            Some(Ok(line)) => {
                debug!(line = %line, "<<");
                conn.handle_line(&mut dispatcher, &line, generation).await;
            }
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };

    if token.is_cancelled() {
        return;
    }
    if let Some(conn) = inner.upgrade() {
        conn.spawn_remote_close(generation, error);
    }
}
