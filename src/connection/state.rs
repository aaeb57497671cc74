//! Connection lifecycle state machine.
//!
//! Every check-and-transition happens under one lock, so of two callers
//! racing for conflicting transitions exactly one wins and the other gets
//! [`TransitionRejected`].

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
        })
    }
}

/// A transition that is not legal from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {action} while {state}")]
pub struct TransitionRejected {
    pub action: &'static str,
    pub state: ConnectionState,
}

/// What a reconnect request has to do first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectStep {
    /// Was connected; now disconnecting, and the completion reconnects.
    Disconnect,
    /// Was disconnected; now connecting.
    Connect,
    /// A connect or disconnect is already running and is left alone.
    InFlight(ConnectionState),
}

/// What a disconnect request has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectStep {
    /// Was connected; the caller tears the transport down.
    Teardown,
    /// A reconnect cycle is already tearing the transport down. It now ends
    /// there instead of connecting again.
    CancelReconnect,
}

#[derive(Debug)]
struct Inner {
    state: ConnectionState,
    reconnecting: bool,
}

/// Guarded lifecycle state plus the `reconnecting` flag.
#[derive(Debug)]
pub struct StateMachine {
    inner: Mutex<Inner>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                reconnecting: false,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_reconnecting(&self) -> bool {
        self.inner.lock().reconnecting
    }

    fn transition(
        &self,
        action: &'static str,
        from: ConnectionState,
        to: ConnectionState,
    ) -> Result<(), TransitionRejected> {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return Err(TransitionRejected {
                action,
                state: inner.state,
            });
        }
        inner.state = to;
        Ok(())
    }

    /// `Disconnected -> Connecting`
    pub fn begin_connect(&self) -> Result<(), TransitionRejected> {
        self.transition(
            "connect",
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
        )
    }

    /// `Connecting -> Connected`
    pub fn connect_succeeded(&self) -> Result<(), TransitionRejected> {
        self.transition(
            "complete connect",
            ConnectionState::Connecting,
            ConnectionState::Connected,
        )
    }

    /// `Connecting -> Disconnected`. A failed connect also ends any reconnect
    /// cycle; returns whether one was in progress.
    pub fn connect_failed(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Connecting {
            inner.state = ConnectionState::Disconnected;
        }
        std::mem::take(&mut inner.reconnecting)
    }

    /// `Connected -> Disconnecting`. A disconnect is terminal: it clears
    /// `reconnecting`, including for a cycle still tearing down or still
    /// waiting for its ready ack.
    pub fn begin_disconnect(&self) -> Result<DisconnectStep, TransitionRejected> {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connected => {
                inner.state = ConnectionState::Disconnecting;
                inner.reconnecting = false;
                Ok(DisconnectStep::Teardown)
            }
            ConnectionState::Disconnecting if inner.reconnecting => {
                inner.reconnecting = false;
                Ok(DisconnectStep::CancelReconnect)
            }
            state => Err(TransitionRejected {
                action: "disconnect",
                state,
            }),
        }
    }

    /// `Disconnecting -> Disconnected`. Returns the `reconnecting` flag, which
    /// decides between reconnecting and terminal shutdown.
    pub fn disconnect_succeeded(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Disconnecting {
            inner.state = ConnectionState::Disconnected;
        }
        inner.reconnecting
    }

    /// `Disconnecting -> Connected`; the transport is still usable.
    pub fn disconnect_failed(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Disconnecting {
            inner.state = ConnectionState::Connected;
        }
        inner.reconnecting = false;
    }

    /// Start a reconnect cycle in one atomic step.
    pub fn begin_reconnect(&self) -> ReconnectStep {
        let mut inner = self.inner.lock();
        match inner.state {
            ConnectionState::Connected => {
                inner.reconnecting = true;
                inner.state = ConnectionState::Disconnecting;
                ReconnectStep::Disconnect
            }
            ConnectionState::Disconnected => {
                inner.reconnecting = true;
                inner.state = ConnectionState::Connecting;
                ReconnectStep::Connect
            }
            state => ReconnectStep::InFlight(state),
        }
    }

    /// `Connected -> Disconnecting` with `reconnecting` set, for a cycle the
    /// connection starts itself (server request, lost liveness, remote
    /// close). Never revives a connection that is not live.
    pub fn begin_recovery(&self) -> Result<(), TransitionRejected> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            return Err(TransitionRejected {
                action: "recover",
                state: inner.state,
            });
        }
        inner.state = ConnectionState::Disconnecting;
        inner.reconnecting = true;
        Ok(())
    }

    /// Clear the flag once the new session is confirmed. Returns whether this
    /// session completes a reconnect.
    pub fn finish_reconnect(&self) -> bool {
        std::mem::take(&mut self.inner.lock().reconnecting)
    }
}
