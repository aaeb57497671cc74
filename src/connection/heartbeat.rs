//! Heartbeat (ping/pong) liveness monitor.
//!
//! Two timers: an interval timer that sends a ping every `interval`, and a
//! deadline timer armed only after a ping goes out. A pong disarms the
//! deadline; if the deadline fires first the link is told liveness was lost,
//! exactly once per unanswered ping.
//!
//! Before a session is ready the monitor can instead hold a one-shot ready
//! deadline, so a server that accepts the transport but never acknowledges
//! the handshake is treated like one that stopped answering pings.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::config::HeartbeatConfig;
use crate::telemetry::spans;

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub timeout: Duration,
}

impl From<&HeartbeatConfig> for HeartbeatSettings {
    fn from(config: &HeartbeatConfig) -> Self {
        Self {
            enabled: config.enabled,
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self::from(&HeartbeatConfig::default())
    }
}

/// An outstanding ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingHeartbeat {
    pub sent_at: Instant,
    pub awaiting_pong: bool,
}

/// What the monitor drives: the live connection.
#[async_trait]
pub trait HeartbeatLink: Send + Sync + 'static {
    /// Send one ping. Returns `false` if it could not be written.
    async fn send_ping(&self) -> bool;

    /// No pong arrived in time.
    fn liveness_lost(&self);
}

/// A spawned timer task that can be cancelled at any moment.
///
/// Dropping the handle cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `make(token)`; the future should exit once `token` is cancelled.
    pub fn spawn<F, Fut>(make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(make(token.clone()));
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_armed(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

struct MonitorState {
    settings: HeartbeatSettings,
    link: Option<Weak<dyn HeartbeatLink>>,
    interval_task: Option<ScheduledTask>,
    deadline: Option<ScheduledTask>,
    pending: Option<PendingHeartbeat>,
    /// Bumped on every ping and every stop so a stale deadline never fires.
    epoch: u64,
}

impl MonitorState {
    fn disarm(&mut self) {
        self.deadline = None;
        self.pending = None;
        self.epoch += 1;
    }
}

/// Periodic liveness prober, owned by one connection.
pub struct HeartbeatMonitor {
    protocol: &'static str,
    state: Arc<Mutex<MonitorState>>,
}

impl HeartbeatMonitor {
    pub fn new(protocol: &'static str, settings: HeartbeatSettings) -> Self {
        Self {
            protocol,
            state: Arc::new(Mutex::new(MonitorState {
                settings,
                link: None,
                interval_task: None,
                deadline: None,
                pending: None,
                epoch: 0,
            })),
        }
    }

    pub fn settings(&self) -> HeartbeatSettings {
        self.state.lock().settings
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().settings.enabled
    }

    /// Whether the interval timer is running.
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .interval_task
            .as_ref()
            .is_some_and(ScheduledTask::is_armed)
    }

    pub fn pending(&self) -> Option<PendingHeartbeat> {
        self.state.lock().pending
    }

    /// Begin probing `link`. Replaces any previous link.
    pub fn start(&self, link: Weak<dyn HeartbeatLink>) {
        let mut st = self.state.lock();
        st.disarm();
        st.interval_task = None;
        st.link = Some(link);
        if st.settings.enabled {
            st.interval_task = Some(self.spawn_interval(st.settings));
        }
    }

    /// Hold `link` to a ready deadline: unless [`HeartbeatMonitor::start`] or
    /// [`HeartbeatMonitor::stop`] runs within `timeout`, liveness is lost.
    pub fn expect_ready(&self, link: Weak<dyn HeartbeatLink>, timeout: Duration) {
        let mut st = self.state.lock();
        st.disarm();
        st.interval_task = None;
        st.link = Some(link);
        st.deadline = Some(spawn_deadline(
            Arc::clone(&self.state),
            self.protocol,
            timeout,
            st.epoch,
            Deadline::Ready,
        ));
    }

    /// Whether a ready or pong deadline is armed.
    pub fn has_deadline(&self) -> bool {
        self.state
            .lock()
            .deadline
            .as_ref()
            .is_some_and(ScheduledTask::is_armed)
    }

    /// Stop probing and disarm everything.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        st.link = None;
        st.interval_task = None;
        st.disarm();
    }

    /// A pong (or other ack) was observed. Returns `true` if it answered an
    /// outstanding ping.
    pub fn acknowledge(&self) -> bool {
        let mut st = self.state.lock();
        match st.pending {
            Some(p) if p.awaiting_pong => {
                debug!(
                    protocol = self.protocol,
                    rtt_ms = p.sent_at.elapsed().as_millis() as u64,
                    "pong received"
                );
                st.disarm();
                true
            }
            _ => false,
        }
    }

    /// Toggle the monitor. Disabling disarms a pending deadline; enabling on a
    /// live link restarts the interval timer.
    pub fn set_enabled(&self, enabled: bool) {
        let mut st = self.state.lock();
        if st.settings.enabled == enabled {
            return;
        }
        st.settings.enabled = enabled;
        if enabled {
            if st.link.is_some() {
                st.interval_task = Some(self.spawn_interval(st.settings));
            }
        } else {
            st.interval_task = None;
            st.disarm();
        }
        info!(protocol = self.protocol, enabled, "heartbeat toggled");
    }

    fn spawn_interval(&self, settings: HeartbeatSettings) -> ScheduledTask {
        let state = Arc::clone(&self.state);
        let protocol = self.protocol;
        ScheduledTask::spawn(move |token| {
            run_interval(state, protocol, settings, token)
                .instrument(spans::heartbeat(protocol))
        })
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_interval(
    state: Arc<Mutex<MonitorState>>,
    protocol: &'static str,
    settings: HeartbeatSettings,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Arm the deadline before the ping goes out so a fast pong always
        // finds something to disarm.
        let link = {
            let mut st = state.lock();
            if token.is_cancelled() {
                break;
            }
            if st.pending.is_some_and(|p| p.awaiting_pong) {
                debug!(protocol, "previous ping still unanswered, skipping tick");
                continue;
            }
            let Some(link) = st.link.as_ref().and_then(Weak::upgrade) else {
                break;
            };
            st.epoch += 1;
            st.pending = Some(PendingHeartbeat {
                sent_at: Instant::now(),
                awaiting_pong: true,
            });
            st.deadline = Some(spawn_deadline(
                Arc::clone(&state),
                protocol,
                settings.timeout,
                st.epoch,
                Deadline::Pong,
            ));
            link
        };

        if !link.send_ping().await {
            debug!(protocol, "ping could not be sent, waiting for deadline");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deadline {
    /// Answer to the outstanding ping.
    Pong,
    /// Protocol ready ack after the transport opened.
    Ready,
}

fn spawn_deadline(
    state: Arc<Mutex<MonitorState>>,
    protocol: &'static str,
    timeout: Duration,
    epoch: u64,
    kind: Deadline,
) -> ScheduledTask {
    ScheduledTask::spawn(move |token| {
        async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(timeout) => {}
            }

            let link = {
                let mut st = state.lock();
                let awaiting = match kind {
                    Deadline::Pong => st.pending.is_some_and(|p| p.awaiting_pong),
                    Deadline::Ready => true,
                };
                if st.epoch != epoch || !awaiting {
                    return;
                }
                // Taking our own handle out only cancels a token we no longer watch
                st.disarm();
                st.link.as_ref().and_then(Weak::upgrade)
            };

            match kind {
                Deadline::Pong => {
                    warn!(protocol, timeout_secs = timeout.as_secs(), "no pong before deadline")
                }
                Deadline::Ready => {
                    warn!(protocol, timeout_secs = timeout.as_secs(), "session never became ready")
                }
            }
            if let Some(link) = link {
                link.liveness_lost();
            }
        }
        .instrument(spans::heartbeat(protocol))
    })
}
