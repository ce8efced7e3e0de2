//! Per-subscription connection state machine
//!
//! One subscription owns one [`ConnectionDriver`]: a task that holds the
//! physical stream, the heartbeat deadline, and the backoff sleeps, and
//! walks the lifecycle state machine:
//!
//! ```text
//! Connecting --(stream opened)--> Connected
//! Connecting --(retryable error)--> Reconnecting
//! Connected  --(retryable error)--> Reconnecting
//! Connected  --(non-retryable error)--> Failed (terminal)
//! Connected  --(server completion)--> Disconnected (terminal)
//! Reconnecting --(backoff elapsed)--> Connecting
//! Reconnecting --(attempt ceiling)--> Failed (terminal)
//! (any) --(consumer unsubscribes)--> Disconnected (terminal)
//! ```
//!
//! Entering `Connected` resets the attempt counter and arms the heartbeat.
//! Data frames reset the heartbeat and the activity timestamp and are
//! forwarded; `heartbeat` frames reset both without producing a consumer
//! event. Every failure goes through the classifier exactly once and either
//! feeds the backoff scheduler or terminates the subscription.
//!
//! Because the task owns all of its resources as plain values, teardown is
//! "stop the task": the socket and timers drop with it. The shared record
//! ([`ConnectionShared`]) exists only for introspection and for the
//! closed-flag handshake that guarantees at most one terminal delivery.

use crate::backoff::RetryPolicy;
use crate::classify::{self, CategorizedError};
use crate::connector::{FrameStream, StreamConnector, StreamRequest};
use crate::heartbeat::HeartbeatMonitor;
use crate::metrics::LinkMetrics;
use crate::observer::SubscriptionObserver;
use crate::registry::SubscriptionRegistry;
use futures::StreamExt;
use serde::Serialize;
use sselink_core::Frame;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Lifecycle stage of one physical stream.
///
/// Exactly one state is active at any time; `Disconnected` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Opening the stream
    Connecting,
    /// Stream established and live
    Connected,
    /// Waiting out a backoff delay before reconnecting; `attempt` counts
    /// reconnections since the last successful connect, starting at 1
    Reconnecting {
        /// The attempt number being waited out
        attempt: u32,
    },
    /// Terminal: completed by the server or unsubscribed by the consumer
    Disconnected,
    /// Terminal: a non-retryable failure, or the retry budget ran out
    Failed,
}

impl ConnectionState {
    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting { attempt } => {
                write!(f, "reconnecting (attempt {})", attempt)
            }
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Supervision state shared between a driver task, its handle, and the
/// registry.
///
/// Everything here is either atomic or behind a short-lived lock; nothing
/// is held across an await. The `closed` flag is the single source of
/// truth for "no further consumer deliveries": whoever flips it first owns
/// the terminal transition.
pub(crate) struct ConnectionShared {
    pub(crate) id: String,
    pub(crate) operation_name: Option<String>,
    closed: AtomicBool,
    state: Mutex<ConnectionState>,
    reconnect_attempts: AtomicU32,
    pub(crate) created_at: Instant,
    last_activity_at: Mutex<Instant>,
    last_error: Mutex<Option<CategorizedError>>,
}

impl ConnectionShared {
    pub(crate) fn new(id: String, operation_name: Option<String>) -> Self {
        let now = Instant::now();
        Self {
            id,
            operation_name,
            closed: AtomicBool::new(false),
            state: Mutex::new(ConnectionState::Connecting),
            reconnect_attempts: AtomicU32::new(0),
            created_at: now,
            last_activity_at: Mutex::new(now),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub(crate) fn set_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }

    /// Record activity on the stream.
    pub(crate) fn touch(&self) {
        *self
            .last_activity_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub(crate) fn last_activity(&self) -> Instant {
        *self
            .last_activity_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_error(&self, error: CategorizedError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub(crate) fn last_error(&self) -> Option<CategorizedError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flip the closed flag; `true` for the first caller only.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}

/// What one established stream ended with.
enum PumpOutcome {
    /// Server sent `complete`
    Complete,
    /// Non-retryable failure
    Fatal(CategorizedError),
    /// Retryable failure; feed the backoff scheduler
    Retry(CategorizedError),
}

/// The task body supervising one subscription.
pub(crate) struct ConnectionDriver {
    pub(crate) shared: Arc<ConnectionShared>,
    pub(crate) registry: Arc<SubscriptionRegistry>,
    pub(crate) connector: Arc<dyn StreamConnector>,
    pub(crate) request: StreamRequest,
    pub(crate) policy: RetryPolicy,
    pub(crate) heartbeat_timeout: Duration,
    pub(crate) observer: Box<dyn SubscriptionObserver>,
    pub(crate) metrics: Option<Arc<LinkMetrics>>,
}

impl ConnectionDriver {
    pub(crate) async fn run(mut self) {
        loop {
            self.shared.set_state(ConnectionState::Connecting);
            let was_reconnect = self.shared.attempts() > 0;

            match self.connector.connect(self.request.clone()).await {
                Ok(frames) => {
                    self.shared.set_state(ConnectionState::Connected);
                    self.shared.set_attempts(0);
                    self.shared.touch();
                    if let Some(m) = &self.metrics {
                        if was_reconnect {
                            m.record_reconnection_success();
                        }
                    }
                    tracing::debug!(id = %self.shared.id, "stream established");

                    match self.pump(frames).await {
                        PumpOutcome::Complete => return self.finish_complete(),
                        PumpOutcome::Fatal(error) => return self.finish_error(error),
                        PumpOutcome::Retry(error) => {
                            if !self.schedule_retry(error).await {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let error = classify::classify_transport(&e);
                    tracing::debug!(
                        id = %self.shared.id,
                        kind = %error.kind,
                        "connect failed: {}",
                        error.message
                    );
                    if !error.retryable {
                        return self.finish_error(error);
                    }
                    if !self.schedule_retry(error).await {
                        return;
                    }
                }
            }
        }
    }

    /// Deliver frames until the stream ends, errors, or goes silent.
    async fn pump(&mut self, mut frames: FrameStream) -> PumpOutcome {
        let mut heartbeat = HeartbeatMonitor::new(self.heartbeat_timeout);

        loop {
            // The deadline is snapshotted per iteration; a reset in the
            // frame arm takes effect on the next one.
            let expiry = tokio::time::sleep_until(heartbeat.deadline());
            tokio::select! {
                _ = expiry => {
                    let error = classify::timeout_after(heartbeat.window());
                    tracing::warn!(
                        id = %self.shared.id,
                        window_ms = heartbeat.window().as_millis() as u64,
                        "no activity within heartbeat window"
                    );
                    return PumpOutcome::Retry(error);
                }
                frame = frames.next() => match frame {
                    Some(Ok(Frame::Next(payload))) => {
                        heartbeat.reset();
                        self.shared.touch();
                        if let Some(m) = &self.metrics {
                            m.record_frame("next");
                        }
                        if !self.shared.is_closed() {
                            self.observer.on_next(payload);
                        }
                    }
                    Some(Ok(Frame::Heartbeat)) => {
                        heartbeat.reset();
                        self.shared.touch();
                        if let Some(m) = &self.metrics {
                            m.record_frame("heartbeat");
                        }
                        tracing::trace!(id = %self.shared.id, "heartbeat");
                    }
                    Some(Ok(Frame::Complete)) => {
                        return PumpOutcome::Complete;
                    }
                    Some(Ok(Frame::Error(payload))) => {
                        match classify::classify_envelope(&payload) {
                            // Keep-alive artifacts on the error channel
                            None => {
                                tracing::trace!(id = %self.shared.id, "ignoring empty error frame");
                            }
                            Some(error) if error.retryable => return PumpOutcome::Retry(error),
                            Some(error) => return PumpOutcome::Fatal(error),
                        }
                    }
                    Some(Err(e)) => {
                        let error = classify::classify_transport(&e);
                        if error.kind == classify::ErrorKind::Parse {
                            // Logged distinctly: parse faults usually mean a
                            // protocol mismatch, not network trouble
                            tracing::warn!(id = %self.shared.id, "malformed frame: {}", error.message);
                        }
                        return if error.retryable {
                            PumpOutcome::Retry(error)
                        } else {
                            PumpOutcome::Fatal(error)
                        };
                    }
                    None => {
                        return PumpOutcome::Retry(CategorizedError::new(
                            classify::ErrorKind::Network,
                            "stream ended without completion",
                        ));
                    }
                }
            }
        }
    }

    /// Wait out the backoff delay for a retryable failure.
    ///
    /// Returns `false` when the retry budget is exhausted, after delivering
    /// the terminal error.
    async fn schedule_retry(&mut self, error: CategorizedError) -> bool {
        let attempt = self.shared.attempts();
        let kind = error.kind;
        self.shared.record_error(error.clone());

        match self.policy.next_delay(kind, attempt) {
            Some(delay) => {
                self.shared
                    .set_state(ConnectionState::Reconnecting { attempt: attempt + 1 });
                self.shared.set_attempts(attempt + 1);
                if let Some(m) = &self.metrics {
                    m.record_error(kind.as_str());
                    m.record_reconnection_attempt();
                }
                tracing::info!(
                    id = %self.shared.id,
                    kind = %kind,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "reconnecting"
                );
                tokio::time::sleep(delay).await;
                true
            }
            None => {
                tracing::warn!(
                    id = %self.shared.id,
                    kind = %kind,
                    attempts = attempt,
                    "retry budget exhausted"
                );
                self.finish_error(error);
                false
            }
        }
    }

    /// Terminal failure: deliver the error once and tear down.
    fn finish_error(&mut self, error: CategorizedError) {
        self.shared.record_error(error.clone());
        if let Some(m) = &self.metrics {
            m.record_error(error.kind.as_str());
        }
        if self.shared.close() {
            self.shared.set_state(ConnectionState::Failed);
            tracing::info!(id = %self.shared.id, "subscription failed: {}", error);
            self.observer.on_error(error);
        }
        self.registry.remove(&self.shared.id);
        if let Some(m) = &self.metrics {
            m.update_active(self.registry.len() as i64);
        }
    }

    /// Terminal completion: deliver it once and tear down.
    fn finish_complete(&mut self) {
        if self.shared.close() {
            self.shared.set_state(ConnectionState::Disconnected);
            tracing::debug!(id = %self.shared.id, "subscription completed by server");
            self.observer.on_complete();
        }
        self.registry.remove(&self.shared.id);
        if let Some(m) = &self.metrics {
            m.update_active(self.registry.len() as i64);
        }
    }
}
