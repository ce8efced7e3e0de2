//! Liveness monitoring for established streams
//!
//! A subscription can sit idle for minutes while still being perfectly
//! healthy, so liveness is proven by activity — data frames or named
//! `heartbeat` signals — rather than by payload delivery. The monitor keeps
//! a rolling deadline: any activity pushes it out by the configured window,
//! and if the deadline is ever reached the connection supervisor synthesizes
//! a `Timeout` categorized error and routes it through the same recovery
//! path as a socket-reported failure. The monitor has no other side
//! channel.
//!
//! The deadline is a plain value owned by the connection's driver task, so
//! teardown never has to hunt for ambient timer state: dropping the driver
//! drops the monitor.

use std::time::Duration;
use tokio::time::Instant;

/// Rolling activity deadline for one established stream.
///
/// Created when a connection reaches `Connected` and re-armed on every
/// activity event. The supervisor sleeps against
/// [`deadline`](Self::deadline) alongside the frame stream.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    window: Duration,
    deadline: Instant,
}

impl HeartbeatMonitor {
    /// Arm a monitor whose deadline is `window` from now.
    ///
    /// The window should be at least double the server's expected heartbeat
    /// cadence, otherwise ordinary jitter will look like an outage.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: Instant::now() + window,
        }
    }

    /// Push the deadline out to `window` from now.
    pub fn reset(&mut self) {
        self.deadline = Instant::now() + self.window;
    }

    /// The configured activity window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The instant the connection is declared dead without further activity.
    ///
    /// Snapshot value: sleep against it (`sleep_until`) rather than holding
    /// a borrow of the monitor across the wait, so activity handlers can
    /// re-arm between polls.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}
