//! Link metrics definitions
//!
//! OpenTelemetry instruments for monitoring a fleet of long-lived
//! subscriptions. Reconnection is invisible to consumers by design, so
//! these metrics (plus the registry introspection API) are where operators
//! see it.
//!
//! # Metrics Collected
//!
//! - **active_subscriptions**: currently tracked subscriptions (gauge)
//! - **frames_received**: frames by channel name (counter)
//! - **errors_total**: classified failures by kind (counter)
//! - **reconnection_attempts**: reconnect timers scheduled (counter)
//! - **reconnection_success**: streams re-established after loss (counter)
//!
//! Metrics are recorded automatically when observability is enabled via
//! `LinkBuilder::with_observability()`.

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Meter},
    KeyValue,
};

/// Link metrics for monitoring
pub struct LinkMetrics {
    /// Number of currently tracked subscriptions
    pub active_subscriptions: Gauge<i64>,
    /// Total frames received, by channel
    pub frames_received: Counter<u64>,
    /// Total classified failures, by kind
    pub errors_total: Counter<u64>,
    /// Total reconnection attempts scheduled
    pub reconnection_attempts: Counter<u64>,
    /// Total successful reconnections
    pub reconnection_success: Counter<u64>,
}

impl LinkMetrics {
    /// Create a new LinkMetrics instance
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create a new LinkMetrics instance with a custom meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            active_subscriptions: meter
                .i64_gauge("sselink.client.subscriptions.active")
                .with_description("Number of currently tracked subscriptions")
                .build(),
            frames_received: meter
                .u64_counter("sselink.client.frames.received")
                .with_description("Total frames received, by channel")
                .build(),
            errors_total: meter
                .u64_counter("sselink.client.errors.total")
                .with_description("Total classified failures, by kind")
                .build(),
            reconnection_attempts: meter
                .u64_counter("sselink.client.reconnection.attempts")
                .with_description("Total reconnection attempts scheduled")
                .build(),
            reconnection_success: meter
                .u64_counter("sselink.client.reconnection.success")
                .with_description("Total successful reconnections")
                .build(),
        }
    }

    /// Update the active subscription count
    pub fn update_active(&self, count: i64) {
        self.active_subscriptions.record(count, &[]);
    }

    /// Record a received frame
    pub fn record_frame(&self, channel: &str) {
        let attributes = &[KeyValue::new("channel", channel.to_string())];
        self.frames_received.add(1, attributes);
    }

    /// Record a classified failure
    pub fn record_error(&self, kind: &str) {
        let attributes = &[KeyValue::new("kind", kind.to_string())];
        self.errors_total.add(1, attributes);
    }

    /// Record a reconnection attempt
    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    /// Record a successful reconnection
    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }
}
