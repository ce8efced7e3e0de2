//! Resilient GraphQL subscription transport over Server-Sent Events
//!
//! This crate turns a GraphQL subscription operation into a managed,
//! auto-reconnecting, heartbeat-monitored SSE stream, exposed through the
//! same push-based contract (`next` / `error` / `complete`) the rest of a
//! client pipeline expects from any operation.
//!
//! # Core Features
//!
//! - **One supervised connection per subscription**: each subscribe call
//!   gets its own state machine, heartbeat deadline, and retry budget
//! - **Categorized failure recovery**: failures are classified once
//!   (network, auth, server, client, timeout, parse) and retried — or not —
//!   by kind
//! - **Exponential backoff with jitter**: reconnection storms across many
//!   failing subscriptions spread out instead of synchronizing
//! - **Liveness independent of payload**: a named heartbeat channel keeps
//!   idle-but-healthy streams alive and flags silent ones
//! - **Leak-free teardown**: unsubscribing synchronously stops the driver
//!   task, dropping its socket and timers, and removes the registry entry
//! - **Operational introspection**: enumerate live subscriptions with
//!   state, attempt count, and last error; dispose everything at shutdown
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sselink_client::{CallbackObserver, SubscriptionLink};
//! use sselink_core::Operation;
//!
//! # async fn example() -> sselink_core::Result<()> {
//! let link = SubscriptionLink::builder("https://gateway.local/graphql/stream")
//!     .header("Authorization", "Bearer token")
//!     .build()?;
//!
//! let operation = Operation::subscription("subscription { sessionEvents { id kind } }")
//!     .with_operation_name("SessionEvents");
//!
//! let (handle, mut events) = link.subscribe_stream(operation)?;
//!
//! while let Some(event) = events.next_event().await {
//!     println!("{:?}", event);
//! }
//!
//! handle.unsubscribe();
//! # Ok(())
//! # }
//! ```
//!
//! # With Retry Tuning
//!
//! ```rust,no_run
//! use sselink_client::{LinkBuilder, RetryPolicy};
//! use std::time::Duration;
//!
//! # fn example() -> sselink_core::Result<()> {
//! let link = LinkBuilder::new("https://gateway.local/graphql/stream")
//!     .retry(
//!         RetryPolicy::default()
//!             .with_attempts(10)
//!             .with_delay(Duration::from_millis(500))
//!             .with_max_delay(Duration::from_secs(60)),
//!     )
//!     .heartbeat_timeout(Duration::from_secs(90))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod classify;
mod config;
mod connection;
mod connector;
mod heartbeat;
mod link;
mod link_builder;
mod metrics;
mod observer;
mod registry;

pub use backoff::{RetryPolicy, JITTER_MS};
pub use classify::{classify_envelope, classify_transport, CategorizedError, ErrorKind};
pub use config::{Credentials, DebugConfig, LinkConfig, LogLevel, DEFAULT_HEARTBEAT_TIMEOUT};
pub use connection::ConnectionState;
pub use connector::{frame_stream, FrameStream, HttpConnector, StreamConnector, StreamRequest};
pub use link::{SubscriptionHandle, SubscriptionLink};
pub use link_builder::LinkBuilder;
pub use metrics::LinkMetrics;
pub use observer::{
    CallbackObserver, SubscriptionEvent, SubscriptionObserver, SubscriptionStream,
};
pub use registry::{SubscriptionInfo, SubscriptionRegistry};
