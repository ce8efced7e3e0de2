//! SSELINK - GraphQL Subscriptions Over Server-Sent Events
//!
//! This is the main convenience crate that re-exports the sselink
//! sub-crates. Use it if you want a single dependency providing the full
//! subscription transport.
//!
//! # Architecture
//!
//! sselink is organized into modular crates:
//!
//! - **sselink-core**: operation descriptors, stream frames, SSE codec,
//!   error types, observability bootstrap
//! - **sselink-client**: the resilient subscription transport — link,
//!   per-connection state machines, classified failure recovery, backoff
//!   with jitter, heartbeat monitoring, registry introspection
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sselink::{CallbackObserver, Operation, SubscriptionLink};
//!
//! #[tokio::main]
//! async fn main() -> sselink::core::Result<()> {
//!     let link = SubscriptionLink::builder("https://gateway.local/graphql/stream")
//!         .header("Authorization", "Bearer token")
//!         .build()?;
//!
//!     let handle = link.subscribe(
//!         Operation::subscription("subscription { repoEvents { path } }"),
//!         CallbackObserver::new().on_next(|event| println!("{}", event)),
//!     )?;
//!
//!     // ... drive the application; tear down at shutdown
//!     handle.unsubscribe();
//!     Ok(())
//! }
//! ```

// Re-export all public APIs from sub-crates
pub use sselink_client as client;
pub use sselink_core as core;

// Convenience re-exports of the most commonly used types
pub use sselink_client::{
    CallbackObserver, CategorizedError, ConnectionState, ErrorKind, LinkBuilder, RetryPolicy,
    SubscriptionHandle, SubscriptionInfo, SubscriptionLink, SubscriptionStream,
};
pub use sselink_core::{Operation, OperationKind};
