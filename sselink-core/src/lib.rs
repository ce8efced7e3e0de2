//! Core types and SSE codec for sselink
//!
//! This crate provides the foundation shared by the sselink transports:
//!
//! - **Types**: operation descriptors, stream frames, and typed views over
//!   GraphQL execution results and error envelopes
//! - **Codec**: the incremental SSE decoder, frame mapping for the named
//!   event channels, and stream-address composition
//! - **Error handling**: the transport-level error enum the classifier
//!   consumes
//! - **Observability**: OpenTelemetry bootstrap and debug logging setup
//!
//! # Overview
//!
//! A GraphQL subscription is a long-lived operation yielding a sequence of
//! results over a unidirectional push channel. This crate defines what goes
//! over that channel and how it is framed; it deliberately knows nothing
//! about connections, retries, or liveness. The `sselink-client` crate
//! builds the resilient transport on top of this foundation.
//!
//! # Example
//!
//! ```rust
//! use sselink_core::{codec, Operation};
//! use url::Url;
//!
//! let base = Url::parse("https://gateway.local/graphql/stream").unwrap();
//! let op = Operation::subscription("subscription { sessionEvents { id } }");
//!
//! let target = codec::stream_url(&base, &op).unwrap();
//! assert!(target.query().unwrap().contains("query="));
//! ```

pub mod codec;
pub mod error;
pub mod observability;
pub mod types;

// Re-export the most commonly used types for convenience
pub use error::{Error, Result};
pub use observability::{
    init_debug_logging, init_observability, shutdown_observability, ObservabilityConfig,
};
pub use types::{ErrorEnvelope, ExecutionResult, Frame, Operation, OperationKind};
