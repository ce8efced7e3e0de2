//! Core types for the streaming subscription protocol
//!
//! This module defines the data structures shared by every transport built
//! on sselink:
//!
//! - **Operation**: a GraphQL operation descriptor as it arrives from the
//!   link chain (document, variables, operation name, root kind)
//! - **Frame**: one decoded event from the server stream, on one of the
//!   named channels (`next`, `error`, `complete`, `heartbeat`)
//! - **ExecutionResult / ErrorEnvelope**: typed views over the JSON payloads
//!   carried by `next` and `error` frames
//!
//! The transport itself never interprets query semantics; `Operation` is an
//! opaque descriptor that gets encoded into the stream address, and `next`
//! payloads are passed through to the consumer unchanged. The typed views
//! exist for consumers and for error classification, not for the hot path.

use serde::{Deserialize, Serialize};

/// Root kind of a GraphQL operation.
///
/// The streaming link only activates for [`OperationKind::Subscription`];
/// queries and mutations belong to the request/response transport and are
/// rejected at the link boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Single request/response read
    Query,
    /// Single request/response write
    Mutation,
    /// Long-lived stream of results
    Subscription,
}

impl OperationKind {
    /// Whether this operation is served by the streaming link.
    pub fn is_subscription(&self) -> bool {
        matches!(self, OperationKind::Subscription)
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        };
        write!(f, "{}", name)
    }
}

/// A GraphQL operation descriptor.
///
/// Carries the operation document verbatim, its variable bindings, and an
/// optional operation name. The descriptor is what the link encodes into
/// the stream address (see [`crate::codec::stream_url`]); the transport
/// never parses the document.
///
/// # Examples
///
/// ```rust
/// use sselink_core::Operation;
/// use serde_json::json;
///
/// let op = Operation::subscription("subscription OnTick { tick { seq } }")
///     .with_operation_name("OnTick")
///     .with_variable("channel", json!("metrics"));
///
/// assert!(op.kind.is_subscription());
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    /// The operation document, passed through verbatim
    pub document: String,
    /// Variable bindings; encoded as JSON only when non-empty
    pub variables: serde_json::Map<String, serde_json::Value>,
    /// Optional operation name, for documents with several operations
    pub operation_name: Option<String>,
    /// Root operation kind
    pub kind: OperationKind,
}

impl Operation {
    fn new(document: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            document: document.into(),
            variables: serde_json::Map::new(),
            operation_name: None,
            kind,
        }
    }

    /// Create a subscription operation descriptor.
    pub fn subscription(document: impl Into<String>) -> Self {
        Self::new(document, OperationKind::Subscription)
    }

    /// Create a query operation descriptor.
    ///
    /// Queries are not handled by the streaming link; this constructor
    /// exists so the link boundary can be exercised with realistic input.
    pub fn query(document: impl Into<String>) -> Self {
        Self::new(document, OperationKind::Query)
    }

    /// Create a mutation operation descriptor.
    pub fn mutation(document: impl Into<String>) -> Self {
        Self::new(document, OperationKind::Mutation)
    }

    /// Replace the full variable map.
    pub fn with_variables(mut self, variables: serde_json::Map<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Bind a single variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Set the operation name.
    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

/// One decoded event from the server stream.
///
/// The wire protocol is named SSE channels, not raw generic messages:
/// the server tags every event with one of four names and the decoder maps
/// them onto this enum. Unknown event names are dropped by the codec before
/// a `Frame` is ever constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A data event; the JSON payload matches the GraphQL execution result
    /// shape and is forwarded to the consumer unchanged
    Next(serde_json::Value),
    /// A server-sent error envelope; classification decides whether it is
    /// terminal or recoverable
    Error(serde_json::Value),
    /// Terminal completion signal, no payload
    Complete,
    /// Liveness signal, no payload, never visible to the consumer
    Heartbeat,
}

impl Frame {
    /// Wire name of the channel this frame arrived on.
    pub fn channel(&self) -> &'static str {
        match self {
            Frame::Next(_) => "next",
            Frame::Error(_) => "error",
            Frame::Complete => "complete",
            Frame::Heartbeat => "heartbeat",
        }
    }
}

/// Typed view over the payload of a `next` frame.
///
/// The transport delivers raw JSON; consumers that want the standard
/// GraphQL execution result shape can deserialize into this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// The result data, if execution produced any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Field errors reported alongside (or instead of) data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorEnvelope>,
}

/// A single GraphQL error object as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Human-readable error description
    pub message: String,
    /// Source locations within the operation document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<serde_json::Value>,
    /// Response path the error applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<serde_json::Value>,
    /// Vendor extensions; gateways put machine-readable codes here
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl ErrorEnvelope {
    /// The machine-readable error code, if the gateway supplied one.
    pub fn code(&self) -> Option<&str> {
        self.extensions.get("code").and_then(|v| v.as_str())
    }

    /// The HTTP-equivalent status carried in extensions, if any.
    pub fn status(&self) -> Option<u16> {
        self.extensions
            .get("status")
            .or_else(|| self.extensions.get("statusCode"))
            .and_then(|v| v.as_u64())
            .and_then(|s| u16::try_from(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_builders() {
        let op = Operation::subscription("subscription { tick }")
            .with_operation_name("Tick")
            .with_variable("limit", json!(10));

        assert_eq!(op.kind, OperationKind::Subscription);
        assert!(op.kind.is_subscription());
        assert_eq!(op.operation_name.as_deref(), Some("Tick"));
        assert_eq!(op.variables.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_non_subscription_kinds() {
        assert!(!Operation::query("query { me }").kind.is_subscription());
        assert!(!Operation::mutation("mutation { bump }").kind.is_subscription());
    }

    #[test]
    fn test_frame_channel_names() {
        assert_eq!(Frame::Next(json!({})).channel(), "next");
        assert_eq!(Frame::Error(json!({})).channel(), "error");
        assert_eq!(Frame::Complete.channel(), "complete");
        assert_eq!(Frame::Heartbeat.channel(), "heartbeat");
    }

    #[test]
    fn test_execution_result_deserialization() {
        let json = r#"{"data":{"tick":{"seq":4}}}"#;
        let result: ExecutionResult = serde_json::from_str(json).unwrap();
        assert!(result.data.is_some());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_error_envelope_code_and_status() {
        let json = r#"{
            "message": "not allowed",
            "extensions": {"code": "FORBIDDEN", "status": 403}
        }"#;
        let envelope: ErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.code(), Some("FORBIDDEN"));
        assert_eq!(envelope.status(), Some(403));
    }

    #[test]
    fn test_error_envelope_without_extensions() {
        let envelope: ErrorEnvelope = serde_json::from_str(r#"{"message":"boom"}"#).unwrap();
        assert_eq!(envelope.code(), None);
        assert_eq!(envelope.status(), None);
    }
}
