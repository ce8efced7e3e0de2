//! Error types for sselink
//!
//! This module provides the transport-internal error type used across the
//! sselink crates. It covers everything that can go wrong below the
//! classification layer: the HTTP handshake, the byte stream, SSE framing,
//! and JSON payload parsing.
//!
//! # Two Error Layers
//!
//! sselink distinguishes two layers of failure:
//!
//! - **`Error`** (this module): raw transport faults as they happen. These
//!   are internal; the connection supervisor feeds them to the error
//!   classifier.
//! - **`CategorizedError`** (in `sselink-client`): the consumer-facing,
//!   classified form carrying a fixed kind taxonomy and a retryability
//!   verdict. It is computed exactly once per failure and never mutated.
//!
//! Code inside the crates propagates `Error` with `?`; only the classifier
//! turns it into something a consumer sees.

use thiserror::Error;

/// Result type for sselink operations
///
/// Convenience alias used throughout the sselink crates.
pub type Result<T> = std::result::Result<T, Error>;

/// Transport-level error for streaming subscription operations
///
/// Represents raw failures below the classification layer. Variants map to
/// where in the pipeline the failure happened, not to how it should be
/// handled; retryability is decided later by the classifier.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// HTTP request failure before a stream was established
    ///
    /// Connection refused, DNS failure, TLS failure, request build errors.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered the stream request with a non-success status
    ///
    /// The status code is preserved so the classifier can distinguish
    /// authentication failures (401/403) from other client or server faults.
    #[error("Handshake rejected with status {status}")]
    HandshakeStatus {
        /// The HTTP status code the server answered with
        status: u16,
    },

    /// The established byte stream failed mid-flight
    ///
    /// Read errors, aborted transfers, or the peer dropping the connection
    /// without a `complete` frame.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A frame payload could not be parsed
    ///
    /// Usually indicates a protocol or version mismatch with the gateway
    /// rather than network instability.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization of an outgoing value failed
    ///
    /// Occurs when encoding operation variables into the stream address.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    ///
    /// Bad endpoint URL, unusable header values, and similar setup faults.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The operation kind is not handled by this transport
    ///
    /// Queries and mutations fall through to the request/response transport;
    /// the streaming link rejects them at the boundary.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The connection was closed
    ///
    /// The stream is no longer active and no further frames will arrive.
    #[error("Connection closed")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_status_display() {
        let error = Error::HandshakeStatus { status: 401 };
        assert!(format!("{}", error).contains("401"));
    }

    #[test]
    fn test_parse_error_display() {
        let error = Error::Parse("unexpected token".to_string());
        let display = format!("{}", error);
        assert!(display.contains("Parse error"));
        assert!(display.contains("unexpected token"));
    }

    #[test]
    fn test_unsupported_operation() {
        let error = Error::UnsupportedOperation("query".to_string());
        match error {
            Error::UnsupportedOperation(kind) => assert_eq!(kind, "query"),
            _ => panic!("Expected UnsupportedOperation"),
        }
    }

    #[test]
    fn test_errors_are_cloneable() {
        let error = Error::Stream("reset by peer".to_string());
        let cloned = error.clone();
        assert_eq!(format!("{}", error), format!("{}", cloned));
    }
}
