//! Error classification for the subscription transport
//!
//! Pure mapping from raw failures — transport faults, malformed payloads,
//! server-sent error envelopes — to a [`CategorizedError`] carrying a fixed
//! kind taxonomy and a retryability verdict. The kind is computed once at
//! classification time and never mutated; everything downstream (backoff,
//! terminal delivery, logging, metrics) keys off it.
//!
//! # Taxonomy
//!
//! | Kind | Retryable | Typical cause |
//! |------|-----------|---------------|
//! | `Network` | yes | socket closed unexpectedly, connection refused |
//! | `Auth` | no | 401/403 handshake, `UNAUTHENTICATED` envelope |
//! | `Server` | yes | 5xx handshake, unrecognized server envelope |
//! | `Client` | no | 4xx-equivalent client-fault codes |
//! | `Timeout` | yes (stricter ceiling) | heartbeat window expired |
//! | `Parse` | yes | malformed frame payload |
//!
//! Empty or `"undefined"` error payloads never reach this module; the codec
//! drops them as keep-alive artifacts before a frame exists.

use serde::Serialize;
use serde_json::Value;
use sselink_core::Error;
use std::time::Duration;

/// Gateway error codes that mean the caller's credentials are no good.
const AUTH_CODES: &[&str] = &["UNAUTHENTICATED", "UNAUTHORIZED", "FORBIDDEN"];

/// Gateway error codes equivalent to a 4xx client fault.
const CLIENT_CODES: &[&str] = &[
    "BAD_REQUEST",
    "BAD_USER_INPUT",
    "GRAPHQL_VALIDATION_FAILED",
    "GRAPHQL_PARSE_FAILED",
];

/// Failure category of a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Transport-level connectivity failure
    Network,
    /// Authentication or authorization failure
    Auth,
    /// Server-side fault
    Server,
    /// Client-side fault in the request itself
    Client,
    /// No activity within the heartbeat window
    Timeout,
    /// Malformed frame payload
    Parse,
}

impl ErrorKind {
    /// Whether failures of this kind are candidates for reconnection.
    ///
    /// `Auth` and `Client` are never retried: the same request would fail
    /// the same way.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorKind::Auth | ErrorKind::Client)
    }

    /// Stable lowercase label, used for logging and metric attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Auth => "auth",
            ErrorKind::Server => "server",
            ErrorKind::Client => "client",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Parse => "parse",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure normalized into the fixed taxonomy.
///
/// This is the only error shape a consumer ever sees on the error callback,
/// and the only shape the reconnection machinery reasons about.
#[derive(Debug, Clone, Serialize)]
pub struct CategorizedError {
    /// Failure category
    pub kind: ErrorKind,
    /// Retryability verdict, derived from the kind at classification time
    pub retryable: bool,
    /// HTTP or HTTP-equivalent status code, when one was observed
    pub status: Option<u16>,
    /// Human-readable description of the underlying failure
    pub message: String,
}

impl CategorizedError {
    /// Classify a failure under the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable: kind.is_retryable(),
            status: None,
            message: message.into(),
        }
    }

    /// Attach the observed status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl std::fmt::Display for CategorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({}): {}", self.kind, status, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for CategorizedError {}

/// Classify a transport-level failure.
///
/// Handshake rejections are split by status code; parse faults keep their
/// identity so they can be logged distinctly (they usually indicate a
/// protocol mismatch, not network instability); everything else at this
/// layer is connectivity.
pub fn classify_transport(error: &Error) -> CategorizedError {
    match error {
        Error::HandshakeStatus { status } => classify_status(*status, error.to_string()),
        Error::Parse(msg) => CategorizedError::new(ErrorKind::Parse, msg.clone()),
        Error::Serialization(msg) => CategorizedError::new(ErrorKind::Client, msg.clone()),
        other => CategorizedError::new(ErrorKind::Network, other.to_string()),
    }
}

fn classify_status(status: u16, message: String) -> CategorizedError {
    let kind = match status {
        401 | 403 => ErrorKind::Auth,
        400..=499 => ErrorKind::Client,
        _ => ErrorKind::Server,
    };
    CategorizedError::new(kind, message).with_status(status)
}

/// Classify a server-sent error envelope.
///
/// The payload is whatever JSON arrived on the `error` channel: a single
/// error object, an array of them, or an execution result carrying an
/// `errors` list. Returns `None` when there is nothing to classify (null
/// payload, empty error list) — such frames are ignored entirely, with no
/// consumer callback.
pub fn classify_envelope(payload: &Value) -> Option<CategorizedError> {
    let error = first_error(payload)?;

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .unwrap_or("subscription error")
        .to_string();

    let extensions = error.get("extensions");
    let code = extensions
        .and_then(|e| e.get("code"))
        .and_then(Value::as_str)
        .map(|c| c.to_ascii_uppercase());
    let status = extensions
        .and_then(|e| e.get("status").or_else(|| e.get("statusCode")))
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok());

    let kind = if matches!(&code, Some(c) if AUTH_CODES.contains(&c.as_str()))
        || matches!(status, Some(401 | 403))
    {
        ErrorKind::Auth
    } else if matches!(&code, Some(c) if CLIENT_CODES.contains(&c.as_str()))
        || matches!(status, Some(400..=499))
    {
        ErrorKind::Client
    } else {
        ErrorKind::Server
    };

    let mut categorized = CategorizedError::new(kind, message);
    if let Some(status) = status {
        categorized = categorized.with_status(status);
    }
    Some(categorized)
}

fn first_error(payload: &Value) -> Option<&Value> {
    match payload {
        Value::Null => None,
        Value::Array(items) => items.first(),
        Value::Object(map) => match map.get("errors").and_then(Value::as_array) {
            Some(errors) => errors.first(),
            None => Some(payload),
        },
        _ => Some(payload),
    }
}

/// Synthesize the categorized error for an expired heartbeat window.
pub fn timeout_after(window: Duration) -> CategorizedError {
    CategorizedError::new(
        ErrorKind::Timeout,
        format!("no activity within {}ms heartbeat window", window.as_millis()),
    )
}
