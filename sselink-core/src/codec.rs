//! Codec for the SSE subscription wire format
//!
//! This module owns both directions of the wire format:
//!
//! - **Outbound**: [`stream_url`] composes the addressable stream target
//!   from the configured endpoint and an operation descriptor — document,
//!   JSON-encoded variables (only when non-empty), and operation name are
//!   appended as query parameters with a stable encoding.
//! - **Inbound**: [`SseDecoder`] incrementally splits raw bytes into SSE
//!   events, and [`parse_frame`] maps a dispatched event onto one of the
//!   protocol's named channels (`next`, `error`, `complete`, `heartbeat`).
//!
//! # Incremental Decoding
//!
//! SSE is a line-oriented text protocol and HTTP chunk boundaries fall
//! anywhere, so the decoder buffers bytes and only consumes complete lines.
//! A multi-byte UTF-8 sequence split across chunks stays buffered until its
//! line terminator arrives.
//!
//! # Tolerated Input
//!
//! Real gateways emit artifacts the decoder must shrug off: comment lines
//! (`:keepalive`), unknown event names, `retry:` hints, and `error` events
//! with an empty or literal-`"undefined"` payload. All of these decode to
//! nothing rather than to an error.
//!
//! # Examples
//!
//! ```rust
//! use sselink_core::{codec::SseDecoder, codec::parse_frame, Frame};
//!
//! let mut decoder = SseDecoder::new();
//! let events = decoder.feed(b"event: next\ndata: {\"data\":{\"n\":1}}\n\n");
//! assert_eq!(events.len(), 1);
//! let frame = parse_frame(&events[0]).unwrap();
//! assert!(matches!(frame, Some(Frame::Next(_))));
//! ```

use crate::error::{Error, Result};
use crate::types::{Frame, Operation};
use url::Url;

/// One dispatched Server-Sent Event, before protocol mapping.
///
/// `event` defaults to `"message"` when the server omits the field, per the
/// SSE specification. Multiple `data:` lines are joined with newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event name (`next`, `error`, `complete`, `heartbeat`, ...)
    pub event: String,
    /// The joined data payload, possibly empty
    pub data: String,
    /// The last seen event id, if the server sent one
    pub id: Option<String>,
}

/// Incremental decoder from raw bytes to [`SseEvent`]s.
///
/// Feed it chunks as they arrive; it returns every event completed by that
/// chunk. State between calls is the unconsumed byte tail plus the fields
/// of the event currently being accumulated.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    event: String,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a chunk of bytes and return the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = &raw[..raw.len() - 1];
            if line.ends_with(b"\r") {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            self.process_line(&line, &mut events);
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            // Blank line dispatches the accumulated event. An event with no
            // fields at all is not dispatched.
            if !self.event.is_empty() || !self.data.is_empty() {
                let event = if self.event.is_empty() {
                    "message".to_string()
                } else {
                    std::mem::take(&mut self.event)
                };
                events.push(SseEvent {
                    event,
                    data: std::mem::take(&mut self.data).join("\n"),
                    id: self.id.clone(),
                });
            }
            return;
        }

        if line.starts_with(':') {
            // Comment line; some gateways use these as keep-alives.
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = value.to_string(),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // `retry` hints and unknown fields are ignored; reconnection
            // pacing is owned by the backoff scheduler, not the server.
            _ => {}
        }
    }
}

/// Map a dispatched SSE event onto a protocol frame.
///
/// Returns `Ok(None)` for events the protocol ignores: unknown event names,
/// and `error` events whose payload is empty or the literal `"undefined"`
/// (keep-alive artifacts some gateways emit on the error channel).
///
/// # Errors
///
/// Returns [`Error::Parse`] when a `next` or `error` payload is present but
/// not valid JSON. The caller classifies that as a recoverable parse fault.
pub fn parse_frame(event: &SseEvent) -> Result<Option<Frame>> {
    match event.event.as_str() {
        "next" | "message" => {
            let value = serde_json::from_str(&event.data)
                .map_err(|e| Error::Parse(format!("malformed next payload: {}", e)))?;
            Ok(Some(Frame::Next(value)))
        }
        "error" => {
            let data = event.data.trim();
            if data.is_empty() || data == "undefined" {
                return Ok(None);
            }
            let value = serde_json::from_str(data)
                .map_err(|e| Error::Parse(format!("malformed error payload: {}", e)))?;
            Ok(Some(Frame::Error(value)))
        }
        "complete" => Ok(Some(Frame::Complete)),
        "heartbeat" => Ok(Some(Frame::Heartbeat)),
        _ => Ok(None),
    }
}

/// Compose the addressable stream target for an operation.
///
/// The logical target is the configured base endpoint with the operation
/// document, JSON-encoded variables (only if non-empty), and operation name
/// appended as query parameters. Existing query parameters on the base URL
/// are preserved.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the variable map cannot be encoded
/// as JSON.
pub fn stream_url(base: &Url, operation: &Operation) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("query", &operation.document);
        if !operation.variables.is_empty() {
            let json = serde_json::to_string(&operation.variables)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            pairs.append_pair("variables", &json);
        }
        if let Some(name) = &operation.operation_name {
            pairs.append_pair("operationName", name);
        }
    }
    Ok(url)
}
