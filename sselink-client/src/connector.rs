//! Physical stream connectors
//!
//! The connection supervisor never talks to a socket directly; it opens
//! streams through the [`StreamConnector`] seam. The production
//! implementation is [`HttpConnector`], which issues a streaming HTTP GET
//! with `Accept: text/event-stream` and decodes the response body into
//! protocol frames incrementally. Tests inject fake connectors that replay
//! scripted frames, which is what makes the state machine testable without
//! a real gateway.
//!
//! A connector produces a [`FrameStream`]: frames in socket order, `Err`
//! items for transport or parse faults, and end-of-stream when the peer
//! hangs up without a `complete` frame. Classification of those faults is
//! the supervisor's job, not the connector's.

use crate::config::Credentials;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use sselink_core::codec::{self, SseDecoder};
use sselink_core::{Error, Frame, Result};
use std::collections::VecDeque;
use url::Url;

/// Decoded frames in socket order, until the stream ends or fails.
pub type FrameStream = BoxStream<'static, Result<Frame>>;

/// Everything needed to open one physical stream.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Fully composed stream address (endpoint + operation parameters)
    pub url: Url,
    /// Static headers configured on the link
    pub headers: Vec<(String, String)>,
    /// Credentials mode
    pub credentials: Credentials,
}

impl StreamRequest {
    /// The headers to actually send, after applying the credentials mode.
    ///
    /// `Omit` strips credential-bearing headers; the other modes pass the
    /// configured set through unchanged.
    pub fn effective_headers(&self) -> Vec<(String, String)> {
        match self.credentials {
            Credentials::Omit => self
                .headers
                .iter()
                .filter(|(name, _)| {
                    !name.eq_ignore_ascii_case("authorization")
                        && !name.eq_ignore_ascii_case("cookie")
                })
                .cloned()
                .collect(),
            Credentials::SameOrigin | Credentials::Include => self.headers.clone(),
        }
    }
}

/// Seam between the connection supervisor and the physical transport.
///
/// `connect` resolves once the stream is established (the "socket opened"
/// transition) or fails with a transport error for the classifier.
pub trait StreamConnector: Send + Sync + 'static {
    /// Open one physical stream for the given request.
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<FrameStream>>;
}

/// Production connector: streaming HTTP GET with SSE decoding.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections
/// across all subscriptions sharing the link.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    /// Create a connector with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector backed by a caller-configured HTTP client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl StreamConnector for HttpConnector {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, Result<FrameStream>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut builder = client
                .get(request.url.clone())
                .header(reqwest::header::ACCEPT, "text/event-stream");
            for (name, value) in request.effective_headers() {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::HandshakeStatus {
                    status: status.as_u16(),
                });
            }

            Ok(frame_stream(response.bytes_stream()))
        })
    }
}

/// Decode a byte stream into protocol frames.
///
/// Transport read errors end the stream after surfacing one `Err` item;
/// per-frame parse faults surface as `Err` items too, leaving the byte
/// stream intact in case the next frame is well-formed.
pub fn frame_stream<S, B, E>(bytes: S) -> FrameStream
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let state = (
        Box::pin(bytes),
        SseDecoder::new(),
        VecDeque::<Result<Frame>>::new(),
        false,
    );
    futures::stream::unfold(state, |(mut inner, mut decoder, mut pending, mut done)| async move {
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((item, (inner, decoder, pending, done)));
            }
            if done {
                return None;
            }
            match inner.next().await {
                Some(Ok(chunk)) => {
                    for event in decoder.feed(chunk.as_ref()) {
                        match codec::parse_frame(&event) {
                            Ok(Some(frame)) => pending.push_back(Ok(frame)),
                            Ok(None) => {}
                            Err(e) => pending.push_back(Err(e)),
                        }
                    }
                }
                Some(Err(e)) => {
                    pending.push_back(Err(Error::Stream(e.to_string())));
                    done = true;
                }
                None => done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(parts: &[&str]) -> impl futures::Stream<Item = std::io::Result<Vec<u8>>> {
        let owned: Vec<std::io::Result<Vec<u8>>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn test_frame_stream_decodes_events() {
        let mut frames = frame_stream(chunks(&[
            "event: next\ndata: {\"data\":{\"n\":1}}\n\n",
            "event: heartbeat\n\n",
            "event: complete\n\n",
        ]));

        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            Frame::Next(json!({"data": {"n": 1}}))
        );
        assert_eq!(frames.next().await.unwrap().unwrap(), Frame::Heartbeat);
        assert_eq!(frames.next().await.unwrap().unwrap(), Frame::Complete);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn test_frame_stream_split_chunks() {
        let mut frames = frame_stream(chunks(&["event: ne", "xt\ndata: {}", "\n\n"]));
        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            Frame::Next(json!({}))
        );
    }

    #[tokio::test]
    async fn test_frame_stream_surfaces_parse_fault_and_continues() {
        let mut frames = frame_stream(chunks(&[
            "event: next\ndata: {broken\n\n",
            "event: next\ndata: {\"ok\":true}\n\n",
        ]));

        assert!(matches!(frames.next().await, Some(Err(Error::Parse(_)))));
        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            Frame::Next(json!({"ok": true}))
        );
    }

    #[tokio::test]
    async fn test_frame_stream_drops_keepalive_artifacts() {
        let mut frames = frame_stream(chunks(&[
            ":keepalive\n\n",
            "event: error\ndata: undefined\n\n",
            "event: complete\n\n",
        ]));

        assert_eq!(frames.next().await.unwrap().unwrap(), Frame::Complete);
        assert!(frames.next().await.is_none());
    }

    #[test]
    fn test_effective_headers_omit_strips_credentials() {
        let request = StreamRequest {
            url: Url::parse("https://gateway.local/stream").unwrap(),
            headers: vec![
                ("Authorization".to_string(), "Bearer x".to_string()),
                ("Cookie".to_string(), "sid=1".to_string()),
                ("X-Tenant".to_string(), "ops".to_string()),
            ],
            credentials: Credentials::Omit,
        };

        let headers = request.effective_headers();
        assert_eq!(headers, vec![("X-Tenant".to_string(), "ops".to_string())]);
    }

    #[test]
    fn test_effective_headers_include_passes_through() {
        let request = StreamRequest {
            url: Url::parse("https://gateway.local/stream").unwrap(),
            headers: vec![("Authorization".to_string(), "Bearer x".to_string())],
            credentials: Credentials::Include,
        };

        assert_eq!(request.effective_headers().len(), 1);
    }
}
