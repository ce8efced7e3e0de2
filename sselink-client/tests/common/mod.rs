//! Common test utilities for sselink-client integration tests
//!
//! Provides a scriptable fake connector for driving the connection state
//! machine without a network, and a minimal SSE server over a raw TCP
//! listener for exercising the real HTTP connector.

#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::StreamExt;
use sselink_client::{FrameStream, StreamConnector, StreamRequest};
use sselink_core::{Error, Frame};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

/// One scripted item on a fake stream.
pub enum StreamStep {
    /// Yield a frame
    Frame(Frame),
    /// Yield a transport error
    Fail(Error),
    /// Sleep before the next step
    Wait(Duration),
    /// Never yield again (a healthy but idle stream)
    Hang,
}

/// One scripted connect outcome.
pub enum ConnectScript {
    /// Fail the connect with this error
    Refuse(Error),
    /// The connect never resolves (socket never opens)
    HangConnect,
    /// Establish a stream that replays these steps, then ends
    Accept(Vec<StreamStep>),
}

/// Scriptable connector: each connect pops the next script from the queue
/// routed to it. Routes are matched by substring against the stream URL
/// (operation names work well as keys); the empty-string route matches
/// everything and is what [`FakeConnector::new`] installs.
pub struct FakeConnector {
    routes: Mutex<Vec<(String, VecDeque<ConnectScript>)>>,
    connects: Mutex<Vec<Instant>>,
}

impl FakeConnector {
    /// A connector with a single catch-all script queue.
    pub fn new(scripts: Vec<ConnectScript>) -> Arc<Self> {
        let connector = Self::routed();
        connector.route("", scripts);
        connector
    }

    /// A connector with no routes yet; add them with [`route`](Self::route).
    pub fn routed() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(Vec::new()),
            connects: Mutex::new(Vec::new()),
        })
    }

    /// Queue scripts for connects whose URL contains `key`.
    pub fn route(&self, key: &str, scripts: Vec<ConnectScript>) {
        self.routes
            .lock()
            .unwrap()
            .push((key.to_string(), scripts.into()));
    }

    /// Instants at which connects were attempted, in order.
    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }

    /// Total connect attempts so far.
    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    fn next_script(&self, url: &str) -> ConnectScript {
        let mut routes = self.routes.lock().unwrap();
        for (key, scripts) in routes.iter_mut() {
            if url.contains(key.as_str()) {
                if let Some(script) = scripts.pop_front() {
                    return script;
                }
            }
        }
        // Out of script: behave like a healthy idle stream
        ConnectScript::Accept(vec![StreamStep::Hang])
    }
}

impl StreamConnector for FakeConnector {
    fn connect(&self, request: StreamRequest) -> BoxFuture<'static, sselink_core::Result<FrameStream>> {
        self.connects.lock().unwrap().push(Instant::now());
        let script = self.next_script(request.url.as_str());
        Box::pin(async move {
            match script {
                ConnectScript::Refuse(error) => Err(error),
                ConnectScript::HangConnect => {
                    futures::future::pending::<()>().await;
                    unreachable!("pending future resolved")
                }
                ConnectScript::Accept(steps) => Ok(steps_stream(steps)),
            }
        })
    }
}

fn steps_stream(steps: Vec<StreamStep>) -> FrameStream {
    let queue: VecDeque<StreamStep> = steps.into();
    futures::stream::unfold(queue, |mut queue| async move {
        loop {
            match queue.pop_front() {
                Some(StreamStep::Frame(frame)) => return Some((Ok(frame), queue)),
                Some(StreamStep::Fail(error)) => return Some((Err(error), queue)),
                Some(StreamStep::Wait(duration)) => tokio::time::sleep(duration).await,
                Some(StreamStep::Hang) => futures::future::pending::<()>().await,
                None => return None,
            }
        }
    })
    .boxed()
}

/// Spawn a single-shot SSE server on a random port and return its URL.
///
/// The server accepts one connection, answers with `status`, streams the
/// given event blocks, and closes. Event blocks must carry their own SSE
/// framing (trailing blank line included).
pub async fn spawn_sse_server(status: u16, events: Vec<String>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = match listener.accept().await {
            Ok(conn) => conn,
            Err(_) => return,
        };

        // Drain the request head
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => return,
                Ok(n) => {
                    if buf[..n].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(_) => return,
            }
        }

        let reason = if status == 200 { "OK" } else { "Error" };
        let head = if status == 200 {
            format!(
                "HTTP/1.1 200 {}\r\ncontent-type: text/event-stream\r\ncache-control: no-cache\r\nconnection: close\r\n\r\n",
                reason
            )
        } else {
            format!(
                "HTTP/1.1 {} {}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status, reason
            )
        };
        if stream.write_all(head.as_bytes()).await.is_err() {
            return;
        }

        for event in events {
            if stream.write_all(event.as_bytes()).await.is_err() {
                return;
            }
            let _ = stream.flush().await;
        }
        // Linger briefly so in-flight frames are read before the close
        tokio::time::sleep(Duration::from_millis(100)).await;
    });

    format!("http://{}", addr)
}
