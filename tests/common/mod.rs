//! Shared collaborators for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use presence_monitor::presence::ProbeOutcome;
use presence_monitor::probe::Prober;
use presence_monitor::rpc::{Connection, RawResponse, RpcRequest, Transport, TransportError};

/// Replays a fixed script of outcomes, then answers `fallback` forever.
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeOutcome>>,
    fallback: ProbeOutcome,
    delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl ScriptedProber {
    pub fn new(script: &[ProbeOutcome], fallback: ProbeOutcome) -> Self {
        Self {
            script: Mutex::new(script.iter().copied().collect()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Every probe takes `delay` before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Prober for ScriptedProber {
    fn probe<'a>(&'a self, _host: &'a str, _timeout: Duration) -> BoxFuture<'a, ProbeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);

        async move {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            outcome
        }
        .boxed()
    }
}

/// In-memory transport that records every request and replies with a fixed body.
#[derive(Clone)]
pub struct RecordingTransport {
    pub requests: Arc<Mutex<Vec<(String, RpcRequest)>>>,
    pub connects: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    reply: &'static str,
}

impl RecordingTransport {
    pub fn replying(reply: &'static str) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            reply,
        }
    }

    pub fn activities(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.content.activity.clone())
            .collect()
    }
}

pub struct RecordingConnection {
    transport: RecordingTransport,
}

impl Transport for RecordingTransport {
    type Connection = RecordingConnection;

    fn connect(&self) -> BoxFuture<'static, Result<RecordingConnection, TransportError>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let transport = self.clone();
        async move { Ok(RecordingConnection { transport }) }.boxed()
    }
}

impl Connection for RecordingConnection {
    fn call<'a>(
        &'a self,
        queue: &'a str,
        request: &'a RpcRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        self.transport
            .requests
            .lock()
            .unwrap()
            .push((queue.to_string(), request.clone()));
        let reply = self.transport.reply;
        async move { Ok(RawResponse::new(reply)) }.boxed()
    }

    fn close(&self) {
        self.transport.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A request as seen by the mock gateway.
#[derive(Debug)]
pub struct GatewayRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl GatewayRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Start a mock HTTP gateway that answers every request with `status` and `body`.
pub async fn start_mock_gateway(
    status: u16,
    body: &'static str,
) -> (SocketAddr, mpsc::UnboundedReceiver<GatewayRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let _ = tx.send(request);

                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<GatewayRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(GatewayRequest {
        request_line,
        headers,
        body,
    })
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
