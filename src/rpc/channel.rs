//! Shared call channel with in-flight accounting.
//!
//! # States
//! - Idle: no connection
//! - Connecting: connection requested, not ready yet
//! - Active: connection ready
//!
//! # State Transitions
//! ```text
//! Idle → Connecting: first send
//! Connecting → Active: connection ready
//! Connecting → Idle: connection failed
//! Active → Idle: close() with zero calls in flight
//! ```
//!
//! # Design Decisions
//! - Every completed call must be paired with exactly one `response_received`
//! - `close()` with calls outstanding is a no-op; nothing is deferred
//! - Calls issued while connecting all wait on the same shared readiness future

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::observability::metrics;
use crate::rpc::message::{decode, RawResponse, ResponseValue, RpcRequest};
use crate::rpc::{Connection, Transport, TransportError};

/// Completion handler for a single call.
pub type ResponseCallback = Box<dyn FnOnce(Result<RawResponse, TransportError>) + Send + 'static>;

type PendingConnection<C> = Shared<BoxFuture<'static, Result<Arc<C>, TransportError>>>;

/// Observable channel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Active,
}

struct ChannelInner<C> {
    connection: Option<PendingConnection<C>>,
    outstanding: usize,
}

/// Handle to the shared broker connection. Clones share the same state.
pub struct CallChannel<T: Transport> {
    transport: Arc<T>,
    inner: Arc<Mutex<ChannelInner<T::Connection>>>,
    drained: Arc<Notify>,
}

impl<T: Transport> Clone for CallChannel<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            inner: self.inner.clone(),
            drained: self.drained.clone(),
        }
    }
}

impl<T: Transport> CallChannel<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
            inner: Arc::new(Mutex::new(ChannelInner {
                connection: None,
                outstanding: 0,
            })),
            drained: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelInner<T::Connection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue `request` to `queue`.
    ///
    /// The in-flight counter is incremented before this returns; the call itself
    /// runs on a spawned task once the connection is ready, then hands its result
    /// to `callback` (or to [`complete_call`] when `None`). Must be called inside
    /// a Tokio runtime.
    pub fn send(
        &self,
        request: RpcRequest,
        queue: &str,
        callback: Option<ResponseCallback>,
    ) -> JoinHandle<()> {
        let call_id = Uuid::new_v4();

        let connection = {
            let mut inner = self.lock();
            // A connection that failed to open is replaced, anything else is shared
            let existing = inner
                .connection
                .as_ref()
                .filter(|pending| !matches!(pending.peek(), Some(Err(_))))
                .cloned();
            let connection = match existing {
                Some(pending) => pending,
                None => {
                    tracing::debug!(call_id = %call_id, "Opening broker connection");
                    let pending = self
                        .transport
                        .connect()
                        .map(|result| result.map(Arc::new))
                        .boxed()
                        .shared();
                    inner.connection = Some(pending.clone());
                    pending
                }
            };
            inner.outstanding += 1;
            metrics::record_in_flight(inner.outstanding);
            connection
        };

        let callback: ResponseCallback = match callback {
            Some(callback) => callback,
            None => {
                let channel = self.clone();
                Box::new(move |result| {
                    complete_call(&channel, result);
                })
            }
        };
        let queue = queue.to_string();

        tokio::spawn(async move {
            let result = match connection.await {
                Ok(conn) => {
                    tracing::info!(
                        call_id = %call_id,
                        queue = %queue,
                        content = ?request.content,
                        "Sending request"
                    );
                    conn.call(&queue, &request).await
                }
                Err(e) => Err(e),
            };

            if let Err(e) = &result {
                tracing::debug!(call_id = %call_id, error = %e, "Call failed");
            }
            callback(result);
        })
    }

    /// Account for one completed call. Returns the remaining in-flight count.
    pub fn response_received(&self) -> usize {
        let remaining = {
            let mut inner = self.lock();
            if inner.outstanding == 0 {
                tracing::warn!("response_received called with no calls in flight");
            }
            inner.outstanding = inner.outstanding.saturating_sub(1);
            metrics::record_in_flight(inner.outstanding);
            inner.outstanding
        };

        if remaining == 0 {
            self.drained.notify_waiters();
        }
        remaining
    }

    /// Release the connection if no calls are in flight.
    ///
    /// Returns `true` if a connection was released. With calls outstanding this
    /// does nothing and the caller must close again after draining.
    pub fn close(&self) -> bool {
        let released = {
            let mut inner = self.lock();
            if inner.outstanding > 0 {
                tracing::debug!(outstanding = inner.outstanding, "Close skipped, calls still in flight");
                return false;
            }
            inner.connection.take()
        };

        match released {
            Some(pending) => {
                if let Some(Ok(conn)) = pending.peek() {
                    conn.close();
                }
                tracing::debug!("Broker connection closed");
                true
            }
            None => false,
        }
    }

    /// Wait until no calls are in flight, up to `timeout`. Returns `true` if drained.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.drained.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().outstanding
    }

    pub fn state(&self) -> ChannelState {
        match self.lock().connection.as_ref() {
            None => ChannelState::Idle,
            Some(pending) => match pending.peek() {
                None => ChannelState::Connecting,
                Some(Ok(_)) => ChannelState::Active,
                // Replaced by the next send
                Some(Err(_)) => ChannelState::Idle,
            },
        }
    }
}

/// How a call ended, from the application's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// Broker accepted the command (`true`).
    Accepted,
    /// Broker rejected the command (`false`).
    Rejected,
    /// Broker answered with a value.
    Replied(ResponseValue),
    /// Reply was empty, null or undecodable.
    Failed,
    /// Transport error. Any reply body it carried has been decoded and logged.
    TransportFailed(TransportError),
}

impl CallOutcome {
    fn label(&self) -> &'static str {
        match self {
            CallOutcome::Accepted => "accepted",
            CallOutcome::Rejected => "rejected",
            CallOutcome::Replied(_) => "replied",
            CallOutcome::Failed => "failed",
            CallOutcome::TransportFailed(_) => "transport_error",
        }
    }
}

/// Default completion path: account for the call, decode and log the reply,
/// then close the channel if it has drained.
pub fn complete_call<T: Transport>(
    channel: &CallChannel<T>,
    result: Result<RawResponse, TransportError>,
) -> CallOutcome {
    channel.response_received();

    let outcome = match result {
        Err(e) => {
            tracing::error!(error = %e, "RPC error");
            if let Some(raw) = e.reply() {
                let value = decode(Some(raw));
                tracing::warn!(response = ?value, "RPC error reply");
            }
            CallOutcome::TransportFailed(e)
        }
        Ok(raw) => match decode(Some(&raw)) {
            Some(ResponseValue::Flag(true)) => {
                tracing::info!("RPC response: OK");
                CallOutcome::Accepted
            }
            Some(ResponseValue::Flag(false)) => {
                tracing::warn!("RPC response: NOT OK");
                CallOutcome::Rejected
            }
            Some(value) => {
                tracing::info!(response = ?value, "RPC response");
                CallOutcome::Replied(value)
            }
            None => {
                tracing::warn!("RPC command failed");
                CallOutcome::Failed
            }
        },
    };

    metrics::record_call(outcome.label());
    channel.close();
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::message::{encode, RequestFields};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct GatedTransport {
        ready: Arc<Notify>,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        fail_connect: bool,
    }

    struct EchoConnection {
        closes: Arc<AtomicUsize>,
    }

    impl Transport for GatedTransport {
        type Connection = EchoConnection;

        fn connect(&self) -> BoxFuture<'static, Result<EchoConnection, TransportError>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let ready = self.ready.clone();
            let closes = self.closes.clone();
            let fail = self.fail_connect;
            async move {
                ready.notified().await;
                if fail {
                    Err(TransportError::Connect("refused".into()))
                } else {
                    Ok(EchoConnection { closes })
                }
            }
            .boxed()
        }
    }

    impl Connection for EchoConnection {
        fn call<'a>(
            &'a self,
            _queue: &'a str,
            _request: &'a RpcRequest,
        ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
            async { Ok(RawResponse::new(r#"{"content":{"response":true}}"#)) }.boxed()
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        channel: CallChannel<GatedTransport>,
        ready: Arc<Notify>,
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    fn harness(fail_connect: bool) -> Harness {
        let ready = Arc::new(Notify::new());
        let connects = Arc::new(AtomicUsize::new(0));
        let closes = Arc::new(AtomicUsize::new(0));
        let channel = CallChannel::new(GatedTransport {
            ready: ready.clone(),
            connects: connects.clone(),
            closes: closes.clone(),
            fail_connect,
        });
        Harness { channel, ready, connects, closes }
    }

    fn request() -> RpcRequest {
        encode(RequestFields::activity("GET CURRENT ACTIVITY"))
    }

    fn forwarding(tx: &mpsc::UnboundedSender<Result<RawResponse, TransportError>>) -> Option<ResponseCallback> {
        let tx = tx.clone();
        Some(Box::new(move |result| {
            let _ = tx.send(result);
        }))
    }

    #[tokio::test]
    async fn test_send_then_response_restores_counter() {
        let h = harness(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert_eq!(h.channel.state(), ChannelState::Idle);

        let handle = h.channel.send(request(), "activitymanager", forwarding(&tx));
        assert_eq!(h.channel.in_flight(), 1);
        assert_eq!(h.channel.state(), ChannelState::Connecting);

        h.ready.notify_one();
        handle.await.unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
        assert_eq!(h.channel.state(), ChannelState::Active);

        assert_eq!(h.channel.response_received(), 0);
        assert!(h.channel.close());
        assert_eq!(h.channel.state(), ChannelState::Idle);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_connection() {
        let h = harness(false);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = h.channel.send(request(), "activitymanager", forwarding(&tx));
        let second = h.channel.send(request(), "activitymanager", forwarding(&tx));
        assert_eq!(h.channel.in_flight(), 2);
        assert_eq!(h.connects.load(Ordering::SeqCst), 1);

        h.ready.notify_one();
        first.await.unwrap();
        second.await.unwrap();
        assert!(rx.recv().await.unwrap().is_ok());
        assert!(rx.recv().await.unwrap().is_ok());

        assert_eq!(h.channel.response_received(), 1);
        assert!(!h.channel.close());
        assert_eq!(h.channel.state(), ChannelState::Active);

        assert_eq!(h.channel.response_received(), 0);
        assert!(h.channel.close());
    }

    #[tokio::test]
    async fn test_close_while_idle_is_noop() {
        let h = harness(false);
        assert!(!h.channel.close());
        assert_eq!(h.channel.state(), ChannelState::Idle);
    }

    #[tokio::test]
    async fn test_response_received_saturates() {
        let h = harness(false);
        assert_eq!(h.channel.response_received(), 0);
        assert_eq!(h.channel.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_reaches_callback_and_reconnects() {
        let h = harness(true);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = h.channel.send(request(), "activitymanager", forwarding(&tx));
        h.ready.notify_one();
        handle.await.unwrap();

        let result = rx.recv().await.unwrap();
        assert!(matches!(result, Err(TransportError::Connect(_))));
        assert_eq!(h.channel.in_flight(), 1);
        assert_eq!(h.channel.state(), ChannelState::Idle);

        // Failed connection is not reused
        let _retry = h.channel.send(request(), "activitymanager", forwarding(&tx));
        assert_eq!(h.connects.load(Ordering::SeqCst), 2);
        assert_eq!(h.channel.state(), ChannelState::Connecting);
    }

    #[tokio::test]
    async fn test_default_callback_completes_and_closes() {
        let h = harness(false);
        let handle = h.channel.send(request(), "activitymanager", None);
        h.ready.notify_one();
        handle.await.unwrap();

        assert_eq!(h.channel.in_flight(), 0);
        assert_eq!(h.channel.state(), ChannelState::Idle);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_outstanding_calls() {
        let h = harness(false);
        let (tx, _rx) = mpsc::unbounded_channel();
        let _handle = h.channel.send(request(), "activitymanager", forwarding(&tx));

        assert!(!h.channel.drain(Duration::from_millis(20)).await);

        let channel = h.channel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            channel.response_received();
        });
        assert!(h.channel.drain(Duration::from_secs(1)).await);
    }

    #[test]
    fn test_complete_call_outcomes() {
        let h = harness(false);

        let rejected = complete_call(&h.channel, Ok(RawResponse::new(r#"{"content":{"response":false}}"#)));
        assert_eq!(rejected, CallOutcome::Rejected);

        let failed = complete_call(&h.channel, Ok(RawResponse::new(r#"{"content":{"response":null}}"#)));
        assert_eq!(failed, CallOutcome::Failed);

        let text = complete_call(&h.channel, Ok(RawResponse::new(r#"{"content":{"response":"LOUNGE OFF"}}"#)));
        assert_eq!(text, CallOutcome::Replied(ResponseValue::Text("LOUNGE OFF".into())));

        let transport = complete_call(&h.channel, Err(TransportError::Timeout));
        assert_eq!(transport, CallOutcome::TransportFailed(TransportError::Timeout));
    }

    #[test]
    fn test_error_status_keeps_reply() {
        let h = harness(false);
        let body = RawResponse::new(r#"{"content":{"response":false}}"#);
        let error = TransportError::Status { code: 500, body: Some(body.clone()) };

        assert_eq!(error.reply(), Some(&body));
        assert_eq!(decode(error.reply()), Some(ResponseValue::Flag(false)));

        let outcome = complete_call(&h.channel, Err(error.clone()));
        assert_eq!(outcome, CallOutcome::TransportFailed(error));
        assert_eq!(TransportError::Timeout.reply(), None);
    }
}
