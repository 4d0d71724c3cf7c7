//! Request/reply call subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher
//!     → message.rs (encode request envelope)
//!     → channel.rs (open connection on first call, count in-flight calls)
//!     → Transport / Connection (http.rs or any other impl)
//!     → callback(result)
//!     → response_received → decode → close when drained
//! ```
//!
//! # Design Decisions
//! - One channel instance, passed by handle, instead of process-wide state
//! - The broker protocol sits behind the `Transport` trait
//! - No retries: a failed call is terminal

use futures_util::future::BoxFuture;
use thiserror::Error;

pub mod channel;
pub mod http;
pub mod message;

pub use channel::{CallChannel, CallOutcome, ChannelState, ResponseCallback};
pub use http::HttpTransport;
pub use message::{encode, decode, RawResponse, RequestFields, ResponseValue, RpcRequest};

/// Transport-level call failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Request could not be delivered or its reply read.
    #[error("call failed: {0}")]
    Call(String),

    /// Broker answered with a non-success status. `body` keeps whatever it
    /// sent back so the reply can still be decoded.
    #[error("broker returned status {code}")]
    Status { code: u16, body: Option<RawResponse> },

    /// No reply within the request timeout.
    #[error("call timed out")]
    Timeout,
}

impl TransportError {
    /// Reply payload delivered alongside the error, if any.
    pub fn reply(&self) -> Option<&RawResponse> {
        match self {
            TransportError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

/// Response payload could not be interpreted.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed response payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Factory for connections to the remote-call broker.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Resolves once the connection is ready to carry calls.
    fn connect(&self) -> BoxFuture<'static, Result<Self::Connection, TransportError>>;
}

/// A ready connection.
pub trait Connection: Send + Sync + 'static {
    /// Issue one request to `queue` and wait for its reply.
    fn call<'a>(
        &'a self,
        queue: &'a str,
        request: &'a RpcRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>>;

    /// Release broker-side resources.
    fn close(&self) {}
}
