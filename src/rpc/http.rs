//! JSON-over-HTTP request/reply transport.
//!
//! Talks to an HTTP gateway that relays each POST onto the named broker queue
//! and returns the RPC reply as the response body. The broker's AMQP listener
//! cannot be addressed directly; point `[broker]` at the gateway.
//!
//! # Responsibilities
//! - Build a client per connection with the configured request timeout
//! - POST request envelopes to `/rpc/<vhost>/<queue>` on the broker gateway
//! - Authenticate with the configured credential pair (basic auth)
//!
//! # Design Decisions
//! - Path segments are percent-encoded, so the default "/" vhost becomes `%2F`
//! - Non-2xx replies are transport errors that still carry the reply body

use std::time::Duration;
use futures_util::future::{BoxFuture, FutureExt};
use url::Url;

use crate::config::BrokerConfig;
use crate::rpc::message::{RawResponse, RpcRequest};
use crate::rpc::{Connection, Transport, TransportError};

/// Connects to a broker's HTTP request/reply gateway.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: BrokerConfig,
}

impl HttpTransport {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

impl Transport for HttpTransport {
    type Connection = HttpConnection;

    fn connect(&self) -> BoxFuture<'static, Result<HttpConnection, TransportError>> {
        let config = self.config.clone();
        async move { HttpConnection::open(config) }.boxed()
    }
}

/// A ready HTTP client bound to one broker.
#[derive(Debug)]
pub struct HttpConnection {
    client: reqwest::Client,
    base_url: Url,
    vhost: String,
    login: String,
    password: String,
}

impl HttpConnection {
    fn open(config: BrokerConfig) -> Result<Self, TransportError> {
        let base_url = Url::parse(&format!("http://{}:{}/", config.host, config.port)).map_err(|e| {
            TransportError::Connect(format!("Invalid broker address '{}:{}': {}", config.host, config.port, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(broker = %base_url, vhost = %config.vhost, "Broker client ready");

        Ok(Self {
            client,
            base_url,
            vhost: config.vhost,
            login: config.login,
            password: config.password,
        })
    }

    /// URL a call to `queue` is posted to.
    pub fn endpoint(&self, queue: &str) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Call("broker URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["rpc", self.vhost.as_str(), queue]);
        Ok(url)
    }
}

impl Connection for HttpConnection {
    fn call<'a>(
        &'a self,
        queue: &'a str,
        request: &'a RpcRequest,
    ) -> BoxFuture<'a, Result<RawResponse, TransportError>> {
        async move {
            let url = self.endpoint(queue)?;

            let response = self
                .client
                .post(url)
                .basic_auth(&self.login, Some(&self.password))
                .json(request)
                .send()
                .await
                .map_err(map_reqwest_error)?;

            let status = response.status();
            let body = response.bytes().await.map_err(map_reqwest_error)?;

            if !status.is_success() {
                return Err(TransportError::Status {
                    code: status.as_u16(),
                    body: (!body.is_empty()).then(|| RawResponse::new(body.to_vec())),
                });
            }
            Ok(RawResponse::new(body.to_vec()))
        }
        .boxed()
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Call(e.to_string())
    }
}
