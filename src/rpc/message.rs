//! Request and response envelopes.
//!
//! Request: `{"content": {"location", "activity", "device", "command"}}`
//! Response: `{"content": {"response": bool | string | null}}`

use serde::{Deserialize, Serialize};

use crate::rpc::DecodeError;

/// Location used when the caller does not name one.
pub const DEFAULT_LOCATION: &str = "all";

/// Application-level request fields; unset fields take their defaults on encode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestFields {
    pub activity: Option<String>,
    pub location: Option<String>,
    pub device: Option<String>,
    pub command: Option<String>,
}

impl RequestFields {
    pub fn activity(activity: impl Into<String>) -> Self {
        Self {
            activity: Some(activity.into()),
            ..Self::default()
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContent {
    pub location: String,
    pub activity: Option<String>,
    pub device: Option<String>,
    pub command: Option<String>,
}

/// Wire-level request envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub content: RequestContent,
}

impl RpcRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Build the request envelope, applying defaults.
pub fn encode(fields: RequestFields) -> RpcRequest {
    RpcRequest {
        content: RequestContent {
            location: fields.location.unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            activity: fields.activity,
            device: fields.device,
            command: fields.command,
        },
    }
}

/// Reply body exactly as the transport delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub data: Vec<u8>,
}

impl RawResponse {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// Application-level result carried in `content.response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Flag(bool),
    Text(String),
    Other(serde_json::Value),
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    response: Option<ResponseValue>,
}

/// Extract `content.response`; `Ok(None)` when the broker replied with null.
pub fn try_decode(raw: &RawResponse) -> Result<Option<ResponseValue>, DecodeError> {
    let envelope: ResponseEnvelope = serde_json::from_slice(&raw.data)?;
    Ok(envelope.content.response)
}

/// Lenient decode: absent or malformed payloads are logged and yield `None`.
pub fn decode(raw: Option<&RawResponse>) -> Option<ResponseValue> {
    let Some(raw) = raw else {
        tracing::warn!("Empty message received from broker");
        return None;
    };

    match try_decode(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, bytes = raw.data.len(), "Undecodable response from broker");
            None
        }
    }
}
