//! Method-channel message shapes.
//!
//! A call is `{"id": ..., "method": "...", "arguments": {...}}`; the reply
//! echoes `id` and carries either `result` or `error`.

use crate::error::ChannelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Incoming method call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodCall {
    /// Correlation id chosen by the host, echoed in the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            arguments,
        }
    }
}

/// Error payload of a failed call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Outgoing response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl MethodResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, error: &ChannelError) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code: error.code().to_string(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Anything that can answer method calls.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    async fn handle(&self, call: MethodCall) -> MethodResponse;
}
