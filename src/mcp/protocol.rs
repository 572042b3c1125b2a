//! JSON-RPC 2.0 frame types for the MCP wire.
//!
//! Inbound traffic is classified into [`Frame`]s: responses to our
//! requests, server-initiated requests, and notifications. Outbound
//! traffic is built as plain [`serde_json::Value`] objects so that
//! user-authored requests travel verbatim, extra fields included.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON-RPC request id: the spec allows strings and numbers; the harness
/// always sends strings but accepts either in replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

impl RequestId {
    /// Builds a [`RequestId`] from a JSON value, when it is one.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }

    /// The id as a JSON value, for embedding in a frame.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => json!(n),
            Self::String(s) => json!(s),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (negative for predefined errors).
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Additional error data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A response to one of our requests.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRpcResponse {
    /// The id the server echoed; `None` when the server replied to a
    /// request it could not parse.
    pub id: Option<RequestId>,
    /// Result value, on success.
    pub result: Option<Value>,
    /// Error object, on failure.
    pub error: Option<JsonRpcError>,
    /// The whole response object, kept for template matching: the
    /// `expect.response` template is evaluated against this value.
    pub raw: Value,
}

impl JsonRpcResponse {
    /// Returns `true` when the response carries a result and no error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }
}

/// A complete JSON-RPC message read off the server's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A response correlated to one of our requests.
    Response(JsonRpcResponse),
    /// A server-initiated request (carries an id and expects an answer).
    Request {
        /// The request id.
        id: Value,
        /// The method the server invoked.
        method: String,
        /// The request parameters.
        params: Value,
    },
    /// A server notification (no id, no response expected).
    Notification {
        /// The notification method.
        method: String,
        /// The notification parameters.
        params: Value,
    },
}

impl Frame {
    /// Classifies a parsed JSON object as a frame.
    ///
    /// Returns `None` for objects that are not JSON-RPC messages (for
    /// example banner text that happened to parse as JSON); the caller
    /// records those as stdout noise.
    #[must_use]
    pub fn classify(value: Value) -> Option<Self> {
        let obj = value.as_object()?;
        if let Some(method) = obj.get("method").and_then(Value::as_str) {
            let method = method.to_string();
            let params = obj.get("params").cloned().unwrap_or(Value::Null);
            return Some(match obj.get("id") {
                Some(id) if !id.is_null() => Self::Request {
                    id: id.clone(),
                    method,
                    params,
                },
                _ => Self::Notification { method, params },
            });
        }
        if obj.contains_key("result") || obj.contains_key("error") {
            let id = obj.get("id").and_then(RequestId::from_value);
            let result = obj.get("result").cloned();
            let error = obj
                .get("error")
                .cloned()
                .and_then(|e| serde_json::from_value(e).ok());
            return Some(Self::Response(JsonRpcResponse {
                id,
                result,
                error,
                raw: value,
            }));
        }
        None
    }
}

/// Builds a request frame owned by the harness (handshake traffic).
#[must_use]
pub fn request_value(id: &RequestId, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id.to_value(),
        "method": method,
        "params": params,
    })
}

/// Builds a notification frame (no id).
#[must_use]
pub fn notification_value(method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

/// Normalizes a user-authored request object for the wire: ensures the
/// `jsonrpc` version tag and an id, preserving everything else as
/// authored. Returns the id in use alongside the frame.
///
/// `fallback_id` is used when the author omitted `id`.
pub fn normalize_request(
    request: &Value,
    fallback_id: &str,
) -> Result<(Value, RequestId), String> {
    let obj = request
        .as_object()
        .ok_or_else(|| String::from("request must be a JSON object"))?;
    if !obj.contains_key("method") {
        return Err(String::from("request is missing `method`"));
    }
    let mut normalized: Map<String, Value> = obj.clone();
    normalized.insert(String::from("jsonrpc"), json!("2.0"));
    let id = match normalized.get("id").and_then(RequestId::from_value) {
        Some(id) => id,
        None => {
            let id = RequestId::from(fallback_id);
            normalized.insert(String::from("id"), id.to_value());
            id
        }
    };
    Ok((Value::Object(normalized), id))
}
