//! JSON-RPC 2.0 message types.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use mcpkit_core::{McpError, McpErrorCode};

/// The only protocol revision JSON-RPC 2.0 defines.
pub const JSONRPC_VERSION: &str = "2.0";

/// Serde bridge for the `jsonrpc` field, applied with `#[serde(with)]`.
///
/// The wire value is almost always `"2.0"`; reads that match hand back
/// the static string instead of keeping the allocation.
mod version {
    use std::borrow::Cow;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::JSONRPC_VERSION;

    pub(super) fn serialize<S: Serializer>(
        value: &Cow<'static, str>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Cow<'static, str>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == JSONRPC_VERSION {
            Cow::Borrowed(JSONRPC_VERSION)
        } else {
            Cow::Owned(raw)
        })
    }
}

fn default_version() -> Cow<'static, str> {
    Cow::Borrowed(JSONRPC_VERSION)
}

/// Correlation id carried by requests and echoed on their responses.
///
/// JSON-RPC permits either shape; sessions built on this crate emit
/// string ids, and numeric ids from peers are accepted as-is. An id only
/// needs to be unique within its session's outgoing direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Textual id.
    String(String),
    /// Numeric id.
    Number(i64),
}

impl RequestId {
    /// Builds a textual id.
    #[must_use]
    pub fn text(id: impl Into<String>) -> Self {
        RequestId::String(id.into())
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::text(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        RequestId::String(id)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(id) => f.write_str(id),
            RequestId::Number(id) => write!(f, "{id}"),
        }
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (always "2.0").
    #[serde(with = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Request ID.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Creates a new request with the given method and parameters.
    #[must_use]
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (a request without an ID; never answered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Protocol version (always "2.0").
    #[serde(with = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Method name.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: default_version(),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        Self {
            code: err.code.into(),
            message: err.message,
            data: err.data,
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        McpError::protocol(err.code, err.message, err.data)
    }
}

/// JSON-RPC 2.0 response.
///
/// Exactly one of `result` / `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version (always "2.0").
    #[serde(with = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Request ID this is responding to. `None` only for errors replying
    /// to an unparseable request.
    pub id: Option<RequestId>,
    /// Result (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: default_version(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: default_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Returns true if this is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A JSON-RPC message: request, notification, or response.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request expecting a response.
    Request(JsonRpcRequest),
    /// A one-way notification.
    Notification(JsonRpcNotification),
    /// A response correlated to an earlier request.
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Discriminates a JSON value into one of the three message shapes.
    ///
    /// The rules follow JSON-RPC 2.0: a `method` with an `id` is a
    /// request, a `method` without an `id` is a notification, and a
    /// `result` or `error` member is a response. Unknown methods parse
    /// fine here; routing them is the dispatcher's concern.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the value matches none of the shapes.
    pub fn from_value(value: Value) -> Result<Self, McpError> {
        let object = value
            .as_object()
            .ok_or_else(|| McpError::new(McpErrorCode::ParseError, "Message is not an object"))?;

        if object.contains_key("method") {
            if object.contains_key("id") {
                let request: JsonRpcRequest = serde_json::from_value(value)?;
                return Ok(JsonRpcMessage::Request(request));
            }
            let notification: JsonRpcNotification = serde_json::from_value(value)?;
            return Ok(JsonRpcMessage::Notification(notification));
        }

        if object.contains_key("result") || object.contains_key("error") {
            let response: JsonRpcResponse = serde_json::from_value(value)?;
            return Ok(JsonRpcMessage::Response(response));
        }

        Err(McpError::new(
            McpErrorCode::ParseError,
            "Message is neither a request, a notification, nor a response",
        ))
    }

    /// Parses a serialized envelope.
    ///
    /// # Errors
    ///
    /// Returns a parse error on malformed JSON or an unrecognized shape.
    pub fn from_str(raw: &str) -> Result<Self, McpError> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(value)
    }
}

impl<'de> Deserialize<'de> for JsonRpcMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        JsonRpcMessage::from_value(value).map_err(serde::de::Error::custom)
    }
}
