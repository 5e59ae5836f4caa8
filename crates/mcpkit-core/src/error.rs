//! Error types for MCP operations.

use serde_json::Value;

/// Result alias used throughout the workspace.
pub type McpResult<T> = Result<T, McpError>;

/// Error codes carried by [`McpError`].
///
/// The first five are the standard JSON-RPC 2.0 codes. The remainder are
/// MCP/SDK codes in the implementation-defined range; they appear on the
/// wire only when an error is converted into a JSON-RPC error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpErrorCode {
    /// Invalid JSON was received (-32700).
    ParseError,
    /// The JSON sent is not a valid request object (-32600).
    InvalidRequest,
    /// The method does not exist or is not available (-32601).
    MethodNotFound,
    /// Invalid method parameters (-32602).
    InvalidParams,
    /// Internal JSON-RPC error (-32603).
    InternalError,
    /// A request was not answered within its deadline (-32001).
    Timeout,
    /// The requested resource URI is not registered (-32002).
    ResourceNotFound,
    /// The session was closed while the operation was in flight (-32003).
    SessionClosed,
    /// The underlying transport failed (-32004).
    Transport,
    /// The operation is not valid in the current lifecycle state (-32005).
    InvalidState,
    /// The peer did not advertise the capability the operation needs (-32006).
    CapabilityMissing,
    /// Protocol version negotiation failed (-32007).
    UnsupportedProtocolVersion,
    /// A registry entry with the same key already exists (-32008).
    DuplicateEntry,
    /// A registry entry with the given key does not exist (-32009).
    UnknownEntry,
    /// A code received from the peer that maps to none of the above.
    Other(i32),
}

impl From<McpErrorCode> for i32 {
    fn from(code: McpErrorCode) -> i32 {
        match code {
            McpErrorCode::ParseError => -32700,
            McpErrorCode::InvalidRequest => -32600,
            McpErrorCode::MethodNotFound => -32601,
            McpErrorCode::InvalidParams => -32602,
            McpErrorCode::InternalError => -32603,
            McpErrorCode::Timeout => -32001,
            McpErrorCode::ResourceNotFound => -32002,
            McpErrorCode::SessionClosed => -32003,
            McpErrorCode::Transport => -32004,
            McpErrorCode::InvalidState => -32005,
            McpErrorCode::CapabilityMissing => -32006,
            McpErrorCode::UnsupportedProtocolVersion => -32007,
            McpErrorCode::DuplicateEntry => -32008,
            McpErrorCode::UnknownEntry => -32009,
            McpErrorCode::Other(code) => code,
        }
    }
}

impl From<i32> for McpErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => McpErrorCode::ParseError,
            -32600 => McpErrorCode::InvalidRequest,
            -32601 => McpErrorCode::MethodNotFound,
            -32602 => McpErrorCode::InvalidParams,
            -32603 => McpErrorCode::InternalError,
            -32001 => McpErrorCode::Timeout,
            -32002 => McpErrorCode::ResourceNotFound,
            -32003 => McpErrorCode::SessionClosed,
            -32004 => McpErrorCode::Transport,
            -32005 => McpErrorCode::InvalidState,
            -32006 => McpErrorCode::CapabilityMissing,
            -32007 => McpErrorCode::UnsupportedProtocolVersion,
            -32008 => McpErrorCode::DuplicateEntry,
            -32009 => McpErrorCode::UnknownEntry,
            other => McpErrorCode::Other(other),
        }
    }
}

/// Structured MCP error.
///
/// Mirrors the JSON-RPC error object: a numeric code (via
/// [`McpErrorCode`]), a human-readable message, and optional structured
/// data. Errors returned by request handlers are converted into error
/// responses with the same code/message/data; errors received from the
/// peer are reconstructed through [`McpError::protocol`].
#[derive(Debug, Clone)]
pub struct McpError {
    /// The error code.
    pub code: McpErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional structured error data.
    pub data: Option<Value>,
}

impl McpError {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: McpErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches structured data to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Error for an unknown method, formatted as sent on the wire.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            McpErrorCode::MethodNotFound,
            format!("Method not found: {method}"),
        )
    }

    /// Error for invalid or missing request parameters.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidParams, message)
    }

    /// Error for a structurally invalid or out-of-order request.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidRequest, message)
    }

    /// Internal error carrying a handler failure message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InternalError, message)
    }

    /// Error for a request that exceeded its deadline.
    #[must_use]
    pub fn timeout(method: &str) -> Self {
        Self::new(
            McpErrorCode::Timeout,
            format!("Request '{method}' timed out"),
        )
    }

    /// Error completing pending requests when the session closes.
    #[must_use]
    pub fn session_closed() -> Self {
        Self::new(McpErrorCode::SessionClosed, "Session closed")
    }

    /// Error wrapping a transport-level failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::Transport, message)
    }

    /// Error for an operation attempted in the wrong lifecycle state.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidState, message)
    }

    /// Error for an operation gated by a capability the peer lacks.
    #[must_use]
    pub fn capability(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::CapabilityMissing, message)
    }

    /// Error for a failed protocol version negotiation.
    #[must_use]
    pub fn unsupported_protocol_version(version: &str) -> Self {
        Self::new(
            McpErrorCode::UnsupportedProtocolVersion,
            format!("Unsupported protocol version: {version}"),
        )
    }

    /// Error for a duplicate registry entry.
    #[must_use]
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::DuplicateEntry, message)
    }

    /// Error for a missing registry entry.
    #[must_use]
    pub fn unknown_entry(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::UnknownEntry, message)
    }

    /// Error for a read of an unregistered resource URI.
    #[must_use]
    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            McpErrorCode::ResourceNotFound,
            format!("Resource not found: {uri}"),
        )
    }

    /// Reconstructs an error received from the peer.
    #[must_use]
    pub fn protocol(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data,
        }
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, i32::from(self.code))
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(McpErrorCode::ParseError, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonrpc_codes_use_reserved_values() {
        assert_eq!(i32::from(McpErrorCode::ParseError), -32700);
        assert_eq!(i32::from(McpErrorCode::InvalidRequest), -32600);
        assert_eq!(i32::from(McpErrorCode::MethodNotFound), -32601);
        assert_eq!(i32::from(McpErrorCode::InvalidParams), -32602);
        assert_eq!(i32::from(McpErrorCode::InternalError), -32603);
    }

    #[test]
    fn code_roundtrip() {
        for code in [
            McpErrorCode::ParseError,
            McpErrorCode::Timeout,
            McpErrorCode::SessionClosed,
            McpErrorCode::CapabilityMissing,
            McpErrorCode::Other(-32099),
        ] {
            assert_eq!(McpErrorCode::from(i32::from(code)), code);
        }
    }

    #[test]
    fn method_not_found_message() {
        let err = McpError::method_not_found("unknown.method");
        assert_eq!(err.message, "Method not found: unknown.method");
        assert_eq!(i32::from(err.code), -32601);
    }

    #[test]
    fn protocol_error_preserves_peer_data() {
        let err = McpError::protocol(-32602, "bad args", Some(serde_json::json!({"field": "a"})));
        assert_eq!(err.code, McpErrorCode::InvalidParams);
        assert_eq!(err.data.unwrap()["field"], "a");
    }
}
