//! Transports for the mcpkit MCP SDK.
//!
//! A [`Transport`] provides framed, ordered, bidirectional delivery of
//! JSON-RPC envelopes between two peers. This crate ships three families:
//!
//! - [`stdio`]: newline-delimited JSON over a child process's stdin/stdout
//!   ([`stdio::StdioClientTransport`]) or the current process's own
//!   stdin/stdout ([`stdio::StdioServerTransport`])
//! - [`sse`]: HTTP+SSE, where the server pushes envelopes on a
//!   long-lived event stream and the peer POSTs envelopes to a
//!   discovered endpoint
//! - [`memory`]: an in-process duplex pair for tests and embedding
//!
//! # Contract
//!
//! Every transport behaves as a bounded queue in both directions: a full
//! outbound queue fails [`Transport::send_message`] with
//! [`TransportError::EnqueueFailed`] instead of blocking indefinitely, and
//! per-direction FIFO ordering is preserved end to end. The inbound
//! handler is installed by [`Transport::connect`] before any envelope is
//! delivered.

#![forbid(unsafe_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::JsonRpcMessage;

pub mod memory;
pub mod sse;
pub mod stdio;

/// A boxed future used by handler callbacks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Inbound message handler installed via [`Transport::connect`].
///
/// Invoked for every inbound envelope, in arrival order. Response routing
/// is the installer's responsibility; in practice the session installs
/// itself here and writes any replies back through
/// [`Transport::send_message`].
pub type MessageHandler = Arc<dyn Fn(JsonRpcMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Envelope (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The bounded outbound queue refused the envelope.
    #[error("Failed to enqueue message")]
    EnqueueFailed,

    /// The channel to the peer has ended.
    #[error("Transport closed")]
    Closed,

    /// An operation requires a prior successful `connect`.
    #[error("Transport not connected")]
    NotConnected,

    /// `connect` was called on a transport that is already connected.
    #[error("Transport already connected")]
    AlreadyConnected,

    /// The child process could not be started.
    #[error("Failed to start process: {0}")]
    Spawn(String),

    /// An HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The SSE endpoint event did not arrive within the bounded wait.
    #[error("Message endpoint not discovered within {0:?}")]
    EndpointNotDiscovered(Duration),
}

impl From<TransportError> for McpError {
    fn from(err: TransportError) -> Self {
        McpError::transport(err.to_string())
    }
}

/// Framed, ordered, bidirectional delivery of JSON-RPC envelopes.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Begins bidirectional operation with the given inbound handler.
    ///
    /// Completes when the underlying channel is established (process
    /// spawned, SSE endpoint discovered, routes wired). The handler is in
    /// place before the first inbound envelope is observed.
    ///
    /// # Errors
    ///
    /// Fails if the channel cannot be established or `connect` was
    /// already called.
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError>;

    /// Enqueues an envelope for transmission.
    ///
    /// Completes once the envelope is accepted into the outbound queue,
    /// which preserves FIFO ordering per direction.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::EnqueueFailed`] when the queue is
    /// full and [`TransportError::Closed`] after close.
    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError>;

    /// Stops accepting outbound envelopes, flushes, and releases resources.
    ///
    /// In-flight inbound dispatches are allowed to complete. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails if releasing the underlying channel fails.
    async fn close_gracefully(&self) -> Result<(), TransportError>;
}

/// Decodes a raw `params` value into a declared payload type.
///
/// Used by request and notification handlers; a missing or mismatched
/// value is an invalid-params error.
///
/// # Errors
///
/// Returns [`McpError::invalid_params`] when `params` is absent or does
/// not match `T`.
pub fn unmarshal<T: DeserializeOwned>(params: Option<serde_json::Value>) -> McpResult<T> {
    let value = params.ok_or_else(|| McpError::invalid_params("Missing required parameters"))?;
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}

/// Decodes optional `params`, falling back to the type's default.
///
/// # Errors
///
/// Returns [`McpError::invalid_params`] when present params do not match
/// `T`.
pub fn unmarshal_or_default<T: DeserializeOwned + Default>(
    params: Option<serde_json::Value>,
) -> McpResult<T> {
    match params {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
        }
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_protocol::PaginatedParams;

    #[test]
    fn unmarshal_rejects_missing_params() {
        let err = unmarshal::<PaginatedParams>(None).unwrap_err();
        assert_eq!(i32::from(err.code), -32602);
    }

    #[test]
    fn unmarshal_or_default_accepts_missing_params() {
        let params = unmarshal_or_default::<PaginatedParams>(None).unwrap();
        assert!(params.cursor.is_none());
    }

    #[test]
    fn unmarshal_rejects_mismatched_shape() {
        let err =
            unmarshal::<mcpkit_protocol::ReadResourceParams>(Some(serde_json::json!({"nope": 1})))
                .unwrap_err();
        assert_eq!(i32::from(err.code), -32602);
    }
}
