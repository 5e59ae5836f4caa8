//! Model Context Protocol SDK for Rust.
//!
//! MCP is a bidirectional JSON-RPC 2.0 protocol by which an AI host
//! ("client") and a capability provider ("server") exchange tool
//! invocations, resource reads, prompt templates, log records, and
//! sampling requests over a pluggable transport.
//!
//! This crate re-exports the workspace surface:
//!
//! - [`protocol`]: envelopes, method names, payload types
//! - [`transport`]: stdio, HTTP+SSE, and in-memory transports
//! - [`session`]: the correlated request/notification peer
//! - [`client`] / [`server`]: the two role implementations, each with an
//!   async core and a blocking façade
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcpkit::client::McpAsyncClient;
//! use mcpkit::transport::stdio::{ServerParameters, StdioClientTransport};
//!
//! # async fn run() -> mcpkit::Result<()> {
//! let params = ServerParameters::builder("weather-server").arg("--stdio").build();
//! let transport = Arc::new(StdioClientTransport::new(params));
//!
//! let client = McpAsyncClient::builder("host-app", "1.0.0")
//!     .connect(transport)
//!     .await?;
//! client.initialize().await?;
//!
//! let tools = client.list_tools(None).await?;
//! println!("{} tools available", tools.tools.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub use mcpkit_core::{block_on, McpError, McpErrorCode, McpResult};

/// Result alias matching the crate-wide error type.
pub type Result<T> = McpResult<T>;

/// Protocol schema: envelopes, methods, payload types.
pub mod protocol {
    pub use mcpkit_protocol::*;
}

/// Transports: stdio, HTTP+SSE, in-memory duplex.
pub mod transport {
    pub use mcpkit_transport::*;
}

/// The transport-agnostic session runtime.
pub mod session {
    pub use mcpkit_session::*;
}

/// The client role.
pub mod client {
    pub use mcpkit_client::*;
}

/// The server role.
pub mod server {
    pub use mcpkit_server::*;
}
