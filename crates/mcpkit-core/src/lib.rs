//! Core types for the mcpkit MCP SDK.
//!
//! This crate provides the fundamental building blocks shared by every
//! other crate in the workspace:
//! - [`McpError`] and [`McpErrorCode`], the structured error type used
//!   across the protocol, session, and role layers
//! - Log-target constants for consistent `tracing` filtering
//! - [`block_on`], the runtime helper backing the synchronous façades
//!
//! # Design Principles
//!
//! - All types are `Send + Sync`
//! - Errors carry the JSON-RPC error code they map to on the wire
//! - No subscriber is installed; applications choose their own backend

#![forbid(unsafe_code)]

mod error;
pub mod logging;
mod runtime;

pub use error::{McpError, McpErrorCode, McpResult};
pub use runtime::block_on;
