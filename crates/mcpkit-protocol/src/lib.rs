//! MCP protocol types and JSON-RPC envelopes.
//!
//! This crate provides:
//! - JSON-RPC 2.0 message types and the envelope discrimination parser
//! - MCP method-name constants
//! - MCP payload shapes (tools, resources, prompts, roots, sampling,
//!   logging)
//! - Protocol version constants for negotiation
//!
//! # MCP Protocol Overview
//!
//! MCP (Model Context Protocol) uses JSON-RPC 2.0 over various transports.
//! Both peers run a symmetric session; the asymmetry lives in which
//! request methods each side handles:
//!
//! - **Tools**: executable functions the server exposes
//! - **Resources**: URI-addressed data the server exposes
//! - **Prompts**: message templates the server exposes
//! - **Roots**: filesystem/URI boundaries the client declares
//! - **Sampling**: LLM completions the server requests from the client

#![forbid(unsafe_code)]

mod jsonrpc;
mod messages;
pub mod methods;
mod types;

pub use jsonrpc::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
    JSONRPC_VERSION,
};
pub use messages::*;
pub use types::*;
