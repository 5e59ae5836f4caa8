//! Blocking server façade.
//!
//! [`McpSyncServer`] mirrors the asynchronous server, blocking on every
//! mutation and notification via the shared mcpkit runtime.

use std::sync::Arc;

use mcpkit_core::{block_on, McpResult};
use mcpkit_protocol::{
    ClientCapabilities, ClientInfo, CreateMessageParams, CreateMessageResult, ListRootsResult,
    LoggingMessageParams, ResourceTemplate, Tool,
};
use mcpkit_transport::Transport;

use crate::builder::ServerBuilder;
use crate::registry::{PromptRegistration, ResourceRegistration, ToolRegistration};
use crate::McpAsyncServer;

impl ServerBuilder {
    /// Connects and wraps the server in its blocking façade.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ServerBuilder::connect`].
    pub fn connect_sync(self, transport: Arc<dyn Transport>) -> McpResult<McpSyncServer> {
        block_on(self.connect(transport)).map(McpSyncServer::new)
    }
}

/// Blocking MCP server: every operation awaits its asynchronous
/// counterpart to completion.
pub struct McpSyncServer {
    inner: McpAsyncServer,
}

impl McpSyncServer {
    /// Wraps an already-connected asynchronous server.
    #[must_use]
    pub fn new(inner: McpAsyncServer) -> Self {
        Self { inner }
    }

    /// The wrapped asynchronous server.
    #[must_use]
    pub fn as_async(&self) -> &McpAsyncServer {
        &self.inner
    }

    /// Blocking [`McpAsyncServer::add_tool`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn add_tool(&self, registration: ToolRegistration) -> McpResult<()> {
        block_on(self.inner.add_tool(registration))
    }

    /// Blocking [`McpAsyncServer::remove_tool`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn remove_tool(&self, name: &str) -> McpResult<()> {
        block_on(self.inner.remove_tool(name))
    }

    /// Blocking [`McpAsyncServer::add_resource`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn add_resource(&self, registration: ResourceRegistration) -> McpResult<()> {
        block_on(self.inner.add_resource(registration))
    }

    /// Blocking [`McpAsyncServer::remove_resource`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn remove_resource(&self, uri: &str) -> McpResult<()> {
        block_on(self.inner.remove_resource(uri))
    }

    /// Blocking [`McpAsyncServer::add_resource_template`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn add_resource_template(&self, template: ResourceTemplate) -> McpResult<()> {
        block_on(self.inner.add_resource_template(template))
    }

    /// Blocking [`McpAsyncServer::add_prompt`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn add_prompt(&self, registration: PromptRegistration) -> McpResult<()> {
        block_on(self.inner.add_prompt(registration))
    }

    /// Blocking [`McpAsyncServer::remove_prompt`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn remove_prompt(&self, name: &str) -> McpResult<()> {
        block_on(self.inner.remove_prompt(name))
    }

    /// Registered tool descriptors.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.inner.tools()
    }

    /// Blocking [`McpAsyncServer::notify_tools_list_changed`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn notify_tools_list_changed(&self) -> McpResult<()> {
        block_on(self.inner.notify_tools_list_changed())
    }

    /// Blocking [`McpAsyncServer::notify_resources_list_changed`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn notify_resources_list_changed(&self) -> McpResult<()> {
        block_on(self.inner.notify_resources_list_changed())
    }

    /// Blocking [`McpAsyncServer::notify_prompts_list_changed`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn notify_prompts_list_changed(&self) -> McpResult<()> {
        block_on(self.inner.notify_prompts_list_changed())
    }

    /// Blocking [`McpAsyncServer::logging_notification`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn logging_notification(&self, record: LoggingMessageParams) -> McpResult<()> {
        block_on(self.inner.logging_notification(record))
    }

    /// Blocking [`McpAsyncServer::create_message`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult> {
        block_on(self.inner.create_message(params))
    }

    /// Blocking [`McpAsyncServer::list_roots`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn list_roots(&self, cursor: Option<String>) -> McpResult<ListRootsResult> {
        block_on(self.inner.list_roots(cursor))
    }

    /// The connected client's implementation info, once initialized.
    #[must_use]
    pub fn client_info(&self) -> Option<ClientInfo> {
        self.inner.client_info()
    }

    /// The connected client's capabilities, once initialized.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.inner.client_capabilities()
    }

    /// Blocking [`McpAsyncServer::close_gracefully`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn close_gracefully(&self) -> McpResult<()> {
        block_on(self.inner.close_gracefully())
    }
}
