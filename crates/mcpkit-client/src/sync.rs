//! Blocking client façade.
//!
//! [`McpSyncClient`] is a thin wrapper that drives the asynchronous
//! client to completion on the shared mcpkit runtime. Consumers
//! registered through the blocking helpers run on the blocking pool, off
//! the session's dispatch context.

use std::sync::Arc;

use mcpkit_core::{block_on, McpError, McpResult};
use mcpkit_protocol::{
    CallToolParams, CallToolResult, EmptyResult, GetPromptParams, GetPromptResult,
    InitializeResult, ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult,
    ListToolsResult, LogLevel, LoggingMessageParams, ReadResourceResult, Root, ServerCapabilities,
    ServerInfo, Tool,
};
use mcpkit_transport::Transport;

use crate::builder::{ClientBuilder, LoggingConsumer, ToolsChangeConsumer};
use crate::McpAsyncClient;

/// Bridges a blocking consumer into an async one running on the
/// blocking pool.
fn bridge_blocking<T: Send + 'static>(
    consumer: Arc<dyn Fn(T) + Send + Sync>,
) -> Arc<dyn Fn(T) -> mcpkit_transport::BoxFuture<'static, McpResult<()>> + Send + Sync> {
    Arc::new(move |value: T| {
        let consumer = Arc::clone(&consumer);
        Box::pin(async move {
            tokio::task::spawn_blocking(move || consumer(value))
                .await
                .map_err(|e| McpError::internal(format!("Blocking consumer panicked: {e}")))
        })
    })
}

impl ClientBuilder {
    /// Registers a blocking tools change consumer.
    #[must_use]
    pub fn tools_change_consumer_blocking(
        self,
        consumer: Arc<dyn Fn(Vec<Tool>) + Send + Sync>,
    ) -> Self {
        let bridged: ToolsChangeConsumer = bridge_blocking(consumer);
        self.tools_change_consumer(bridged)
    }

    /// Registers a blocking consumer for inbound log records.
    #[must_use]
    pub fn logging_consumer_blocking(
        self,
        consumer: Arc<dyn Fn(LoggingMessageParams) + Send + Sync>,
    ) -> Self {
        let bridged: LoggingConsumer = bridge_blocking(consumer);
        self.logging_consumer(bridged)
    }

    /// Connects and wraps the client in its blocking façade.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ClientBuilder::connect`].
    pub fn connect_sync(self, transport: Arc<dyn Transport>) -> McpResult<McpSyncClient> {
        block_on(self.connect(transport)).map(McpSyncClient::new)
    }
}

/// Blocking MCP client: every operation awaits its asynchronous
/// counterpart to completion.
pub struct McpSyncClient {
    inner: McpAsyncClient,
}

impl McpSyncClient {
    /// Wraps an already-connected asynchronous client.
    #[must_use]
    pub fn new(inner: McpAsyncClient) -> Self {
        Self { inner }
    }

    /// The wrapped asynchronous client.
    #[must_use]
    pub fn as_async(&self) -> &McpAsyncClient {
        &self.inner
    }

    /// Blocking [`McpAsyncClient::initialize`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn initialize(&self) -> McpResult<InitializeResult> {
        block_on(self.inner.initialize())
    }

    /// Blocking [`McpAsyncClient::ping`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn ping(&self) -> McpResult<EmptyResult> {
        block_on(self.inner.ping())
    }

    /// Blocking [`McpAsyncClient::list_tools`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        block_on(self.inner.list_tools(cursor))
    }

    /// Blocking [`McpAsyncClient::call_tool`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn call_tool(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        block_on(self.inner.call_tool(params))
    }

    /// Blocking [`McpAsyncClient::list_resources`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResult> {
        block_on(self.inner.list_resources(cursor))
    }

    /// Blocking [`McpAsyncClient::read_resource`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        block_on(self.inner.read_resource(uri))
    }

    /// Blocking [`McpAsyncClient::list_resource_templates`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResult> {
        block_on(self.inner.list_resource_templates(cursor))
    }

    /// Blocking [`McpAsyncClient::list_prompts`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        block_on(self.inner.list_prompts(cursor))
    }

    /// Blocking [`McpAsyncClient::get_prompt`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn get_prompt(&self, params: GetPromptParams) -> McpResult<GetPromptResult> {
        block_on(self.inner.get_prompt(params))
    }

    /// Blocking [`McpAsyncClient::set_logging_level`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn set_logging_level(&self, level: LogLevel) -> McpResult<()> {
        block_on(self.inner.set_logging_level(level))
    }

    /// Blocking [`McpAsyncClient::add_root`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn add_root(&self, root: Root) -> McpResult<()> {
        block_on(self.inner.add_root(root))
    }

    /// Blocking [`McpAsyncClient::remove_root`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn remove_root(&self, uri: &str) -> McpResult<()> {
        block_on(self.inner.remove_root(uri))
    }

    /// The current root set.
    #[must_use]
    pub fn roots(&self) -> Vec<Root> {
        self.inner.roots()
    }

    /// The server's capabilities, once initialized.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.inner.server_capabilities()
    }

    /// The server's implementation info, once initialized.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.inner.server_info()
    }

    /// Blocking [`McpAsyncClient::close_gracefully`].
    ///
    /// # Errors
    ///
    /// Same failure modes as the async operation.
    pub fn close_gracefully(&self) -> McpResult<()> {
        block_on(self.inner.close_gracefully())
    }
}
