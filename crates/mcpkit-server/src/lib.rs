//! MCP server role.
//!
//! An [`McpAsyncServer`] owns a session and implements the server side of
//! the protocol: the initialization handler, dynamic registries of
//! tools/resources/prompts with list-changed notifications, logging
//! emission filtered by the client-set minimum level, outbound sampling
//! requests, and a consumer path for the client's roots changes.
//!
//! A blocking façade is available as [`McpSyncServer`].

#![forbid(unsafe_code)]

mod builder;
mod registry;
mod sync;

pub use builder::ServerBuilder;
pub use registry::{
    PromptHandlerFn, PromptRegistration, ResourceHandlerFn, ResourceRegistration, ToolHandlerFn,
    ToolRegistration,
};
pub use sync::McpSyncServer;

use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::warn;

use mcpkit_core::logging::targets;
use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::{
    methods, ClientCapabilities, ClientInfo, CreateMessageParams, CreateMessageResult,
    ListRootsResult, LogLevel, LoggingMessageParams, PaginatedParams, Prompt, Resource,
    ResourceTemplate, ResourceUpdatedParams, Root, ServerCapabilities, ServerInfo, Tool,
};
use mcpkit_session::McpSession;
use mcpkit_transport::BoxFuture;

use registry::FeatureRegistry;

/// Consumer invoked with the client's refreshed root list after a
/// `notifications/roots/list_changed`.
pub type RootsChangeConsumer =
    Arc<dyn Fn(Vec<Root>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Client-side state recorded by the initialize handler.
#[derive(Debug, Clone)]
pub(crate) struct ClientState {
    pub(crate) info: ClientInfo,
    pub(crate) capabilities: ClientCapabilities,
    #[allow(dead_code)]
    pub(crate) protocol_version: String,
}

pub(crate) struct ServerShared {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    registry: FeatureRegistry,
    min_log_level: Mutex<LogLevel>,
    client_state: RwLock<Option<ClientState>>,
    session: OnceLock<McpSession>,
    roots_change_consumers: Vec<RootsChangeConsumer>,
}

impl ServerShared {
    fn new(
        info: ServerInfo,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
        roots_change_consumers: Vec<RootsChangeConsumer>,
    ) -> Self {
        Self {
            info,
            capabilities,
            instructions,
            registry: FeatureRegistry::default(),
            min_log_level: Mutex::new(LogLevel::Debug),
            client_state: RwLock::new(None),
            session: OnceLock::new(),
            roots_change_consumers,
        }
    }

    fn install_session(&self, session: McpSession) -> McpResult<()> {
        self.session
            .set(session)
            .map_err(|_| McpError::invalid_state("Session already installed"))
    }

    fn session(&self) -> McpResult<&McpSession> {
        self.session
            .get()
            .ok_or_else(|| McpError::invalid_state("Server session not connected"))
    }

    fn ensure_initialized(&self) -> McpResult<()> {
        if self
            .client_state
            .read()
            .expect("client state lock poisoned")
            .is_some()
        {
            Ok(())
        } else {
            Err(McpError::invalid_state(
                "Server not initialized. Client must send 'initialize' first.",
            ))
        }
    }

    fn client_state(&self) -> Option<ClientState> {
        self.client_state
            .read()
            .expect("client state lock poisoned")
            .clone()
    }

    fn set_min_log_level(&self, level: LogLevel) {
        *self
            .min_log_level
            .lock()
            .expect("log level lock poisoned") = level;
    }

    fn min_log_level(&self) -> LogLevel {
        *self
            .min_log_level
            .lock()
            .expect("log level lock poisoned")
    }

    async fn fetch_roots(&self, cursor: Option<String>) -> McpResult<ListRootsResult> {
        let params = PaginatedParams::new(cursor);
        self.session()?
            .send_request(methods::ROOTS_LIST, Some(serde_json::to_value(params)?))
            .await
    }

    async fn fan_out_roots(&self, roots: Vec<Root>) {
        for consumer in &self.roots_change_consumers {
            if let Err(err) = consumer(roots.clone()).await {
                warn!(target: targets::SERVER, "Roots change consumer failed: {err}");
            }
        }
    }
}

/// Asynchronous MCP server.
///
/// Cheap to clone; all clones share the same session and registries.
#[derive(Clone)]
pub struct McpAsyncServer {
    pub(crate) shared: Arc<ServerShared>,
}

impl McpAsyncServer {
    /// Starts building a server with the given implementation info.
    #[must_use]
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ServerBuilder {
        ServerBuilder::new(name, version)
    }

    // --------------------------------------------------------------------
    // State accessors
    // --------------------------------------------------------------------

    /// This server's implementation info.
    #[must_use]
    pub fn server_info(&self) -> &ServerInfo {
        &self.shared.info
    }

    /// The capabilities this server advertises.
    #[must_use]
    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.shared.capabilities
    }

    /// The connected client's implementation info, once initialized.
    #[must_use]
    pub fn client_info(&self) -> Option<ClientInfo> {
        self.shared.client_state().map(|s| s.info)
    }

    /// The connected client's capabilities, once initialized.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.shared.client_state().map(|s| s.capabilities)
    }

    /// Registered tool descriptors.
    #[must_use]
    pub fn tools(&self) -> Vec<Tool> {
        self.shared.registry.tools_snapshot()
    }

    /// Registered resource descriptors.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        self.shared.registry.resources_snapshot()
    }

    /// Registered resource templates.
    #[must_use]
    pub fn resource_templates(&self) -> Vec<ResourceTemplate> {
        self.shared.registry.templates_snapshot()
    }

    /// Registered prompt descriptors.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.shared.registry.prompts_snapshot()
    }

    // --------------------------------------------------------------------
    // Dynamic registries
    // --------------------------------------------------------------------

    /// Adds a tool, emitting `notifications/tools/list_changed` when the
    /// capability declares it.
    ///
    /// # Errors
    ///
    /// Fails when the tools capability is absent or the name is taken;
    /// on failure the registry is unchanged and nothing is sent.
    pub async fn add_tool(&self, registration: ToolRegistration) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .tools
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise tools"))?
            .clone();

        let name = registration.tool.name.clone();
        if !self.shared.registry.insert_tool(registration) {
            return Err(McpError::duplicate(format!(
                "Tool with name '{name}' already exists"
            )));
        }
        if capability.list_changed {
            self.notify_tools_list_changed().await?;
        }
        Ok(())
    }

    /// Removes a tool by name, emitting list-changed when declared.
    ///
    /// # Errors
    ///
    /// Fails when the tools capability is absent or the name is unknown.
    pub async fn remove_tool(&self, name: &str) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .tools
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise tools"))?
            .clone();

        if !self.shared.registry.remove_tool(name) {
            return Err(McpError::unknown_entry(format!(
                "Tool with name '{name}' not found"
            )));
        }
        if capability.list_changed {
            self.notify_tools_list_changed().await?;
        }
        Ok(())
    }

    /// Adds a resource, emitting `notifications/resources/list_changed`
    /// when the capability declares it.
    ///
    /// # Errors
    ///
    /// Fails when the resources capability is absent or the URI is
    /// taken; on failure the registry is unchanged and nothing is sent.
    pub async fn add_resource(&self, registration: ResourceRegistration) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .resources
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise resources"))?
            .clone();

        let uri = registration.resource.uri.clone();
        if !self.shared.registry.insert_resource(registration) {
            return Err(McpError::duplicate(format!(
                "Resource with uri '{uri}' already exists"
            )));
        }
        if capability.list_changed {
            self.notify_resources_list_changed().await?;
        }
        Ok(())
    }

    /// Removes a resource by URI, emitting list-changed when declared.
    ///
    /// # Errors
    ///
    /// Fails when the resources capability is absent or the URI is
    /// unknown.
    pub async fn remove_resource(&self, uri: &str) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .resources
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise resources"))?
            .clone();

        if !self.shared.registry.remove_resource(uri) {
            return Err(McpError::unknown_entry(format!(
                "Resource with uri '{uri}' not found"
            )));
        }
        if capability.list_changed {
            self.notify_resources_list_changed().await?;
        }
        Ok(())
    }

    /// Adds a resource template.
    ///
    /// # Errors
    ///
    /// Fails when the resources capability is absent or the URI template
    /// is taken.
    pub async fn add_resource_template(&self, template: ResourceTemplate) -> McpResult<()> {
        if self.shared.capabilities.resources.is_none() {
            return Err(McpError::capability("Server does not advertise resources"));
        }
        let uri_template = template.uri_template.clone();
        if !self.shared.registry.insert_template(template) {
            return Err(McpError::duplicate(format!(
                "Resource template '{uri_template}' already exists"
            )));
        }
        Ok(())
    }

    /// Adds a prompt, emitting `notifications/prompts/list_changed` when
    /// the capability declares it.
    ///
    /// # Errors
    ///
    /// Fails when the prompts capability is absent or the name is taken;
    /// on failure the registry is unchanged and nothing is sent.
    pub async fn add_prompt(&self, registration: PromptRegistration) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .prompts
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise prompts"))?
            .clone();

        let name = registration.prompt.name.clone();
        if !self.shared.registry.insert_prompt(registration) {
            return Err(McpError::duplicate(format!(
                "Prompt with name '{name}' already exists"
            )));
        }
        if capability.list_changed {
            self.notify_prompts_list_changed().await?;
        }
        Ok(())
    }

    /// Removes a prompt by name, emitting list-changed when declared.
    ///
    /// # Errors
    ///
    /// Fails when the prompts capability is absent or the name is
    /// unknown.
    pub async fn remove_prompt(&self, name: &str) -> McpResult<()> {
        let capability = self
            .shared
            .capabilities
            .prompts
            .as_ref()
            .ok_or_else(|| McpError::capability("Server does not advertise prompts"))?
            .clone();

        if !self.shared.registry.remove_prompt(name) {
            return Err(McpError::unknown_entry(format!(
                "Prompt with name '{name}' not found"
            )));
        }
        if capability.list_changed {
            self.notify_prompts_list_changed().await?;
        }
        Ok(())
    }

    // --------------------------------------------------------------------
    // Notifications
    // --------------------------------------------------------------------

    /// Sends `notifications/tools/list_changed`.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn notify_tools_list_changed(&self) -> McpResult<()> {
        self.shared
            .session()?
            .send_notification(methods::NOTIFICATION_TOOLS_LIST_CHANGED, None)
            .await
    }

    /// Sends `notifications/resources/list_changed`.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn notify_resources_list_changed(&self) -> McpResult<()> {
        self.shared
            .session()?
            .send_notification(methods::NOTIFICATION_RESOURCES_LIST_CHANGED, None)
            .await
    }

    /// Sends `notifications/prompts/list_changed`.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn notify_prompts_list_changed(&self) -> McpResult<()> {
        self.shared
            .session()?
            .send_notification(methods::NOTIFICATION_PROMPTS_LIST_CHANGED, None)
            .await
    }

    /// Sends `notifications/resources/updated` for a URI the client has
    /// subscribed to; a no-op for unsubscribed URIs.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn resource_updated_notification(&self, uri: impl Into<String>) -> McpResult<()> {
        let uri = uri.into();
        if !self.shared.registry.is_subscribed(&uri) {
            return Ok(());
        }
        let params = ResourceUpdatedParams { uri };
        self.shared
            .session()?
            .send_notification(
                methods::NOTIFICATION_RESOURCES_UPDATED,
                Some(serde_json::to_value(params)?),
            )
            .await
    }

    /// Emits a protocol log record, subject to the minimum-level filter.
    ///
    /// The record reaches the wire iff its level is at least the current
    /// minimum (initially debug; updated by `logging/setLevel`).
    ///
    /// # Errors
    ///
    /// Fails when the logging capability is absent or the send fails.
    pub async fn logging_notification(&self, record: LoggingMessageParams) -> McpResult<()> {
        if self.shared.capabilities.logging.is_none() {
            return Err(McpError::capability("Server does not advertise logging"));
        }
        if record.level < self.shared.min_log_level() {
            return Ok(());
        }
        self.shared
            .session()?
            .send_notification(
                methods::NOTIFICATION_MESSAGE,
                Some(serde_json::to_value(record)?),
            )
            .await
    }

    // --------------------------------------------------------------------
    // Client-directed requests
    // --------------------------------------------------------------------

    /// Requests an LLM completion from the client.
    ///
    /// # Errors
    ///
    /// Fails locally when the client did not advertise sampling.
    pub async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> McpResult<CreateMessageResult> {
        let client_state = self
            .shared
            .client_state()
            .ok_or_else(|| McpError::invalid_state("Server not initialized"))?;
        if client_state.capabilities.sampling.is_none() {
            return Err(McpError::capability(
                "Client must be configured with sampling capabilities",
            ));
        }
        self.shared
            .session()?
            .send_request(
                methods::SAMPLING_CREATE_MESSAGE,
                Some(serde_json::to_value(params)?),
            )
            .await
    }

    /// Requests the client's root list.
    ///
    /// # Errors
    ///
    /// Fails locally when the client did not advertise roots.
    pub async fn list_roots(&self, cursor: Option<String>) -> McpResult<ListRootsResult> {
        let client_state = self
            .shared
            .client_state()
            .ok_or_else(|| McpError::invalid_state("Server not initialized"))?;
        if client_state.capabilities.roots.is_none() {
            return Err(McpError::capability(
                "Client must be configured with roots capabilities",
            ));
        }
        self.shared.fetch_roots(cursor).await
    }

    // --------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------

    /// Gracefully closes the underlying session.
    ///
    /// # Errors
    ///
    /// Propagates transport shutdown failures.
    pub async fn close_gracefully(&self) -> McpResult<()> {
        self.shared.session()?.close_gracefully().await
    }

    /// Forcibly closes the underlying session.
    pub fn close(&self) {
        if let Ok(session) = self.shared.session() {
            session.close();
        }
    }
}
