//! MCP client role.
//!
//! An [`McpAsyncClient`] owns a session and implements the client side of
//! the protocol: initialization and capability negotiation, typed
//! feature operations gated on the server's advertised capabilities,
//! roots management, sampling-request handling, and fan-out of server
//! change notifications to registered consumers.
//!
//! # Lifecycle
//!
//! 1. Build and connect: [`McpAsyncClient::builder`] → `connect`
//! 2. [`McpAsyncClient::initialize`]: handshake and version negotiation
//! 3. Feature operations (`list_tools`, `call_tool`, ...)
//! 4. [`McpAsyncClient::close_gracefully`]
//!
//! Feature operations before a successful `initialize` fail with a state
//! error. A blocking façade is available as [`McpSyncClient`].

#![forbid(unsafe_code)]

mod builder;
mod sync;

pub use builder::{
    ClientBuilder, LoggingConsumer, PromptsChangeConsumer, ResourceUpdateConsumer,
    ResourcesChangeConsumer, SamplingHandler, ToolsChangeConsumer,
};
pub use sync::McpSyncClient;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use tracing::warn;

use mcpkit_core::logging::targets;
use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::{
    methods, CallToolParams, CallToolResult, ClientCapabilities, ClientInfo, EmptyResult,
    GetPromptParams, GetPromptResult, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, LogLevel,
    LoggingMessageParams, PaginatedParams, Prompt, ReadResourceParams, ReadResourceResult,
    Resource, ResourceUpdatedParams, Root, ServerCapabilities, ServerInfo, SetLevelParams,
    SubscribeResourceParams, Tool, UnsubscribeResourceParams, SUPPORTED_PROTOCOL_VERSIONS,
};
use mcpkit_session::McpSession;

/// Negotiated server-side state, recorded on successful initialization.
#[derive(Debug, Clone)]
struct NegotiatedState {
    server_info: ServerInfo,
    server_capabilities: ServerCapabilities,
    protocol_version: String,
    instructions: Option<String>,
}

pub(crate) struct ClientShared {
    info: ClientInfo,
    capabilities: ClientCapabilities,
    session: OnceLock<McpSession>,
    negotiated: RwLock<Option<NegotiatedState>>,
    roots: Mutex<HashMap<String, Root>>,
    subscriptions: Mutex<HashMap<String, Vec<ResourceUpdateConsumer>>>,
    tools_change_consumers: Vec<ToolsChangeConsumer>,
    resources_change_consumers: Vec<ResourcesChangeConsumer>,
    prompts_change_consumers: Vec<PromptsChangeConsumer>,
    logging_consumers: Vec<LoggingConsumer>,
}

impl ClientShared {
    #[allow(clippy::too_many_arguments)]
    fn new(
        info: ClientInfo,
        capabilities: ClientCapabilities,
        roots: HashMap<String, Root>,
        tools_change_consumers: Vec<ToolsChangeConsumer>,
        resources_change_consumers: Vec<ResourcesChangeConsumer>,
        prompts_change_consumers: Vec<PromptsChangeConsumer>,
        logging_consumers: Vec<LoggingConsumer>,
    ) -> Self {
        Self {
            info,
            capabilities,
            session: OnceLock::new(),
            negotiated: RwLock::new(None),
            roots: Mutex::new(roots),
            subscriptions: Mutex::new(HashMap::new()),
            tools_change_consumers,
            resources_change_consumers,
            prompts_change_consumers,
            logging_consumers,
        }
    }

    fn capabilities(&self) -> &ClientCapabilities {
        &self.capabilities
    }

    fn install_session(&self, session: McpSession) -> McpResult<()> {
        self.session
            .set(session)
            .map_err(|_| McpError::invalid_state("Session already installed"))
    }

    fn session(&self) -> McpResult<&McpSession> {
        self.session
            .get()
            .ok_or_else(|| McpError::invalid_state("Client session not connected"))
    }

    fn roots_snapshot(&self) -> Vec<Root> {
        self.roots
            .lock()
            .expect("roots lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    async fn refetch_tools(&self) -> McpResult<Vec<Tool>> {
        let result: ListToolsResult = self
            .session()?
            .send_request(
                methods::TOOLS_LIST,
                Some(serde_json::to_value(PaginatedParams::default())?),
            )
            .await?;
        Ok(result.tools)
    }

    async fn refetch_resources(&self) -> McpResult<Vec<Resource>> {
        let result: ListResourcesResult = self
            .session()?
            .send_request(
                methods::RESOURCES_LIST,
                Some(serde_json::to_value(PaginatedParams::default())?),
            )
            .await?;
        Ok(result.resources)
    }

    async fn refetch_prompts(&self) -> McpResult<Vec<Prompt>> {
        let result: ListPromptsResult = self
            .session()?
            .send_request(
                methods::PROMPTS_LIST,
                Some(serde_json::to_value(PaginatedParams::default())?),
            )
            .await?;
        Ok(result.prompts)
    }

    /// Invokes each consumer in registration order; failures are logged
    /// and do not abort the chain.
    async fn fan_out_tools(&self, tools: Vec<Tool>) {
        for consumer in &self.tools_change_consumers {
            if let Err(err) = consumer(tools.clone()).await {
                warn!(target: targets::CLIENT, "Tools change consumer failed: {err}");
            }
        }
    }

    async fn fan_out_resources(&self, resources: Vec<Resource>) {
        for consumer in &self.resources_change_consumers {
            if let Err(err) = consumer(resources.clone()).await {
                warn!(target: targets::CLIENT, "Resources change consumer failed: {err}");
            }
        }
    }

    async fn fan_out_prompts(&self, prompts: Vec<Prompt>) {
        for consumer in &self.prompts_change_consumers {
            if let Err(err) = consumer(prompts.clone()).await {
                warn!(target: targets::CLIENT, "Prompts change consumer failed: {err}");
            }
        }
    }

    async fn fan_out_log_record(&self, record: LoggingMessageParams) {
        for consumer in &self.logging_consumers {
            if let Err(err) = consumer(record.clone()).await {
                warn!(target: targets::CLIENT, "Logging consumer failed: {err}");
            }
        }
    }

    async fn fan_out_resource_update(&self, update: ResourceUpdatedParams) {
        let subscribers: Vec<ResourceUpdateConsumer> = {
            let subscriptions = self.subscriptions.lock().expect("subscriptions lock poisoned");
            subscriptions.get(&update.uri).cloned().unwrap_or_default()
        };
        if subscribers.is_empty() {
            warn!(
                target: targets::CLIENT,
                "Resource update for '{}' with no subscriber", update.uri
            );
            return;
        }
        for subscriber in subscribers {
            if let Err(err) = subscriber(update.clone()).await {
                warn!(target: targets::CLIENT, "Resource update subscriber failed: {err}");
            }
        }
    }
}

/// Asynchronous MCP client.
///
/// Cheap to clone; all clones share the same session and state.
#[derive(Clone)]
pub struct McpAsyncClient {
    pub(crate) shared: Arc<ClientShared>,
}

impl McpAsyncClient {
    /// Starts building a client with the given implementation info.
    #[must_use]
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name, version)
    }

    // --------------------------------------------------------------------
    // Lifecycle
    // --------------------------------------------------------------------

    /// Runs the initialization handshake.
    ///
    /// Sends `initialize` with the newest supported protocol version,
    /// verifies the server's chosen version is one the client supports,
    /// records the negotiated state, and sends the
    /// `notifications/initialized` notification. Feature operations are
    /// permitted only after this completes.
    ///
    /// # Errors
    ///
    /// Fails with a version error when the server picks an unsupported
    /// revision; in that case no `initialized` notification is sent.
    pub async fn initialize(&self) -> McpResult<InitializeResult> {
        let params = InitializeParams {
            protocol_version: SUPPORTED_PROTOCOL_VERSIONS[0].to_owned(),
            capabilities: self.shared.capabilities.clone(),
            client_info: self.shared.info.clone(),
        };

        let result: InitializeResult = self
            .shared
            .session()?
            .send_request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;

        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&result.protocol_version.as_str()) {
            return Err(McpError::unsupported_protocol_version(
                &result.protocol_version,
            ));
        }

        *self
            .shared
            .negotiated
            .write()
            .expect("negotiated lock poisoned") = Some(NegotiatedState {
            server_info: result.server_info.clone(),
            server_capabilities: result.capabilities.clone(),
            protocol_version: result.protocol_version.clone(),
            instructions: result.instructions.clone(),
        });

        self.shared
            .session()?
            .send_notification(methods::NOTIFICATION_INITIALIZED, None)
            .await?;

        Ok(result)
    }

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

    // --------------------------------------------------------------------
    // Negotiated state
    // --------------------------------------------------------------------

    /// The server's capabilities, once initialized.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.negotiated().map(|s| s.server_capabilities)
    }

    /// The server's implementation info, once initialized.
    #[must_use]
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.negotiated().map(|s| s.server_info)
    }

    /// The negotiated protocol version, once initialized.
    #[must_use]
    pub fn negotiated_protocol_version(&self) -> Option<String> {
        self.negotiated().map(|s| s.protocol_version)
    }

    /// The server's usage instructions, when it provided any.
    #[must_use]
    pub fn server_instructions(&self) -> Option<String> {
        self.negotiated().and_then(|s| s.instructions)
    }

    /// The capabilities this client advertises.
    #[must_use]
    pub fn client_capabilities(&self) -> &ClientCapabilities {
        &self.shared.capabilities
    }

    /// This client's implementation info.
    #[must_use]
    pub fn client_info(&self) -> &ClientInfo {
        &self.shared.info
    }

    fn negotiated(&self) -> Option<NegotiatedState> {
        self.shared
            .negotiated
            .read()
            .expect("negotiated lock poisoned")
            .clone()
    }

    fn require_initialized(&self) -> McpResult<NegotiatedState> {
        self.negotiated()
            .ok_or_else(|| McpError::invalid_state("Client not initialized"))
    }

    fn require_server_capability(
        &self,
        check: impl Fn(&ServerCapabilities) -> bool,
        area: &str,
    ) -> McpResult<()> {
        let state = self.require_initialized()?;
        if check(&state.server_capabilities) {
            Ok(())
        } else {
            Err(McpError::capability(format!(
                "Server does not support {area}"
            )))
        }
    }

    // --------------------------------------------------------------------
    // Basic utilities
    // --------------------------------------------------------------------

    /// Sends a `ping`; any session state after connect is acceptable.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn ping(&self) -> McpResult<EmptyResult> {
        self.shared
            .session()?
            .send_request(methods::PING, None)
            .await
    }

    // --------------------------------------------------------------------
    // Tools
    // --------------------------------------------------------------------

    /// Lists the server's tools, forwarding the pagination cursor.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise tools.
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ListToolsResult> {
        self.require_server_capability(|caps| caps.tools.is_some(), "tools")?;
        self.paginated_request(methods::TOOLS_LIST, cursor).await
    }

    /// Calls a tool by name.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise tools; otherwise
    /// returns the server's result or error.
    pub async fn call_tool(&self, params: CallToolParams) -> McpResult<CallToolResult> {
        self.require_server_capability(|caps| caps.tools.is_some(), "tools")?;
        self.shared
            .session()?
            .send_request(methods::TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await
    }

    // --------------------------------------------------------------------
    // Resources
    // --------------------------------------------------------------------

    /// Lists the server's resources, forwarding the pagination cursor.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise resources.
    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ListResourcesResult> {
        self.require_server_capability(|caps| caps.resources.is_some(), "resources")?;
        self.paginated_request(methods::RESOURCES_LIST, cursor).await
    }

    /// Reads a resource by URI.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise resources.
    pub async fn read_resource(&self, uri: impl Into<String>) -> McpResult<ReadResourceResult> {
        self.require_server_capability(|caps| caps.resources.is_some(), "resources")?;
        let params = ReadResourceParams { uri: uri.into() };
        self.shared
            .session()?
            .send_request(methods::RESOURCES_READ, Some(serde_json::to_value(params)?))
            .await
    }

    /// Lists the server's resource templates.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise resources.
    pub async fn list_resource_templates(
        &self,
        cursor: Option<String>,
    ) -> McpResult<ListResourceTemplatesResult> {
        self.require_server_capability(|caps| caps.resources.is_some(), "resources")?;
        self.paginated_request(methods::RESOURCES_TEMPLATES_LIST, cursor)
            .await
    }

    /// Subscribes to updates for a resource URI and registers the
    /// consumer invoked on each `notifications/resources/updated` for it.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise resource
    /// subscription support.
    pub async fn subscribe_resource(
        &self,
        uri: impl Into<String>,
        consumer: ResourceUpdateConsumer,
    ) -> McpResult<()> {
        self.require_server_capability(
            |caps| caps.resources.as_ref().is_some_and(|r| r.subscribe),
            "resource subscriptions",
        )?;
        let uri = uri.into();
        let params = SubscribeResourceParams { uri: uri.clone() };
        let _: EmptyResult = self
            .shared
            .session()?
            .send_request(
                methods::RESOURCES_SUBSCRIBE,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        self.shared
            .subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .entry(uri)
            .or_default()
            .push(consumer);
        Ok(())
    }

    /// Unsubscribes from a resource URI, dropping its registered
    /// consumers.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise resource
    /// subscription support.
    pub async fn unsubscribe_resource(&self, uri: impl Into<String>) -> McpResult<()> {
        self.require_server_capability(
            |caps| caps.resources.as_ref().is_some_and(|r| r.subscribe),
            "resource subscriptions",
        )?;
        let uri = uri.into();
        let params = UnsubscribeResourceParams { uri: uri.clone() };
        let _: EmptyResult = self
            .shared
            .session()?
            .send_request(
                methods::RESOURCES_UNSUBSCRIBE,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        self.shared
            .subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .remove(&uri);
        Ok(())
    }

    // --------------------------------------------------------------------
    // Prompts
    // --------------------------------------------------------------------

    /// Lists the server's prompts, forwarding the pagination cursor.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise prompts.
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<ListPromptsResult> {
        self.require_server_capability(|caps| caps.prompts.is_some(), "prompts")?;
        self.paginated_request(methods::PROMPTS_LIST, cursor).await
    }

    /// Expands a prompt by name.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise prompts.
    pub async fn get_prompt(&self, params: GetPromptParams) -> McpResult<GetPromptResult> {
        self.require_server_capability(|caps| caps.prompts.is_some(), "prompts")?;
        self.shared
            .session()?
            .send_request(methods::PROMPTS_GET, Some(serde_json::to_value(params)?))
            .await
    }

    // --------------------------------------------------------------------
    // Logging
    // --------------------------------------------------------------------

    /// Sets the minimum level of log records the server should emit.
    ///
    /// # Errors
    ///
    /// Fails locally when the server did not advertise logging.
    pub async fn set_logging_level(&self, level: LogLevel) -> McpResult<()> {
        self.require_server_capability(|caps| caps.logging.is_some(), "logging")?;
        let params = SetLevelParams { level };
        let _: EmptyResult = self
            .shared
            .session()?
            .send_request(
                methods::LOGGING_SET_LEVEL,
                Some(serde_json::to_value(params)?),
            )
            .await?;
        Ok(())
    }

    // --------------------------------------------------------------------
    // Roots
    // --------------------------------------------------------------------

    /// Adds a root, notifying the server when the roots capability
    /// declares list-changed.
    ///
    /// # Errors
    ///
    /// Fails when the client lacks the roots capability or the URI is
    /// already declared; on failure nothing is sent.
    pub async fn add_root(&self, root: Root) -> McpResult<()> {
        let roots_capability = self
            .shared
            .capabilities
            .roots
            .as_ref()
            .ok_or_else(|| {
                McpError::capability("Client must be configured with roots capabilities")
            })?
            .clone();

        {
            let mut roots = self.shared.roots.lock().expect("roots lock poisoned");
            if roots.contains_key(&root.uri) {
                return Err(McpError::duplicate(format!(
                    "Root with uri '{}' already exists",
                    root.uri
                )));
            }
            roots.insert(root.uri.clone(), root);
        }

        if roots_capability.list_changed {
            self.roots_list_changed_notification().await?;
        }
        Ok(())
    }

    /// Removes a root by URI, notifying the server when declared.
    ///
    /// # Errors
    ///
    /// Fails when the client lacks the roots capability or the URI is
    /// unknown; on failure nothing is sent.
    pub async fn remove_root(&self, uri: &str) -> McpResult<()> {
        let roots_capability = self
            .shared
            .capabilities
            .roots
            .as_ref()
            .ok_or_else(|| {
                McpError::capability("Client must be configured with roots capabilities")
            })?
            .clone();

        let removed = self
            .shared
            .roots
            .lock()
            .expect("roots lock poisoned")
            .remove(uri);
        if removed.is_none() {
            return Err(McpError::unknown_entry(format!(
                "Root with uri '{uri}' not found"
            )));
        }

        if roots_capability.list_changed {
            self.roots_list_changed_notification().await?;
        }
        Ok(())
    }

    /// The current root set.
    #[must_use]
    pub fn roots(&self) -> Vec<Root> {
        self.shared.roots_snapshot()
    }

    /// Manually sends `notifications/roots/list_changed`.
    ///
    /// `add_root` / `remove_root` send it automatically when the
    /// capability declares list-changed.
    ///
    /// # Errors
    ///
    /// Propagates session errors.
    pub async fn roots_list_changed_notification(&self) -> McpResult<()> {
        self.shared
            .session()?
            .send_notification(methods::NOTIFICATION_ROOTS_LIST_CHANGED, None)
            .await
    }

    async fn paginated_request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        cursor: Option<String>,
    ) -> McpResult<T> {
        let params = PaginatedParams::new(cursor);
        self.shared
            .session()?
            .send_request(method, Some(serde_json::to_value(params)?))
            .await
    }
}
