//! Server construction.
//!
//! [`ServerBuilder`] is the enumerated configuration of a server: info,
//! capabilities, instructions, request timeout, initial registrations,
//! and roots-change consumers. `connect` registers exactly the request
//! handlers the advertised capabilities call for, then starts the
//! session.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use mcpkit_core::logging::targets;
use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::{
    methods, EmptyResult, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, PaginatedParams,
    ReadResourceParams, ResourceTemplate, ServerCapabilities, ServerInfo, SetLevelParams,
    SubscribeResourceParams, UnsubscribeResourceParams, LATEST_PROTOCOL_VERSION,
};
use mcpkit_session::{NotificationHandler, RequestHandler, SessionConfig};
use mcpkit_transport::{unmarshal, unmarshal_or_default, Transport};

use crate::registry::{PromptRegistration, ResourceRegistration, ToolRegistration};
use crate::{ClientState, McpAsyncServer, RootsChangeConsumer, ServerShared};

/// Builder for [`McpAsyncServer`].
pub struct ServerBuilder {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    request_timeout: Duration,
    tools: Vec<ToolRegistration>,
    resources: Vec<ResourceRegistration>,
    templates: Vec<ResourceTemplate>,
    prompts: Vec<PromptRegistration>,
    roots_change_consumers: Vec<RootsChangeConsumer>,
}

impl ServerBuilder {
    pub(crate) fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo::new(name, version),
            capabilities: ServerCapabilities::default(),
            instructions: None,
            request_timeout: mcpkit_session::DEFAULT_REQUEST_TIMEOUT,
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            prompts: Vec::new(),
            roots_change_consumers: Vec::new(),
        }
    }

    /// Sets the capabilities advertised in the `initialize` response.
    #[must_use]
    pub fn capabilities(mut self, capabilities: ServerCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the optional usage instructions returned to clients.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Sets the per-request timeout for server-initiated requests.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Registers an initial tool.
    #[must_use]
    pub fn tool(mut self, registration: ToolRegistration) -> Self {
        self.tools.push(registration);
        self
    }

    /// Registers an initial resource.
    #[must_use]
    pub fn resource(mut self, registration: ResourceRegistration) -> Self {
        self.resources.push(registration);
        self
    }

    /// Registers an initial resource template.
    #[must_use]
    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        self.templates.push(template);
        self
    }

    /// Registers an initial prompt.
    #[must_use]
    pub fn prompt(mut self, registration: PromptRegistration) -> Self {
        self.prompts.push(registration);
        self
    }

    /// Registers a consumer for the client's roots-change notifications.
    ///
    /// When any consumer is registered, the server answers
    /// `notifications/roots/list_changed` by fetching `roots/list` and
    /// fanning the fresh list out.
    #[must_use]
    pub fn roots_change_consumer(mut self, consumer: RootsChangeConsumer) -> Self {
        self.roots_change_consumers.push(consumer);
        self
    }

    /// Connects the session and returns the serving server.
    ///
    /// # Errors
    ///
    /// Fails when a registration lacks its capability area, when initial
    /// registrations collide, or when the transport cannot connect.
    pub async fn connect(self, transport: Arc<dyn Transport>) -> McpResult<McpAsyncServer> {
        if !self.tools.is_empty() && self.capabilities.tools.is_none() {
            return Err(McpError::invalid_state(
                "Tools registered without the tools capability",
            ));
        }
        if (!self.resources.is_empty() || !self.templates.is_empty())
            && self.capabilities.resources.is_none()
        {
            return Err(McpError::invalid_state(
                "Resources registered without the resources capability",
            ));
        }
        if !self.prompts.is_empty() && self.capabilities.prompts.is_none() {
            return Err(McpError::invalid_state(
                "Prompts registered without the prompts capability",
            ));
        }

        let shared = Arc::new(ServerShared::new(
            self.info,
            self.capabilities,
            self.instructions,
            self.roots_change_consumers,
        ));

        for registration in self.tools {
            let name = registration.tool.name.clone();
            if !shared.registry.insert_tool(registration) {
                return Err(McpError::duplicate(format!(
                    "Tool with name '{name}' already exists"
                )));
            }
        }
        for registration in self.resources {
            let uri = registration.resource.uri.clone();
            if !shared.registry.insert_resource(registration) {
                return Err(McpError::duplicate(format!(
                    "Resource with uri '{uri}' already exists"
                )));
            }
        }
        for template in self.templates {
            let uri_template = template.uri_template.clone();
            if !shared.registry.insert_template(template) {
                return Err(McpError::duplicate(format!(
                    "Resource template '{uri_template}' already exists"
                )));
            }
        }
        for registration in self.prompts {
            let name = registration.prompt.name.clone();
            if !shared.registry.insert_prompt(registration) {
                return Err(McpError::duplicate(format!(
                    "Prompt with name '{name}' already exists"
                )));
            }
        }

        let mut config = SessionConfig::new()
            .request_timeout(self.request_timeout)
            .request_handler(methods::INITIALIZE, initialize_handler(&shared))
            .request_handler(methods::PING, ping_handler())
            .notification_handler(methods::NOTIFICATION_INITIALIZED, initialized_handler());

        if shared.capabilities.tools.is_some() {
            config = config
                .request_handler(methods::TOOLS_LIST, tools_list_handler(&shared))
                .request_handler(methods::TOOLS_CALL, tools_call_handler(&shared));
        }
        if let Some(resources) = &shared.capabilities.resources {
            config = config
                .request_handler(methods::RESOURCES_LIST, resources_list_handler(&shared))
                .request_handler(methods::RESOURCES_READ, resources_read_handler(&shared))
                .request_handler(
                    methods::RESOURCES_TEMPLATES_LIST,
                    templates_list_handler(&shared),
                );
            if resources.subscribe {
                config = config
                    .request_handler(methods::RESOURCES_SUBSCRIBE, subscribe_handler(&shared))
                    .request_handler(
                        methods::RESOURCES_UNSUBSCRIBE,
                        unsubscribe_handler(&shared),
                    );
            }
        }
        if shared.capabilities.prompts.is_some() {
            config = config
                .request_handler(methods::PROMPTS_LIST, prompts_list_handler(&shared))
                .request_handler(methods::PROMPTS_GET, prompts_get_handler(&shared));
        }
        if shared.capabilities.logging.is_some() {
            config = config.request_handler(methods::LOGGING_SET_LEVEL, set_level_handler(&shared));
        }
        if !shared.roots_change_consumers.is_empty() {
            config = config.notification_handler(
                methods::NOTIFICATION_ROOTS_LIST_CHANGED,
                roots_changed_handler(&shared),
            );
        }

        let session = mcpkit_session::McpSession::connect(transport, config).await?;
        shared.install_session(session)?;

        Ok(McpAsyncServer { shared })
    }
}

fn initialize_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let request: InitializeParams = unmarshal(params)?;

            let mut state = shared
                .client_state
                .write()
                .expect("client state lock poisoned");
            if state.is_some() {
                return Err(McpError::invalid_state("Session already initialized"));
            }
            if request.protocol_version != LATEST_PROTOCOL_VERSION {
                return Err(McpError::unsupported_protocol_version(
                    &request.protocol_version,
                ));
            }

            info!(
                target: targets::SERVER,
                "Client connected: {} {}", request.client_info.name, request.client_info.version
            );
            *state = Some(ClientState {
                info: request.client_info,
                capabilities: request.capabilities,
                protocol_version: request.protocol_version,
            });
            drop(state);

            let result = InitializeResult {
                protocol_version: LATEST_PROTOCOL_VERSION.to_owned(),
                capabilities: shared.capabilities.clone(),
                server_info: shared.info.clone(),
                instructions: shared.instructions.clone(),
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn initialized_handler() -> NotificationHandler {
    Arc::new(|_params| {
        Box::pin(async {
            info!(target: targets::SERVER, "Session initialized");
            Ok(())
        })
    })
}

fn ping_handler() -> RequestHandler {
    Arc::new(|_params| Box::pin(async { Ok(serde_json::to_value(EmptyResult {})?) }))
}

fn tools_list_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let _params: PaginatedParams = unmarshal_or_default(params)?;
            let result = ListToolsResult {
                tools: shared.registry.tools_snapshot(),
                next_cursor: None,
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn tools_call_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: mcpkit_protocol::CallToolParams = unmarshal(params)?;
            let registration = shared
                .registry
                .tool(&request.name)
                .ok_or_else(|| {
                    McpError::invalid_params(format!("Tool not found: {}", request.name))
                })?;
            let result = (registration.handler)(request.arguments).await?;
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn resources_list_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let _params: PaginatedParams = unmarshal_or_default(params)?;
            let result = ListResourcesResult {
                resources: shared.registry.resources_snapshot(),
                next_cursor: None,
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn resources_read_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: ReadResourceParams = unmarshal(params)?;
            let registration = shared
                .registry
                .resource(&request.uri)
                .ok_or_else(|| McpError::resource_not_found(&request.uri))?;
            let result = (registration.handler)(request.uri).await?;
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn templates_list_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let _params: PaginatedParams = unmarshal_or_default(params)?;
            let result = ListResourceTemplatesResult {
                resource_templates: shared.registry.templates_snapshot(),
                next_cursor: None,
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn subscribe_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: SubscribeResourceParams = unmarshal(params)?;
            if !shared.registry.resource_exists(&request.uri) {
                return Err(McpError::resource_not_found(&request.uri));
            }
            shared.registry.subscribe(request.uri);
            Ok(serde_json::to_value(EmptyResult {})?)
        })
    })
}

fn unsubscribe_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: UnsubscribeResourceParams = unmarshal(params)?;
            if !shared.registry.resource_exists(&request.uri) {
                return Err(McpError::resource_not_found(&request.uri));
            }
            shared.registry.unsubscribe(&request.uri);
            Ok(serde_json::to_value(EmptyResult {})?)
        })
    })
}

fn prompts_list_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let _params: PaginatedParams = unmarshal_or_default(params)?;
            let result = ListPromptsResult {
                prompts: shared.registry.prompts_snapshot(),
                next_cursor: None,
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn prompts_get_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: mcpkit_protocol::GetPromptParams = unmarshal(params)?;
            let registration = shared
                .registry
                .prompt(&request.name)
                .ok_or_else(|| {
                    McpError::invalid_params(format!("Prompt not found: {}", request.name))
                })?;
            let result = (registration.handler)(request).await?;
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn set_level_handler(shared: &Arc<ServerShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            shared.ensure_initialized()?;
            let request: SetLevelParams = unmarshal(params)?;
            shared.set_min_log_level(request.level);
            info!(target: targets::SERVER, "Minimum logging level set to {:?}", request.level);
            Ok(serde_json::to_value(EmptyResult {})?)
        })
    })
}

fn roots_changed_handler(shared: &Arc<ServerShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |_params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let roots = shared.fetch_roots(None).await?.roots;
            shared.fan_out_roots(roots).await;
            Ok(())
        })
    })
}
