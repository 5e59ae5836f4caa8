//! Client construction.
//!
//! [`ClientBuilder`] is the enumerated configuration of a client: info,
//! capabilities, initial roots, change consumers, logging consumers, and
//! the sampling handler. `connect` registers the inbound handlers the
//! advertised capabilities demand and starts the session.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use mcpkit_core::logging::targets;
use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::{
    methods, ClientCapabilities, ClientInfo, CreateMessageParams, CreateMessageResult, ListRootsResult,
    LoggingMessageParams, PaginatedParams, Prompt, Resource, ResourceUpdatedParams, Root, Tool,
};
use mcpkit_session::{NotificationHandler, RequestHandler, SessionConfig};
use mcpkit_transport::{unmarshal, unmarshal_or_default, BoxFuture, Transport};

use crate::{ClientShared, McpAsyncClient};

/// Consumer invoked with the refreshed tool list after a
/// `notifications/tools/list_changed`.
pub type ToolsChangeConsumer =
    Arc<dyn Fn(Vec<Tool>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Consumer invoked with the refreshed resource list after a
/// `notifications/resources/list_changed`.
pub type ResourcesChangeConsumer =
    Arc<dyn Fn(Vec<Resource>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Consumer invoked with the refreshed prompt list after a
/// `notifications/prompts/list_changed`.
pub type PromptsChangeConsumer =
    Arc<dyn Fn(Vec<Prompt>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Consumer invoked with each inbound log record.
pub type LoggingConsumer =
    Arc<dyn Fn(LoggingMessageParams) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Per-URI subscriber invoked on `notifications/resources/updated`.
pub type ResourceUpdateConsumer =
    Arc<dyn Fn(ResourceUpdatedParams) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Handler answering the server's `sampling/createMessage` requests.
pub type SamplingHandler = Arc<
    dyn Fn(CreateMessageParams) -> BoxFuture<'static, McpResult<CreateMessageResult>>
        + Send
        + Sync,
>;

/// Builder for [`McpAsyncClient`].
pub struct ClientBuilder {
    info: ClientInfo,
    capabilities: ClientCapabilities,
    request_timeout: Duration,
    roots: Vec<Root>,
    tools_change_consumers: Vec<ToolsChangeConsumer>,
    resources_change_consumers: Vec<ResourcesChangeConsumer>,
    prompts_change_consumers: Vec<PromptsChangeConsumer>,
    logging_consumers: Vec<LoggingConsumer>,
    sampling_handler: Option<SamplingHandler>,
}

impl ClientBuilder {
    pub(crate) fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ClientInfo::new(name, version),
            capabilities: ClientCapabilities::default(),
            request_timeout: mcpkit_session::DEFAULT_REQUEST_TIMEOUT,
            roots: Vec::new(),
            tools_change_consumers: Vec::new(),
            resources_change_consumers: Vec::new(),
            prompts_change_consumers: Vec::new(),
            logging_consumers: Vec::new(),
            sampling_handler: None,
        }
    }

    /// Sets the capabilities advertised in `initialize`.
    #[must_use]
    pub fn capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Declares an initial root.
    #[must_use]
    pub fn root(mut self, root: Root) -> Self {
        self.roots.push(root);
        self
    }

    /// Registers a tools change consumer.
    #[must_use]
    pub fn tools_change_consumer(mut self, consumer: ToolsChangeConsumer) -> Self {
        self.tools_change_consumers.push(consumer);
        self
    }

    /// Registers a resources change consumer.
    #[must_use]
    pub fn resources_change_consumer(mut self, consumer: ResourcesChangeConsumer) -> Self {
        self.resources_change_consumers.push(consumer);
        self
    }

    /// Registers a prompts change consumer.
    #[must_use]
    pub fn prompts_change_consumer(mut self, consumer: PromptsChangeConsumer) -> Self {
        self.prompts_change_consumers.push(consumer);
        self
    }

    /// Registers a consumer for inbound log records.
    #[must_use]
    pub fn logging_consumer(mut self, consumer: LoggingConsumer) -> Self {
        self.logging_consumers.push(consumer);
        self
    }

    /// Installs the sampling handler.
    ///
    /// Required whenever the advertised capabilities include sampling.
    #[must_use]
    pub fn sampling_handler(mut self, handler: SamplingHandler) -> Self {
        self.sampling_handler = Some(handler);
        self
    }

    /// Connects the session and returns the ready-to-initialize client.
    ///
    /// # Errors
    ///
    /// Fails when the sampling capability is advertised without a
    /// handler, when duplicate initial roots are declared, or when the
    /// transport cannot connect.
    pub async fn connect(self, transport: Arc<dyn Transport>) -> McpResult<McpAsyncClient> {
        if self.capabilities.sampling.is_some() && self.sampling_handler.is_none() {
            return Err(McpError::invalid_state(
                "Sampling handler required when sampling capability is advertised",
            ));
        }

        let mut roots = std::collections::HashMap::new();
        for root in self.roots {
            if roots.insert(root.uri.clone(), root.clone()).is_some() {
                return Err(McpError::duplicate(format!(
                    "Root with uri '{}' already exists",
                    root.uri
                )));
            }
        }

        let shared = Arc::new(ClientShared::new(
            self.info,
            self.capabilities,
            roots,
            self.tools_change_consumers,
            self.resources_change_consumers,
            self.prompts_change_consumers,
            self.logging_consumers,
        ));

        let mut config = SessionConfig::new().request_timeout(self.request_timeout);

        if shared.capabilities().roots.is_some() {
            config = config.request_handler(methods::ROOTS_LIST, roots_list_handler(&shared));
        }
        if shared.capabilities().sampling.is_some() {
            let handler = self
                .sampling_handler
                .clone()
                .ok_or_else(|| McpError::invalid_state("Sampling handler missing"))?;
            config =
                config.request_handler(methods::SAMPLING_CREATE_MESSAGE, sampling_handler(handler));
        }

        config = config
            .notification_handler(
                methods::NOTIFICATION_TOOLS_LIST_CHANGED,
                tools_changed_handler(&shared),
            )
            .notification_handler(
                methods::NOTIFICATION_RESOURCES_LIST_CHANGED,
                resources_changed_handler(&shared),
            )
            .notification_handler(
                methods::NOTIFICATION_PROMPTS_LIST_CHANGED,
                prompts_changed_handler(&shared),
            )
            .notification_handler(
                methods::NOTIFICATION_RESOURCES_UPDATED,
                resource_updated_handler(&shared),
            )
            .notification_handler(methods::NOTIFICATION_MESSAGE, logging_handler(&shared));

        let session = mcpkit_session::McpSession::connect(transport, config).await?;
        shared.install_session(session)?;

        Ok(McpAsyncClient { shared })
    }
}

fn roots_list_handler(shared: &Arc<ClientShared>) -> RequestHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let _params: PaginatedParams = unmarshal_or_default(params)?;
            let result = ListRootsResult {
                roots: shared.roots_snapshot(),
                next_cursor: None,
            };
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn sampling_handler(handler: SamplingHandler) -> RequestHandler {
    Arc::new(move |params| {
        let handler = Arc::clone(&handler);
        Box::pin(async move {
            let request: CreateMessageParams = unmarshal(params)?;
            let result = handler(request).await?;
            Ok(serde_json::to_value(result)?)
        })
    })
}

fn tools_changed_handler(shared: &Arc<ClientShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |_params: Option<Value>| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let result = shared.refetch_tools().await?;
            info!(target: targets::CLIENT, "Tools changed: {} available", result.len());
            shared.fan_out_tools(result).await;
            Ok(())
        })
    })
}

fn resources_changed_handler(shared: &Arc<ClientShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |_params: Option<Value>| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let result = shared.refetch_resources().await?;
            info!(target: targets::CLIENT, "Resources changed: {} available", result.len());
            shared.fan_out_resources(result).await;
            Ok(())
        })
    })
}

fn prompts_changed_handler(shared: &Arc<ClientShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |_params: Option<Value>| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let result = shared.refetch_prompts().await?;
            info!(target: targets::CLIENT, "Prompts changed: {} available", result.len());
            shared.fan_out_prompts(result).await;
            Ok(())
        })
    })
}

fn resource_updated_handler(shared: &Arc<ClientShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let update: ResourceUpdatedParams = unmarshal(params)?;
            shared.fan_out_resource_update(update).await;
            Ok(())
        })
    })
}

fn logging_handler(shared: &Arc<ClientShared>) -> NotificationHandler {
    let shared = Arc::clone(shared);
    Arc::new(move |params| {
        let shared = Arc::clone(&shared);
        Box::pin(async move {
            let record: LoggingMessageParams = unmarshal(params)?;
            shared.fan_out_log_record(record).await;
            Ok(())
        })
    })
}
