//! MCP method names.
//!
//! The closed set of method-name constants used by both peers. Grouped by
//! feature area; `notifications/*` methods never receive a response.

/// Lifecycle: initialization request.
pub const INITIALIZE: &str = "initialize";
/// Lifecycle: sent by the client after a successful initialize.
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
/// Lifecycle: health check, answered with an empty result.
pub const PING: &str = "ping";

/// Tools: list available tools.
pub const TOOLS_LIST: &str = "tools/list";
/// Tools: invoke a tool by name.
pub const TOOLS_CALL: &str = "tools/call";
/// Tools: the server's tool list changed.
pub const NOTIFICATION_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// Resources: list available resources.
pub const RESOURCES_LIST: &str = "resources/list";
/// Resources: read a resource by URI.
pub const RESOURCES_READ: &str = "resources/read";
/// Resources: list resource templates.
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
/// Resources: subscribe to updates for a URI.
pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
/// Resources: unsubscribe from updates for a URI.
pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
/// Resources: the server's resource list changed.
pub const NOTIFICATION_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
/// Resources: a subscribed resource changed.
pub const NOTIFICATION_RESOURCES_UPDATED: &str = "notifications/resources/updated";

/// Prompts: list available prompts.
pub const PROMPTS_LIST: &str = "prompts/list";
/// Prompts: expand a prompt by name.
pub const PROMPTS_GET: &str = "prompts/get";
/// Prompts: the server's prompt list changed.
pub const NOTIFICATION_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";

/// Logging: set the minimum level the server will emit.
pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
/// Logging: a log record from the server.
pub const NOTIFICATION_MESSAGE: &str = "notifications/message";

/// Roots: list the client's declared roots.
pub const ROOTS_LIST: &str = "roots/list";
/// Roots: the client's root list changed.
pub const NOTIFICATION_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";

/// Sampling: server-to-client LLM completion request.
pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
