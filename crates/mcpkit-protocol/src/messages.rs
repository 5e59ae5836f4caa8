//! MCP protocol messages.
//!
//! Request and response payloads for all MCP methods. All list requests
//! accept an optional opaque pagination cursor and return the items plus
//! an optional `nextCursor`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{
    ClientCapabilities, ClientInfo, Content, LogLevel, ModelPreferences, Prompt, PromptMessage,
    Resource, ResourceContent, ResourceTemplate, Role, Root, SamplingContent, SamplingMessage,
    ServerCapabilities, ServerInfo, StopReason, Tool,
};

/// Empty result object, serialized as `{}`.
///
/// Used by `ping`, `logging/setLevel`, and the subscription requests.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EmptyResult {}

// ============================================================================
// Initialize
// ============================================================================

/// `initialize` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Protocol version the client proposes (its newest supported).
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Client capabilities.
    pub capabilities: ClientCapabilities,
    /// Client info.
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

/// `initialize` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Protocol version the server chose.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
    /// Server info.
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
    /// Optional usage instructions for the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// ============================================================================
// Pagination
// ============================================================================

/// Params shared by every list request: an optional opaque cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginatedParams {
    /// Cursor from a previous list response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PaginatedParams {
    /// Creates params carrying the given cursor.
    #[must_use]
    pub fn new(cursor: Option<String>) -> Self {
        Self { cursor }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// `tools/list` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Available tools.
    pub tools: Vec<Tool>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `tools/call` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name to call.
    pub name: String,
    /// Tool arguments, matching the tool's declared input schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
}

impl CallToolParams {
    /// Creates call params for the named tool.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Option<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// `tools/call` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Tool output content.
    pub content: Vec<Content>,
    /// Whether the tool execution itself failed.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }

    /// Creates a failed text result (tool-level error, not protocol error).
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: true,
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// `resources/list` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Available resources.
    pub resources: Vec<Resource>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/templates/list` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// Advertised resource templates.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/read` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// Resource URI to read.
    pub uri: String,
}

/// `resources/read` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// Resource contents.
    pub contents: Vec<ResourceContent>,
}

/// `resources/subscribe` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResourceParams {
    /// Resource URI to subscribe to.
    pub uri: String,
}

/// `resources/unsubscribe` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResourceParams {
    /// Resource URI to unsubscribe from.
    pub uri: String,
}

/// `notifications/resources/updated` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    /// URI of the resource that changed.
    pub uri: String,
}

// ============================================================================
// Prompts
// ============================================================================

/// `prompts/list` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Available prompts.
    pub prompts: Vec<Prompt>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `prompts/get` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Prompt name.
    pub name: String,
    /// Prompt arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
}

/// `prompts/get` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// Optional prompt description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Expanded prompt messages.
    pub messages: Vec<PromptMessage>,
}

// ============================================================================
// Logging
// ============================================================================

/// `logging/setLevel` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelParams {
    /// Minimum level the server should emit.
    pub level: LogLevel,
}

/// `notifications/message` params: one log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    /// Record severity.
    pub level: LogLevel,
    /// Logger name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Record payload.
    pub data: serde_json::Value,
}

// ============================================================================
// Roots
// ============================================================================

/// `roots/list` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// The client's declared roots.
    pub roots: Vec<Root>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ============================================================================
// Sampling (server-to-client LLM requests)
// ============================================================================

/// `sampling/createMessage` request params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageParams {
    /// Conversation messages.
    pub messages: Vec<SamplingMessage>,
    /// Maximum tokens to generate.
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// Optional system prompt.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Stop sequences ending generation.
    #[serde(
        rename = "stopSequences",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub stop_sequences: Vec<String>,
    /// Model preferences and hints.
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// Which MCP server context to include.
    #[serde(rename = "includeContext", skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
}

impl CreateMessageParams {
    /// Creates a sampling request with default settings.
    #[must_use]
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            system_prompt: None,
            temperature: None,
            stop_sequences: Vec::new(),
            model_preferences: None,
            include_context: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Context inclusion mode for sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    /// Include no MCP context.
    None,
    /// Include context from the requesting server only.
    ThisServer,
    /// Include context from all connected MCP servers.
    AllServers,
}

/// `sampling/createMessage` response result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// Generated content (text or image).
    pub content: SamplingContent,
    /// Role of the generated message (always assistant).
    pub role: Role,
    /// Model that produced the completion.
    pub model: String,
    /// Why generation stopped.
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl CreateMessageResult {
    /// Creates a text completion result.
    #[must_use]
    pub fn text(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: SamplingContent::Text { text: text.into() },
            role: Role::Assistant,
            model: model.into(),
            stop_reason: Some(StopReason::EndTurn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_params_wire_shape() {
        let params = InitializeParams {
            protocol_version: "2024-11-05".to_owned(),
            capabilities: ClientCapabilities {
                roots: Some(crate::types::RootsCapability {
                    list_changed: false,
                }),
                sampling: None,
            },
            client_info: ClientInfo::new("test-client", "1.0.0"),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["protocolVersion"], "2024-11-05");
        assert_eq!(value["clientInfo"]["name"], "test-client");
        assert_eq!(value["capabilities"]["roots"], serde_json::json!({}));
    }

    #[test]
    fn initialize_result_roundtrip() {
        let raw = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {"listChanged": true}},
            "serverInfo": {"name": "test-server", "version": "1.0.0"}
        });
        let result: InitializeResult = serde_json::from_value(raw).unwrap();
        assert!(result.capabilities.tools.unwrap().list_changed);
        assert!(result.instructions.is_none());
    }

    #[test]
    fn paginated_params_omit_absent_cursor() {
        assert_eq!(
            serde_json::to_value(PaginatedParams::default()).unwrap(),
            serde_json::json!({})
        );
        assert_eq!(
            serde_json::to_value(PaginatedParams::new(Some("next".to_owned()))).unwrap(),
            serde_json::json!({"cursor": "next"})
        );
    }

    #[test]
    fn call_tool_result_wire_shape() {
        let value = serde_json::to_value(CallToolResult::text("5.0")).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "content": [{"type": "text", "text": "5.0"}],
                "isError": false
            })
        );
    }

    #[test]
    fn call_tool_result_is_error_defaults_false() {
        let result: CallToolResult =
            serde_json::from_value(serde_json::json!({"content": []})).unwrap();
        assert!(!result.is_error);
    }

    #[test]
    fn logging_message_wire_shape() {
        let params = LoggingMessageParams {
            level: LogLevel::Error,
            logger: Some("database".to_owned()),
            data: serde_json::json!("connection lost"),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["level"], "error");
        assert_eq!(value["logger"], "database");
    }

    #[test]
    fn empty_result_is_empty_object() {
        assert_eq!(
            serde_json::to_value(EmptyResult {}).unwrap(),
            serde_json::json!({})
        );
        let _: EmptyResult = serde_json::from_value(serde_json::json!({})).unwrap();
    }

    #[test]
    fn create_message_params_minimal() {
        let params = CreateMessageParams::new(vec![SamplingMessage::user("Hello")], 100);
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["maxTokens"], 100);
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value.get("systemPrompt").is_none());
        assert!(value.get("stopSequences").is_none());
    }

    #[test]
    fn create_message_result_text() {
        let result = CreateMessageResult::text("Hi there!", "claude-3");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["content"]["type"], "text");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["model"], "claude-3");
        assert_eq!(value["stopReason"], "endTurn");
    }

    #[test]
    fn list_roots_result_roundtrip() {
        let raw = serde_json::json!({
            "roots": [{"uri": "file:///work", "name": "Workspace"}]
        });
        let result: ListRootsResult = serde_json::from_value(raw).unwrap();
        assert_eq!(result.roots.len(), 1);
        assert_eq!(result.roots[0].uri, "file:///work");
        assert!(result.next_cursor.is_none());
    }
}
