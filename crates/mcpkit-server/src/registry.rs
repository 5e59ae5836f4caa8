//! Dynamic feature registries.
//!
//! Tools are keyed by name, resources by URI, prompts by name; resource
//! templates are an append-only list keyed by their URI template. All
//! mutation goes through insert/remove pairs that leave the registry
//! unchanged on failure; reads take snapshots so no handler is invoked
//! while a registry lock is held.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use mcpkit_core::McpResult;
use mcpkit_protocol::{
    CallToolResult, GetPromptParams, GetPromptResult, Prompt, ReadResourceResult, Resource,
    ResourceTemplate, Tool,
};
use mcpkit_transport::BoxFuture;

/// Handler invoked for `tools/call` on the registered tool.
pub type ToolHandlerFn =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, McpResult<CallToolResult>> + Send + Sync>;

/// Handler invoked for `resources/read` on the registered resource.
pub type ResourceHandlerFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, McpResult<ReadResourceResult>> + Send + Sync>;

/// Handler invoked for `prompts/get` on the registered prompt.
pub type PromptHandlerFn =
    Arc<dyn Fn(GetPromptParams) -> BoxFuture<'static, McpResult<GetPromptResult>> + Send + Sync>;

/// A tool descriptor paired with its call handler.
#[derive(Clone)]
pub struct ToolRegistration {
    /// The descriptor served by `tools/list`.
    pub tool: Tool,
    /// The handler behind `tools/call`.
    pub handler: ToolHandlerFn,
}

impl ToolRegistration {
    /// Pairs a descriptor with an async call handler.
    pub fn new<F, Fut>(tool: Tool, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        Self {
            tool,
            handler: Arc::new(move |arguments| Box::pin(handler(arguments))),
        }
    }
}

/// A resource descriptor paired with its read handler.
#[derive(Clone)]
pub struct ResourceRegistration {
    /// The descriptor served by `resources/list`.
    pub resource: Resource,
    /// The handler behind `resources/read`; receives the request URI.
    pub handler: ResourceHandlerFn,
}

impl ResourceRegistration {
    /// Pairs a descriptor with an async read handler.
    pub fn new<F, Fut>(resource: Resource, handler: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<ReadResourceResult>> + Send + 'static,
    {
        Self {
            resource,
            handler: Arc::new(move |uri| Box::pin(handler(uri))),
        }
    }
}

/// A prompt descriptor paired with its get handler.
#[derive(Clone)]
pub struct PromptRegistration {
    /// The descriptor served by `prompts/list`.
    pub prompt: Prompt,
    /// The handler behind `prompts/get`.
    pub handler: PromptHandlerFn,
}

impl PromptRegistration {
    /// Pairs a descriptor with an async get handler.
    pub fn new<F, Fut>(prompt: Prompt, handler: F) -> Self
    where
        F: Fn(GetPromptParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = McpResult<GetPromptResult>> + Send + 'static,
    {
        Self {
            prompt,
            handler: Arc::new(move |params| Box::pin(handler(params))),
        }
    }
}

/// The server's dynamic registries plus the resource subscription set.
#[derive(Default)]
pub(crate) struct FeatureRegistry {
    tools: Mutex<HashMap<String, ToolRegistration>>,
    resources: Mutex<HashMap<String, ResourceRegistration>>,
    templates: Mutex<Vec<ResourceTemplate>>,
    prompts: Mutex<HashMap<String, PromptRegistration>>,
    subscriptions: Mutex<HashSet<String>>,
}

impl FeatureRegistry {
    pub(crate) fn insert_tool(&self, registration: ToolRegistration) -> bool {
        let mut tools = self.tools.lock().expect("tools lock poisoned");
        if tools.contains_key(&registration.tool.name) {
            return false;
        }
        tools.insert(registration.tool.name.clone(), registration);
        true
    }

    pub(crate) fn remove_tool(&self, name: &str) -> bool {
        self.tools
            .lock()
            .expect("tools lock poisoned")
            .remove(name)
            .is_some()
    }

    pub(crate) fn tool(&self, name: &str) -> Option<ToolRegistration> {
        self.tools
            .lock()
            .expect("tools lock poisoned")
            .get(name)
            .cloned()
    }

    pub(crate) fn tools_snapshot(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self
            .tools
            .lock()
            .expect("tools lock poisoned")
            .values()
            .map(|r| r.tool.clone())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub(crate) fn insert_resource(&self, registration: ResourceRegistration) -> bool {
        let mut resources = self.resources.lock().expect("resources lock poisoned");
        if resources.contains_key(&registration.resource.uri) {
            return false;
        }
        resources.insert(registration.resource.uri.clone(), registration);
        true
    }

    pub(crate) fn remove_resource(&self, uri: &str) -> bool {
        self.resources
            .lock()
            .expect("resources lock poisoned")
            .remove(uri)
            .is_some()
    }

    pub(crate) fn resource(&self, uri: &str) -> Option<ResourceRegistration> {
        self.resources
            .lock()
            .expect("resources lock poisoned")
            .get(uri)
            .cloned()
    }

    pub(crate) fn resource_exists(&self, uri: &str) -> bool {
        self.resources
            .lock()
            .expect("resources lock poisoned")
            .contains_key(uri)
    }

    pub(crate) fn resources_snapshot(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self
            .resources
            .lock()
            .expect("resources lock poisoned")
            .values()
            .map(|r| r.resource.clone())
            .collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    pub(crate) fn insert_template(&self, template: ResourceTemplate) -> bool {
        let mut templates = self.templates.lock().expect("templates lock poisoned");
        if templates
            .iter()
            .any(|t| t.uri_template == template.uri_template)
        {
            return false;
        }
        templates.push(template);
        true
    }

    pub(crate) fn templates_snapshot(&self) -> Vec<ResourceTemplate> {
        self.templates
            .lock()
            .expect("templates lock poisoned")
            .clone()
    }

    pub(crate) fn insert_prompt(&self, registration: PromptRegistration) -> bool {
        let mut prompts = self.prompts.lock().expect("prompts lock poisoned");
        if prompts.contains_key(&registration.prompt.name) {
            return false;
        }
        prompts.insert(registration.prompt.name.clone(), registration);
        true
    }

    pub(crate) fn remove_prompt(&self, name: &str) -> bool {
        self.prompts
            .lock()
            .expect("prompts lock poisoned")
            .remove(name)
            .is_some()
    }

    pub(crate) fn prompt(&self, name: &str) -> Option<PromptRegistration> {
        self.prompts
            .lock()
            .expect("prompts lock poisoned")
            .get(name)
            .cloned()
    }

    pub(crate) fn prompts_snapshot(&self) -> Vec<Prompt> {
        let mut prompts: Vec<Prompt> = self
            .prompts
            .lock()
            .expect("prompts lock poisoned")
            .values()
            .map(|r| r.prompt.clone())
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    pub(crate) fn subscribe(&self, uri: String) {
        self.subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .insert(uri);
    }

    pub(crate) fn unsubscribe(&self, uri: &str) {
        self.subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .remove(uri);
    }

    pub(crate) fn is_subscribed(&self, uri: &str) -> bool {
        self.subscriptions
            .lock()
            .expect("subscriptions lock poisoned")
            .contains(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_tool(name: &str) -> ToolRegistration {
        ToolRegistration::new(
            Tool {
                name: name.to_owned(),
                description: None,
                input_schema: serde_json::json!({"type": "object"}),
            },
            |_arguments| async { Ok(CallToolResult::text("ok")) },
        )
    }

    #[test]
    fn tool_insert_is_rejected_on_duplicate_name() {
        let registry = FeatureRegistry::default();
        assert!(registry.insert_tool(demo_tool("echo")));
        assert!(!registry.insert_tool(demo_tool("echo")));
        assert_eq!(registry.tools_snapshot().len(), 1);
    }

    #[test]
    fn tool_remove_then_list_excludes_entry() {
        let registry = FeatureRegistry::default();
        registry.insert_tool(demo_tool("a"));
        registry.insert_tool(demo_tool("b"));
        assert!(registry.remove_tool("a"));
        assert!(!registry.remove_tool("a"));
        let names: Vec<String> = registry
            .tools_snapshot()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["b"]);
    }

    #[test]
    fn template_duplicates_by_uri_template_are_rejected() {
        let registry = FeatureRegistry::default();
        let template = ResourceTemplate {
            uri_template: "file:///{path}".to_owned(),
            name: "files".to_owned(),
            description: None,
            mime_type: None,
        };
        assert!(registry.insert_template(template.clone()));
        assert!(!registry.insert_template(template));
    }

    #[test]
    fn subscriptions_track_uris() {
        let registry = FeatureRegistry::default();
        registry.subscribe("file:///a".to_owned());
        assert!(registry.is_subscribed("file:///a"));
        registry.unsubscribe("file:///a");
        assert!(!registry.is_subscribed("file:///a"));
    }
}
