//! End-to-end scenarios driving a real client/server pair over the
//! in-process duplex transport.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use mcpkit::client::{McpAsyncClient, ResourceUpdateConsumer, SamplingHandler, ToolsChangeConsumer};
use mcpkit::protocol::{
    CallToolParams, CallToolResult, ClientCapabilities, CreateMessageParams, CreateMessageResult,
    GetPromptParams, GetPromptResult, LogLevel, LoggingMessageParams, Prompt, PromptArgument,
    PromptMessage, Resource, ResourceContent, ResourcesCapability, Role, Root, RootsCapability,
    SamplingCapability, SamplingMessage, ServerCapabilities, Tool, ToolsCapability,
};
use mcpkit::server::{
    McpAsyncServer, PromptRegistration, ResourceRegistration, RootsChangeConsumer,
    ToolRegistration,
};
use mcpkit::transport::memory::duplex;
use mcpkit::McpErrorCode;

fn calculator_tool() -> ToolRegistration {
    ToolRegistration::new(
        Tool {
            name: "calculator".to_owned(),
            description: Some("Basic arithmetic".to_owned()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "operation": {"type": "string"},
                    "a": {"type": "number"},
                    "b": {"type": "number"}
                }
            }),
        },
        |arguments| async move {
            let arguments = arguments.unwrap_or_default();
            let a = arguments["a"].as_f64().unwrap_or_default();
            let b = arguments["b"].as_f64().unwrap_or_default();
            match arguments["operation"].as_str() {
                Some("add") => Ok(CallToolResult::text(format!("{:.1}", a + b))),
                other => Ok(CallToolResult::error(format!(
                    "unsupported operation: {other:?}"
                ))),
            }
        },
    )
}

fn readme_resource() -> ResourceRegistration {
    ResourceRegistration::new(
        Resource {
            uri: "file:///readme".to_owned(),
            name: "readme".to_owned(),
            description: None,
            mime_type: Some("text/plain".to_owned()),
        },
        |uri| async move { Ok(mcpkit::protocol::ReadResourceResult {
            contents: vec![ResourceContent::text(uri, "hello world")],
        }) },
    )
}

fn greeting_prompt() -> PromptRegistration {
    PromptRegistration::new(
        Prompt {
            name: "greeting".to_owned(),
            description: Some("Greets someone by name".to_owned()),
            arguments: vec![PromptArgument {
                name: "name".to_owned(),
                description: None,
                required: true,
            }],
        },
        |params: GetPromptParams| async move {
            let name = params
                .arguments
                .as_ref()
                .and_then(|a| a.get("name").cloned())
                .unwrap_or_else(|| "stranger".to_owned());
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: mcpkit::protocol::Content::text(format!("Say hello to {name}")),
                }],
            })
        },
    )
}

fn full_server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        tools: Some(ToolsCapability { list_changed: true }),
        resources: Some(ResourcesCapability {
            subscribe: true,
            list_changed: true,
        }),
        prompts: Some(mcpkit::protocol::PromptsCapability { list_changed: true }),
        logging: Some(Default::default()),
    }
}

struct Pair {
    client: McpAsyncClient,
    server: McpAsyncServer,
}

async fn connect_pair(
    server_builder: mcpkit::server::ServerBuilder,
    client_builder: mcpkit::client::ClientBuilder,
) -> Pair {
    let (client_side, server_side) = duplex(64);
    let server = server_builder.connect(Arc::new(server_side)).await.unwrap();
    let client = client_builder.connect(Arc::new(client_side)).await.unwrap();
    Pair { client, server }
}

async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event stream ended")
}

#[tokio::test]
async fn initialization_negotiates_capabilities_and_version() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0").capabilities(ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: true }),
            ..Default::default()
        }),
        McpAsyncClient::builder("test-client", "1.0.0").capabilities(ClientCapabilities {
            roots: Some(RootsCapability {
                list_changed: false,
            }),
            ..Default::default()
        }),
    )
    .await;

    let result = pair.client.initialize().await.unwrap();
    assert_eq!(result.protocol_version, "2024-11-05");
    assert_eq!(result.server_info.name, "test-server");

    let server_caps = pair.client.server_capabilities().unwrap();
    assert!(server_caps.tools.unwrap().list_changed);
    assert_eq!(
        pair.client.negotiated_protocol_version().as_deref(),
        Some("2024-11-05")
    );

    // The server learned the client's identity and capabilities.
    let client_info = pair.server.client_info().unwrap();
    assert_eq!(client_info.name, "test-client");
    assert!(pair.server.client_capabilities().unwrap().roots.is_some());
}

#[tokio::test]
async fn call_tool_returns_tool_output() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0")
            .capabilities(full_server_capabilities())
            .tool(calculator_tool()),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;
    pair.client.initialize().await.unwrap();

    let tools = pair.client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "calculator");

    let result = pair
        .client
        .call_tool(CallToolParams::new(
            "calculator",
            Some(json!({"operation": "add", "a": 2, "b": 3})),
        ))
        .await
        .unwrap();
    assert!(!result.is_error);
    match &result.content[0] {
        mcpkit::protocol::Content::Text { text } => assert_eq!(text, "5.0"),
        other => panic!("expected text content, got {other:?}"),
    }

    let err = pair
        .client
        .call_tool(CallToolParams::new("missing", None))
        .await
        .unwrap_err();
    assert_eq!(err.code, McpErrorCode::InvalidParams);
    assert_eq!(err.message, "Tool not found: missing");
}

#[tokio::test]
async fn operations_are_gated_on_server_capabilities() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0").capabilities(ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            ..Default::default()
        }),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;
    pair.client.initialize().await.unwrap();

    let err = pair.client.list_prompts(None).await.unwrap_err();
    assert_eq!(err.code, McpErrorCode::CapabilityMissing);
    let err = pair.client.list_resources(None).await.unwrap_err();
    assert_eq!(err.code, McpErrorCode::CapabilityMissing);
    let err = pair
        .client
        .set_logging_level(LogLevel::Warning)
        .await
        .unwrap_err();
    assert_eq!(err.code, McpErrorCode::CapabilityMissing);

    // Tools are advertised, so the gate opens.
    pair.client.list_tools(None).await.unwrap();
}

#[tokio::test]
async fn tools_list_changed_fans_out_to_consumers_once() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let consumer: ToolsChangeConsumer = Arc::new(move |tools: Vec<Tool>| {
        let seen_tx = seen_tx.clone();
        Box::pin(async move {
            let _ = seen_tx.send(tools);
            Ok(())
        })
    });

    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0").capabilities(full_server_capabilities()),
        McpAsyncClient::builder("test-client", "1.0.0").tools_change_consumer(consumer),
    )
    .await;
    pair.client.initialize().await.unwrap();

    pair.server.add_tool(calculator_tool()).await.unwrap();

    let tools = recv_within(&mut seen_rx).await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "calculator");

    // Exactly one fan-out per notification.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen_rx.try_recv().is_err());
}

#[tokio::test]
async fn read_resource_and_get_prompt_round_trip() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0")
            .capabilities(full_server_capabilities())
            .resource(readme_resource())
            .prompt(greeting_prompt()),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;
    pair.client.initialize().await.unwrap();

    let resources = pair.client.list_resources(None).await.unwrap();
    assert_eq!(resources.resources.len(), 1);

    let contents = pair.client.read_resource("file:///readme").await.unwrap();
    assert_eq!(contents.contents[0].text.as_deref(), Some("hello world"));

    let err = pair.client.read_resource("file:///missing").await.unwrap_err();
    assert_eq!(err.code, McpErrorCode::ResourceNotFound);

    let prompts = pair.client.list_prompts(None).await.unwrap();
    assert_eq!(prompts.prompts[0].name, "greeting");

    let prompt = pair
        .client
        .get_prompt(GetPromptParams {
            name: "greeting".to_owned(),
            arguments: Some([("name".to_owned(), "Ada".to_owned())].into_iter().collect()),
        })
        .await
        .unwrap();
    match &prompt.messages[0].content {
        mcpkit::protocol::Content::Text { text } => assert_eq!(text, "Say hello to Ada"),
        other => panic!("expected text content, got {other:?}"),
    }
}

#[tokio::test]
async fn resource_subscription_delivers_updates_per_uri() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let consumer: ResourceUpdateConsumer = Arc::new(move |update| {
        let seen_tx = seen_tx.clone();
        Box::pin(async move {
            let _ = seen_tx.send(update);
            Ok(())
        })
    });

    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0")
            .capabilities(full_server_capabilities())
            .resource(readme_resource()),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;
    pair.client.initialize().await.unwrap();

    pair.client
        .subscribe_resource("file:///readme", consumer)
        .await
        .unwrap();

    pair.server
        .resource_updated_notification("file:///readme")
        .await
        .unwrap();
    let update = recv_within(&mut seen_rx).await;
    assert_eq!(update.uri, "file:///readme");

    // After unsubscribing the server-side send becomes a no-op.
    pair.client
        .unsubscribe_resource("file:///readme")
        .await
        .unwrap();
    pair.server
        .resource_updated_notification("file:///readme")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen_rx.try_recv().is_err());
}

#[tokio::test]
async fn logging_records_are_filtered_by_minimum_level() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let consumer: mcpkit::client::LoggingConsumer = Arc::new(move |record| {
        let seen_tx = seen_tx.clone();
        Box::pin(async move {
            let _ = seen_tx.send(record);
            Ok(())
        })
    });

    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0").capabilities(full_server_capabilities()),
        McpAsyncClient::builder("test-client", "1.0.0").logging_consumer(consumer),
    )
    .await;
    pair.client.initialize().await.unwrap();

    pair.client
        .set_logging_level(LogLevel::Warning)
        .await
        .unwrap();

    pair.server
        .logging_notification(LoggingMessageParams {
            level: LogLevel::Info,
            logger: Some("worker".to_owned()),
            data: json!("suppressed"),
        })
        .await
        .unwrap();
    pair.server
        .logging_notification(LoggingMessageParams {
            level: LogLevel::Error,
            logger: Some("worker".to_owned()),
            data: json!("delivered"),
        })
        .await
        .unwrap();

    let record = recv_within(&mut seen_rx).await;
    assert_eq!(record.level, LogLevel::Error);
    assert_eq!(record.data, json!("delivered"));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(seen_rx.try_recv().is_err());
}

#[tokio::test]
async fn sampling_request_is_answered_by_client_handler() {
    let handler: SamplingHandler = Arc::new(|request: CreateMessageParams| {
        Box::pin(async move {
            let prompt = match &request.messages[0].content {
                mcpkit::protocol::SamplingContent::Text { text } => text.clone(),
                _ => String::new(),
            };
            Ok(CreateMessageResult::text(
                format!("echo: {prompt}"),
                "test-llm",
            ))
        })
    });

    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0"),
        McpAsyncClient::builder("test-client", "1.0.0")
            .capabilities(ClientCapabilities {
                sampling: Some(SamplingCapability::default()),
                ..Default::default()
            })
            .sampling_handler(handler),
    )
    .await;
    pair.client.initialize().await.unwrap();

    let result = pair
        .server
        .create_message(CreateMessageParams::new(
            vec![SamplingMessage::user("What is the weather?")],
            64,
        ))
        .await
        .unwrap();
    assert_eq!(result.model, "test-llm");
    match result.content {
        mcpkit::protocol::SamplingContent::Text { text } => {
            assert_eq!(text, "echo: What is the weather?");
        }
        other => panic!("expected text content, got {other:?}"),
    }
}

#[tokio::test]
async fn roots_are_served_and_changes_fan_out_to_server_consumers() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let consumer: RootsChangeConsumer = Arc::new(move |roots: Vec<Root>| {
        let seen_tx = seen_tx.clone();
        Box::pin(async move {
            let _ = seen_tx.send(roots);
            Ok(())
        })
    });

    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0").roots_change_consumer(consumer),
        McpAsyncClient::builder("test-client", "1.0.0")
            .capabilities(ClientCapabilities {
                roots: Some(RootsCapability { list_changed: true }),
                ..Default::default()
            })
            .root(Root::new("file:///work").with_name("Workspace")),
    )
    .await;
    pair.client.initialize().await.unwrap();

    let roots = pair.server.list_roots(None).await.unwrap();
    assert_eq!(roots.roots.len(), 1);
    assert_eq!(roots.roots[0].uri, "file:///work");

    pair.client.add_root(Root::new("file:///extra")).await.unwrap();
    let updated = recv_within(&mut seen_rx).await;
    let mut uris: Vec<String> = updated.into_iter().map(|r| r.uri).collect();
    uris.sort();
    assert_eq!(uris, ["file:///extra", "file:///work"]);
}

#[tokio::test]
async fn ping_works_before_and_after_initialization() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0"),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;

    pair.client.ping().await.unwrap();
    pair.client.initialize().await.unwrap();
    pair.client.ping().await.unwrap();
}

#[tokio::test]
async fn graceful_close_refuses_further_operations() {
    let pair = connect_pair(
        McpAsyncServer::builder("test-server", "1.0.0"),
        McpAsyncClient::builder("test-client", "1.0.0"),
    )
    .await;
    pair.client.initialize().await.unwrap();

    pair.client.close_gracefully().await.unwrap();
    let err = pair.client.ping().await.unwrap_err();
    assert_eq!(err.code, McpErrorCode::SessionClosed);
}
