//! Blocking façades driving the async roles from synchronous code.

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::json;

use mcpkit::client::McpAsyncClient;
use mcpkit::protocol::{
    CallToolParams, CallToolResult, ServerCapabilities, Tool, ToolsCapability,
};
use mcpkit::server::{McpAsyncServer, ToolRegistration};
use mcpkit::transport::memory::duplex;

#[test]
fn sync_client_and_server_complete_a_tool_call() {
    let (client_side, server_side) = duplex(32);

    let server = McpAsyncServer::builder("sync-server", "1.0.0")
        .capabilities(ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: true }),
            ..Default::default()
        })
        .tool(ToolRegistration::new(
            Tool {
                name: "upper".to_owned(),
                description: None,
                input_schema: json!({"type": "object"}),
            },
            |arguments| async move {
                let text = arguments
                    .and_then(|a| a["text"].as_str().map(str::to_uppercase))
                    .unwrap_or_default();
                Ok(CallToolResult::text(text))
            },
        ))
        .connect_sync(Arc::new(server_side))
        .unwrap();

    let client = McpAsyncClient::builder("sync-client", "1.0.0")
        .connect_sync(Arc::new(client_side))
        .unwrap();

    client.initialize().unwrap();
    client.ping().unwrap();

    let tools = client.list_tools(None).unwrap();
    assert_eq!(tools.tools[0].name, "upper");

    let result = client
        .call_tool(CallToolParams::new("upper", Some(json!({"text": "loud"}))))
        .unwrap();
    match &result.content[0] {
        mcpkit::protocol::Content::Text { text } => assert_eq!(text, "LOUD"),
        other => panic!("expected text content, got {other:?}"),
    }

    // Mutations through the sync server block until the notification is
    // accepted by the transport.
    server
        .add_tool(ToolRegistration::new(
            Tool {
                name: "noop".to_owned(),
                description: None,
                input_schema: json!({"type": "object"}),
            },
            |_| async { Ok(CallToolResult::text("")) },
        ))
        .unwrap();
    assert_eq!(server.tools().len(), 2);

    client.close_gracefully().unwrap();
}

#[test]
fn blocking_consumers_receive_change_fan_out() {
    let (client_side, server_side) = duplex(32);

    let server = McpAsyncServer::builder("sync-server", "1.0.0")
        .capabilities(ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: true }),
            ..Default::default()
        })
        .connect_sync(Arc::new(server_side))
        .unwrap();

    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let client = McpAsyncClient::builder("sync-client", "1.0.0")
        .tools_change_consumer_blocking(Arc::new(move |tools: Vec<Tool>| {
            sink.lock().unwrap().push(tools.len());
        }))
        .connect_sync(Arc::new(client_side))
        .unwrap();

    client.initialize().unwrap();

    // Adding a tool emits list_changed; the client refetches and fans
    // out to the blocking consumer on the blocking pool.
    server
        .add_tool(ToolRegistration::new(
            Tool {
                name: "noop".to_owned(),
                description: None,
                input_schema: json!({"type": "object"}),
            },
            |_| async { Ok(CallToolResult::text("")) },
        ))
        .unwrap();

    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        if seen.lock().unwrap().as_slice() == [1] {
            break;
        }
        assert!(
            std::time::Instant::now() < deadline,
            "blocking consumer never ran"
        );
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
}
