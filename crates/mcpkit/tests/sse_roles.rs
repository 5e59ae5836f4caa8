//! Client/server roles running over the HTTP+SSE transport against a
//! live listener.

use std::sync::Arc;

use serde_json::json;
use url::Url;

use mcpkit::client::McpAsyncClient;
use mcpkit::protocol::{
    CallToolParams, CallToolResult, ServerCapabilities, Tool, ToolsCapability,
};
use mcpkit::server::{McpAsyncServer, ToolRegistration};
use mcpkit::transport::sse::{SseClientTransport, SseServerTransport};

#[tokio::test]
async fn initialize_and_call_tool_over_sse() {
    let server_transport = Arc::new(SseServerTransport::new());
    let router = server_transport.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let server = McpAsyncServer::builder("sse-server", "1.0.0")
        .capabilities(ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            ..Default::default()
        })
        .tool(ToolRegistration::new(
            Tool {
                name: "echo".to_owned(),
                description: None,
                input_schema: json!({"type": "object"}),
            },
            |arguments| async move {
                let text = arguments
                    .and_then(|a| a["text"].as_str().map(str::to_owned))
                    .unwrap_or_default();
                Ok(CallToolResult::text(text))
            },
        ))
        .connect(server_transport)
        .await
        .unwrap();

    let base = Url::parse(&format!("http://{addr}/")).unwrap();
    let client = McpAsyncClient::builder("sse-client", "1.0.0")
        .connect(Arc::new(SseClientTransport::new(base)))
        .await
        .unwrap();

    let result = client.initialize().await.unwrap();
    assert_eq!(result.server_info.name, "sse-server");

    let tools = client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools.len(), 1);

    let result = client
        .call_tool(CallToolParams::new(
            "echo",
            Some(json!({"text": "over sse"})),
        ))
        .await
        .unwrap();
    match &result.content[0] {
        mcpkit::protocol::Content::Text { text } => assert_eq!(text, "over sse"),
        other => panic!("expected text content, got {other:?}"),
    }

    client.close_gracefully().await.unwrap();
    server.close_gracefully().await.unwrap();
}
