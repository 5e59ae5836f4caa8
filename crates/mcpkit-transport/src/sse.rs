//! HTTP+SSE transport.
//!
//! Server-to-peer push rides a long-lived `text/event-stream` response;
//! peer-to-server push is an HTTP POST of a serialized envelope. Two SSE
//! event types are used:
//!
//! - `endpoint`: sent exactly once at the start of a client's stream;
//!   its data is the relative URL the client must POST messages to for
//!   this session
//! - `message`: its data is one serialized JSON-RPC envelope
//!
//! [`SseClientTransport`] consumes the stream with `reqwest`;
//! [`SseServerTransport`] produces it from an `axum` router the host
//! application serves.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use url::Url;

use mcpkit_core::logging::targets;
use mcpkit_protocol::JsonRpcMessage;

use crate::{MessageHandler, Transport, TransportError};

/// SSE event type carrying the message-endpoint URL.
const ENDPOINT_EVENT: &str = "endpoint";
/// SSE event type carrying a serialized envelope.
const MESSAGE_EVENT: &str = "message";

/// Default SSE stream path.
const DEFAULT_SSE_PATH: &str = "/sse";
/// Default message POST path.
const DEFAULT_MESSAGE_PATH: &str = "/message";

/// Default bound on waiting for the `endpoint` event.
const DEFAULT_ENDPOINT_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-client outbound event queue capacity on the server side.
const CLIENT_QUEUE_CAPACITY: usize = 256;

/// One parsed SSE event.
#[derive(Debug, PartialEq, Eq)]
struct SseEvent {
    event: String,
    data: String,
}

/// Parses one SSE event block (the text between two blank lines).
///
/// Multiple `data:` lines are joined with `\n`; comment lines and fields
/// we do not use (`id:`, `retry:`) are skipped. Returns `None` for
/// blocks carrying no data (e.g. keep-alive comments).
fn parse_event_block(block: &str) -> Option<SseEvent> {
    let mut event = MESSAGE_EVENT.to_owned();
    let mut data_lines: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim_start_matches(' ').to_owned();
        } else if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    if data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}

// ============================================================================
// Client side
// ============================================================================

/// Client half of the HTTP+SSE transport.
///
/// `connect` opens the SSE stream and resolves once the `endpoint` event
/// has been received; outbound sends block (bounded) on that discovery
/// and then POST to the advertised URL.
pub struct SseClientTransport {
    base_url: Url,
    sse_path: String,
    http: reqwest::Client,
    endpoint: Arc<watch::Sender<Option<String>>>,
    endpoint_timeout: Duration,
    closing: Arc<AtomicBool>,
    stream_task: Mutex<Option<JoinHandle<()>>>,
    connected: AtomicBool,
}

impl SseClientTransport {
    /// Creates a transport targeting the given server base URL.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url,
            sse_path: DEFAULT_SSE_PATH.to_owned(),
            http,
            endpoint: Arc::new(watch::Sender::new(None)),
            endpoint_timeout: DEFAULT_ENDPOINT_TIMEOUT,
            closing: Arc::new(AtomicBool::new(false)),
            stream_task: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Overrides the SSE stream path (default `/sse`).
    #[must_use]
    pub fn with_sse_path(mut self, path: impl Into<String>) -> Self {
        self.sse_path = path.into();
        self
    }

    /// Overrides the bounded wait for endpoint discovery.
    #[must_use]
    pub fn with_endpoint_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint_timeout = timeout;
        self
    }

    /// Waits (bounded) until the message endpoint has been discovered.
    async fn await_endpoint(&self) -> Result<String, TransportError> {
        let mut rx = self.endpoint.subscribe();
        let result = match tokio::time::timeout(self.endpoint_timeout, rx.wait_for(Option::is_some)).await {
            Ok(Ok(endpoint)) => Ok(endpoint
                .as_ref()
                .cloned()
                .unwrap_or_default()),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::EndpointNotDiscovered(self.endpoint_timeout)),
        };
        result
    }
}

#[async_trait::async_trait]
impl Transport for SseClientTransport {
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(TransportError::AlreadyConnected);
        }

        let stream_url = self
            .base_url
            .join(&self.sse_path)
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let response = self
            .http
            .get(stream_url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Http(format!("SSE connect failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "SSE connect returned HTTP {}",
                response.status()
            )));
        }

        let endpoint_tx = Arc::clone(&self.endpoint);
        let closing = Arc::clone(&self.closing);
        let task = tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                if closing.load(Ordering::SeqCst) {
                    break;
                }
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        warn!(target: targets::TRANSPORT, "SSE stream error: {err}");
                        break;
                    }
                };
                let Ok(text) = std::str::from_utf8(&chunk) else {
                    continue;
                };
                buffer.push_str(text);

                while let Some(split) = buffer.find("\n\n") {
                    let block = buffer[..split].to_owned();
                    buffer.drain(..split + 2);

                    let Some(event) = parse_event_block(&block) else {
                        continue;
                    };
                    match event.event.as_str() {
                        ENDPOINT_EVENT => {
                            debug!(
                                target: targets::TRANSPORT,
                                "Discovered message endpoint: {}", event.data
                            );
                            endpoint_tx.send_replace(Some(event.data));
                        }
                        MESSAGE_EVENT => match JsonRpcMessage::from_str(&event.data) {
                            Ok(message) => handler(message).await,
                            Err(err) => {
                                warn!(
                                    target: targets::TRANSPORT,
                                    "Discarding malformed SSE message: {err}"
                                );
                            }
                        },
                        other => {
                            error!(
                                target: targets::TRANSPORT,
                                "Unrecognized SSE event type: {other}"
                            );
                        }
                    }
                }
            }
            info!(target: targets::TRANSPORT, "SSE stream ended");
        });
        *self
            .stream_task
            .lock()
            .expect("stream task lock poisoned") = Some(task);

        // The transport is usable once the POST endpoint is known.
        self.await_endpoint().await?;
        Ok(())
    }

    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        let endpoint = self.await_endpoint().await?;
        let url = self
            .base_url
            .join(&endpoint)
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let body = serde_json::to_string(&message)?;

        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::Http(format!("message POST failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TransportError::Http(format!(
                "message POST returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close_gracefully(&self) -> Result<(), TransportError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(task) = self
            .stream_task
            .lock()
            .expect("stream task lock poisoned")
            .take()
        {
            task.abort();
        }
        Ok(())
    }
}

// ============================================================================
// Server side
// ============================================================================

#[derive(Clone)]
struct SseServerState {
    clients: Arc<Mutex<HashMap<String, mpsc::Sender<Event>>>>,
    handler: Arc<RwLock<Option<MessageHandler>>>,
    message_path: String,
    closed: Arc<AtomicBool>,
}

/// Server half of the HTTP+SSE transport.
///
/// Exposes an [`axum::Router`] (see [`SseServerTransport::router`]) the
/// host serves however it likes. Each connected client gets its own
/// session keyed by the `sessionId` query parameter embedded in the
/// endpoint URL it was advertised; outbound envelopes are broadcast to
/// every connected client.
pub struct SseServerTransport {
    sse_path: String,
    state: SseServerState,
}

impl SseServerTransport {
    /// Creates a transport using the default `/sse` and `/message` paths.
    #[must_use]
    pub fn new() -> Self {
        Self::with_paths(DEFAULT_SSE_PATH, DEFAULT_MESSAGE_PATH)
    }

    /// Creates a transport with custom stream and message paths.
    #[must_use]
    pub fn with_paths(sse_path: impl Into<String>, message_path: impl Into<String>) -> Self {
        Self {
            sse_path: sse_path.into(),
            state: SseServerState {
                clients: Arc::new(Mutex::new(HashMap::new())),
                handler: Arc::new(RwLock::new(None)),
                message_path: message_path.into(),
                closed: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Builds the router serving the SSE stream and the message endpoint.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.sse_path, get(handle_sse_stream))
            .route(&self.state.message_path, post(handle_message_post))
            .with_state(self.state.clone())
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.state.clients.lock().expect("clients lock poisoned").len()
    }
}

impl Default for SseServerTransport {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle_sse_stream(
    State(state): State<SseServerState>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, axum::http::StatusCode> {
    if state.closed.load(Ordering::SeqCst) {
        return Err(axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel::<Event>(CLIENT_QUEUE_CAPACITY);

    // The endpoint event goes first on a fresh queue, so it is always the
    // opening frame of the stream.
    let endpoint = format!("{}?sessionId={}", state.message_path, session_id);
    let _ = tx.try_send(Event::default().event(ENDPOINT_EVENT).data(endpoint));

    info!(target: targets::TRANSPORT, "SSE client connected: {session_id}");
    state
        .clients
        .lock()
        .expect("clients lock poisoned")
        .insert(session_id, tx);

    Ok(Sse::new(ReceiverStream::new(rx).map(Ok::<Event, Infallible>)))
}

#[derive(serde::Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: String,
}

async fn handle_message_post(
    State(state): State<SseServerState>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> axum::http::StatusCode {
    if state.closed.load(Ordering::SeqCst) {
        return axum::http::StatusCode::SERVICE_UNAVAILABLE;
    }
    let known_session = state
        .clients
        .lock()
        .expect("clients lock poisoned")
        .contains_key(&query.session_id);
    if !known_session {
        return axum::http::StatusCode::NOT_FOUND;
    }

    let handler = state
        .handler
        .read()
        .expect("handler lock poisoned")
        .clone();
    let Some(handler) = handler else {
        return axum::http::StatusCode::SERVICE_UNAVAILABLE;
    };

    match JsonRpcMessage::from_str(&body) {
        Ok(message) => {
            // Accepted for processing; the protocol-level response, if
            // any, arrives later as an SSE message event.
            tokio::spawn(handler(message));
            axum::http::StatusCode::ACCEPTED
        }
        Err(err) => {
            warn!(target: targets::TRANSPORT, "Rejecting malformed POST body: {err}");
            axum::http::StatusCode::BAD_REQUEST
        }
    }
}

#[async_trait::async_trait]
impl Transport for SseServerTransport {
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError> {
        let mut slot = self.state.handler.write().expect("handler lock poisoned");
        if slot.is_some() {
            return Err(TransportError::AlreadyConnected);
        }
        *slot = Some(handler);
        Ok(())
    }

    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }

        // Serialized JSON is a single line, which SSE data frames require.
        let json = serde_json::to_string(&message)?;

        let mut clients = self.state.clients.lock().expect("clients lock poisoned");
        let mut disconnected = Vec::new();
        for (session_id, tx) in clients.iter() {
            let event = Event::default().event(MESSAGE_EVENT).data(&json);
            match tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        target: targets::TRANSPORT,
                        "Disconnecting slow SSE client {session_id}"
                    );
                    disconnected.push(session_id.clone());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    disconnected.push(session_id.clone());
                }
            }
        }
        for session_id in disconnected {
            clients.remove(&session_id);
        }
        Ok(())
    }

    async fn close_gracefully(&self) -> Result<(), TransportError> {
        self.state.closed.store(true, Ordering::SeqCst);
        // Dropping the queues ends every client's event stream.
        self.state
            .clients
            .lock()
            .expect("clients lock poisoned")
            .clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_protocol::{JsonRpcNotification, JsonRpcRequest};

    #[test]
    fn parses_endpoint_event() {
        let event = parse_event_block("event: endpoint\ndata: /message?sessionId=abc").unwrap();
        assert_eq!(event.event, "endpoint");
        assert_eq!(event.data, "/message?sessionId=abc");
    }

    #[test]
    fn event_type_defaults_to_message() {
        let event = parse_event_block("data: {\"jsonrpc\":\"2.0\"}").unwrap();
        assert_eq!(event.event, "message");
    }

    #[test]
    fn joins_multiple_data_lines() {
        let event = parse_event_block("data: first\ndata: second").unwrap();
        assert_eq!(event.data, "first\nsecond");
    }

    #[test]
    fn comment_only_block_is_skipped() {
        assert!(parse_event_block(": keep-alive").is_none());
        assert!(parse_event_block("").is_none());
    }

    #[test]
    fn tolerates_crlf_line_endings() {
        let event = parse_event_block("event: message\r\ndata: body\r").unwrap();
        assert_eq!(event.event, "message");
        assert_eq!(event.data, "body");
    }

    async fn serve(transport: &SseServerTransport) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = transport.router();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn sse_round_trip_between_client_and_server() {
        let server = SseServerTransport::new();
        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let server_handler: MessageHandler = Arc::new(move |message| {
            let tx = server_tx.clone();
            Box::pin(async move {
                let _ = tx.send(message);
            })
        });
        server.connect(server_handler).await.unwrap();
        let base = serve(&server).await;

        let client = SseClientTransport::new(base);
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();
        let client_handler: MessageHandler = Arc::new(move |message| {
            let tx = client_tx.clone();
            Box::pin(async move {
                let _ = tx.send(message);
            })
        });
        client.connect(client_handler).await.unwrap();
        assert_eq!(server.client_count(), 1);

        // Client -> server over POST.
        client
            .send_message(JsonRpcMessage::Request(JsonRpcRequest::new(
                "c-0", "ping", None,
            )))
            .await
            .unwrap();
        let inbound = tokio::time::timeout(Duration::from_secs(5), server_rx.recv())
            .await
            .expect("timed out")
            .expect("server handler stream ended");
        assert!(matches!(inbound, JsonRpcMessage::Request(_)));

        // Server -> client over the event stream.
        server
            .send_message(JsonRpcMessage::Notification(JsonRpcNotification::new(
                "notifications/tools/list_changed",
                None,
            )))
            .await
            .unwrap();
        let pushed = tokio::time::timeout(Duration::from_secs(5), client_rx.recv())
            .await
            .expect("timed out")
            .expect("client handler stream ended");
        match pushed {
            JsonRpcMessage::Notification(n) => {
                assert_eq!(n.method, "notifications/tools/list_changed");
            }
            other => panic!("expected notification, got {other:?}"),
        }

        client.close_gracefully().await.unwrap();
        server.close_gracefully().await.unwrap();
    }

    #[tokio::test]
    async fn post_with_unknown_session_is_rejected() {
        let server = SseServerTransport::new();
        server
            .connect(Arc::new(|_| Box::pin(async {})))
            .await
            .unwrap();
        let base = serve(&server).await;

        let response = reqwest::Client::new()
            .post(base.join("/message?sessionId=nope").unwrap())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{\"jsonrpc\":\"2.0\",\"method\":\"x\"}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn endpoint_discovery_times_out_without_server() {
        // Point at a listener that accepts but never speaks SSE.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(
            "/sse",
            get(|| async { ([("content-type", "text/event-stream")], "") }),
        );
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let client = SseClientTransport::new(Url::parse(&format!("http://{addr}/")).unwrap())
            .with_endpoint_timeout(Duration::from_millis(200));
        let err = client
            .connect(Arc::new(|_| Box::pin(async {})))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EndpointNotDiscovered(_)));
    }
}
