//! Transport-agnostic JSON-RPC session runtime.
//!
//! A [`McpSession`] is the correlated-request peer both MCP roles are
//! built on. It assigns request ids, correlates responses to outstanding
//! requests under per-request timeouts, routes inbound requests and
//! notifications to registered handlers, and serializes outbound writes
//! through its transport.
//!
//! # Lifecycle
//!
//! ```text
//! CREATED ──connect──▶ RUNNING ──close_gracefully──▶ CLOSING ──▶ CLOSED
//!                       │                                       ▲
//!                       └────────────── close (forced) ─────────┘
//! ```
//!
//! Handler tables are fixed before the transport starts reading, so no
//! inbound message can be observed before the routing tables are
//! populated. Envelopes arriving while the session is not running are
//! dropped and logged.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use mcpkit_core::logging::targets;
use mcpkit_core::{McpError, McpResult};
use mcpkit_protocol::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use mcpkit_transport::{BoxFuture, MessageHandler, Transport};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Handler for an inbound request: raw `params` in, result payload out.
///
/// A returned error becomes the JSON-RPC error response, carrying the
/// handler's code and message.
pub type RequestHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, McpResult<Value>> + Send + Sync>;

/// Handler for an inbound notification. Errors are logged, never sent to
/// the peer.
pub type NotificationHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, McpResult<()>> + Send + Sync>;

/// Session configuration: timeout plus the routing tables.
///
/// Both roles populate the tables before connecting, which is what makes
/// the "handlers registered before inbound reading begins" invariant
/// hold.
pub struct SessionConfig {
    request_timeout: Duration,
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
}

impl SessionConfig {
    /// Creates a configuration with the default timeout and no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_handlers: HashMap::new(),
            notification_handlers: HashMap::new(),
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Registers a request handler for a method.
    #[must_use]
    pub fn request_handler(mut self, method: impl Into<String>, handler: RequestHandler) -> Self {
        self.request_handlers.insert(method.into(), handler);
        self
    }

    /// Registers a notification handler for a method.
    #[must_use]
    pub fn notification_handler(
        mut self,
        method: impl Into<String>,
        handler: NotificationHandler,
    ) -> Self {
        self.notification_handlers.insert(method.into(), handler);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_CLOSING: u8 = 2;
const STATE_CLOSED: u8 = 3;

/// One-shot completion slot for an outstanding request.
///
/// First completer wins: the inbound dispatcher (response), the timeout
/// (which removes the entry), or session close (which drains the table).
type PendingSender = oneshot::Sender<McpResult<Value>>;

/// A notification admitted to the sequential worker: its method (for
/// logging), handler, and params.
type QueuedNotification = (String, NotificationHandler, Option<Value>);

struct SessionInner {
    prefix: String,
    counter: AtomicU64,
    state: AtomicU8,
    request_timeout: Duration,
    pending: Mutex<HashMap<RequestId, PendingSender>>,
    request_handlers: HashMap<String, RequestHandler>,
    notification_handlers: HashMap<String, NotificationHandler>,
    notification_queue: mpsc::UnboundedSender<QueuedNotification>,
    transport: Arc<dyn Transport>,
}

/// The JSON-RPC peer sitting on top of a transport.
pub struct McpSession {
    inner: Arc<SessionInner>,
}

impl McpSession {
    /// Builds a session around the transport and starts it.
    ///
    /// The inbound dispatcher is installed as the transport's handler as
    /// part of `Transport::connect`, before its readiness resolves.
    ///
    /// # Errors
    ///
    /// Fails if the transport cannot establish its channel.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
    ) -> McpResult<Self> {
        // Notifications run on a single worker so they are processed in
        // receive order, concurrently with request handlers but never
        // with each other. Responses are completed by the dispatcher
        // directly, so a notification handler may itself send requests.
        let (notification_tx, mut notification_rx) =
            mpsc::unbounded_channel::<QueuedNotification>();
        tokio::spawn(async move {
            while let Some((method, handler, params)) = notification_rx.recv().await {
                if let Err(err) = handler(params).await {
                    warn!(target: targets::SESSION, "Notification handler '{method}' failed: {err}");
                }
            }
        });

        let inner = Arc::new(SessionInner {
            prefix: uuid::Uuid::new_v4().simple().to_string(),
            counter: AtomicU64::new(0),
            state: AtomicU8::new(STATE_CREATED),
            request_timeout: config.request_timeout,
            pending: Mutex::new(HashMap::new()),
            request_handlers: config.request_handlers,
            notification_handlers: config.notification_handlers,
            notification_queue: notification_tx,
            transport: Arc::clone(&transport),
        });

        // Running before the transport starts reading, so no early
        // envelope from the peer is ever dropped.
        inner.state.store(STATE_RUNNING, Ordering::SeqCst);

        let dispatcher: MessageHandler = {
            let inner = Arc::clone(&inner);
            Arc::new(move |message| {
                let inner = Arc::clone(&inner);
                Box::pin(async move { inner.dispatch(message).await }) as BoxFuture<'static, ()>
            })
        };
        transport.connect(dispatcher).await.map_err(McpError::from)?;

        Ok(Self { inner })
    }

    /// Sends a request and awaits its typed result.
    ///
    /// Exactly one of success, peer error, timeout, or session-closed
    /// completes the call. A response arriving after the timeout fired is
    /// dropped by the dispatcher.
    ///
    /// # Errors
    ///
    /// Peer errors are returned with their code/message/data; local
    /// failures carry the matching [`McpError`] code.
    pub async fn send_request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<T> {
        self.ensure_running()?;

        let id = self.next_request_id();
        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(id.clone(), tx);

        let request = JsonRpcRequest::new(id.clone(), method, params);
        if let Err(err) = self
            .inner
            .transport
            .send_message(JsonRpcMessage::Request(request))
            .await
        {
            self.lock_pending().remove(&id);
            return Err(err.into());
        }

        match tokio::time::timeout(self.inner.request_timeout, rx).await {
            Ok(Ok(completion)) => completion.and_then(decode_result),
            // Sender dropped without completing: the session was closed
            // and the table drained.
            Ok(Err(_)) => Err(McpError::session_closed()),
            Err(_) => {
                self.lock_pending().remove(&id);
                Err(McpError::timeout(method))
            }
        }
    }

    /// Sends a one-way notification. No correlation, no response.
    ///
    /// # Errors
    ///
    /// Fails if the session is not running or the write is refused.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> McpResult<()> {
        self.ensure_running()?;
        let notification = JsonRpcNotification::new(method, params);
        self.inner
            .transport
            .send_message(JsonRpcMessage::Notification(notification))
            .await
            .map_err(McpError::from)
    }

    /// Gracefully closes the session: stops intake, closes the
    /// transport, and completes every pending request with a
    /// session-closed error.
    ///
    /// # Errors
    ///
    /// Fails if the transport's own shutdown fails; pending requests are
    /// cancelled regardless.
    pub async fn close_gracefully(&self) -> McpResult<()> {
        let prior = self.inner.state.swap(STATE_CLOSING, Ordering::SeqCst);
        if prior == STATE_CLOSING || prior == STATE_CLOSED {
            return Ok(());
        }
        let result = self
            .inner
            .transport
            .close_gracefully()
            .await
            .map_err(McpError::from);
        self.inner.fail_pending();
        self.inner.state.store(STATE_CLOSED, Ordering::SeqCst);
        result
    }

    /// Forcibly closes the session. Pending requests are cancelled
    /// immediately; the transport is shut down in the background.
    pub fn close(&self) {
        let prior = self.inner.state.swap(STATE_CLOSED, Ordering::SeqCst);
        if prior == STATE_CLOSED {
            return;
        }
        self.inner.fail_pending();
        let transport = Arc::clone(&self.inner.transport);
        tokio::spawn(async move {
            let _ = transport.close_gracefully().await;
        });
    }

    /// Whether the session has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(
            self.inner.state.load(Ordering::SeqCst),
            STATE_CLOSING | STATE_CLOSED
        )
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.lock_pending().len()
    }

    fn ensure_running(&self) -> McpResult<()> {
        match self.inner.state.load(Ordering::SeqCst) {
            STATE_RUNNING => Ok(()),
            STATE_CREATED => Err(McpError::invalid_state("Session not started")),
            _ => Err(McpError::session_closed()),
        }
    }

    fn next_request_id(&self) -> RequestId {
        let n = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        RequestId::from(format!("{}-{}", self.inner.prefix, n))
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, PendingSender>> {
        self.inner.pending.lock().expect("pending lock poisoned")
    }
}

/// Decodes a success result payload into the declared type.
fn decode_result<T: DeserializeOwned>(value: Value) -> McpResult<T> {
    // Peers may answer void results with `null`; treat it as `{}`.
    let value = if value.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        value
    };
    serde_json::from_value(value)
        .map_err(|e| McpError::internal(format!("Failed to decode result: {e}")))
}

impl SessionInner {
    async fn dispatch(self: Arc<Self>, message: JsonRpcMessage) {
        if self.state.load(Ordering::SeqCst) != STATE_RUNNING {
            warn!(target: targets::SESSION, "Dropping message received while not running");
            return;
        }

        match message {
            JsonRpcMessage::Response(response) => self.complete_pending(response),
            JsonRpcMessage::Request(request) => self.dispatch_request(request),
            JsonRpcMessage::Notification(notification) => {
                self.dispatch_notification(notification);
            }
        }
    }

    fn complete_pending(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.clone() else {
            warn!(target: targets::SESSION, "Dropping response without id");
            return;
        };
        let entry = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&id);
        let Some(sender) = entry else {
            warn!(target: targets::SESSION, "Dropping response for unknown id {id}");
            return;
        };

        let completion = match response.error {
            Some(error) => Err(error.into()),
            None => Ok(response.result.unwrap_or(Value::Null)),
        };
        // The receiver may already be gone (timeout raced the response).
        let _ = sender.send(completion);
    }

    fn dispatch_request(self: &Arc<Self>, request: JsonRpcRequest) {
        let inner = Arc::clone(self);
        let handler = self.request_handlers.get(&request.method).cloned();

        // Handlers run off the inbound path so a slow handler never
        // blocks the reader; multiple requests may be in flight at once.
        tokio::spawn(async move {
            let JsonRpcRequest {
                id, method, params, ..
            } = request;

            let response = match handler {
                Some(handler) => match handler(params).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::error(Some(id), err.into()),
                },
                None => {
                    debug!(target: targets::SESSION, "No handler for request method '{method}'");
                    JsonRpcResponse::error(Some(id), McpError::method_not_found(&method).into())
                }
            };

            // Best effort: the transport may already be closed.
            if let Err(err) = inner
                .transport
                .send_message(JsonRpcMessage::Response(response))
                .await
            {
                warn!(target: targets::SESSION, "Failed to send response for '{method}': {err}");
            }
        });
    }

    fn dispatch_notification(&self, notification: JsonRpcNotification) {
        let Some(handler) = self.notification_handlers.get(&notification.method).cloned() else {
            debug!(
                target: targets::SESSION,
                "Dropping notification with no handler: {}", notification.method
            );
            return;
        };

        let _ = self
            .notification_queue
            .send((notification.method, handler, notification.params));
    }

    fn fail_pending(&self) {
        let drained: Vec<PendingSender> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.drain().map(|(_, sender)| sender).collect()
        };
        for sender in drained {
            let _ = sender.send(Err(McpError::session_closed()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpkit_core::McpErrorCode;
    use mcpkit_protocol::JsonRpcError;
    use mcpkit_transport::memory::{duplex, MemoryTransport};
    use serde_json::json;
    use tokio::sync::mpsc;

    /// Wires the peer side with an auto-responder and returns every
    /// envelope it observed.
    async fn echo_peer(
        transport: MemoryTransport,
    ) -> (Arc<MemoryTransport>, mpsc::UnboundedReceiver<JsonRpcMessage>) {
        let transport = Arc::new(transport);
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let responder = Arc::clone(&transport);
        let handler: MessageHandler = Arc::new(move |message| {
            let responder = Arc::clone(&responder);
            let seen_tx = seen_tx.clone();
            Box::pin(async move {
                let _ = seen_tx.send(message.clone());
                if let JsonRpcMessage::Request(request) = message {
                    let response = match request.method.as_str() {
                        "demo/fail" => JsonRpcResponse::error(
                            Some(request.id),
                            JsonRpcError {
                                code: -32602,
                                message: "bad params".to_owned(),
                                data: Some(json!({"hint": "numbers only"})),
                            },
                        ),
                        "demo/slow" => return,
                        _ => JsonRpcResponse::success(
                            request.id,
                            json!({"method": request.method}),
                        ),
                    };
                    let _ = responder
                        .send_message(JsonRpcMessage::Response(response))
                        .await;
                }
            })
        });
        transport.connect(handler).await.unwrap();
        (transport, seen_rx)
    }

    #[tokio::test]
    async fn request_resolves_with_peer_result() {
        let (local, remote) = duplex(16);
        let _peer = echo_peer(remote).await;
        let session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();

        let result: Value = session.send_request("demo/echo", None).await.unwrap();
        assert_eq!(result, json!({"method": "demo/echo"}));
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn fresh_session_has_no_pending_requests() {
        let (local, _remote) = duplex(16);
        let session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn peer_error_surfaces_code_message_and_data() {
        let (local, remote) = duplex(16);
        let _peer = echo_peer(remote).await;
        let session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();

        let err = session
            .send_request::<Value>("demo/fail", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, McpErrorCode::InvalidParams);
        assert_eq!(err.message, "bad params");
        assert_eq!(err.data.unwrap()["hint"], "numbers only");
    }

    #[tokio::test]
    async fn unanswered_request_times_out_and_clears_pending() {
        let (local, remote) = duplex(16);
        let (peer, _seen) = echo_peer(remote).await;
        let session = McpSession::connect(
            Arc::new(local),
            SessionConfig::new().request_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap();

        let err = session
            .send_request::<Value>("demo/slow", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, McpErrorCode::Timeout);
        assert_eq!(session.pending_requests(), 0);

        // A late response for an unknown id is logged and dropped.
        let late = JsonRpcResponse::success(RequestId::from("stale-0"), json!({}));
        peer.send_message(JsonRpcMessage::Response(late))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.pending_requests(), 0);
    }

    #[tokio::test]
    async fn unknown_inbound_method_gets_method_not_found_reply() {
        let (local, remote) = duplex(16);
        let (peer, mut seen) = echo_peer(remote).await;
        let _session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();

        peer.send_message(JsonRpcMessage::Request(JsonRpcRequest::new(
            "x-7",
            "unknown.method",
            None,
        )))
        .await
        .unwrap();

        let reply = loop {
            let message = tokio::time::timeout(Duration::from_secs(2), seen.recv())
                .await
                .expect("timed out")
                .expect("peer stream ended");
            if let JsonRpcMessage::Response(response) = message {
                break response;
            }
        };
        assert_eq!(reply.id, Some(RequestId::from("x-7")));
        let error = reply.error.unwrap();
        assert_eq!(error.code, -32601);
        assert_eq!(error.message, "Method not found: unknown.method");
    }

    #[tokio::test]
    async fn request_handler_runs_once_and_reply_id_matches() {
        let calls = Arc::new(AtomicU64::new(0));
        let handler_calls = Arc::clone(&calls);
        let handler: RequestHandler = Arc::new(move |_params| {
            let handler_calls = Arc::clone(&handler_calls);
            Box::pin(async move {
                handler_calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"ok": true}))
            })
        });

        let (local, remote) = duplex(16);
        let (peer, mut seen) = echo_peer(remote).await;
        let _session = McpSession::connect(
            Arc::new(local),
            SessionConfig::new().request_handler("demo/handled", handler),
        )
        .await
        .unwrap();

        peer.send_message(JsonRpcMessage::Request(JsonRpcRequest::new(
            7i64,
            "demo/handled",
            None,
        )))
        .await
        .unwrap();

        let reply = loop {
            let message = tokio::time::timeout(Duration::from_secs(2), seen.recv())
                .await
                .expect("timed out")
                .expect("peer stream ended");
            if let JsonRpcMessage::Response(response) = message {
                break response;
            }
        };
        assert_eq!(reply.id, Some(RequestId::Number(7)));
        assert_eq!(reply.result.unwrap()["ok"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_error_response() {
        let handler: RequestHandler = Arc::new(|_params| {
            Box::pin(async { Err(McpError::internal("boom")) })
        });

        let (local, remote) = duplex(16);
        let (peer, mut seen) = echo_peer(remote).await;
        let _session = McpSession::connect(
            Arc::new(local),
            SessionConfig::new().request_handler("demo/explode", handler),
        )
        .await
        .unwrap();

        peer.send_message(JsonRpcMessage::Request(JsonRpcRequest::new(
            "q-1",
            "demo/explode",
            None,
        )))
        .await
        .unwrap();

        let reply = loop {
            let message = tokio::time::timeout(Duration::from_secs(2), seen.recv())
                .await
                .expect("timed out")
                .expect("peer stream ended");
            if let JsonRpcMessage::Response(response) = message {
                break response;
            }
        };
        let error = reply.error.unwrap();
        assert_eq!(error.code, -32603);
        assert_eq!(error.message, "boom");
    }

    #[tokio::test]
    async fn notifications_never_produce_a_wire_reply() {
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let handler: NotificationHandler = Arc::new(move |params| {
            let notify_tx = notify_tx.clone();
            Box::pin(async move {
                let _ = notify_tx.send(params);
                Ok(())
            })
        });

        let (local, remote) = duplex(16);
        let (peer, mut seen) = echo_peer(remote).await;
        let _session = McpSession::connect(
            Arc::new(local),
            SessionConfig::new().notification_handler("notifications/test", handler),
        )
        .await
        .unwrap();

        peer.send_message(JsonRpcMessage::Notification(JsonRpcNotification::new(
            "notifications/test",
            Some(json!({"n": 1})),
        )))
        .await
        .unwrap();

        let params = tokio::time::timeout(Duration::from_secs(2), notify_rx.recv())
            .await
            .expect("timed out")
            .expect("handler stream ended");
        assert_eq!(params.unwrap()["n"], 1);

        // Give any (incorrect) reply time to arrive; none may.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seen.try_recv().is_err());
    }

    #[tokio::test]
    async fn notifications_are_processed_in_receive_order() {
        let (order_tx, mut order_rx) = mpsc::unbounded_channel();
        let handler: NotificationHandler = Arc::new(move |params| {
            let order_tx = order_tx.clone();
            Box::pin(async move {
                let n = params.and_then(|p| p["n"].as_u64()).unwrap_or_default();
                // Make earlier notifications slower; order must still hold.
                tokio::time::sleep(Duration::from_millis(30u64.saturating_sub(n * 10))).await;
                let _ = order_tx.send(n);
                Ok(())
            })
        });

        let (local, remote) = duplex(16);
        let (peer, _seen) = echo_peer(remote).await;
        let _session = McpSession::connect(
            Arc::new(local),
            SessionConfig::new().notification_handler("notifications/seq", handler),
        )
        .await
        .unwrap();

        for n in 0..3u64 {
            peer.send_message(JsonRpcMessage::Notification(JsonRpcNotification::new(
                "notifications/seq",
                Some(json!({"n": n})),
            )))
            .await
            .unwrap();
        }

        for expected in 0..3u64 {
            let n = tokio::time::timeout(Duration::from_secs(2), order_rx.recv())
                .await
                .expect("timed out")
                .expect("order stream ended");
            assert_eq!(n, expected);
        }
    }

    #[tokio::test]
    async fn close_gracefully_cancels_pending_and_refuses_new_sends() {
        let (local, remote) = duplex(16);
        let _peer = echo_peer(remote).await;
        let session = Arc::new(
            McpSession::connect(
                Arc::new(local),
                SessionConfig::new().request_timeout(Duration::from_secs(30)),
            )
            .await
            .unwrap(),
        );

        let in_flight = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_request::<Value>("demo/slow", None).await })
        };
        // Let the request register before closing.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(session.pending_requests(), 1);

        session.close_gracefully().await.unwrap();

        let err = in_flight.await.unwrap().unwrap_err();
        assert_eq!(err.code, McpErrorCode::SessionClosed);
        assert_eq!(session.pending_requests(), 0);
        assert!(session.is_closed());

        let err = session
            .send_request::<Value>("demo/echo", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, McpErrorCode::SessionClosed);
        let err = session
            .send_notification("notifications/test", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, McpErrorCode::SessionClosed);
    }

    #[tokio::test]
    async fn request_ids_are_unique_and_prefixed() {
        let (local, remote) = duplex(16);
        let (_peer, mut seen) = echo_peer(remote).await;
        let session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();

        let _: Value = session.send_request("demo/echo", None).await.unwrap();
        let _: Value = session.send_request("demo/echo", None).await.unwrap();

        let mut ids = Vec::new();
        while let Ok(message) = seen.try_recv() {
            if let JsonRpcMessage::Request(request) = message {
                ids.push(request.id.to_string());
            }
        }
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        let prefix = ids[0].rsplit_once('-').unwrap().0.to_owned();
        assert!(ids[1].starts_with(&prefix));
    }

    #[tokio::test]
    async fn void_results_decode_from_null() {
        let (local, remote) = duplex(16);
        let transport = Arc::new(remote);
        let responder = Arc::clone(&transport);
        let handler: MessageHandler = Arc::new(move |message| {
            let responder = Arc::clone(&responder);
            Box::pin(async move {
                if let JsonRpcMessage::Request(request) = message {
                    let response = JsonRpcResponse {
                        jsonrpc: std::borrow::Cow::Borrowed("2.0"),
                        id: Some(request.id),
                        result: Some(Value::Null),
                        error: None,
                    };
                    let _ = responder
                        .send_message(JsonRpcMessage::Response(response))
                        .await;
                }
            })
        });
        transport.connect(handler).await.unwrap();

        let session = McpSession::connect(Arc::new(local), SessionConfig::new())
            .await
            .unwrap();
        let _: mcpkit_protocol::EmptyResult =
            session.send_request("demo/void", None).await.unwrap();
    }
}
