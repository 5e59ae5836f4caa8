//! In-process duplex transport.
//!
//! [`duplex`] returns two linked transports with a bounded queue in each
//! direction. Useful for tests and for embedding a client and server in
//! the same process without touching the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use mcpkit_core::logging::targets;
use mcpkit_protocol::JsonRpcMessage;

use crate::{MessageHandler, Transport, TransportError};

/// One half of an in-process duplex pair.
pub struct MemoryTransport {
    outbound: Mutex<Option<mpsc::Sender<JsonRpcMessage>>>,
    inbound: Mutex<Option<mpsc::Receiver<JsonRpcMessage>>>,
    closed: AtomicBool,
}

/// Creates a linked pair of transports with the given queue capacity
/// per direction.
#[must_use]
pub fn duplex(capacity: usize) -> (MemoryTransport, MemoryTransport) {
    let (a_to_b_tx, a_to_b_rx) = mpsc::channel(capacity);
    let (b_to_a_tx, b_to_a_rx) = mpsc::channel(capacity);
    (
        MemoryTransport::new(a_to_b_tx, b_to_a_rx),
        MemoryTransport::new(b_to_a_tx, a_to_b_rx),
    )
}

impl MemoryTransport {
    fn new(outbound: mpsc::Sender<JsonRpcMessage>, inbound: mpsc::Receiver<JsonRpcMessage>) -> Self {
        Self {
            outbound: Mutex::new(Some(outbound)),
            inbound: Mutex::new(Some(inbound)),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, handler: MessageHandler) -> Result<(), TransportError> {
        let mut inbound = self
            .inbound
            .lock()
            .expect("inbound lock poisoned")
            .take()
            .ok_or(TransportError::AlreadyConnected)?;

        // One envelope at a time, in arrival order. The handler decides
        // what runs concurrently.
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                handler(message).await;
            }
            debug!(target: targets::TRANSPORT, "memory transport inbound ended");
        });

        Ok(())
    }

    async fn send_message(&self, message: JsonRpcMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let sender = {
            let guard = self.outbound.lock().expect("outbound lock poisoned");
            guard.clone().ok_or(TransportError::Closed)?
        };
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::EnqueueFailed,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    async fn close_gracefully(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        // Dropping the sender ends the peer's inbound loop once drained.
        self.outbound.lock().expect("outbound lock poisoned").take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;

    use mcpkit_protocol::{JsonRpcNotification, JsonRpcRequest};

    fn capture_handler() -> (MessageHandler, mpsc::UnboundedReceiver<JsonRpcMessage>) {
        let (tx, rx) = unbounded_channel();
        let handler: MessageHandler = Arc::new(move |message| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(message);
            })
        });
        (handler, rx)
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let (a, b) = duplex(8);
        let (handler, mut rx) = capture_handler();
        b.connect(handler).await.unwrap();

        for i in 0..4 {
            a.send_message(JsonRpcMessage::Request(JsonRpcRequest::new(
                i as i64,
                format!("method_{i}"),
                None,
            )))
            .await
            .unwrap();
        }

        for i in 0..4 {
            let message = rx.recv().await.unwrap();
            match message {
                JsonRpcMessage::Request(req) => assert_eq!(req.method, format!("method_{i}")),
                other => panic!("expected request, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn full_queue_fails_with_enqueue_error() {
        let (a, _b) = duplex(1);
        let notification =
            JsonRpcMessage::Notification(JsonRpcNotification::new("notifications/test", None));
        a.send_message(notification.clone()).await.unwrap();
        // Peer never connected, so nothing drains the queue.
        let err = a.send_message(notification).await.unwrap_err();
        assert!(matches!(err, TransportError::EnqueueFailed));
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (a, _b) = duplex(4);
        a.close_gracefully().await.unwrap();
        let err = a
            .send_message(JsonRpcMessage::Notification(JsonRpcNotification::new(
                "notifications/test",
                None,
            )))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn second_connect_fails() {
        let (_a, b) = duplex(4);
        let (handler, _rx) = capture_handler();
        b.connect(handler.clone()).await.unwrap();
        assert!(matches!(
            b.connect(handler).await,
            Err(TransportError::AlreadyConnected)
        ));
    }
}
