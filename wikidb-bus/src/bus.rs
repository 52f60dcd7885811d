//! Single-process message bus: named addresses, at-most-once delivery.
//!
//! Not a durable broker. A consumer registers an address and gets the
//! receiving end; callers build envelopes through [`MessageBus::request`]
//! and await the per-envelope reply channel. No retries at this layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use wikidb_core::{ServiceError, ServiceResult};

use crate::envelope::Envelope;

/// Envelopes buffered per address before senders are backpressured.
const CHANNEL_CAPACITY: usize = 32;

/// Cloneable handle to the in-process dispatch table.
#[derive(Clone, Default)]
pub struct MessageBus {
    addresses: Arc<Mutex<HashMap<String, mpsc::Sender<Envelope>>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as the consumer for `address`, replacing any previous
    /// consumer. Returns the stream of incoming envelopes.
    pub fn register(&self, address: &str) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.addresses
            .lock()
            .unwrap()
            .insert(address.to_owned(), tx);
        tracing::debug!(address, "consumer registered");
        rx
    }

    /// Send one request envelope to `address` and await the reply.
    ///
    /// At-most-once: if the consumer is missing or goes away before
    /// replying, the caller gets `ConnectionUnavailable` and nothing is
    /// redelivered.
    pub async fn request(&self, address: &str, action: &str, body: Value) -> ServiceResult<Value> {
        let sender = self
            .addresses
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| {
                ServiceError::ConnectionUnavailable(format!("no consumer at address '{address}'"))
            })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let envelope = Envelope {
            action: action.to_owned(),
            body,
            reply: reply_tx,
        };
        sender.send(envelope).await.map_err(|_| {
            ServiceError::ConnectionUnavailable(format!(
                "consumer at address '{address}' is gone"
            ))
        })?;

        reply_rx.await.map_err(|_| {
            ServiceError::ConnectionUnavailable(format!(
                "consumer at address '{address}' dropped the reply"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::encode_ok;
    use serde_json::json;

    #[tokio::test]
    async fn request_reaches_consumer_and_reply_comes_back() {
        let bus = MessageBus::new();
        let mut rx = bus.register("test.echo");

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                let _ = envelope.reply.send(encode_ok(envelope.body));
            }
        });

        let reply = bus
            .request("test.echo", "anything", json!({"n": 1}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"ok": true, "value": {"n": 1}}));
    }

    #[tokio::test]
    async fn missing_consumer_is_connection_unavailable() {
        let bus = MessageBus::new();
        let err = bus
            .request("nobody.home", "list-page-names", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConnectionUnavailable(_)));
    }

    #[tokio::test]
    async fn dropped_reply_is_connection_unavailable() {
        let bus = MessageBus::new();
        let mut rx = bus.register("test.sink");

        tokio::spawn(async move {
            // Consume and drop the envelope without replying.
            let _ = rx.recv().await;
        });

        let err = bus
            .request("test.sink", "list-page-names", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ConnectionUnavailable(_)));
    }
}
