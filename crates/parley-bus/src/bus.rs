// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publisher and subscriber handles for the two event channels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use parley_core::event::{ChatEvent, MessageEvent};
use parley_core::{EphemeralStore, KeySpace};

/// How many delivery attempts a failed publish gets before it is dropped.
const MAX_PUBLISH_ATTEMPTS: u32 = 5;

/// Initial backoff delay; doubles per attempt.
const PUBLISH_BACKOFF: Duration = Duration::from_millis(100);

/// Cross-instance event fan-out over store pub/sub.
///
/// Publish failures are retried with exponential backoff on a detached task
/// and never fail or block the originating transition.
#[derive(Clone)]
pub struct EventBus {
    store: Arc<dyn EphemeralStore>,
    keys: KeySpace,
}

impl EventBus {
    pub fn new(store: Arc<dyn EphemeralStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Publish a lifecycle transition on `chat.lifecycle`.
    pub async fn publish_lifecycle(&self, event: &ChatEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                debug!(
                    conversation_id = %event.conversation_id,
                    kind = %event.kind,
                    "publishing lifecycle event"
                );
                self.publish_with_retry(self.keys.lifecycle_channel(), payload)
                    .await;
            }
            Err(e) => error!(error = %e, "lifecycle event failed to serialize"),
        }
    }

    /// Publish a full message record on `chat.messages`.
    pub async fn publish_message(&self, event: &MessageEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => {
                self.publish_with_retry(self.keys.message_channel(), payload)
                    .await;
            }
            Err(e) => error!(error = %e, "message event failed to serialize"),
        }
    }

    /// Subscribe to the lifecycle channel.
    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<String> {
        self.store.subscribe(&self.keys.lifecycle_channel())
    }

    /// Subscribe to the message channel.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<String> {
        self.store.subscribe(&self.keys.message_channel())
    }

    /// First attempt inline; on failure, retries continue on a detached task
    /// so the caller's transition is never blocked.
    async fn publish_with_retry(&self, channel: String, payload: String) {
        let Err(first) = self.store.publish(&channel, &payload).await else {
            return;
        };
        warn!(channel = %channel, error = %first, "publish failed, retrying in background");

        let store = self.store.clone();
        tokio::spawn(async move {
            let mut delay = PUBLISH_BACKOFF;
            for attempt in 2..=MAX_PUBLISH_ATTEMPTS {
                tokio::time::sleep(delay).await;
                match store.publish(&channel, &payload).await {
                    Ok(()) => {
                        debug!(channel = %channel, attempt, "publish retry succeeded");
                        return;
                    }
                    Err(e) => {
                        warn!(channel = %channel, attempt, error = %e, "publish retry failed");
                        delay *= 2;
                    }
                }
            }
            error!(channel = %channel, "publish dropped after {MAX_PUBLISH_ATTEMPTS} attempts");
        });
    }
}

/// Decode a lifecycle payload; `None` for foreign or malformed frames.
pub fn decode_lifecycle(payload: &str) -> Option<ChatEvent> {
    serde_json::from_str(payload).ok()
}

/// Decode a message payload; `None` for foreign or malformed frames.
pub fn decode_message(payload: &str) -> Option<MessageEvent> {
    serde_json::from_str(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::event::ChatEventType;
    use parley_core::types::{ChatMessage, MessageType, Participant};
    use parley_store::MemoryStore;

    fn bus() -> EventBus {
        EventBus::new(Arc::new(MemoryStore::new()), KeySpace::default())
    }

    #[tokio::test]
    async fn lifecycle_event_reaches_subscriber() {
        let bus = bus();
        let mut rx = bus.subscribe_lifecycle();

        let event = ChatEvent::new(
            "c-1",
            ChatEventType::ConversationStarted,
            serde_json::json!({"customerId": "cust-1"}),
        );
        bus.publish_lifecycle(&event).await;

        let received = decode_lifecycle(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(received.event_id, event.event_id);
        assert_eq!(received.kind, ChatEventType::ConversationStarted);
    }

    #[tokio::test]
    async fn message_event_reaches_subscriber() {
        let bus = bus();
        let mut rx = bus.subscribe_messages();

        let message = ChatMessage::new("c-1", Participant::system(), MessageType::System, "bye");
        let event = MessageEvent::new(message.clone());
        bus.publish_message(&event).await;

        let received = decode_message(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(received.message.id, message.id);
        assert_eq!(received.conversation_id, "c-1");
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_error() {
        let bus = bus();
        let event = ChatEvent::new("c-1", ChatEventType::ConversationClosed, serde_json::json!({}));
        // Nothing to assert beyond "does not panic": no subscriber exists.
        bus.publish_lifecycle(&event).await;
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        assert!(decode_lifecycle("not json").is_none());
        assert!(decode_message("{\"partial\":true}").is_none());
    }
}
