// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analytics sink: an independent subscriber on both event channels.
//!
//! Stands in for the BI pipeline. Never on the critical path; a slow or dead
//! sink cannot block or fail a user action, it only lags and drops.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::{decode_lifecycle, decode_message, EventBus};

/// Forwards every bus event to the analytics log stream.
pub struct AnalyticsSink {
    bus: EventBus,
}

impl AnalyticsSink {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Spawn the sink loop; runs until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut lifecycle_rx = self.bus.subscribe_lifecycle();
        let mut message_rx = self.bus.subscribe_messages();

        tokio::spawn(async move {
            info!("analytics sink subscribed");
            loop {
                tokio::select! {
                    received = lifecycle_rx.recv() => match received {
                        Ok(payload) => {
                            if let Some(event) = decode_lifecycle(&payload) {
                                debug!(
                                    target: "parley::analytics",
                                    conversation_id = %event.conversation_id,
                                    kind = %event.kind,
                                    event_id = %event.event_id,
                                    "lifecycle"
                                );
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(dropped = n, "analytics sink lagged on lifecycle channel");
                        }
                        Err(_) => break,
                    },
                    received = message_rx.recv() => match received {
                        Ok(payload) => {
                            if let Some(event) = decode_message(&payload) {
                                debug!(
                                    target: "parley::analytics",
                                    conversation_id = %event.conversation_id,
                                    message_id = %event.message.id,
                                    "message"
                                );
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(dropped = n, "analytics sink lagged on message channel");
                        }
                        Err(_) => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
            info!("analytics sink stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::event::{ChatEvent, ChatEventType};
    use parley_core::KeySpace;
    use parley_store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn sink_stops_on_cancel() {
        let bus = EventBus::new(Arc::new(MemoryStore::new()), KeySpace::default());
        let cancel = CancellationToken::new();
        let handle = AnalyticsSink::new(bus.clone()).spawn(cancel.clone());

        bus.publish_lifecycle(&ChatEvent::new(
            "c-1",
            ChatEventType::ConversationStarted,
            serde_json::json!({}),
        ))
        .await;

        cancel.cancel();
        handle.await.unwrap();
    }
}
