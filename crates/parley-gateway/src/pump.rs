// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event pump: translates bus events into room and queue broadcasts.
//!
//! One pump runs per gateway node. It must be spawned before the server
//! accepts connections so a transition published on another instance is
//! never missed by a client that just connected. Closed conversations get
//! their `system:event` dispatched first, then the room is told to
//! disconnect.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_bus::bus::{decode_lifecycle, decode_message};
use parley_bus::EventBus;
use parley_core::event::ChatEventType;

use crate::server::GatewayState;
use crate::ws::{events, frame};

/// Spawn the pump loop; runs until `cancel` fires.
pub fn spawn_event_pump(
    state: GatewayState,
    bus: EventBus,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut lifecycle_rx = bus.subscribe_lifecycle();
    let mut message_rx = bus.subscribe_messages();

    tokio::spawn(async move {
        info!("gateway event pump subscribed");
        loop {
            // Biased: drain message frames before lifecycle frames so a
            // closure notice always reaches the room before the CLOSED
            // event that disconnects it.
            tokio::select! {
                biased;
                received = message_rx.recv() => match received {
                    Ok(payload) => {
                        if let Some(event) = decode_message(&payload) {
                            state.rooms.broadcast(
                                &event.conversation_id,
                                frame(events::MESSAGE, &event.message),
                            );
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "event pump lagged on message channel");
                    }
                    Err(_) => break,
                },
                received = lifecycle_rx.recv() => match received {
                    Ok(payload) => {
                        let Some(event) = decode_lifecycle(&payload) else {
                            continue;
                        };
                        state.rooms.broadcast(
                            &event.conversation_id,
                            frame(events::SYSTEM, &event),
                        );

                        if event.kind == ChatEventType::ConversationClosed {
                            state.rooms.close(&event.conversation_id);
                        }

                        if affects_queue(event.kind) {
                            broadcast_queue_snapshot(&state).await;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(dropped = n, "event pump lagged on lifecycle channel");
                        // Snapshots are self-contained; resync the watchers.
                        broadcast_queue_snapshot(&state).await;
                    }
                    Err(_) => break,
                },
                _ = cancel.cancelled() => break,
            }
        }
        info!("gateway event pump stopped");
    })
}

fn affects_queue(kind: ChatEventType) -> bool {
    matches!(
        kind,
        ChatEventType::ConversationQueued
            | ChatEventType::ConversationAccepted
            | ChatEventType::ConversationReassigned
            | ChatEventType::ConversationClosed
    )
}

async fn broadcast_queue_snapshot(state: &GatewayState) {
    let max_entries = state.coordinator.config().queue.broadcast_max_entries;
    match state.coordinator.queue_snapshot(max_entries).await {
        Ok(entries) => {
            state
                .rooms
                .queue_broadcast(frame(events::QUEUE_SNAPSHOT, &entries));
        }
        Err(e) => warn!(error = %e, "queue snapshot broadcast failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_affecting_kinds() {
        assert!(affects_queue(ChatEventType::ConversationQueued));
        assert!(affects_queue(ChatEventType::ConversationAccepted));
        assert!(affects_queue(ChatEventType::ConversationReassigned));
        assert!(affects_queue(ChatEventType::ConversationClosed));
        assert!(!affects_queue(ChatEventType::ConversationStarted));
        assert!(!affects_queue(ChatEventType::MessageReceived));
    }
}
