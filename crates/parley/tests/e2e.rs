// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for the complete Parley pipeline.
//!
//! Each test wires an isolated harness (shared store, temp SQLite audit,
//! coordinator, event pump) and observes what room members and queue
//! watchers receive, exactly as websocket sessions would. The pump runs
//! asynchronously, so assertions scan forward to the frame they care about
//! instead of assuming exact arrival slots.

use std::collections::HashMap;
use std::time::Duration;

use parley_core::types::{ConversationStatus, MessageType};
use parley_gateway::RoomMessage;
use parley_test_utils::{agent, customer, TestHarness};

async fn recv_room(
    rx: &mut tokio::sync::broadcast::Receiver<RoomMessage>,
) -> RoomMessage {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for room frame")
        .expect("room channel closed")
}

/// Scan forward to the next frame with the given event name.
async fn next_frame(
    rx: &mut tokio::sync::broadcast::Receiver<RoomMessage>,
    event: &str,
) -> serde_json::Value {
    loop {
        match recv_room(rx).await {
            RoomMessage::Frame(payload) => {
                let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
                if value["event"] == event {
                    return value;
                }
            }
            RoomMessage::Close => panic!("room closed while waiting for {event}"),
        }
    }
}

/// Scan forward to the next queue snapshot whose entry count matches.
async fn next_snapshot_with_len(
    rx: &mut tokio::sync::broadcast::Receiver<String>,
    len: usize,
) -> serde_json::Value {
    loop {
        let payload = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for queue snapshot")
            .expect("queue channel closed");
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["event"], "queue:snapshot");
        if value["data"].as_array().unwrap().len() == len {
            return value;
        }
    }
}

#[tokio::test]
async fn messages_fan_out_to_room_members() {
    let h = TestHarness::builder().build().await.unwrap();

    let conversation = h
        .coordinator
        .start(customer("cust-7"), HashMap::new())
        .await
        .unwrap();
    let mut room_rx = h.gateway.rooms.join(&conversation.id);

    let sent = h
        .coordinator
        .send_message(&conversation.id, customer("cust-7"), "hi", MessageType::Text)
        .await
        .unwrap();

    let value = next_frame(&mut room_rx, "chat:message").await;
    assert_eq!(value["data"]["id"], sent.id.as_str());
    assert_eq!(value["data"]["content"], "hi");
    assert_eq!(value["data"]["sender"]["id"], "cust-7");
}

#[tokio::test]
async fn queue_watchers_see_snapshots_on_every_queue_change() {
    let h = TestHarness::builder().build().await.unwrap();
    let mut watcher = h.gateway.rooms.queue_subscribe();

    let conversation = h
        .coordinator
        .start(customer("cust-1"), HashMap::new())
        .await
        .unwrap();
    h.coordinator
        .queue_for_agent(&conversation.id, "web")
        .await
        .unwrap();

    let snapshot = next_snapshot_with_len(&mut watcher, 1).await;
    assert_eq!(
        snapshot["data"][0]["conversationId"],
        conversation.id.as_str()
    );

    // Accepting empties the queue; watchers get the empty snapshot.
    h.coordinator
        .accept(agent("ag-1", "Avery"), &conversation.id)
        .await
        .unwrap();
    next_snapshot_with_len(&mut watcher, 0).await;
}

#[tokio::test]
async fn close_dispatches_notice_then_disconnects_the_room() {
    let h = TestHarness::builder().build().await.unwrap();

    let conversation = h
        .coordinator
        .start(customer("cust-1"), HashMap::new())
        .await
        .unwrap();
    let mut room_rx = h.gateway.rooms.join(&conversation.id);

    h.coordinator
        .close(&conversation.id, Some(&agent("ag-1", "Avery")))
        .await
        .unwrap();

    let mut saw_notice = false;
    let mut saw_closed_event = false;
    loop {
        match recv_room(&mut room_rx).await {
            RoomMessage::Frame(payload) => {
                let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
                match value["event"].as_str().unwrap() {
                    "chat:message" if value["data"]["type"] == "SYSTEM" => {
                        assert!(
                            !saw_closed_event,
                            "notice must precede the closed event"
                        );
                        saw_notice = true;
                    }
                    "system:event" if value["data"]["type"] == "CONVERSATION_CLOSED" => {
                        saw_closed_event = true;
                    }
                    _ => {} // earlier lifecycle frames are fine
                }
            }
            RoomMessage::Close => break,
        }
    }
    assert!(saw_notice, "closure notice reached the room");
    assert!(saw_closed_event, "closed event reached the room");
}

#[tokio::test]
async fn reconnect_tail_matches_send_order_without_duplicates() {
    let h = TestHarness::builder().build().await.unwrap();

    let conversation = h
        .coordinator
        .start(customer("cust-1"), HashMap::new())
        .await
        .unwrap();
    let id = conversation.id.clone();

    for content in ["one", "two", "three"] {
        h.coordinator
            .send_message(&id, customer("cust-1"), content, MessageType::Text)
            .await
            .unwrap();
    }

    // Reconnect: the gateway resolves the conversation (not CLOSED) and the
    // client fetches the tail.
    let resolved = h.coordinator.conversation(&id).await.unwrap().unwrap();
    assert_ne!(resolved.status, ConversationStatus::Closed);

    let history = h.coordinator.recent_messages(&id, 100).await.unwrap();
    let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);

    // The next live frame carries a new id, not a duplicate of history.
    let mut room_rx = h.gateway.rooms.join(&id);
    let live = h
        .coordinator
        .send_message(&id, customer("cust-1"), "four", MessageType::Text)
        .await
        .unwrap();
    loop {
        let value = next_frame(&mut room_rx, "chat:message").await;
        if value["data"]["content"] == "four" {
            assert_eq!(value["data"]["id"], live.id.as_str());
            assert!(history.iter().all(|m| m.id != live.id));
            break;
        }
    }
}

#[tokio::test]
async fn purge_broadcasts_an_empty_snapshot() {
    let h = TestHarness::builder().build().await.unwrap();

    let conversation = h
        .coordinator
        .start(customer("cust-1"), HashMap::new())
        .await
        .unwrap();
    h.coordinator
        .queue_for_agent(&conversation.id, "web")
        .await
        .unwrap();

    // Age the entry past the purge threshold.
    let entry = h
        .coordinator
        .queue_engine()
        .remove(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    h.coordinator
        .queue_engine()
        .enqueue(&parley_core::types::QueueEntry {
            enqueued_at: chrono::Utc::now() - chrono::Duration::hours(2),
            ..entry
        })
        .await
        .unwrap();

    let mut watcher = h.gateway.rooms.queue_subscribe();
    let closed = h.coordinator.purge_stale_queue().await.unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, ConversationStatus::Closed);

    next_snapshot_with_len(&mut watcher, 0).await;
}
