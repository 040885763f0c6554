// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-gateway multicast groups.
//!
//! A room is a broadcast channel keyed by conversation id; the queue group
//! is one more channel carrying `queue:snapshot` frames to every agent-queue
//! session on this node. Rooms are created on first join and pruned when the
//! last member leaves.

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Capacity per room; a lagging session drops oldest frames first.
const ROOM_CAPACITY: usize = 128;

/// What flows through a room.
#[derive(Debug, Clone)]
pub enum RoomMessage {
    /// A serialized frame to forward to the client.
    Frame(String),
    /// The room's conversation closed; sessions disconnect after their
    /// pending frames are flushed.
    Close,
}

/// Per-node registry of rooms plus the agent-queue broadcast group.
pub struct RoomRegistry {
    rooms: DashMap<String, broadcast::Sender<RoomMessage>>,
    queue_watchers: broadcast::Sender<String>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            queue_watchers: broadcast::channel(ROOM_CAPACITY).0,
        }
    }

    /// Join the room for `conversation_id`, creating it on first join.
    pub fn join(&self, conversation_id: &str) -> broadcast::Receiver<RoomMessage> {
        self.rooms
            .entry(conversation_id.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Broadcast a frame to a room. A missing or empty room is a no-op.
    pub fn broadcast(&self, conversation_id: &str, frame: String) {
        if let Some(sender) = self.rooms.get(conversation_id) {
            let _ = sender.send(RoomMessage::Frame(frame));
        }
    }

    /// Tell every member of a room to disconnect, then drop the room.
    pub fn close(&self, conversation_id: &str) {
        if let Some((_, sender)) = self.rooms.remove(conversation_id) {
            let _ = sender.send(RoomMessage::Close);
        }
    }

    /// Drop the room if nobody is left in it.
    pub fn prune(&self, conversation_id: &str) {
        self.rooms
            .remove_if(conversation_id, |_, sender| sender.receiver_count() == 0);
    }

    /// Number of sessions currently in a room.
    pub fn member_count(&self, conversation_id: &str) -> usize {
        self.rooms
            .get(conversation_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Subscribe to queue snapshot broadcasts.
    pub fn queue_subscribe(&self) -> broadcast::Receiver<String> {
        self.queue_watchers.subscribe()
    }

    /// Broadcast a snapshot frame to all agent-queue sessions.
    pub fn queue_broadcast(&self, frame: String) {
        let _ = self.queue_watchers.send(frame);
    }
}
