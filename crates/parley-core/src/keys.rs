// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic naming of ephemeral-store keys and bus channels.

/// Composes store keys and pub/sub channel names under a configurable prefix.
///
/// Pure; no failure modes.
#[derive(Debug, Clone)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Live conversation record.
    pub fn conversation(&self, conversation_id: &str) -> String {
        format!("{}:conversation:{conversation_id}", self.prefix)
    }

    /// Sorted set of known conversation ids, scored by `updated_at`.
    pub fn conversation_index(&self) -> String {
        format!("{}:conversation:index", self.prefix)
    }

    /// TTL-bounded message log for a conversation.
    pub fn messages(&self, conversation_id: &str) -> String {
        format!("{}:conversation:{conversation_id}:messages", self.prefix)
    }

    /// Pending sorted set of waiting conversations.
    pub fn queue_pending(&self) -> String {
        format!("{}:queue:pending", self.prefix)
    }

    /// Assignment ownership lease for a conversation.
    pub fn assignment(&self, conversation_id: &str) -> String {
        format!("{}:assignment:{conversation_id}", self.prefix)
    }

    /// Short-TTL liveness flag for a participant.
    pub fn presence(&self, participant_id: &str) -> String {
        format!("{}:presence:{participant_id}", self.prefix)
    }

    /// Per-agent load record.
    pub fn agent_load(&self, agent_id: &str) -> String {
        format!("{}:agent:{agent_id}:load", self.prefix)
    }

    /// Mutual-exclusion lock name for one conversation's transitions.
    pub fn conversation_lock(&self, conversation_id: &str) -> String {
        format!("lock:conversation:{conversation_id}")
    }

    /// Lock name for bulk queue maintenance.
    pub fn queue_lock(&self) -> String {
        "lock:queue".to_string()
    }

    /// Pub/sub channel carrying lifecycle events.
    pub fn lifecycle_channel(&self) -> String {
        "chat.lifecycle".to_string()
    }

    /// Pub/sub channel carrying message events.
    pub fn message_channel(&self) -> String {
        "chat.messages".to_string()
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("parley")
    }
}
