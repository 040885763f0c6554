// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Parley workspace.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A party to a conversation.
///
/// Customers are identified by a token plus device fingerprint, agents by an
/// opaque agent id. [`ParticipantType::System`] is a sentinel used only for
/// closure notices authored by the coordinator itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ParticipantType,
    pub display_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl Participant {
    /// The sentinel author of coordinator-generated system messages.
    pub fn system() -> Self {
        Self {
            id: "system".to_string(),
            kind: ParticipantType::System,
            display_name: "System".to_string(),
            attributes: HashMap::new(),
        }
    }
}

/// Kind of participant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantType {
    Customer,
    Agent,
    System,
}

/// Lifecycle status of a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationStatus {
    Open,
    Queued,
    Assigned,
    Closed,
}

/// One customer-agent chat session; the lifecycle unit of the coordinator.
///
/// Invariants:
/// - `agent` is present whenever `status` is ASSIGNED (or CLOSED from ASSIGNED).
/// - `closed_at` is set iff `status == Closed`; `accepted_at` is set iff the
///   conversation ever reached ASSIGNED.
/// - once CLOSED, no field other than `updated_at` mutates.
/// - `updated_at` is monotonically non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub customer: Participant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Participant>,
    pub status: ConversationStatus,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a fresh OPEN conversation for `customer`.
    pub fn open(customer: Participant, attributes: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            customer,
            agent: None,
            status: ConversationStatus::Open,
            attributes,
            created_at: now,
            accepted_at: None,
            closed_at: None,
            updated_at: now,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == ConversationStatus::Closed
    }

    /// True when `agent_id` currently owns this conversation.
    pub fn owned_by(&self, agent_id: &str) -> bool {
        self.agent.as_ref().is_some_and(|a| a.id == agent_id)
    }
}

/// Kind of chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    System,
}

/// A single message within a conversation.
///
/// Messages are append-only; `id` is unique and messages are appended in
/// timestamp order per conversation. SYSTEM messages are written only by the
/// coordinator itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender: Participant,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    /// Build a message with a fresh id stamped now.
    pub fn new(
        conversation_id: impl Into<String>,
        sender: Participant,
        kind: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            sender,
            kind,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A waiting conversation in the shared agent queue.
///
/// Scored by `enqueued_at` (ms epoch) in the pending sorted set to enforce
/// FIFO. A conversation appears in the queue at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub conversation_id: String,
    pub customer_id: String,
    pub channel: String,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    /// Sorted-set score for this entry.
    pub fn score(&self) -> i64 {
        self.enqueued_at.timestamp_millis()
    }
}
