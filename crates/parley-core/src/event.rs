// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle and message events published on the event bus.
//!
//! Delivery is at-least-once; consumers dedupe by event or message id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use crate::types::ChatMessage;

/// Kind of lifecycle transition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatEventType {
    ConversationStarted,
    ConversationQueued,
    ConversationAccepted,
    ConversationReassigned,
    MessageReceived,
    ConversationClosed,
}

/// A lifecycle transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEvent {
    pub event_id: String,
    pub conversation_id: String,
    #[serde(rename = "type")]
    pub kind: ChatEventType,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

impl ChatEvent {
    /// Build an event with a fresh id stamped now.
    pub fn new(conversation_id: impl Into<String>, kind: ChatEventType, payload: Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            kind,
            occurred_at: Utc::now(),
            payload,
        }
    }
}

/// A full message record fanned out to room subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub event_id: String,
    pub conversation_id: String,
    pub message: ChatMessage,
    pub occurred_at: DateTime<Utc>,
}

impl MessageEvent {
    pub fn new(message: ChatMessage) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            occurred_at: message.timestamp,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageType, Participant};

    #[test]
    fn event_type_wire_form() {
        let json = serde_json::to_string(&ChatEventType::ConversationAccepted).unwrap();
        assert_eq!(json, "\"CONVERSATION_ACCEPTED\"");
    }

    #[test]
    fn chat_event_round_trips() {
        let event = ChatEvent::new(
            "c-1",
            ChatEventType::ConversationQueued,
            serde_json::json!({"queuePosition": 0}),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_id, event.event_id);
        assert_eq!(back.kind, ChatEventType::ConversationQueued);
        assert_eq!(back.payload["queuePosition"], 0);
    }

    #[test]
    fn message_event_copies_conversation_id() {
        let message = ChatMessage::new("c-9", Participant::system(), MessageType::System, "closed");
        let event = MessageEvent::new(message.clone());
        assert_eq!(event.conversation_id, "c-9");
        assert_eq!(event.occurred_at, message.timestamp);
        assert_eq!(event.message.id, message.id);
    }
}
