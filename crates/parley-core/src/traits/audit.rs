// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit store seam: the durable, append-mostly projection of conversations.
//!
//! The audit store is never the live read path; the coordinator writes to it
//! inside each transition so a failed write aborts the transition before any
//! events are published.

use async_trait::async_trait;

use crate::error::ChatError;
use crate::types::{ChatMessage, Conversation};

/// Relational projection of conversations and messages, retained permanently.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Upsert the current conversation snapshot.
    async fn record_conversation(&self, conversation: &Conversation) -> Result<(), ChatError>;

    /// Append one message row.
    async fn record_message(&self, message: &ChatMessage) -> Result<(), ChatError>;

    /// Read back one conversation snapshot.
    async fn conversation(&self, id: &str) -> Result<Option<Conversation>, ChatError>;

    /// Messages of a conversation in timestamp order.
    async fn messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ChatError>;
}
