// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`AuditStore`] seam.

use async_trait::async_trait;

use parley_core::traits::AuditStore;
use parley_core::types::{ChatMessage, Conversation};
use parley_core::ChatError;

use crate::database::Database;
use crate::queries;

/// SQLite-backed audit projection.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
pub struct SqliteAudit {
    db: Database,
}

impl SqliteAudit {
    /// Open (or create) the audit database at `path`.
    pub async fn open(path: &str) -> Result<Self, ChatError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    /// Checkpoint and close the database.
    pub async fn close(&self) -> Result<(), ChatError> {
        self.db.close().await
    }
}

#[async_trait]
impl AuditStore for SqliteAudit {
    async fn record_conversation(&self, conversation: &Conversation) -> Result<(), ChatError> {
        queries::conversations::upsert_conversation(&self.db, conversation).await
    }

    async fn record_message(&self, message: &ChatMessage) -> Result<(), ChatError> {
        queries::messages::insert_message(&self.db, message).await
    }

    async fn conversation(&self, id: &str) -> Result<Option<Conversation>, ChatError> {
        queries::conversations::get_conversation(&self.db, id).await
    }

    async fn messages(
        &self,
        conversation_id: &str,
        limit: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        queries::messages::get_messages(&self.db, conversation_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::{MessageType, Participant, ParticipantType};
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[tokio::test]
    async fn full_audit_trail_through_adapter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.db");
        let audit = SqliteAudit::open(path.to_str().unwrap()).await.unwrap();

        let customer = Participant {
            id: "cust-1".into(),
            kind: ParticipantType::Customer,
            display_name: "C".into(),
            attributes: HashMap::new(),
        };
        let conversation = Conversation::open(customer.clone(), HashMap::new());
        audit.record_conversation(&conversation).await.unwrap();

        let message =
            ChatMessage::new(conversation.id.clone(), customer, MessageType::Text, "hi");
        audit.record_message(&message).await.unwrap();

        let back = audit.conversation(&conversation.id).await.unwrap().unwrap();
        assert_eq!(back.id, conversation.id);

        let messages = audit.messages(&conversation.id, None).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hi");

        audit.close().await.unwrap();
    }
}
