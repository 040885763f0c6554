// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live conversation state and the TTL-bounded message log.
//!
//! Conversations are JSON values under `{p}:conversation:{id}` with the
//! retention TTL; an index sorted set scored by `updated_at` supports
//! enumeration. The message log is a sorted set scored by timestamp and is
//! pruned past retention on append; the audit store keeps the durable copy.

use std::sync::Arc;
use std::time::Duration;

use parley_core::types::{ChatMessage, Conversation};
use parley_core::{ChatError, EphemeralStore, KeySpace};

/// Reads and writes the live projection in the ephemeral store.
#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn EphemeralStore>,
    keys: KeySpace,
    retention: Duration,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn EphemeralStore>, keys: KeySpace, retention: Duration) -> Self {
        Self {
            store,
            keys,
            retention,
        }
    }

    /// Write the current snapshot and refresh its retention TTL.
    pub async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let raw = serde_json::to_string(conversation).map_err(ChatError::backend)?;
        self.store
            .put(
                &self.keys.conversation(&conversation.id),
                &raw,
                Some(self.retention),
            )
            .await?;
        self.store
            .zadd(
                &self.keys.conversation_index(),
                &conversation.id,
                conversation.updated_at.timestamp_millis(),
            )
            .await
    }

    /// Read one live conversation.
    pub async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, ChatError> {
        let raw = self
            .store
            .get(&self.keys.conversation(conversation_id))
            .await?;
        Ok(raw.and_then(|raw| serde_json::from_str(&raw).ok()))
    }

    /// All live conversations, oldest-updated first. Ids whose records have
    /// expired are dropped from the index as they are observed.
    pub async fn find_all(&self) -> Result<Vec<Conversation>, ChatError> {
        let index_key = self.keys.conversation_index();
        let ids = self.store.zrange(&index_key, 0, -1).await?;
        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(&id).await? {
                Some(conversation) => conversations.push(conversation),
                None => {
                    self.store.zrem(&index_key, &id).await?;
                }
            }
        }
        Ok(conversations)
    }

    /// Append one message to the log and prune entries past retention.
    pub async fn append_message(&self, message: &ChatMessage) -> Result<(), ChatError> {
        let key = self.keys.messages(&message.conversation_id);
        let raw = serde_json::to_string(message).map_err(ChatError::backend)?;
        self.store
            .zadd(&key, &raw, message.timestamp.timestamp_millis())
            .await?;

        let cutoff = chrono::Utc::now().timestamp_millis() - self.retention.as_millis() as i64;
        for stale in self.store.zrange_by_score(&key, 0, cutoff).await? {
            self.store.zrem(&key, &stale).await?;
        }
        Ok(())
    }

    /// The most recent `limit` messages, in send order.
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let members = self
            .store
            .zrange(&self.keys.messages(conversation_id), 0, -1)
            .await?;
        let mut messages: Vec<ChatMessage> = members
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect();
        if messages.len() > limit {
            messages.drain(..messages.len() - limit);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use parley_core::types::{MessageType, Participant, ParticipantType};
    use parley_store::MemoryStore;
    use std::collections::HashMap;

    fn repository() -> ConversationRepository {
        ConversationRepository::new(
            Arc::new(MemoryStore::new()),
            KeySpace::default(),
            Duration::from_secs(3600),
        )
    }

    fn customer(id: &str) -> Participant {
        Participant {
            id: id.to_string(),
            kind: ParticipantType::Customer,
            display_name: "C".into(),
            attributes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn save_then_get_round_trips() {
        let repo = repository();
        let conversation = Conversation::open(customer("cust-1"), HashMap::new());
        repo.save(&conversation).await.unwrap();

        let back = repo.get(&conversation.id).await.unwrap().unwrap();
        assert_eq!(back.id, conversation.id);
        assert_eq!(back.customer.id, "cust-1");

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_all_lists_saved_conversations() {
        let repo = repository();
        let a = Conversation::open(customer("cust-1"), HashMap::new());
        let b = Conversation::open(customer("cust-2"), HashMap::new());
        repo.save(&a).await.unwrap();
        repo.save(&b).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn messages_keep_send_order_and_tail_limit() {
        let repo = repository();
        let base = Utc::now();
        for i in 0..5 {
            let message = ChatMessage {
                id: format!("m{i}"),
                conversation_id: "c-1".into(),
                sender: customer("cust-1"),
                kind: MessageType::Text,
                content: format!("msg {i}"),
                timestamp: base + ChronoDuration::seconds(i),
            };
            repo.append_message(&message).await.unwrap();
        }

        let all = repo.recent_messages("c-1", 100).await.unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);

        // Tail semantics: the most recent N, still in send order.
        let tail = repo.recent_messages("c-1", 2).await.unwrap();
        let tail_ids: Vec<_> = tail.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(tail_ids, vec!["m3", "m4"]);
    }

    #[tokio::test]
    async fn append_prunes_past_retention() {
        let repo = repository();
        let old = ChatMessage {
            id: "old".into(),
            conversation_id: "c-1".into(),
            sender: customer("cust-1"),
            kind: MessageType::Text,
            content: "stale".into(),
            timestamp: Utc::now() - ChronoDuration::hours(2),
        };
        repo.append_message(&old).await.unwrap();

        let fresh = ChatMessage::new("c-1", customer("cust-1"), MessageType::Text, "live");
        repo.append_message(&fresh).await.unwrap();

        let messages = repo.recent_messages("c-1", 100).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "live");
    }
}
