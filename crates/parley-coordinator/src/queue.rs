// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! FIFO queue of waiting conversations over the ephemeral store.
//!
//! Entries are JSON members of one sorted set, scored by `enqueued_at` in
//! ms epoch. Individual operations rely on the store's own atomicity; only
//! bulk maintenance takes the queue lock (the coordinator holds it).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use parley_core::traits::store::ClaimOutcome;
use parley_core::types::QueueEntry;
use parley_core::{ChatError, EphemeralStore, KeySpace};

/// Outcome class of [`QueueEngine::claim_for_agent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimStatus {
    Claimed,
    Owned,
    Busy,
    Missing,
}

/// Result of a claim attempt; `entry` is set only for [`ClaimStatus::Claimed`].
#[derive(Debug, Clone)]
pub struct ClaimResult {
    pub status: ClaimStatus,
    pub entry: Option<QueueEntry>,
}

/// The shared agent queue.
#[derive(Clone)]
pub struct QueueEngine {
    store: Arc<dyn EphemeralStore>,
    keys: KeySpace,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn EphemeralStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Insert `entry` at its `enqueued_at` score. Callers guarantee at most
    /// one entry per conversation by holding the conversation lock.
    pub async fn enqueue(&self, entry: &QueueEntry) -> Result<(), ChatError> {
        let raw = serde_json::to_string(entry).map_err(ChatError::backend)?;
        self.store
            .zadd(&self.keys.queue_pending(), &raw, entry.score())
            .await?;
        debug!(conversation_id = %entry.conversation_id, "queue entry added");
        Ok(())
    }

    /// Atomically claim a queued conversation for `agent_id`.
    ///
    /// This is the only point where ownership is decided; the store executes
    /// the whole evaluation as one indivisible step.
    pub async fn claim_for_agent(
        &self,
        conversation_id: &str,
        agent_id: &str,
        ttl: Duration,
    ) -> Result<ClaimResult, ChatError> {
        let outcome = self
            .store
            .claim(
                &self.keys.queue_pending(),
                &self.keys.assignment(conversation_id),
                conversation_id,
                agent_id,
                ttl,
            )
            .await?;

        Ok(match outcome {
            ClaimOutcome::Claimed(raw) => ClaimResult {
                status: ClaimStatus::Claimed,
                entry: serde_json::from_str(&raw).ok(),
            },
            ClaimOutcome::Owned => ClaimResult {
                status: ClaimStatus::Owned,
                entry: None,
            },
            ClaimOutcome::Busy => ClaimResult {
                status: ClaimStatus::Busy,
                entry: None,
            },
            ClaimOutcome::Missing => ClaimResult {
                status: ClaimStatus::Missing,
                entry: None,
            },
        })
    }

    /// The oldest waiting entry, if any.
    pub async fn peek(&self) -> Result<Option<QueueEntry>, ChatError> {
        let members = self.store.zrange(&self.keys.queue_pending(), 0, 0).await?;
        Ok(members.first().and_then(|raw| deserialize(raw)))
    }

    /// Remove the entry for `conversation_id`, returning it when present.
    pub async fn remove(&self, conversation_id: &str) -> Result<Option<QueueEntry>, ChatError> {
        let key = self.keys.queue_pending();
        for raw in self.store.zrange(&key, 0, -1).await? {
            if let Some(entry) = deserialize(&raw) {
                if entry.conversation_id == conversation_id {
                    self.store.zrem(&key, &raw).await?;
                    return Ok(Some(entry));
                }
            }
        }
        Ok(None)
    }

    /// Up to `limit` waiting entries in FIFO order.
    pub async fn list(&self, limit: usize) -> Result<Vec<QueueEntry>, ChatError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let members = self
            .store
            .zrange(&self.keys.queue_pending(), 0, limit as i64 - 1)
            .await?;
        Ok(members.iter().filter_map(|raw| deserialize(raw)).collect())
    }

    /// 0-based FIFO position of a conversation, or -1 when absent.
    pub async fn position(&self, conversation_id: &str) -> Result<i64, ChatError> {
        let members = self.store.zrange(&self.keys.queue_pending(), 0, -1).await?;
        for (index, raw) in members.iter().enumerate() {
            if deserialize(raw).is_some_and(|e| e.conversation_id == conversation_id) {
                return Ok(index as i64);
            }
        }
        Ok(-1)
    }

    /// Reinsert the entry for `conversation_id` at the current timestamp,
    /// bumping an aging entry to the back of the queue.
    pub async fn touch(&self, conversation_id: &str) -> Result<(), ChatError> {
        let Some(entry) = self.remove(conversation_id).await? else {
            return Ok(());
        };
        let bumped = QueueEntry {
            enqueued_at: Utc::now(),
            ..entry
        };
        self.enqueue(&bumped).await
    }

    /// Remove and return entries older than `age`. Callers close the
    /// affected conversations so UIs clear.
    pub async fn purge_older_than(&self, age: Duration) -> Result<Vec<QueueEntry>, ChatError> {
        if age.is_zero() {
            return Ok(Vec::new());
        }
        let cutoff = Utc::now().timestamp_millis() - age.as_millis() as i64;
        let key = self.keys.queue_pending();
        let stale = self.store.zrange_by_score(&key, 0, cutoff).await?;

        let mut removed = Vec::new();
        for raw in stale {
            if let Some(entry) = deserialize(&raw) {
                self.store.zrem(&key, &raw).await?;
                removed.push(entry);
            }
        }
        Ok(removed)
    }
}

fn deserialize(raw: &str) -> Option<QueueEntry> {
    serde_json::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use parley_store::MemoryStore;

    fn engine() -> QueueEngine {
        QueueEngine::new(Arc::new(MemoryStore::new()), KeySpace::default())
    }

    fn entry_at(conversation_id: &str, enqueued_at: DateTime<Utc>) -> QueueEntry {
        QueueEntry {
            conversation_id: conversation_id.to_string(),
            customer_id: format!("cust-{conversation_id}"),
            channel: "web".to_string(),
            enqueued_at,
        }
    }

    #[tokio::test]
    async fn enqueue_peek_and_list_are_fifo() {
        let queue = engine();
        let base = Utc::now();
        queue.enqueue(&entry_at("c-2", base + ChronoDuration::seconds(1))).await.unwrap();
        queue.enqueue(&entry_at("c-1", base)).await.unwrap();
        queue.enqueue(&entry_at("c-3", base + ChronoDuration::seconds(2))).await.unwrap();

        let head = queue.peek().await.unwrap().unwrap();
        assert_eq!(head.conversation_id, "c-1");

        let ids: Vec<_> = queue
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.conversation_id)
            .collect();
        assert_eq!(ids, vec!["c-1", "c-2", "c-3"]);

        let limited = queue.list(2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert!(queue.list(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn position_tracks_fifo_index() {
        let queue = engine();
        let base = Utc::now();
        queue.enqueue(&entry_at("c-1", base)).await.unwrap();
        queue.enqueue(&entry_at("c-2", base + ChronoDuration::seconds(1))).await.unwrap();

        assert_eq!(queue.position("c-1").await.unwrap(), 0);
        assert_eq!(queue.position("c-2").await.unwrap(), 1);
        assert_eq!(queue.position("absent").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn remove_returns_the_entry_once() {
        let queue = engine();
        queue.enqueue(&entry_at("c-1", Utc::now())).await.unwrap();

        let removed = queue.remove("c-1").await.unwrap();
        assert_eq!(removed.unwrap().conversation_id, "c-1");
        assert!(queue.remove("c-1").await.unwrap().is_none());
        assert!(queue.peek().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_removes_entry_and_reports_outcomes() {
        let queue = engine();
        queue.enqueue(&entry_at("c-1", Utc::now())).await.unwrap();
        let ttl = Duration::from_secs(60);

        let claimed = queue.claim_for_agent("c-1", "ag-1", ttl).await.unwrap();
        assert_eq!(claimed.status, ClaimStatus::Claimed);
        assert_eq!(claimed.entry.unwrap().conversation_id, "c-1");

        // Second claim by the owner refreshes the lease.
        let owned = queue.claim_for_agent("c-1", "ag-1", ttl).await.unwrap();
        assert_eq!(owned.status, ClaimStatus::Owned);

        // A competitor is rejected outright.
        let busy = queue.claim_for_agent("c-1", "ag-2", ttl).await.unwrap();
        assert_eq!(busy.status, ClaimStatus::Busy);

        // A conversation that was never queued is missing.
        let missing = queue.claim_for_agent("c-9", "ag-3", ttl).await.unwrap();
        assert_eq!(missing.status, ClaimStatus::Missing);
    }

    #[tokio::test]
    async fn touch_moves_entry_to_the_back() {
        let queue = engine();
        let base = Utc::now() - ChronoDuration::minutes(10);
        queue.enqueue(&entry_at("c-1", base)).await.unwrap();
        queue.enqueue(&entry_at("c-2", base + ChronoDuration::seconds(1))).await.unwrap();

        queue.touch("c-1").await.unwrap();
        let ids: Vec<_> = queue
            .list(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.conversation_id)
            .collect();
        assert_eq!(ids, vec!["c-2", "c-1"]);
    }

    #[tokio::test]
    async fn purge_removes_only_stale_entries() {
        let queue = engine();
        let now = Utc::now();
        queue.enqueue(&entry_at("stale", now - ChronoDuration::hours(2))).await.unwrap();
        queue.enqueue(&entry_at("fresh", now)).await.unwrap();

        let removed = queue
            .purge_older_than(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].conversation_id, "stale");

        let remaining = queue.list(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].conversation_id, "fresh");
    }

    #[tokio::test]
    async fn purge_with_zero_age_is_noop() {
        let queue = engine();
        queue.enqueue(&entry_at("c-1", Utc::now() - ChronoDuration::hours(5))).await.unwrap();
        let removed = queue.purge_older_than(Duration::ZERO).await.unwrap();
        assert!(removed.is_empty());
        assert_eq!(queue.list(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn purge_on_young_entry_is_noop() {
        let queue = engine();
        queue.enqueue(&entry_at("c-1", Utc::now())).await.unwrap();
        let removed = queue
            .purge_older_than(Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(removed.is_empty());
        assert_eq!(queue.position("c-1").await.unwrap(), 0);
    }
}
