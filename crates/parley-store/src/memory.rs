// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The in-process ephemeral store engine.
//!
//! All key/value and sorted-set state lives behind one mutex, so every trait
//! method — including the claim script — executes as one indivisible step.
//! Expiry is lazy: an expired entry is dropped on the access that observes it.
//! Named locks are tokio mutexes, which queue waiters FIFO, giving the fair
//! acquisition order the coordinator's lock discipline requires. The lease
//! parameter is advisory here: an in-process holder releases on drop, panics
//! included, so a wedged holder cannot outlive its task.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::time::Instant;

use parley_core::traits::store::{ClaimOutcome, EphemeralStore, LockGuard};
use parley_core::ChatError;

/// Broadcast capacity per pub/sub channel; lagging receivers drop oldest.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// A sorted set: members ranked by `(score, insertion seq)`.
#[derive(Debug, Default)]
struct SortedSet {
    by_rank: BTreeMap<(i64, u64), String>,
    index: HashMap<String, (i64, u64)>,
    seq: u64,
}

impl SortedSet {
    fn insert(&mut self, member: String, score: i64) {
        if let Some(rank) = self.index.remove(&member) {
            self.by_rank.remove(&rank);
        }
        let rank = (score, self.seq);
        self.seq += 1;
        self.index.insert(member.clone(), rank);
        self.by_rank.insert(rank, member);
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.index.remove(member) {
            Some(rank) => {
                self.by_rank.remove(&rank);
                true
            }
            None => false,
        }
    }

    fn members(&self) -> impl Iterator<Item = &String> {
        self.by_rank.values()
    }
}

#[derive(Default)]
struct Shared {
    kv: HashMap<String, KvEntry>,
    zsets: HashMap<String, SortedSet>,
}

impl Shared {
    /// Read a key, dropping it if expired.
    fn get_live(&mut self, key: &str) -> Option<&KvEntry> {
        let now = Instant::now();
        if self.kv.get(key).is_some_and(|e| !e.live(now)) {
            self.kv.remove(key);
        }
        self.kv.get(key)
    }
}

/// In-process ephemeral store.
///
/// Cheap to clone via [`Arc`]; every gateway instance in the process shares
/// one `MemoryStore` so pub/sub spans instances the way a networked engine
/// would.
#[derive(Default)]
pub struct MemoryStore {
    shared: Mutex<Shared>,
    channels: DashMap<String, broadcast::Sender<String>>,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        // A poisoned mutex means a writer panicked mid-update; state is
        // still structurally sound because no method leaves a partial write.
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl EphemeralStore for MemoryStore {
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ChatError> {
        let mut shared = self.shared();
        shared.kv.insert(
            key.to_string(),
            KvEntry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let mut shared = self.shared();
        Ok(shared.get_live(key).map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, ChatError> {
        let mut shared = self.shared();
        let existed = shared.get_live(key).is_some();
        shared.kv.remove(key);
        Ok(existed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, ChatError> {
        let mut shared = self.shared();
        if shared.get_live(key).is_none() {
            return Ok(false);
        }
        if let Some(entry) = shared.kv.get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(true)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<(), ChatError> {
        let mut shared = self.shared();
        shared
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, ChatError> {
        let shared = self.shared();
        let Some(zset) = shared.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let len = zset.index.len() as i64;
        let stop = if stop < 0 { len + stop } else { stop };
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }
        Ok(zset
            .members()
            .skip(start.max(0) as usize)
            .take((stop - start.max(0) + 1).max(0) as usize)
            .cloned()
            .collect())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, ChatError> {
        let shared = self.shared();
        let Some(zset) = shared.zsets.get(key) else {
            return Ok(Vec::new());
        };
        Ok(zset
            .by_rank
            .range((min, u64::MIN)..=(max, u64::MAX))
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ChatError> {
        let mut shared = self.shared();
        Ok(shared
            .zsets
            .get_mut(key)
            .is_some_and(|zset| zset.remove(member)))
    }

    async fn claim(
        &self,
        queue_key: &str,
        assignment_key: &str,
        conversation_id: &str,
        agent_id: &str,
        ttl: Duration,
    ) -> Result<ClaimOutcome, ChatError> {
        // Single guard across the whole evaluation: this is the indivisible
        // claim script.
        let mut shared = self.shared();

        let owner = shared.get_live(assignment_key).map(|e| e.value.clone());
        if owner.as_deref().is_some_and(|o| o != agent_id) {
            return Ok(ClaimOutcome::Busy);
        }

        let matching = shared.zsets.get(queue_key).and_then(|zset| {
            zset.members()
                .find(|raw| {
                    serde_json::from_str::<serde_json::Value>(raw)
                        .ok()
                        .and_then(|v| {
                            v.get("conversationId")
                                .and_then(|id| id.as_str())
                                .map(|id| id == conversation_id)
                        })
                        .unwrap_or(false)
                })
                .cloned()
        });

        if let Some(raw) = matching {
            if let Some(zset) = shared.zsets.get_mut(queue_key) {
                zset.remove(&raw);
            }
            shared.kv.insert(
                assignment_key.to_string(),
                KvEntry {
                    value: agent_id.to_string(),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            return Ok(ClaimOutcome::Claimed(raw));
        }

        if owner.as_deref() == Some(agent_id) {
            if let Some(entry) = shared.kv.get_mut(assignment_key) {
                entry.expires_at = Some(Instant::now() + ttl);
            }
            return Ok(ClaimOutcome::Owned);
        }

        Ok(ClaimOutcome::Missing)
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), ChatError> {
        // A send error only means no subscriber is currently listening.
        let _ = self.sender(channel).send(payload.to_string());
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender(channel).subscribe()
    }

    async fn lock(
        &self,
        name: &str,
        acquire_timeout: Duration,
        _lease: Duration,
    ) -> Result<LockGuard, ChatError> {
        let mutex = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        match tokio::time::timeout(acquire_timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(LockGuard::new(guard)),
            Err(_) => Err(ChatError::Contention {
                name: name.to_string(),
                waited_ms: acquire_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_json(conversation_id: &str) -> String {
        format!(
            r#"{{"conversationId":"{conversation_id}","customerId":"cust","channel":"web","enqueuedAt":"2026-01-01T00:00:00Z"}}"#
        )
    }

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = MemoryStore::new();
        store.put("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expires_keys() {
        let store = MemoryStore::new();
        store
            .put("lease", "ag-1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(store.get("lease").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("lease").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_resets_ttl() {
        let store = MemoryStore::new();
        store
            .put("lease", "ag-1", Some(Duration::from_secs(5)))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.expire("lease", Duration::from_secs(10)).await.unwrap());
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("lease").await.unwrap().is_some());

        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn zrange_orders_by_score_then_insertion() {
        let store = MemoryStore::new();
        store.zadd("q", "b", 200).await.unwrap();
        store.zadd("q", "a", 100).await.unwrap();
        store.zadd("q", "c", 200).await.unwrap();

        let all = store.zrange("q", 0, -1).await.unwrap();
        assert_eq!(all, vec!["a", "b", "c"], "score order, ties by insertion");

        let first = store.zrange("q", 0, 0).await.unwrap();
        assert_eq!(first, vec!["a"]);
    }

    #[tokio::test]
    async fn zadd_replaces_existing_member_score() {
        let store = MemoryStore::new();
        store.zadd("q", "a", 100).await.unwrap();
        store.zadd("q", "b", 200).await.unwrap();
        store.zadd("q", "a", 300).await.unwrap();

        let all = store.zrange("q", 0, -1).await.unwrap();
        assert_eq!(all, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn zrange_by_score_bounds_inclusive() {
        let store = MemoryStore::new();
        store.zadd("q", "a", 100).await.unwrap();
        store.zadd("q", "b", 200).await.unwrap();
        store.zadd("q", "c", 300).await.unwrap();

        let mid = store.zrange_by_score("q", 100, 200).await.unwrap();
        assert_eq!(mid, vec!["a", "b"]);
        let none = store.zrange_by_score("q", 400, 500).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn claim_missing_when_not_queued() {
        let store = MemoryStore::new();
        let outcome = store
            .claim("q", "assign:c-1", "c-1", "ag-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Missing);
    }

    #[tokio::test]
    async fn claim_removes_entry_and_sets_owner() {
        let store = MemoryStore::new();
        let raw = entry_json("c-1");
        store.zadd("q", &raw, 1000).await.unwrap();

        let outcome = store
            .claim("q", "assign:c-1", "c-1", "ag-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed(raw));
        assert!(store.zrange("q", 0, -1).await.unwrap().is_empty());
        assert_eq!(
            store.get("assign:c-1").await.unwrap().as_deref(),
            Some("ag-1")
        );
    }

    #[tokio::test]
    async fn claim_busy_for_other_owner_and_owned_for_self() {
        let store = MemoryStore::new();
        store
            .put("assign:c-1", "ag-1", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let busy = store
            .claim("q", "assign:c-1", "c-1", "ag-2", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(busy, ClaimOutcome::Busy);

        let owned = store
            .claim("q", "assign:c-1", "c-1", "ag-1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(owned, ClaimOutcome::Owned);
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        store.zadd("q", &entry_json("c-1"), 1000).await.unwrap();

        let mut handles = Vec::new();
        for agent in ["ag-1", "ag-2", "ag-3", "ag-4"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .claim("q", "assign:c-1", "c-1", agent, Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ClaimOutcome::Claimed(_)) {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1, "exactly one concurrent claim may win");
    }

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("chat.lifecycle");
        store.publish("chat.lifecycle", "payload").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "payload");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let store = MemoryStore::new();
        store.publish("nobody-listening", "payload").await.unwrap();
    }

    #[tokio::test]
    async fn lock_times_out_under_contention() {
        let store = Arc::new(MemoryStore::new());
        let held = store
            .lock("lock:conversation:c-1", Duration::from_secs(1), Duration::from_secs(10))
            .await
            .unwrap();

        let result = store
            .lock(
                "lock:conversation:c-1",
                Duration::from_millis(50),
                Duration::from_secs(10),
            )
            .await;
        assert!(matches!(result, Err(ChatError::Contention { .. })));

        drop(held);
        let reacquired = store
            .lock("lock:conversation:c-1", Duration::from_secs(1), Duration::from_secs(10))
            .await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn distinct_lock_names_do_not_contend() {
        let store = MemoryStore::new();
        let _a = store
            .lock("lock:conversation:c-1", Duration::from_millis(50), Duration::from_secs(10))
            .await
            .unwrap();
        let b = store
            .lock("lock:conversation:c-2", Duration::from_millis(50), Duration::from_secs(10))
            .await;
        assert!(b.is_ok());
    }
}
