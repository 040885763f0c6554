// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ephemeral store seam: atomic key/value with TTL, sorted sets, the claim
//! script, pub/sub, and fair named locks.
//!
//! The coordinator is written against this trait; `parley-store` provides the
//! in-process engine and a networked key/value engine can be plugged at the
//! same seam. Every method is atomic per key; [`EphemeralStore::claim`] is
//! atomic across its two keys and is the single-winner primitive the rest of
//! the system relies on.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ChatError;

/// Outcome of the atomic claim evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The entry was removed from the queue and ownership was set; carries the
    /// raw queue member that was removed.
    Claimed(String),
    /// The caller already owned the assignment; the lease TTL was refreshed.
    Owned,
    /// Another agent owns the assignment.
    Busy,
    /// No queue entry and no ownership to refresh.
    Missing,
}

/// A held named lock. Dropping the guard releases the lock.
pub struct LockGuard {
    _held: Box<dyn Send>,
}

impl LockGuard {
    /// Wrap whatever token the store uses to represent the held lock.
    pub fn new(held: impl Send + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LockGuard")
    }
}

/// Key/value engine offering atomic scripts, sorted sets, pub/sub, and TTL.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Set `key` to `value`, with an optional TTL.
    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), ChatError>;

    /// Read `key`; `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, ChatError>;

    /// Delete `key`; true when it existed.
    async fn delete(&self, key: &str) -> Result<bool, ChatError>;

    /// Reset the TTL of `key`; true when it existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, ChatError>;

    /// Insert `member` into the sorted set at `key` with `score`, replacing
    /// any previous score for the same member.
    async fn zadd(&self, key: &str, member: &str, score: i64) -> Result<(), ChatError>;

    /// Members of the sorted set in score order. `stop` is inclusive; `-1`
    /// means the end of the set.
    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, ChatError>;

    /// Members with `min <= score <= max`, in score order.
    async fn zrange_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<Vec<String>, ChatError>;

    /// Remove `member` from the sorted set; true when it was present.
    async fn zrem(&self, key: &str, member: &str) -> Result<bool, ChatError>;

    /// The single-winner claim script, executed in one indivisible evaluation:
    /// read ownership at `assignment_key`; if owned by another agent return
    /// [`ClaimOutcome::Busy`]; else scan `queue_key` for the member whose
    /// `conversationId` matches, remove it and set ownership with `ttl`
    /// ([`ClaimOutcome::Claimed`]); else if already owned by this agent
    /// refresh the TTL ([`ClaimOutcome::Owned`]); else
    /// [`ClaimOutcome::Missing`].
    async fn claim(
        &self,
        queue_key: &str,
        assignment_key: &str,
        conversation_id: &str,
        agent_id: &str,
        ttl: Duration,
    ) -> Result<ClaimOutcome, ChatError>;

    /// Publish `payload` to all current subscribers of `channel`.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), ChatError>;

    /// Subscribe to `channel`. Delivery is at-least-once from the moment of
    /// subscription; lagging receivers drop oldest first.
    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String>;

    /// Acquire the fair named lock `name`, waiting at most `acquire_timeout`.
    /// `lease` bounds how long a dead holder can wedge the lock.
    async fn lock(
        &self,
        name: &str,
        acquire_timeout: Duration,
        lease: Duration,
    ) -> Result<LockGuard, ChatError>;
}
