// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-agent concurrency accounting.
//!
//! The registry is the fast per-node admission view; the assignment lease in
//! the ephemeral store is authoritative. The coordinator keeps the two in
//! sync under the conversation lock, and a stale registry entry that
//! outlives its lease is recovered by the maintenance sweeper.

use std::collections::HashSet;

use dashmap::DashMap;

/// Tracks which conversations each agent currently holds.
pub struct AssignmentRegistry {
    load: DashMap<String, HashSet<String>>,
    max_concurrent: usize,
}

impl AssignmentRegistry {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            load: DashMap::new(),
            max_concurrent,
        }
    }

    /// True iff the agent is below its concurrency bound.
    pub fn can_assign(&self, agent_id: &str) -> bool {
        self.load
            .get(agent_id)
            .map_or(true, |set| set.len() < self.max_concurrent)
    }

    /// Record ownership of `conversation_id` by `agent_id`. Idempotent.
    pub fn register(&self, agent_id: &str, conversation_id: &str) {
        self.load
            .entry(agent_id.to_string())
            .or_default()
            .insert(conversation_id.to_string());
    }

    /// Drop ownership of `conversation_id` by `agent_id`. Idempotent.
    pub fn remove(&self, agent_id: &str, conversation_id: &str) {
        let emptied = self
            .load
            .get_mut(agent_id)
            .map(|mut set| {
                set.remove(conversation_id);
                set.is_empty()
            })
            .unwrap_or(false);
        if emptied {
            self.load.remove_if(agent_id, |_, set| set.is_empty());
        }
    }

    /// The conversations currently registered to an agent.
    pub fn assignments_of(&self, agent_id: &str) -> HashSet<String> {
        self.load
            .get(agent_id)
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    /// All (agent, conversations) pairs; used by the liveness sweeper.
    pub fn all(&self) -> Vec<(String, Vec<String>)> {
        self.load
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().iter().cloned().collect(),
                )
            })
            .collect()
    }
}
