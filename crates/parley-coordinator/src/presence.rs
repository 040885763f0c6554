// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-TTL participant liveness flags.
//!
//! Presence is refreshed on connect and on every message; absence is
//! detected by TTL expiry or an explicit mark on disconnect.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use parley_core::{ChatError, EphemeralStore, KeySpace};

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn EphemeralStore>,
    keys: KeySpace,
    ttl: Duration,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn EphemeralStore>, keys: KeySpace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    /// Refresh the participant's liveness flag.
    pub async fn mark_present(&self, participant_id: &str) -> Result<(), ChatError> {
        self.store
            .put(
                &self.keys.presence(participant_id),
                &Utc::now().to_rfc3339(),
                Some(self.ttl),
            )
            .await
    }

    /// Drop the flag immediately (clean disconnect).
    pub async fn mark_absent(&self, participant_id: &str) -> Result<(), ChatError> {
        self.store
            .delete(&self.keys.presence(participant_id))
            .await?;
        Ok(())
    }

    pub async fn is_present(&self, participant_id: &str) -> Result<bool, ChatError> {
        Ok(self
            .store
            .get(&self.keys.presence(participant_id))
            .await?
            .is_some())
    }
}
