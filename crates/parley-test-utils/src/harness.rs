// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete stack: shared in-process store, temp
//! SQLite audit database, event bus, coordinator, and gateway state with the
//! event pump running. Tests drive the coordinator and observe what rooms
//! and queue watchers would receive.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use parley_audit::SqliteAudit;
use parley_bus::EventBus;
use parley_config::ParleyConfig;
use parley_coordinator::Coordinator;
use parley_core::types::{Participant, ParticipantType};
use parley_core::{ChatError, KeySpace};
use parley_gateway::{spawn_event_pump, GatewayState};
use parley_store::MemoryStore;

/// A CUSTOMER participant for tests.
pub fn customer(id: &str) -> Participant {
    Participant {
        id: id.to_string(),
        kind: ParticipantType::Customer,
        display_name: format!("Customer {id}"),
        attributes: HashMap::new(),
    }
}

/// An AGENT participant for tests.
pub fn agent(id: &str, display_name: &str) -> Participant {
    Participant {
        id: id.to_string(),
        kind: ParticipantType::Agent,
        display_name: display_name.to_string(),
        attributes: HashMap::new(),
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    config: ParleyConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            config: ParleyConfig::default(),
        }
    }

    /// Adjust the configuration before the stack is wired.
    pub fn with_config(mut self, mutate: impl FnOnce(&mut ParleyConfig)) -> Self {
        mutate(&mut self.config);
        self
    }

    /// Build the harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ChatError> {
        let temp_dir = tempfile::TempDir::new().map_err(ChatError::backend)?;
        let db_path = temp_dir.path().join("audit.db");

        let store = Arc::new(MemoryStore::new());
        let audit = Arc::new(SqliteAudit::open(&db_path.to_string_lossy()).await?);
        let keys = KeySpace::new(self.config.store.key_prefix.clone());
        let bus = EventBus::new(store.clone(), keys.clone());
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            audit.clone(),
            bus.clone(),
            self.config,
        ));

        let gateway = GatewayState::new(coordinator.clone());
        let cancel = CancellationToken::new();
        // Pump first, connections after: the harness mirrors serve's order.
        spawn_event_pump(gateway.clone(), bus.clone(), cancel.clone());

        Ok(TestHarness {
            coordinator,
            store,
            audit,
            bus,
            keys,
            gateway,
            cancel,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired in-process stack.
pub struct TestHarness {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<SqliteAudit>,
    pub bus: EventBus,
    pub keys: KeySpace,
    pub gateway: GatewayState,
    cancel: CancellationToken,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
