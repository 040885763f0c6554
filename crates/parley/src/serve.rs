// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Wires the full coordinator stack: in-process ephemeral store, SQLite
//! audit projection, event bus, coordinator, maintenance sweeper, analytics
//! sink, and the HTTP/WebSocket gateway. The event pump subscribes before
//! the listener accepts its first connection, and everything drains on
//! SIGINT/SIGTERM.

use std::sync::Arc;

use tracing::info;

use parley_audit::SqliteAudit;
use parley_bus::{AnalyticsSink, EventBus};
use parley_config::ParleyConfig;
use parley_coordinator::{Coordinator, MaintenanceSweeper};
use parley_core::{ChatError, KeySpace};
use parley_gateway::{spawn_event_pump, GatewayState};
use parley_store::MemoryStore;

use crate::shutdown;

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ChatError> {
    init_tracing(&config.log.level);

    info!("starting parley serve");

    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(SqliteAudit::open(&config.audit.database_path).await?);
    info!(path = %config.audit.database_path, "audit store ready");

    let keys = KeySpace::new(config.store.key_prefix.clone());
    let bus = EventBus::new(store.clone(), keys);
    let coordinator = Arc::new(Coordinator::new(
        store,
        audit.clone(),
        bus.clone(),
        config.clone(),
    ));

    let cancel = shutdown::install_signal_handler();

    // Subscribe-before-accept: the pump and sink attach to the bus before
    // the listener takes its first connection.
    let gateway = GatewayState::new(coordinator.clone());
    let pump = spawn_event_pump(gateway.clone(), bus.clone(), cancel.clone());
    let sink = AnalyticsSink::new(bus).spawn(cancel.clone());
    let sweeper = MaintenanceSweeper::new(coordinator).spawn(cancel.clone());
    info!(
        sweep_interval_secs = config.queue.sweep_interval_secs,
        "background tasks started"
    );

    parley_gateway::run(&config.server, gateway, cancel.clone()).await?;

    // The server returned: shutdown is in progress. Drain the helpers.
    cancel.cancel();
    let _ = tokio::join!(pump, sink, sweeper);
    audit.close().await?;

    info!("parley serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
