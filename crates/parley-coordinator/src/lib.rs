// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Parley conversation coordinator.
//!
//! Composes the queue engine, assignment registry, live repository, presence
//! tracking, and identity resolution into the lifecycle state machine
//! (open -> queued -> assigned -> closed), with a background sweeper for
//! TTL-driven recovery.

pub mod assignment;
pub mod coordinator;
pub mod identity;
pub mod presence;
pub mod queue;
pub mod repository;
pub mod sweeper;

pub use assignment::AssignmentRegistry;
pub use coordinator::Coordinator;
pub use identity::IdentityResolver;
pub use presence::PresenceTracker;
pub use queue::{ClaimResult, ClaimStatus, QueueEngine};
pub use repository::ConversationRepository;
pub use sweeper::MaintenanceSweeper;
