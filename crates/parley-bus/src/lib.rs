// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event bus for cross-instance fan-out.
//!
//! A thin adapter over the ephemeral store's pub/sub: one channel per event
//! class (`chat.lifecycle`, `chat.messages`). Gateway nodes subscribe before
//! accepting client connections and translate received events into room
//! broadcasts. Delivery is at-least-once; consumers dedupe by id.

pub mod analytics;
pub mod bus;

pub use analytics::AnalyticsSink;
pub use bus::EventBus;
