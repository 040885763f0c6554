// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Realtime gateway for Parley.
//!
//! Serves the customer and agent REST surfaces and the websocket room
//! protocol, and pumps event-bus traffic out to connected clients. Any
//! number of gateway nodes can run against the same store; clients see
//! transitions regardless of which node holds their session.

pub mod agent_api;
pub mod error;
pub mod handlers;
pub mod pump;
pub mod rooms;
pub mod server;
pub mod ws;

pub use pump::spawn_event_pump;
pub use rooms::{RoomMessage, RoomRegistry};
pub use server::{run, GatewayState, Sessions};
