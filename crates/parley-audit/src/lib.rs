// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite audit projection for Parley.
//!
//! The audit store is a durable, append-mostly record of conversations and
//! messages. It is never the live read path; the ephemeral store holds the
//! authoritative state.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod sqlite;

pub use database::Database;
pub use sqlite::SqliteAudit;
