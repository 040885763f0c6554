// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seam traits for the coordinator's external collaborators.

pub mod audit;
pub mod store;

pub use audit::AuditStore;
pub use store::{ClaimOutcome, EphemeralStore, LockGuard};
