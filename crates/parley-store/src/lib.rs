// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process implementation of the [`parley_core::EphemeralStore`] seam.
//!
//! `MemoryStore` backs a single-process deployment and every test in the
//! workspace. A networked key/value engine with the same primitives plugs in
//! at the same trait without touching the coordinator.

pub mod memory;

pub use memory::MemoryStore;
