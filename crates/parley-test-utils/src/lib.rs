// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for end-to-end integration testing.

pub mod harness;

pub use harness::{agent, customer, TestHarness};
