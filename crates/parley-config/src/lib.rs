// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading and models for the Parley chat coordinator.

pub mod loader;
pub mod model;

pub use figment::Error as ConfigError;
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::ParleyConfig;
