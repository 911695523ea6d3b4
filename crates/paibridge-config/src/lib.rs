// SPDX-FileCopyrightText: 2026 Paibridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading and validation for paibridge.

pub mod loader;
pub mod model;
pub mod validation;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::BridgeConfig;
pub use validation::{validate_for_serve, ConfigError};
