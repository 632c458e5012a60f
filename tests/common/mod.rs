//! Common test utilities for Tether scenario and CLI tests.
//!
//! This module provides:
//! - `TestEnv`: Isolated temp directory with inventory, state file and CLI helpers
//! - Fixtures: The `prod` / `prod-pci` layout as inventory text and as a seeded cloud

#![allow(dead_code)]

pub mod env;
pub mod fixtures;

pub use env::*;
pub use fixtures::*;
