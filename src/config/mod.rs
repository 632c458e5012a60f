//! Configuration module for Tether
//!
//! Tool configuration hierarchy:
//! 1. CLI flags (highest priority)
//! 2. Environment variables (TETHER_*)
//! 3. Project config (./tether.toml)
//! 4. User config (~/.config/tether/config.toml)
//! 5. Built-in defaults (lowest priority)
//!
//! The inventory (peers and peering matrix) is loaded separately by
//! [`load_inventory`].

mod inventory;
mod loader;
mod types;

pub use inventory::{load_inventory, parse_inventory, Inventory, InventoryFormat};
pub use loader::{ConfigWarning, PROJECT_CONFIG};
pub use types::{
    AcceptanceConfig, Config, LogFormat, OutputConfig, OutputFormat, RetryConfig, RunConfig,
    TaggingConfig,
};
