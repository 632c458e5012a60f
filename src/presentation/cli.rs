//! CLI Argument Parsing
//!
//! This module defines the CLI interface using clap.
//!
//! ## Design Notes
//!
//! - Global flags (`--config`, `--json`, `--verbose`, `--log-format`, `--simulate`)
//!   are accepted before or after the subcommand
//! - Every command that talks to a provider needs `--simulate`

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::LogFormat;
use crate::domain::entities::PeeringEdge;

/// Tether - cross-account VPC peering orchestrator
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Tool configuration file (default: ./tether.toml, then ~/.config/tether/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit the report as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Run against a simulated cloud persisted in this JSON file
    #[arg(long, global = true, value_name = "STATE_JSON")]
    pub simulate: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the inventory without calling any provider API
    Validate {
        /// Peer inventory (.yaml, .yml or .toml)
        #[arg(short, long, default_value = "peers.yaml")]
        inventory: PathBuf,
    },

    /// Reconcile connections, DNS and routes for every edge
    Apply {
        /// Peer inventory (.yaml, .yml or .toml)
        #[arg(short, long, default_value = "peers.yaml")]
        inventory: PathBuf,

        /// Read and plan only
        #[arg(long)]
        dry_run: bool,

        /// Maximum edges processed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Exit 2 when any edge is degraded or skipped
        #[arg(long)]
        strict: bool,
    },

    /// Show what apply would change (alias of `apply --dry-run`)
    Plan {
        /// Peer inventory (.yaml, .yml or .toml)
        #[arg(short, long, default_value = "peers.yaml")]
        inventory: PathBuf,

        /// Maximum edges processed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Exit 2 when any edge is degraded or skipped
        #[arg(long)]
        strict: bool,
    },

    /// Remove routes and peering connections
    Teardown {
        /// Peer inventory (.yaml, .yml or .toml)
        #[arg(short, long, default_value = "peers.yaml")]
        inventory: PathBuf,

        /// Only this edge, as `source:target` (repeatable; either orientation)
        #[arg(long = "edge", value_name = "SOURCE:TARGET", value_parser = parse_edge)]
        edges: Vec<PeeringEdge>,

        /// Report what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Exit 2 when any edge is degraded or skipped
        #[arg(long)]
        strict: bool,
    },

    /// Check that only main and marker-tagged tables route to partners
    Audit {
        /// Peer inventory (.yaml, .yml or .toml)
        #[arg(short, long, default_value = "peers.yaml")]
        inventory: PathBuf,
    },
}

impl Commands {
    pub fn inventory(&self) -> &PathBuf {
        match self {
            Commands::Validate { inventory }
            | Commands::Apply { inventory, .. }
            | Commands::Plan { inventory, .. }
            | Commands::Teardown { inventory, .. }
            | Commands::Audit { inventory } => inventory,
        }
    }
}

/// Parse `source:target`
pub fn parse_edge(value: &str) -> Result<PeeringEdge, String> {
    match value.split_once(':') {
        Some((source, target)) if !source.trim().is_empty() && !target.trim().is_empty() => {
            Ok(PeeringEdge::new(source.trim(), target.trim()))
        }
        _ => Err(format!("expected SOURCE:TARGET, got '{}'", value)),
    }
}
