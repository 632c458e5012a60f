//! Presentation Layer
//!
//! This layer handles:
//! - CLI argument parsing (via clap)
//! - Wiring use cases to a provider
//! - Output formatting (text/JSON)
//!
//! ## Structure
//!
//! - `cli` - Command-line definition
//! - `factory` - Creates the orchestrator with its provider (dependency injection)
//! - `output` - Report rendering

pub mod cli;
pub mod factory;
pub mod output;

pub use cli::{Cli, Commands};
pub use factory::{create_orchestrator, Simulation};
pub use output::{render_audit, render_run, render_validation, summary_line, RenderFormat, TextRenderer};
