//! Tether - cross-account VPC peering orchestrator
//!
//! Tether connects independently owned VPCs according to a declarative peer
//! inventory and peering matrix. For every edge it establishes (or resumes)
//! the peering connection, applies each side's DNS resolution policy and
//! reconciles routes into the main route table and, when a peer opts in, into
//! the route tables of its marker-tagged subnets only. Untagged tiers never
//! receive a cross-VPC route.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

// Re-exports for convenience
pub use application::{AuditReport, EdgeStatus, Orchestrator, RunOptions, RunReport};
pub use config::{load_inventory, Config, Inventory};
pub use domain::entities::{Peer, PeeringEdge, PeeringMatrix};
pub use domain::services::Topology;
pub use error::{ConfigurationError, EdgeError, TetherError, TetherResult};
pub use infrastructure::{InMemoryCloud, MemoryContextFactory};
