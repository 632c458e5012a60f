//! Domain Services
//!
//! Stateless domain logic: inventory validation, route planning and
//! marker-tag discovery.

pub mod discovery;
pub mod registry;
pub mod route_planner;

pub use discovery::{discover, main_table, resolve_tables};
pub use registry::{PeerRegistry, RegistryBuilder, Topology};
pub use route_planner::{CompetingState, RouteAction, RoutePlanner};
