//! Application Layer
//!
//! Use cases that orchestrate the business flow.
//! This layer:
//! - Depends on Domain layer (entities, services, ports)
//! - Does NOT contain business rules (those are in Domain)
//! - Coordinates provider calls, retries, locking and reporting
//!
//! ## Use Cases
//!
//! - `Orchestrator::apply` - Reconcile every edge (or plan, under dry run)
//! - `Orchestrator::teardown` - Remove routes and connections for edges
//! - `Orchestrator::audit` - Check the tier-isolation property
//!
//! ## Services
//!
//! - `ContextResolver` - Per-run cache of authenticated peer contexts
//! - `ConnectionManager` - Find, resume or create peering connections
//! - `DnsConfigurator` - Per-side DNS resolution policy
//! - `RouteReconciler` - Bidirectional route reconciliation under table locks

pub mod audit;
pub mod connection;
pub mod dns;
pub mod options;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod routes;
pub mod teardown;


pub use audit::{AuditFinding, AuditReport, FindingReason, IsolationAudit};
pub use connection::{ConnectionManager, EnsureOutcome, EnsuredConnection};
pub use dns::DnsConfigurator;
pub use options::{AcceptancePolicy, RunOptions, DEFAULT_TAG_PREFIX};
pub use orchestrator::Orchestrator;
pub use report::{
    ConnectionSummary, DnsOutcome, DnsSetting, EdgeReport, EdgeStatus, RouteOutcome, RouteResult,
    RunKind, RunReport, Tally,
};
pub use resolver::{ContextResolver, PeerContext};
pub use routes::{RouteReconciler, TableLocks};
pub use teardown::Teardown;
