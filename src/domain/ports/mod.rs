//! Domain Ports (Interfaces)
//!
//! These traits define the boundaries of the domain layer.
//! Infrastructure layer provides concrete implementations.

pub mod context_factory;
pub mod network_api;

pub use context_factory::{AuthError, ContextFactory};
pub use network_api::{ApiError, ApiResult, NetworkApi, PeeringRequest, RouteTableInfo, VpcInfo};
