//! Domain Value Objects
//!
//! Immutable value types that represent domain concepts.

mod ids;
mod marker;
mod scope;

pub use ids::{AccountId, ConnectionId, PeerId, Region, RouteTableId, SubnetId, VpcId};
pub use marker::{MarkerTag, PeeringRole};
pub use scope::RouteScope;

/// IPv4/IPv6 network in CIDR notation
pub type Cidr = ipnet::IpNet;
