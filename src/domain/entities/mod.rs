//! Domain Entities
//!
//! Core domain entities that have identity and lifecycle.
//! - `Peer` - A VPC participating in peering
//! - `PeeringEdge` / `PeeringMatrix` - Which peers connect to which
//! - `PeeringConnection` - The link between two peers and its state machine
//! - `RouteTableTarget` / `RouteEntry` - Where cross-VPC routes go

mod connection;
mod edge;
mod peer;
mod route;

pub use connection::{
    ConnectionRecord, ConnectionState, ConnectionStatus, InvalidTransition, PeeringConnection,
    PeeringSide,
};
pub use edge::{PeeringEdge, PeeringMatrix};
pub use peer::Peer;
pub use route::{ExistingRoute, RouteEntry, RouteTableTarget, RouteTarget};
