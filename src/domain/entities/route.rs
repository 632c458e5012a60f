//! Route entities
//!
//! `RouteTableTarget` is a table the reconciler may write to, `RouteEntry` is
//! the route it wants there, and `ExistingRoute` is what the provider reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{Cidr, ConnectionId, PeerId, RouteScope, RouteTableId};

/// A route table eligible to receive a cross-VPC route
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RouteTableTarget {
    pub table_id: RouteTableId,
    /// Peer whose VPC owns the table
    pub owner: PeerId,
    pub scope: RouteScope,
}

impl RouteTableTarget {
    pub fn main(table_id: RouteTableId, owner: PeerId) -> Self {
        Self {
            table_id,
            owner,
            scope: RouteScope::Main,
        }
    }
}

/// Desired route: destination CIDR via a peering connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub target: RouteTableTarget,
    pub destination: Cidr,
    pub next_hop: ConnectionId,
}

/// Next hop of a route already present in a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum RouteTarget {
    PeeringConnection(ConnectionId),
    Gateway(String),
    NatGateway(String),
    TransitGateway(String),
    NetworkInterface(String),
    /// Implicit VPC-local route
    Local,
    Other(String),
}

impl RouteTarget {
    pub fn peering_connection(&self) -> Option<&ConnectionId> {
        match self {
            RouteTarget::PeeringConnection(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteTarget::PeeringConnection(id) => write!(f, "{}", id),
            RouteTarget::Gateway(id)
            | RouteTarget::NatGateway(id)
            | RouteTarget::TransitGateway(id)
            | RouteTarget::NetworkInterface(id)
            | RouteTarget::Other(id) => f.write_str(id),
            RouteTarget::Local => f.write_str("local"),
        }
    }
}

/// A route observed in a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRoute {
    pub destination: Cidr,
    pub target: RouteTarget,
    /// Provider reports the next hop unreachable
    #[serde(default)]
    pub blackhole: bool,
}

impl ExistingRoute {
    pub fn new(destination: Cidr, target: RouteTarget) -> Self {
        Self {
            destination,
            target,
            blackhole: false,
        }
    }

    pub fn via_connection(destination: Cidr, connection: ConnectionId) -> Self {
        Self::new(destination, RouteTarget::PeeringConnection(connection))
    }
}
