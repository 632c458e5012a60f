//! Route scope value object - which kind of route table a target is
//!
//! - `Main` scope: the VPC's main (implicit) route table
//! - `Subnet` scope: a table discovered through a marker-tagged subnet
//! - `Other` scope: any other table in the VPC (teardown and audit only)

use serde::{Deserialize, Serialize};

use super::MarkerTag;

/// Scope of a route table target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RouteScope {
    /// The VPC main route table
    #[default]
    Main,
    /// A subnet route table found through a marker tag
    Subnet { marker: MarkerTag },
    /// A table outside the reconciler's reach
    Other,
}

impl RouteScope {
    /// Returns true for the main route table
    pub fn is_main(&self) -> bool {
        matches!(self, RouteScope::Main)
    }

    /// Marker tag that discovered this table, if any
    pub fn marker(&self) -> Option<&MarkerTag> {
        match self {
            RouteScope::Subnet { marker } => Some(marker),
            RouteScope::Main | RouteScope::Other => None,
        }
    }
}

impl std::fmt::Display for RouteScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteScope::Main => write!(f, "main"),
            RouteScope::Subnet { marker } => write!(f, "subnet[{}]", marker),
            RouteScope::Other => write!(f, "other"),
        }
    }
}
