//! Marker-tag route table discovery
//!
//! Resolves a peer's marker-tagged subnets to the route tables they use.
//! Untagged subnets are never looked at, which is what keeps isolated tiers
//! out of cross-VPC routing.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::domain::entities::{Peer, RouteTableTarget};
use crate::domain::ports::{ApiResult, NetworkApi, RouteTableInfo};
use crate::domain::value_objects::{MarkerTag, RouteScope, RouteTableId, SubnetId};

/// Discover the route tables behind `peer`'s subnets carrying `marker`.
///
/// Tables shared by several tagged subnets appear once. A tagged subnet with
/// no explicit association resolves to the main table.
pub async fn discover(
    api: &dyn NetworkApi,
    peer: &Peer,
    marker: &MarkerTag,
) -> ApiResult<Vec<RouteTableTarget>> {
    let subnets = api.tagged_subnets(&peer.vpc_id, marker).await?;
    if subnets.is_empty() {
        debug!(peer = %peer.id, marker = %marker, "No tagged subnets");
        return Ok(Vec::new());
    }

    let tables = api.route_tables(&peer.vpc_id).await?;
    Ok(resolve_tables(peer, marker, &subnets, &tables))
}

/// Pure half of [`discover`]: map subnets onto tables
pub fn resolve_tables(
    peer: &Peer,
    marker: &MarkerTag,
    subnets: &[SubnetId],
    tables: &[RouteTableInfo],
) -> Vec<RouteTableTarget> {
    let main = main_table(tables);
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();

    for subnet in subnets {
        let table = tables
            .iter()
            .find(|table| table.subnets.contains(subnet))
            .map(|table| &table.id)
            .or(main);

        let Some(table) = table else {
            warn!(peer = %peer.id, subnet = %subnet, "Subnet has no route table; skipping");
            continue;
        };

        if seen.insert(table.clone()) {
            targets.push(RouteTableTarget {
                table_id: table.clone(),
                owner: peer.id.clone(),
                scope: RouteScope::Subnet {
                    marker: marker.clone(),
                },
            });
        }
    }

    targets
}

/// The VPC main route table, if listed
pub fn main_table(tables: &[RouteTableInfo]) -> Option<&RouteTableId> {
    tables.iter().find(|table| table.main).map(|table| &table.id)
}
