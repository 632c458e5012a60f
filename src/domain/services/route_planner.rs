//! Route planning service
//!
//! Pure domain logic for deciding what to do with one route table.
//! This service determines what actions to take based on the routes already
//! in the table, without performing any I/O.

use serde::Serialize;

use crate::domain::entities::{ExistingRoute, RouteTarget};
use crate::domain::value_objects::{Cidr, ConnectionId};

/// The action to take for a desired route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum RouteAction {
    /// No route for the destination yet
    Create,
    /// Route already points at this connection
    Skip,
    /// Route points at a connection confirmed gone; safe to repoint
    Replace { stale: ConnectionId },
    /// Route points somewhere else; operator must intervene
    Conflict { competing: RouteTarget },
}

impl RouteAction {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RouteAction::Conflict { .. })
    }

    /// Whether carrying out this action mutates the table
    pub fn mutates(&self) -> bool {
        matches!(self, RouteAction::Create | RouteAction::Replace { .. })
    }
}

/// What the provider says about a competing peering connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompetingState {
    /// Confirmed deleted, rejected, expired or unknown to the provider
    Gone,
    /// Exists and may still carry traffic
    Live,
    /// Lookup failed; nothing can be confirmed
    Unknown,
}

/// Pure planning service
pub struct RoutePlanner;

impl RoutePlanner {
    /// Plan a single route
    ///
    /// # Arguments
    /// * `existing` - Routes currently in the table
    /// * `destination` - The partner VPC CIDR
    /// * `next_hop` - The connection the route should use
    pub fn plan(existing: &[ExistingRoute], destination: Cidr, next_hop: &ConnectionId) -> RouteAction {
        let current = existing.iter().find(|route| route.destination == destination);

        match current {
            None => RouteAction::Create,
            Some(route) if route.target.peering_connection() == Some(next_hop) => RouteAction::Skip,
            Some(route) => RouteAction::Conflict {
                competing: route.target.clone(),
            },
        }
    }

    /// Re-examine a conflict once the competing connection has been looked up.
    ///
    /// Only a competing *peering connection* that is positively confirmed gone
    /// turns into a replacement. Everything else stays a conflict.
    pub fn reconsider(action: RouteAction, competing: CompetingState) -> RouteAction {
        match (action, competing) {
            (
                RouteAction::Conflict {
                    competing: RouteTarget::PeeringConnection(stale),
                },
                CompetingState::Gone,
            ) => RouteAction::Replace { stale },
            (action, _) => action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(s: &str) -> Cidr {
        s.parse().unwrap()
    }

    fn pcx(id: &str) -> ConnectionId {
        ConnectionId::from(id)
    }

    #[test]
    fn empty_table_creates() {
        assert_eq!(
            RoutePlanner::plan(&[], cidr("10.21.0.0/16"), &pcx("pcx-1")),
            RouteAction::Create
        );
    }

    #[test]
    fn unrelated_destination_creates() {
        let existing = vec![ExistingRoute::new(cidr("0.0.0.0/0"), RouteTarget::Gateway("igw-1".into()))];
        assert_eq!(
            RoutePlanner::plan(&existing, cidr("10.21.0.0/16"), &pcx("pcx-1")),
            RouteAction::Create
        );
    }

    #[test]
    fn same_connection_skips() {
        let existing = vec![ExistingRoute::via_connection(cidr("10.21.0.0/16"), pcx("pcx-1"))];
        let action = RoutePlanner::plan(&existing, cidr("10.21.0.0/16"), &pcx("pcx-1"));
        assert_eq!(action, RouteAction::Skip);
        assert!(!action.mutates());
    }

    #[test]
    fn different_target_conflicts() {
        let existing = vec![ExistingRoute::new(
            cidr("10.21.0.0/16"),
            RouteTarget::TransitGateway("tgw-1".into()),
        )];
        let action = RoutePlanner::plan(&existing, cidr("10.21.0.0/16"), &pcx("pcx-1"));
        assert!(action.is_conflict());
    }

    #[test]
    fn narrower_route_does_not_count_as_existing() {
        let existing = vec![ExistingRoute::new(
            cidr("10.21.4.0/24"),
            RouteTarget::TransitGateway("tgw-1".into()),
        )];
        assert_eq!(
            RoutePlanner::plan(&existing, cidr("10.21.0.0/16"), &pcx("pcx-1")),
            RouteAction::Create
        );
    }

    #[test]
    fn gone_competing_connection_is_replaced() {
        let action = RouteAction::Conflict {
            competing: RouteTarget::PeeringConnection(pcx("pcx-old")),
        };
        assert_eq!(
            RoutePlanner::reconsider(action, CompetingState::Gone),
            RouteAction::Replace {
                stale: pcx("pcx-old")
            }
        );
    }

    #[test]
    fn unconfirmed_competing_connection_stays_conflict() {
        for state in [CompetingState::Live, CompetingState::Unknown] {
            let action = RouteAction::Conflict {
                competing: RouteTarget::PeeringConnection(pcx("pcx-old")),
            };
            assert!(RoutePlanner::reconsider(action, state).is_conflict());
        }
    }

    #[test]
    fn non_peering_competitor_never_replaced() {
        let action = RouteAction::Conflict {
            competing: RouteTarget::NatGateway("nat-1".into()),
        };
        assert!(RoutePlanner::reconsider(action, CompetingState::Gone).is_conflict());
    }
}
