//! Peer entity - a named VPC participating in peering
//!
//! Peers are built once from the inventory and are immutable for a run.

use serde::Serialize;

use crate::domain::value_objects::{
    AccountId, Cidr, MarkerTag, PeerId, PeeringRole, Region, VpcId,
};

/// A virtual network endpoint with its credential and policy metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peer {
    /// Unique name within the inventory
    pub id: PeerId,
    pub vpc_id: VpcId,
    pub account_id: AccountId,
    pub region: Region,
    /// Role assumed to act inside this peer's account
    pub role_arn: String,
    /// Primary VPC CIDR; looked up from the provider when absent
    pub cidr: Option<Cidr>,
    /// Allow this side to resolve the partner's private DNS names
    pub dns_resolution: bool,
    /// Extend routes to marker-tagged subnet route tables
    pub has_additional_routes: bool,
    /// Value carried by this peer's marker tags
    pub route_tag: String,
}

impl Peer {
    /// Create a peer with default policy flags (DNS on, main table only)
    pub fn new(
        id: impl Into<PeerId>,
        vpc_id: impl Into<VpcId>,
        account_id: impl Into<AccountId>,
        region: impl Into<Region>,
    ) -> Self {
        let id = id.into();
        let account_id = account_id.into();
        Self {
            route_tag: id.to_string(),
            role_arn: format!("arn:aws:iam::{}:role/tether-peering", account_id),
            id,
            vpc_id: vpc_id.into(),
            account_id,
            region: region.into(),
            cidr: None,
            dns_resolution: true,
            has_additional_routes: false,
        }
    }

    pub fn with_cidr(mut self, cidr: Cidr) -> Self {
        self.cidr = Some(cidr);
        self
    }

    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = role_arn.into();
        self
    }

    pub fn with_dns_resolution(mut self, enabled: bool) -> Self {
        self.dns_resolution = enabled;
        self
    }

    pub fn with_additional_routes(mut self, enabled: bool) -> Self {
        self.has_additional_routes = enabled;
        self
    }

    pub fn with_route_tag(mut self, tag: impl Into<String>) -> Self {
        self.route_tag = tag.into();
        self
    }

    /// True when both peers live in the same account and region, so a
    /// connection between them needs no cross-context acceptance.
    pub fn shares_context_with(&self, other: &Peer) -> bool {
        self.account_id == other.account_id && self.region == other.region
    }

    /// Marker tag this peer's subnets carry when it plays `role` on an edge
    pub fn marker(&self, prefix: &str, role: PeeringRole) -> MarkerTag {
        MarkerTag::new(prefix, role, self.route_tag.clone())
    }
}
