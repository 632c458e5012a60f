//! Peer registry and inventory validation
//!
//! Validation runs before any API call and reports every problem at once, so
//! a single editing pass can fix the inventory.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::{Peer, PeeringEdge, PeeringMatrix};
use crate::domain::value_objects::PeerId;
use crate::error::{ConfigViolation, ConfigurationError};

/// Validated set of peers, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<PeerId, Peer>,
}

impl PeerRegistry {
    /// Look up a peer by identifier
    pub fn get(&self, id: &PeerId) -> Option<&Peer> {
        self.peers.get(id)
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.peers.contains_key(id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        self.peers.values()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Validated registry plus the unique edges to process
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub registry: PeerRegistry,
    pub edges: Vec<PeeringEdge>,
}

impl Topology {
    /// Build and validate in one step
    pub fn build(peers: Vec<Peer>, matrix: &PeeringMatrix) -> Result<Self, ConfigurationError> {
        let mut builder = RegistryBuilder::new();
        for peer in peers {
            builder.add(peer);
        }
        builder.build(matrix)
    }
}

/// Accumulates peers and upstream parse problems, then validates everything
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    peers: Vec<Peer>,
    violations: Vec<ConfigViolation>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, peer: Peer) {
        self.peers.push(peer);
    }

    /// Record a problem found while parsing, before a `Peer` could be built
    pub fn reject(&mut self, violation: ConfigViolation) {
        self.violations.push(violation);
    }

    pub fn build(self, matrix: &PeeringMatrix) -> Result<Topology, ConfigurationError> {
        let mut violations = self.violations;
        let mut peers: BTreeMap<PeerId, Peer> = BTreeMap::new();
        let mut vpc_owners: BTreeMap<String, PeerId> = BTreeMap::new();

        for peer in self.peers {
            violations.extend(check_required_fields(&peer));

            if !peer.vpc_id.is_empty() {
                match vpc_owners.get(peer.vpc_id.as_str()) {
                    Some(owner) if owner != &peer.id => violations.push(ConfigViolation::new(
                        format!("peers.{}.vpc_id", peer.id),
                        format!("{} is already declared by peer '{}'", peer.vpc_id, owner),
                    )),
                    _ => {
                        vpc_owners.insert(peer.vpc_id.to_string(), peer.id.clone());
                    }
                }
            }

            if peers.contains_key(&peer.id) {
                violations.push(ConfigViolation::new(
                    format!("peers.{}", peer.id),
                    "duplicate peer identifier",
                ));
                continue;
            }
            peers.insert(peer.id.clone(), peer);
        }

        violations.extend(check_matrix(matrix, &peers));

        let edges = matrix.edges();
        for edge in &edges {
            if let (Some(source), Some(target)) = (peers.get(&edge.source), peers.get(&edge.target))
            {
                if let (Some(a), Some(b)) = (source.cidr, target.cidr) {
                    if a.contains(&b) || b.contains(&a) {
                        violations.push(ConfigViolation::new(
                            format!("matrix.{}", edge.source),
                            format!(
                                "CIDR {} of '{}' overlaps CIDR {} of '{}'",
                                a, edge.source, b, edge.target
                            ),
                        ));
                    }
                }
            }
        }

        ConfigurationError::from_violations(violations)?;

        Ok(Topology {
            registry: PeerRegistry { peers },
            edges,
        })
    }
}

fn check_required_fields(peer: &Peer) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();
    let location = |field: &str| format!("peers.{}.{}", peer.id, field);

    if peer.id.is_empty() {
        violations.push(ConfigViolation::new("peers", "peer identifier must not be empty"));
    }
    if peer.vpc_id.is_empty() {
        violations.push(ConfigViolation::new(location("vpc_id"), "must not be empty"));
    }
    if peer.region.is_empty() {
        violations.push(ConfigViolation::new(location("region"), "must not be empty"));
    }
    if peer.account_id.is_empty() {
        violations.push(ConfigViolation::new(location("account_id"), "must not be empty"));
    }
    if peer.role_arn.trim().is_empty() {
        violations.push(ConfigViolation::new(location("role_arn"), "must not be empty"));
    }
    if peer.has_additional_routes && peer.route_tag.trim().is_empty() {
        violations.push(ConfigViolation::new(
            location("route_tag"),
            "must not be empty when has_additional_routes is set",
        ));
    }

    violations
}

fn check_matrix(matrix: &PeeringMatrix, peers: &BTreeMap<PeerId, Peer>) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();
    let mut unknown_reported = BTreeSet::new();

    for edge in matrix.declared() {
        let location = format!("matrix.{}", edge.source);

        if edge.is_self_edge() {
            violations.push(ConfigViolation::new(
                location.clone(),
                format!("peer '{}' cannot peer with itself", edge.source),
            ));
        }
        for end in [&edge.source, &edge.target] {
            if !peers.contains_key(end) && unknown_reported.insert((location.clone(), end.clone()))
            {
                violations.push(ConfigViolation::new(
                    location.clone(),
                    format!("unknown peer '{}'", end),
                ));
            }
        }
    }

    violations
}
