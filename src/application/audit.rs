//! Isolation Audit
//!
//! Read-only check of the tier-isolation property. The reconciler may only
//! write to a peer's main table and, when the peer opts in, to the tables of
//! its marker-tagged subnets. Any other table carrying a route toward a
//! peering partner, whoever put it there, is reported.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::options::RunOptions;
use super::resolver::{ContextResolver, PeerContext};
use crate::domain::entities::{Peer, RouteTarget};
use crate::domain::services::{discover, Topology};
use crate::domain::value_objects::{Cidr, ConnectionId, PeerId, PeeringRole, RouteTableId};
use crate::error::EdgeError;
use crate::infrastructure::retry::retry_api;

/// Why a route breaks isolation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingReason {
    /// Peer has `has_additional_routes = false`, yet a non-main table routes to a partner
    AdditionalRoutesDisabled,
    /// Table is not reachable through any marker-tagged subnet
    NotMarkerTagged,
}

impl FindingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingReason::AdditionalRoutesDisabled => "additional_routes_disabled",
            FindingReason::NotMarkerTagged => "not_marker_tagged",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditFinding {
    pub peer: PeerId,
    pub table: RouteTableId,
    pub destination: Cidr,
    pub next_hop: RouteTarget,
    pub reason: FindingReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditFailure {
    pub peer: PeerId,
    pub error: EdgeError,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub peers_checked: usize,
    pub tables_checked: usize,
    pub findings: Vec<AuditFinding>,
    pub errors: Vec<AuditFailure>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.errors.is_empty()
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            1
        }
    }
}

/// Per-peer audit outcome before aggregation
#[derive(Default)]
struct PeerAudit {
    tables_checked: usize,
    findings: Vec<AuditFinding>,
    errors: Vec<AuditFailure>,
}

/// What a peer's tables are checked against
struct Partners {
    cidrs: Vec<Cidr>,
    connections: BTreeSet<ConnectionId>,
}

impl Partners {
    fn matches(&self, destination: &Cidr, next_hop: &RouteTarget) -> bool {
        // Broader routes such as a 0.0.0.0/0 default do not count
        let toward_partner = self.cidrs.iter().any(|cidr| cidr.contains(destination));
        let via_peering = next_hop
            .peering_connection()
            .is_some_and(|id| self.connections.contains(id));
        toward_partner || via_peering
    }
}

pub struct IsolationAudit {
    options: RunOptions,
}

impl IsolationAudit {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    pub async fn run(&self, topology: &Topology, resolver: &ContextResolver) -> AuditReport {
        let started_at = Utc::now();
        let peers: Vec<&Peer> = topology.registry.peers().collect();

        let audits: Vec<PeerAudit> = stream::iter(peers.iter().copied())
            .map(|peer| self.audit_peer(peer, topology, resolver))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        let mut report = AuditReport {
            started_at,
            finished_at: started_at,
            peers_checked: peers.len(),
            tables_checked: 0,
            findings: Vec::new(),
            errors: Vec::new(),
        };
        for audit in audits {
            report.tables_checked += audit.tables_checked;
            report.findings.extend(audit.findings);
            report.errors.extend(audit.errors);
        }
        report
            .findings
            .sort_by(|a, b| (&a.peer, &a.table).cmp(&(&b.peer, &b.table)));
        report.errors.sort_by(|a, b| a.peer.cmp(&b.peer));
        report.finished_at = Utc::now();

        info!(
            peers = report.peers_checked,
            tables = report.tables_checked,
            findings = report.findings.len(),
            "Isolation audit complete"
        );
        report
    }

    async fn audit_peer(
        &self,
        peer: &Peer,
        topology: &Topology,
        resolver: &ContextResolver,
    ) -> PeerAudit {
        let mut audit = PeerAudit::default();
        let fail = |error: EdgeError| AuditFailure {
            peer: peer.id.clone(),
            error,
        };

        let ctx = match resolver.resolve(peer).await {
            Ok(ctx) => ctx,
            Err(e) => {
                audit.errors.push(fail(e));
                return audit;
            }
        };

        let partners = match self.partners(&ctx, topology, resolver).await {
            Ok(partners) => partners,
            Err(e) => {
                audit.errors.push(fail(e));
                return audit;
            }
        };
        if partners.cidrs.is_empty() && partners.connections.is_empty() {
            debug!(peer = %peer.id, "Peer has no partners; nothing to audit");
            return audit;
        }

        let eligible = match self.eligible_tables(&ctx).await {
            Ok(eligible) => eligible,
            Err(e) => {
                audit.errors.push(fail(e));
                return audit;
            }
        };

        let vpc = &peer.vpc_id;
        let tables = match retry_api(&self.options.retry, "route_tables", || {
            ctx.api.route_tables(vpc)
        })
        .await
        {
            Ok(tables) => tables,
            Err(e) => {
                audit.errors.push(fail(EdgeError::from_api("route_tables", e)));
                return audit;
            }
        };

        for table in tables {
            audit.tables_checked += 1;
            if table.main || eligible.contains(&table.id) {
                continue;
            }
            let reason = if peer.has_additional_routes {
                FindingReason::NotMarkerTagged
            } else {
                FindingReason::AdditionalRoutesDisabled
            };
            for route in table
                .routes
                .iter()
                .filter(|route| partners.matches(&route.destination, &route.target))
            {
                warn!(
                    peer = %peer.id,
                    table = %table.id,
                    destination = %route.destination,
                    reason = reason.as_str(),
                    "Isolation violation"
                );
                audit.findings.push(AuditFinding {
                    peer: peer.id.clone(),
                    table: table.id.clone(),
                    destination: route.destination,
                    next_hop: route.target.clone(),
                    reason,
                });
            }
        }

        audit
    }

    /// Partner CIDRs and the connections linking to them
    async fn partners(
        &self,
        ctx: &PeerContext,
        topology: &Topology,
        resolver: &ContextResolver,
    ) -> Result<Partners, EdgeError> {
        let mut partners = Partners {
            cidrs: Vec::new(),
            connections: BTreeSet::new(),
        };

        let partner_ids = topology.edges.iter().filter_map(|edge| {
            if edge.source == ctx.peer.id {
                Some(&edge.target)
            } else if edge.target == ctx.peer.id {
                Some(&edge.source)
            } else {
                None
            }
        });

        for partner in partner_ids.filter_map(|id| topology.registry.get(id)) {
            let cidr = match partner.cidr {
                Some(cidr) => cidr,
                None => {
                    let partner_ctx = resolver.resolve(partner).await?;
                    let vpc = &partner.vpc_id;
                    retry_api(&self.options.retry, "describe_vpc", || {
                        partner_ctx.api.describe_vpc(vpc)
                    })
                    .await
                    .map_err(|e| EdgeError::from_api("describe_vpc", e))?
                    .cidr
                }
            };
            partners.cidrs.push(cidr);

            let (own, other) = (&ctx.peer.vpc_id, &partner.vpc_id);
            let records = retry_api(&self.options.retry, "find_connections", || {
                ctx.api.find_connections(own, other)
            })
            .await
            .map_err(|e| EdgeError::from_api("find_connections", e))?;
            partners.connections.extend(
                records
                    .into_iter()
                    .filter(|record| !record.status.is_gone())
                    .map(|record| record.id),
            );
        }

        Ok(partners)
    }

    /// Tables the reconciler is allowed to write, main excluded
    async fn eligible_tables(&self, ctx: &PeerContext) -> Result<BTreeSet<RouteTableId>, EdgeError> {
        let mut eligible = BTreeSet::new();
        if !ctx.peer.has_additional_routes {
            return Ok(eligible);
        }
        for role in [PeeringRole::Source, PeeringRole::Target] {
            let marker = ctx.peer.marker(&self.options.tag_prefix, role);
            let targets = retry_api(&self.options.retry, "discover", || {
                discover(ctx.api.as_ref(), &ctx.peer, &marker)
            })
            .await
            .map_err(|e| EdgeError::from_api("discover", e))?;
            eligible.extend(targets.into_iter().map(|t| t.table_id));
        }
        Ok(eligible)
    }
}
