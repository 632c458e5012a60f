//! Run Report
//!
//! Structured result of a reconciliation pass. Every edge gets an
//! [`EdgeReport`]; nothing is dropped, and the tally is derived from the
//! edge reports rather than tracked separately.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entities::{ConnectionState, ConnectionStatus, PeeringConnection, PeeringEdge, PeeringSide};
use crate::domain::value_objects::{Cidr, ConnectionId, PeerId, RouteScope, RouteTableId};
use crate::error::EdgeError;

/// Overall outcome of one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Succeeded,
    /// Connected, with warnings or a retryable partial step
    Degraded,
    Failed,
    /// Never started (cancelled)
    Skipped,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Succeeded => "succeeded",
            EdgeStatus::Degraded => "degraded",
            EdgeStatus::Failed => "failed",
            EdgeStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for EdgeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to one route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOutcome {
    Created,
    AlreadySatisfied,
    /// Repointed away from a connection confirmed gone
    ReplacedStale,
    Conflict,
    WouldCreate,
    WouldReplace,
    /// Removed during teardown
    Removed,
    WouldRemove,
    Failed,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Created => "created",
            RouteOutcome::AlreadySatisfied => "already_satisfied",
            RouteOutcome::ReplacedStale => "replaced_stale",
            RouteOutcome::Conflict => "conflict",
            RouteOutcome::WouldCreate => "would_create",
            RouteOutcome::WouldReplace => "would_replace",
            RouteOutcome::Removed => "removed",
            RouteOutcome::WouldRemove => "would_remove",
            RouteOutcome::Failed => "failed",
        }
    }
}

/// One route decision, attributed to its table
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
    pub table: RouteTableId,
    pub owner: PeerId,
    pub scope: RouteScope,
    pub destination: Cidr,
    pub next_hop: ConnectionId,
    pub outcome: RouteOutcome,
    /// Competing next hop for conflicts, stale connection for replacements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// DNS resolution result for one side of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsOutcome {
    /// Already at the desired value
    Unchanged,
    Applied,
    WouldApply,
    /// Connection not active; nothing to configure yet
    Skipped,
    Failed,
}

impl DnsOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsOutcome::Unchanged => "unchanged",
            DnsOutcome::Applied => "applied",
            DnsOutcome::WouldApply => "would_apply",
            DnsOutcome::Skipped => "skipped",
            DnsOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DnsSetting {
    pub peer: PeerId,
    pub side: PeeringSide,
    /// Desired value from the peer's policy
    pub enabled: bool,
    pub outcome: DnsOutcome,
}

/// Connection as it stood at the end of the edge
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub state: ConnectionState,
    pub status: ConnectionStatus,
    pub requester: PeerId,
    pub accepter: PeerId,
    /// Requested during this run
    pub created: bool,
    /// Accepted during this run
    pub accepted: bool,
    /// Dry run: no connection exists yet, one would be requested
    pub would_request: bool,
    /// Deleted during teardown
    pub deleted: bool,
    pub would_delete: bool,
}

impl ConnectionSummary {
    pub fn from_connection(connection: &PeeringConnection) -> Self {
        Self {
            id: connection.id.clone(),
            state: connection.state,
            status: connection.status,
            requester: connection.requester.clone(),
            accepter: connection.accepter.clone(),
            created: false,
            accepted: false,
            would_request: false,
            deleted: false,
            would_delete: false,
        }
    }
}

/// Everything that happened on one edge
#[derive(Debug, Clone, Serialize)]
pub struct EdgeReport {
    pub source: PeerId,
    pub target: PeerId,
    pub status: EdgeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionSummary>,
    /// Further live connections between the same VPCs (teardown only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_connections: Vec<ConnectionSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns: Vec<DnsSetting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EdgeError>,
}

impl EdgeReport {
    pub fn new(edge: &PeeringEdge) -> Self {
        Self {
            source: edge.source.clone(),
            target: edge.target.clone(),
            status: EdgeStatus::Succeeded,
            connection: None,
            extra_connections: Vec::new(),
            dns: Vec::new(),
            routes: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Report for an edge that was never started
    pub fn skipped(edge: &PeeringEdge) -> Self {
        let mut report = Self::new(edge);
        report.errors.push(EdgeError::Cancelled);
        report.finish()
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn fail(&mut self, error: EdgeError) {
        self.errors.push(error);
    }

    pub fn count(&self, outcome: RouteOutcome) -> usize {
        self.routes.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Derive the status from what was recorded
    pub fn finish(mut self) -> Self {
        self.status = self.derive_status();
        self
    }

    fn derive_status(&self) -> EdgeStatus {
        let nothing_done = self.connection.is_none() && self.routes.is_empty();
        if nothing_done
            && !self.errors.is_empty()
            && self.errors.iter().all(|e| matches!(e, EdgeError::Cancelled))
        {
            return EdgeStatus::Skipped;
        }

        let fatal = self.errors.iter().any(|e| {
            !matches!(
                e,
                EdgeError::PartialConnection { .. } | EdgeError::Cancelled
            )
        });
        if fatal {
            EdgeStatus::Failed
        } else if !self.errors.is_empty() || !self.warnings.is_empty() {
            EdgeStatus::Degraded
        } else {
            EdgeStatus::Succeeded
        }
    }
}

/// Per-status counts plus route totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub connections_created: usize,
    pub routes_created: usize,
    pub routes_satisfied: usize,
    pub routes_replaced: usize,
    pub routes_removed: usize,
    pub conflicts: usize,
}

impl Tally {
    pub fn from_edges(edges: &[EdgeReport]) -> Self {
        let mut tally = Self::default();
        for edge in edges {
            match edge.status {
                EdgeStatus::Succeeded => tally.succeeded += 1,
                EdgeStatus::Degraded => tally.degraded += 1,
                EdgeStatus::Failed => tally.failed += 1,
                EdgeStatus::Skipped => tally.skipped += 1,
            }
            if edge.connection.as_ref().is_some_and(|c| c.created) {
                tally.connections_created += 1;
            }
            tally.routes_created += edge.count(RouteOutcome::Created);
            tally.routes_satisfied += edge.count(RouteOutcome::AlreadySatisfied);
            tally.routes_replaced += edge.count(RouteOutcome::ReplacedStale);
            tally.routes_removed += edge.count(RouteOutcome::Removed);
            tally.conflicts += edge.count(RouteOutcome::Conflict);
        }
        tally
    }
}

/// Which use case produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Apply,
    Plan,
    Teardown,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Apply => "apply",
            RunKind::Plan => "plan",
            RunKind::Teardown => "teardown",
        }
    }
}

/// Aggregate result of one pass
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub kind: RunKind,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub edges: Vec<EdgeReport>,
    pub tally: Tally,
}

impl RunReport {
    pub fn new(
        kind: RunKind,
        dry_run: bool,
        started_at: DateTime<Utc>,
        edges: Vec<EdgeReport>,
    ) -> Self {
        let tally = Tally::from_edges(&edges);
        Self {
            kind,
            dry_run,
            started_at,
            finished_at: Utc::now(),
            edges,
            tally,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.tally.failed > 0
    }

    /// Process exit code: 1 on any failure, 2 for degraded edges under
    /// `strict`, 0 otherwise. Skipped edges count as degraded.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.has_failures() {
            1
        } else if strict && (self.tally.degraded > 0 || self.tally.skipped > 0) {
            2
        } else {
            0
        }
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeReport> {
        self.edges
            .iter()
            .find(|e| e.source.as_str() == source && e.target.as_str() == target)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteResult> {
        self.edges.iter().flat_map(|e| e.routes.iter())
    }
}
