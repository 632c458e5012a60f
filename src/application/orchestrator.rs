//! Orchestration Driver
//!
//! Walks the unique edges of the peering matrix and runs, per edge:
//! resolve contexts, ensure the connection, configure DNS, reconcile routes.
//! Edges run concurrently up to the configured bound. One edge's failure
//! never stops the others, and every edge ends up in the report.
//!
//! Cancellation is checked between steps: once tripped, no new step starts,
//! but the call in flight finishes so a request is never left unaccepted
//! mid-call.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use super::audit::{AuditReport, IsolationAudit};
use super::connection::{ConnectionManager, EnsureOutcome};
use super::dns::DnsConfigurator;
use super::options::RunOptions;
use super::report::{EdgeReport, RunKind, RunReport};
use super::resolver::{ContextResolver, PeerContext};
use super::routes::{RouteReconciler, TableLocks};
use super::teardown::Teardown;
use crate::domain::entities::PeeringEdge;
use crate::domain::ports::ContextFactory;
use crate::domain::services::Topology;
use crate::error::EdgeError;

pub struct Orchestrator {
    options: RunOptions,
    resolver: ContextResolver,
    connections: ConnectionManager,
    dns: DnsConfigurator,
    routes: RouteReconciler,
    teardown: Teardown,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(factory: Arc<dyn ContextFactory>, options: RunOptions) -> Self {
        let locks = Arc::new(TableLocks::new());
        Self {
            resolver: ContextResolver::new(factory),
            connections: ConnectionManager::new(options.clone()),
            dns: DnsConfigurator::new(options.retry.clone(), options.dry_run),
            routes: RouteReconciler::new(options.clone(), Arc::clone(&locks)),
            teardown: Teardown::new(options.clone(), locks),
            cancel: CancellationToken::new(),
            options,
        }
    }

    /// Use an externally owned token (e.g. tripped by Ctrl-C)
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One full reconciliation pass (or plan, under dry run)
    pub async fn apply(&self, topology: &Topology) -> RunReport {
        let kind = if self.options.dry_run {
            RunKind::Plan
        } else {
            RunKind::Apply
        };
        let edges = topology.edges.clone();
        self.drive(kind, topology, edges, |edge, source, target| {
            self.apply_edge(edge, source, target)
        })
        .await
    }

    /// Remove routes and connections for `edges` (all edges when `None`)
    pub async fn teardown(&self, topology: &Topology, only: Option<&[PeeringEdge]>) -> RunReport {
        let edges: Vec<PeeringEdge> = match only {
            Some(selected) => topology
                .edges
                .iter()
                .filter(|edge| {
                    selected
                        .iter()
                        .any(|s| s.unordered_key() == edge.unordered_key())
                })
                .cloned()
                .collect(),
            None => topology.edges.clone(),
        };
        self.drive(RunKind::Teardown, topology, edges, |edge, source, target| async move {
            self.teardown.run(&edge, &source, &target).await
        })
        .await
    }

    /// Read-only isolation check across every peer
    pub async fn audit(&self, topology: &Topology) -> AuditReport {
        IsolationAudit::new(self.options.clone())
            .run(topology, &self.resolver)
            .await
    }

    async fn drive<F, Fut>(
        &self,
        kind: RunKind,
        topology: &Topology,
        edges: Vec<PeeringEdge>,
        step: F,
    ) -> RunReport
    where
        F: Fn(PeeringEdge, PeerContext, PeerContext) -> Fut,
        Fut: Future<Output = EdgeReport>,
    {
        let started_at = Utc::now();
        info!(
            kind = kind.as_str(),
            edges = edges.len(),
            concurrency = self.options.concurrency,
            "Starting run"
        );

        let step = &step;
        let mut indexed: Vec<(usize, EdgeReport)> = stream::iter(edges.into_iter().enumerate())
            .map(|(index, edge)| {
                let span = info_span!("edge", source = %edge.source, target = %edge.target);
                async move { (index, self.process(topology, edge, step).await) }.instrument(span)
            })
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let report = RunReport::new(
            kind,
            self.options.dry_run,
            started_at,
            indexed.into_iter().map(|(_, report)| report).collect(),
        );
        info!(
            succeeded = report.tally.succeeded,
            degraded = report.tally.degraded,
            failed = report.tally.failed,
            skipped = report.tally.skipped,
            "Run complete"
        );
        report
    }

    /// Resolve both contexts, then hand the edge to `step`
    async fn process<F, Fut>(&self, topology: &Topology, edge: PeeringEdge, step: &F) -> EdgeReport
    where
        F: Fn(PeeringEdge, PeerContext, PeerContext) -> Fut,
        Fut: Future<Output = EdgeReport>,
    {
        if self.cancel.is_cancelled() {
            return EdgeReport::skipped(&edge);
        }

        let (Some(source), Some(target)) = (
            topology.registry.get(&edge.source),
            topology.registry.get(&edge.target),
        ) else {
            // Topology validation rejects unknown peers before this point
            let mut report = EdgeReport::new(&edge);
            report.fail(EdgeError::Api {
                operation: "resolve".to_string(),
                message: "edge references a peer outside the registry".to_string(),
            });
            return report.finish();
        };

        let (source_ctx, target_ctx) =
            tokio::join!(self.resolver.resolve(source), self.resolver.resolve(target));
        let (source_ctx, target_ctx) = match (source_ctx, target_ctx) {
            (Ok(s), Ok(t)) => (s, t),
            (s, t) => {
                let mut report = EdgeReport::new(&edge);
                report.errors.extend(s.err());
                report.errors.extend(t.err());
                warn!("Skipping edge: credential context unavailable");
                return report.finish();
            }
        };

        let report = step(edge, source_ctx, target_ctx).await;
        info!(status = %report.status, routes = report.routes.len(), "Edge finished");
        report
    }

    async fn apply_edge(&self, edge: PeeringEdge, source: PeerContext, target: PeerContext) -> EdgeReport {
        let mut report = EdgeReport::new(&edge);

        if self.cancel.is_cancelled() {
            return EdgeReport::skipped(&edge);
        }
        let ensured = match self.connections.ensure(&source, &target, &self.cancel).await {
            Ok(EnsureOutcome::Ready(ensured)) => ensured,
            Ok(EnsureOutcome::Pending(ensured, error)) => {
                warn!(connection = %ensured.connection.id, error = %error, "Connection not active yet");
                report.connection = Some(ensured.summary());
                report.fail(error);
                return report.finish();
            }
            Err(error) => {
                report.fail(error);
                return report.finish();
            }
        };
        report.connection = Some(ensured.summary());

        if self.cancel.is_cancelled() {
            report.fail(EdgeError::Cancelled);
            return report.finish();
        }
        let dns = self.dns.apply(&ensured.connection, &source, &target).await;
        report.dns = dns.settings;
        report.warnings.extend(dns.warnings);

        if self.cancel.is_cancelled() {
            report.fail(EdgeError::Cancelled);
            return report.finish();
        }
        let routes = self.routes.reconcile(&ensured.connection, &source, &target).await;
        report.routes = routes.routes;
        report.errors.extend(routes.errors);

        report.finish()
    }
}
