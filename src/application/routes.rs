//! Route Reconciler
//!
//! Computes and applies the route set for both directions of an edge. The
//! owning peer's main table always gets the route; marker-tagged subnet
//! tables get it only when the owner opts in with `has_additional_routes`.
//! Tables are read and written under a per-table lock so two edges sharing
//! a main table cannot lose each other's updates.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use super::options::RunOptions;
use super::report::{RouteOutcome, RouteResult};
use super::resolver::PeerContext;
use crate::domain::entities::{PeeringConnection, RouteTableTarget, RouteTarget};
use crate::domain::ports::ApiError;
use crate::domain::services::{discover, main_table, CompetingState, RouteAction, RoutePlanner};
use crate::domain::value_objects::{Cidr, ConnectionId, PeeringRole, RouteTableId};
use crate::error::EdgeError;
use crate::infrastructure::retry::retry_api;

/// Arena of per-route-table mutexes shared by every edge in a run
#[derive(Debug, Default)]
pub struct TableLocks {
    locks: Mutex<HashMap<RouteTableId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `table`
    pub async fn lock(&self, table: &RouteTableId) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(table.clone()).or_default())
        };
        mutex.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Route results for an edge plus direction-level failures
#[derive(Debug, Default)]
pub struct ReconcileResult {
    pub routes: Vec<RouteResult>,
    pub errors: Vec<EdgeError>,
}

pub struct RouteReconciler {
    options: RunOptions,
    locks: Arc<TableLocks>,
}

impl RouteReconciler {
    pub fn new(options: RunOptions, locks: Arc<TableLocks>) -> Self {
        Self { options, locks }
    }

    /// Reconcile both directions of `connection`.
    ///
    /// `source` owns the tables tagged with the source marker, `target` the
    /// tables tagged with the target marker.
    pub async fn reconcile(
        &self,
        connection: &PeeringConnection,
        source: &PeerContext,
        target: &PeerContext,
    ) -> ReconcileResult {
        let mut result = ReconcileResult::default();
        for (owner, partner, role) in [
            (source, target, PeeringRole::Source),
            (target, source, PeeringRole::Target),
        ] {
            if let Err(e) = self
                .reconcile_direction(connection, owner, partner, role, &mut result)
                .await
            {
                warn!(owner = %owner.peer.id, error = %e, "Route direction failed");
                result.errors.push(e);
            }
        }
        result
    }

    async fn reconcile_direction(
        &self,
        connection: &PeeringConnection,
        owner: &PeerContext,
        partner: &PeerContext,
        role: PeeringRole,
        result: &mut ReconcileResult,
    ) -> Result<(), EdgeError> {
        let destination = self.destination_cidr(partner).await?;
        let targets = self.targets(owner, role).await?;

        for target in targets {
            let route = self
                .reconcile_table(connection, owner, &target, destination)
                .await;
            match route {
                Ok(route) => result.routes.push(route),
                Err((route, error)) => {
                    result.routes.push(route);
                    result.errors.push(error);
                }
            }
        }
        Ok(())
    }

    /// Partner CIDR from the inventory, else from the partner's own context
    async fn destination_cidr(&self, partner: &PeerContext) -> Result<Cidr, EdgeError> {
        if let Some(cidr) = partner.peer.cidr {
            return Ok(cidr);
        }
        let vpc = &partner.peer.vpc_id;
        let info = retry_api(&self.options.retry, "describe_vpc", || {
            partner.api.describe_vpc(vpc)
        })
        .await
        .map_err(|e| EdgeError::from_api("describe_vpc", e))?;
        debug!(peer = %partner.peer.id, cidr = %info.cidr, "Looked up VPC CIDR");
        Ok(info.cidr)
    }

    /// Main table, plus marker-discovered tables when the owner opts in
    pub async fn targets(
        &self,
        owner: &PeerContext,
        role: PeeringRole,
    ) -> Result<Vec<RouteTableTarget>, EdgeError> {
        let vpc = &owner.peer.vpc_id;
        let tables = retry_api(&self.options.retry, "route_tables", || {
            owner.api.route_tables(vpc)
        })
        .await
        .map_err(|e| EdgeError::from_api("route_tables", e))?;

        let main = main_table(&tables).cloned().ok_or_else(|| EdgeError::Api {
            operation: "route_tables".to_string(),
            message: format!("{} has no main route table", vpc),
        })?;

        let mut seen = BTreeSet::from([main.clone()]);
        let mut targets = vec![RouteTableTarget::main(main, owner.peer.id.clone())];

        if owner.peer.has_additional_routes {
            let marker = owner.peer.marker(&self.options.tag_prefix, role);
            let discovered = retry_api(&self.options.retry, "discover", || {
                discover(owner.api.as_ref(), &owner.peer, &marker)
            })
            .await
            .map_err(|e| EdgeError::from_api("discover", e))?;

            debug!(peer = %owner.peer.id, %marker, tables = discovered.len(), "Discovered tagged tables");
            for target in discovered {
                if seen.insert(target.table_id.clone()) {
                    targets.push(target);
                }
            }
        }

        Ok(targets)
    }

    async fn reconcile_table(
        &self,
        connection: &PeeringConnection,
        owner: &PeerContext,
        target: &RouteTableTarget,
        destination: Cidr,
    ) -> Result<RouteResult, (RouteResult, EdgeError)> {
        let table = &target.table_id;
        let next_hop = &connection.id;
        let result = |outcome, detail: Option<String>| RouteResult {
            table: table.clone(),
            owner: owner.peer.id.clone(),
            scope: target.scope.clone(),
            destination,
            next_hop: next_hop.clone(),
            outcome,
            detail,
        };
        let failed = |operation: &str, e: ApiError| {
            let message = e.to_string();
            (
                result(RouteOutcome::Failed, Some(message)),
                EdgeError::from_api(operation, e),
            )
        };

        let _guard = self.locks.lock(table).await;

        let existing = retry_api(&self.options.retry, "routes", || owner.api.routes(table))
            .await
            .map_err(|e| failed("routes", e))?;

        let mut action = RoutePlanner::plan(&existing, destination, next_hop);
        if let RouteAction::Conflict {
            competing: RouteTarget::PeeringConnection(other),
        } = &action
        {
            let competing = self.competing_state(owner, other).await;
            action = RoutePlanner::reconsider(action, competing);
        }

        match action {
            RouteAction::Skip => Ok(result(RouteOutcome::AlreadySatisfied, None)),
            RouteAction::Create if self.options.dry_run => Ok(result(RouteOutcome::WouldCreate, None)),
            RouteAction::Create => {
                retry_api(&self.options.retry, "create_route", || {
                    owner.api.create_route(table, destination, next_hop)
                })
                .await
                .map_err(|e| failed("create_route", e))?;
                info!(table = %table, %destination, next_hop = %next_hop, "Created route");
                Ok(result(RouteOutcome::Created, None))
            }
            RouteAction::Replace { stale } if self.options.dry_run => {
                Ok(result(RouteOutcome::WouldReplace, Some(stale.to_string())))
            }
            RouteAction::Replace { stale } => {
                retry_api(&self.options.retry, "replace_route", || {
                    owner.api.replace_route(table, destination, next_hop)
                })
                .await
                .map_err(|e| failed("replace_route", e))?;
                info!(table = %table, %destination, stale = %stale, "Replaced stale route");
                Ok(result(RouteOutcome::ReplacedStale, Some(stale.to_string())))
            }
            RouteAction::Conflict { competing } => {
                warn!(table = %table, %destination, competing = %competing, "Route conflict");
                Err((
                    result(RouteOutcome::Conflict, Some(competing.to_string())),
                    EdgeError::RouteConflict {
                        table: table.clone(),
                        destination: destination.to_string(),
                        competing: competing.to_string(),
                    },
                ))
            }
        }
    }

    /// Whether a competing connection is positively gone
    async fn competing_state(
        &self,
        owner: &PeerContext,
        other: &ConnectionId,
    ) -> CompetingState {
        let described = retry_api(&self.options.retry, "describe_connection", || {
            owner.api.describe_connection(other)
        })
        .await;
        match described {
            Ok(None) => CompetingState::Gone,
            Ok(Some(record)) if record.status.is_gone() => CompetingState::Gone,
            Ok(Some(_)) => CompetingState::Live,
            Err(e) => {
                debug!(connection = %other, error = %e, "Competing connection lookup failed");
                CompetingState::Unknown
            }
        }
    }
}
