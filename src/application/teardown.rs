//! Teardown
//!
//! The only path that destroys anything. For one edge it removes every
//! route, in any table of either VPC, whose next hop is one of the edge's
//! peering connections, then deletes those connections. Routes pointing
//! elsewhere are never touched, and running it twice is harmless.

use std::sync::Arc;

use tracing::{info, warn};

use super::options::RunOptions;
use super::report::{ConnectionSummary, EdgeReport, RouteOutcome, RouteResult};
use super::resolver::PeerContext;
use super::routes::TableLocks;
use crate::domain::entities::{ConnectionRecord, PeeringConnection, PeeringEdge};
use crate::domain::ports::ApiError;
use crate::domain::value_objects::RouteScope;
use crate::error::EdgeError;
use crate::infrastructure::retry::retry_api;

pub struct Teardown {
    options: RunOptions,
    locks: Arc<TableLocks>,
}

impl Teardown {
    pub fn new(options: RunOptions, locks: Arc<TableLocks>) -> Self {
        Self { options, locks }
    }

    pub async fn run(
        &self,
        edge: &PeeringEdge,
        source: &PeerContext,
        target: &PeerContext,
    ) -> EdgeReport {
        let mut report = EdgeReport::new(edge);
        let (src_vpc, tgt_vpc) = (&source.peer.vpc_id, &target.peer.vpc_id);

        let records = match retry_api(&self.options.retry, "find_connections", || {
            source.api.find_connections(src_vpc, tgt_vpc)
        })
        .await
        {
            Ok(records) => records,
            Err(e) => {
                report.fail(EdgeError::from_api("find_connections", e));
                return report.finish();
            }
        };

        let live: Vec<ConnectionRecord> = records
            .into_iter()
            .filter(|record| !record.status.is_gone())
            .collect();
        if live.is_empty() {
            info!(edge = %edge, "No connection to tear down");
            return report.finish();
        }

        for record in live {
            let (requester, accepter) = if &record.requester_vpc == src_vpc {
                (source, target)
            } else {
                (target, source)
            };
            let connection = PeeringConnection::from_record(
                &record,
                requester.peer.id.clone(),
                accepter.peer.id.clone(),
            );

            let mut clean = true;
            for owner in [source, target] {
                if let Err(e) = self.remove_routes(&connection, owner, &mut report).await {
                    clean = false;
                    report.fail(e);
                }
            }

            let mut summary = ConnectionSummary::from_connection(&connection);
            if !clean {
                warn!(connection = %connection.id, "Keeping connection; some routes could not be removed");
            } else if self.options.dry_run {
                summary.would_delete = true;
            } else {
                let id = &connection.id;
                match retry_api(&self.options.retry, "delete_connection", || {
                    requester.api.delete_connection(id)
                })
                .await
                {
                    Ok(()) => {
                        info!(connection = %id, "Deleted peering connection");
                        summary.deleted = true;
                    }
                    Err(e) => report.fail(EdgeError::from_api("delete_connection", e)),
                }
            }
            if report.connection.is_none() {
                report.connection = Some(summary);
            } else {
                report.extra_connections.push(summary);
            }
        }

        report.finish()
    }

    async fn remove_routes(
        &self,
        connection: &PeeringConnection,
        owner: &PeerContext,
        report: &mut EdgeReport,
    ) -> Result<(), EdgeError> {
        let vpc = &owner.peer.vpc_id;
        let tables = retry_api(&self.options.retry, "route_tables", || {
            owner.api.route_tables(vpc)
        })
        .await
        .map_err(|e| EdgeError::from_api("route_tables", e))?;

        let mut first_error = None;
        for table in tables {
            let scope = if table.main {
                RouteScope::Main
            } else {
                RouteScope::Other
            };
            let _guard = self.locks.lock(&table.id).await;

            let routes = match retry_api(&self.options.retry, "routes", || {
                owner.api.routes(&table.id)
            })
            .await
            {
                Ok(routes) => routes,
                Err(e) => {
                    warn!(table = %table.id, error = %e, "Could not read routes");
                    first_error.get_or_insert(EdgeError::from_api("routes", e));
                    continue;
                }
            };

            for route in routes
                .iter()
                .filter(|r| r.target.peering_connection() == Some(&connection.id))
            {
                let outcome = if self.options.dry_run {
                    RouteOutcome::WouldRemove
                } else {
                    let removed = retry_api(&self.options.retry, "delete_route", || {
                        owner.api.delete_route(&table.id, route.destination)
                    })
                    .await;
                    match removed {
                        Ok(()) | Err(ApiError::NotFound(_)) => RouteOutcome::Removed,
                        Err(e) => {
                            first_error.get_or_insert(EdgeError::from_api("delete_route", e));
                            RouteOutcome::Failed
                        }
                    }
                };
                report.routes.push(RouteResult {
                    table: table.id.clone(),
                    owner: owner.peer.id.clone(),
                    scope: scope.clone(),
                    destination: route.destination,
                    next_hop: connection.id.clone(),
                    outcome,
                    detail: None,
                });
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
