//! Peering Connection Manager
//!
//! Ensures exactly one usable peering connection between the two ends of an
//! edge. Existing connections are looked up in both orientations and reused;
//! a half-finished request from an earlier run is resumed from the accepter
//! side instead of being recreated.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::options::RunOptions;
use super::report::ConnectionSummary;
use super::resolver::PeerContext;
use crate::domain::entities::{
    ConnectionRecord, ConnectionState, ConnectionStatus, PeeringConnection,
};
use crate::domain::ports::PeeringRequest;
use crate::domain::value_objects::ConnectionId;
use crate::error::EdgeError;
use crate::infrastructure::retry::retry_api;

/// Connection plus what this run did to it
#[derive(Debug, Clone)]
pub struct EnsuredConnection {
    pub connection: PeeringConnection,
    pub created: bool,
    pub accepted: bool,
    /// Dry run found nothing; `connection` is a placeholder
    pub would_request: bool,
}

impl EnsuredConnection {
    fn existing(connection: PeeringConnection) -> Self {
        Self {
            connection,
            created: false,
            accepted: false,
            would_request: false,
        }
    }

    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            created: self.created,
            accepted: self.accepted,
            would_request: self.would_request,
            ..ConnectionSummary::from_connection(&self.connection)
        }
    }
}

/// Outcome of [`ConnectionManager::ensure`]
#[derive(Debug)]
pub enum EnsureOutcome {
    /// Connection is active, or planned under dry run
    Ready(EnsuredConnection),
    /// Connection exists but is not active; the next run resumes it
    Pending(EnsuredConnection, EdgeError),
}

pub struct ConnectionManager {
    options: RunOptions,
}

impl ConnectionManager {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Find, resume or create the connection between `source` and `target`.
    ///
    /// Requests are issued from the source context and accepted from the
    /// target context, even when both share an account and region.
    pub async fn ensure(
        &self,
        source: &PeerContext,
        target: &PeerContext,
        cancel: &CancellationToken,
    ) -> Result<EnsureOutcome, EdgeError> {
        let retry = &self.options.retry;
        let (src_vpc, tgt_vpc) = (&source.peer.vpc_id, &target.peer.vpc_id);

        let records = retry_api(retry, "find_connections", || {
            source.api.find_connections(src_vpc, tgt_vpc)
        })
        .await
        .map_err(|e| EdgeError::from_api("find_connections", e))?;

        if let Some(record) = pick_usable(records) {
            let (requester, accepter) = if &record.requester_vpc == src_vpc {
                (source, target)
            } else {
                (target, source)
            };
            let connection =
                PeeringConnection::from_record(&record, requester.peer.id.clone(), accepter.peer.id.clone());
            debug!(connection = %connection.id, status = %connection.status, "Found existing connection");

            let state = connection.state;
            return match state {
                ConnectionState::Active => Ok(EnsureOutcome::Ready(EnsuredConnection::existing(connection))),
                _ if self.options.dry_run => Ok(EnsureOutcome::Ready(EnsuredConnection::existing(connection))),
                ConnectionState::Requested => {
                    info!(connection = %connection.id, "Resuming pending acceptance");
                    let ensured = EnsuredConnection::existing(connection);
                    Ok(self.accept_and_wait(ensured, requester, accepter, cancel).await)
                }
                _ => {
                    let ensured = EnsuredConnection::existing(connection);
                    Ok(self.wait_active(ensured, requester, cancel).await)
                }
            };
        }

        if self.options.dry_run {
            let placeholder = PeeringConnection {
                id: ConnectionId::planned(),
                requester: source.peer.id.clone(),
                accepter: target.peer.id.clone(),
                state: ConnectionState::Requested,
                status: ConnectionStatus::InitiatingRequest,
                cross_context: !source.peer.shares_context_with(&target.peer),
            };
            return Ok(EnsureOutcome::Ready(EnsuredConnection {
                connection: placeholder,
                created: false,
                accepted: false,
                would_request: true,
            }));
        }

        let request = PeeringRequest {
            requester_vpc: src_vpc.clone(),
            accepter_vpc: tgt_vpc.clone(),
            accepter_account: target.peer.account_id.clone(),
            accepter_region: target.peer.region.clone(),
            tags: self.connection_tags(source, target),
        };
        let record = retry_api(retry, "request_connection", || {
            source.api.request_connection(&request)
        })
        .await
        .map_err(|e| EdgeError::from_api("request_connection", e))?;

        let connection =
            PeeringConnection::from_record(&record, source.peer.id.clone(), target.peer.id.clone());
        info!(
            connection = %connection.id,
            cross_context = connection.cross_context,
            "Requested peering connection"
        );

        let ensured = EnsuredConnection {
            connection,
            created: true,
            accepted: false,
            would_request: false,
        };
        if ensured.connection.state.is_active() {
            return Ok(EnsureOutcome::Ready(ensured));
        }
        Ok(self.accept_and_wait(ensured, source, target, cancel).await)
    }

    fn connection_tags(&self, source: &PeerContext, target: &PeerContext) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "Name".to_string(),
                format!("tether-{}-{}", source.peer.id, target.peer.id),
            ),
            (self.options.managed_tag_key(), "true".to_string()),
        ])
    }

    async fn accept_and_wait(
        &self,
        mut ensured: EnsuredConnection,
        requester: &PeerContext,
        accepter: &PeerContext,
        cancel: &CancellationToken,
    ) -> EnsureOutcome {
        let id = ensured.connection.id.clone();
        let accepted = retry_api(&self.options.retry, "accept_connection", || {
            accepter.api.accept_connection(&id)
        })
        .await;

        match accepted {
            Ok(record) => {
                ensured.accepted = true;
                if let Err(e) = ensured.connection.observe(record.status) {
                    return EnsureOutcome::Pending(
                        ensured,
                        EdgeError::PartialConnection {
                            connection: id,
                            message: e.to_string(),
                        },
                    );
                }
                info!(connection = %id, accepter = %accepter.peer.id, "Accepted peering connection");
                self.wait_active(ensured, requester, cancel).await
            }
            Err(e) => {
                warn!(connection = %id, error = %e, "Acceptance failed; leaving request pending");
                EnsureOutcome::Pending(
                    ensured,
                    EdgeError::PartialConnection {
                        connection: id,
                        message: format!("acceptance failed: {}", e),
                    },
                )
            }
        }
    }

    /// Poll until active, gone, or out of attempts
    async fn wait_active(
        &self,
        mut ensured: EnsuredConnection,
        observer: &PeerContext,
        cancel: &CancellationToken,
    ) -> EnsureOutcome {
        let id = ensured.connection.id.clone();
        let policy = &self.options.acceptance;

        for attempt in 0..=policy.poll_attempts {
            if ensured.connection.state.is_active() {
                return EnsureOutcome::Ready(ensured);
            }
            if attempt == policy.poll_attempts || cancel.is_cancelled() {
                break;
            }
            tokio::time::sleep(policy.poll_interval).await;

            let described = retry_api(&self.options.retry, "describe_connection", || {
                observer.api.describe_connection(&id)
            })
            .await;
            let status = match described {
                Ok(Some(record)) => record.status,
                Ok(None) => ConnectionStatus::Deleted,
                Err(e) => {
                    debug!(connection = %id, error = %e, "Status poll failed");
                    continue;
                }
            };
            if let Err(e) = ensured.connection.observe(status) {
                warn!(connection = %id, error = %e, "Unexpected status change");
            }
            if ensured.connection.state == ConnectionState::Failed {
                let message = format!("connection entered state {}", status);
                return EnsureOutcome::Pending(
                    ensured,
                    EdgeError::PartialConnection {
                        connection: id,
                        message,
                    },
                );
            }
        }

        let message = format!("still {} after polling", ensured.connection.status);
        EnsureOutcome::Pending(
            ensured,
            EdgeError::PartialConnection {
                connection: id,
                message,
            },
        )
    }
}

/// Best existing connection: active first, then provisioning, then pending.
/// Connections that can never carry traffic are ignored.
fn pick_usable(records: Vec<ConnectionRecord>) -> Option<ConnectionRecord> {
    records
        .into_iter()
        .filter(|record| !record.status.is_gone())
        .min_by_key(|record| match record.status.state() {
            ConnectionState::Active => 0,
            ConnectionState::Accepted => 1,
            ConnectionState::Requested => 2,
            ConnectionState::Failed => 3,
        })
}
