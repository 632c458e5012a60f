//! DNS Resolution Configurator
//!
//! Sets "allow remote VPC DNS resolution" on each side of an active
//! connection from that side's own policy flag. A peer with DNS disabled is
//! never enabled, whatever its partner wants. Failures degrade the edge but
//! never abort it.

use tracing::{debug, warn};

use super::report::{DnsOutcome, DnsSetting};
use super::resolver::PeerContext;
use crate::domain::entities::{ConnectionRecord, PeeringConnection, PeeringSide};
use crate::infrastructure::retry::{retry_api, RetryPolicy};

/// DNS settings plus warnings for anything that could not be applied
#[derive(Debug, Default)]
pub struct DnsResult {
    pub settings: Vec<DnsSetting>,
    pub warnings: Vec<String>,
}

pub struct DnsConfigurator {
    retry: RetryPolicy,
    dry_run: bool,
}

impl DnsConfigurator {
    pub fn new(retry: RetryPolicy, dry_run: bool) -> Self {
        Self { retry, dry_run }
    }

    /// Apply both sides. `source` and `target` may be passed in either
    /// orientation; each is matched to its side by peer identifier.
    pub async fn apply(
        &self,
        connection: &PeeringConnection,
        source: &PeerContext,
        target: &PeerContext,
    ) -> DnsResult {
        let mut result = DnsResult::default();

        let sides = [source, target].map(|ctx| {
            let side = connection.side_of(&ctx.peer.id).unwrap_or(PeeringSide::Requester);
            (side, ctx)
        });

        if !connection.state.is_active() {
            for (side, ctx) in sides {
                result.settings.push(DnsSetting {
                    peer: ctx.peer.id.clone(),
                    side,
                    enabled: ctx.peer.dns_resolution,
                    outcome: DnsOutcome::Skipped,
                });
            }
            return result;
        }

        for (side, ctx) in sides {
            let desired = ctx.peer.dns_resolution;
            let outcome = match self.apply_side(connection, side, ctx, desired).await {
                Ok(outcome) => outcome,
                Err(message) => {
                    warn!(
                        connection = %connection.id,
                        peer = %ctx.peer.id,
                        error = %message,
                        "DNS resolution not applied"
                    );
                    result.warnings.push(format!(
                        "DNS resolution for {} ({} side) not applied: {}",
                        ctx.peer.id, side, message
                    ));
                    DnsOutcome::Failed
                }
            };
            result.settings.push(DnsSetting {
                peer: ctx.peer.id.clone(),
                side,
                enabled: desired,
                outcome,
            });
        }

        result
    }

    async fn apply_side(
        &self,
        connection: &PeeringConnection,
        side: PeeringSide,
        ctx: &PeerContext,
        desired: bool,
    ) -> Result<DnsOutcome, String> {
        let id = &connection.id;
        let record = retry_api(&self.retry, "describe_connection", || {
            ctx.api.describe_connection(id)
        })
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("{} not visible from {}", id, ctx.peer.id))?;

        if current(&record, side) == desired {
            debug!(connection = %id, peer = %ctx.peer.id, desired, "DNS resolution already set");
            return Ok(DnsOutcome::Unchanged);
        }
        if self.dry_run {
            return Ok(DnsOutcome::WouldApply);
        }

        retry_api(&self.retry, "set_dns_resolution", || {
            ctx.api.set_dns_resolution(id, side, desired)
        })
        .await
        .map_err(|e| e.to_string())?;

        debug!(connection = %id, peer = %ctx.peer.id, %side, desired, "DNS resolution applied");
        Ok(DnsOutcome::Applied)
    }
}

fn current(record: &ConnectionRecord, side: PeeringSide) -> bool {
    match side {
        PeeringSide::Requester => record.requester_dns_resolution,
        PeeringSide::Accepter => record.accepter_dns_resolution,
    }
}
