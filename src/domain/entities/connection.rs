//! Peering connection entity and its acceptance state machine
//!
//! Cross-account and cross-region peering is a two-phase protocol: the
//! requester side creates a request, the accepter side accepts it. The
//! provider persists the intermediate state, so a run that dies between the
//! two phases resumes from `Requested` on the next run instead of creating
//! a second connection.
//!
//! ```text
//! Requested ──accept──▶ Accepted ──provisioned──▶ Active
//!     │                    │                        │
//!     └────────────────────┴──────────▶ Failed ◀────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{AccountId, ConnectionId, PeerId, Region, VpcId};

/// Status as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    InitiatingRequest,
    PendingAcceptance,
    Provisioning,
    Active,
    Failed,
    Rejected,
    Expired,
    Deleting,
    Deleted,
}

impl ConnectionStatus {
    /// Collapse the provider status onto the orchestrator's state machine
    pub fn state(&self) -> ConnectionState {
        match self {
            ConnectionStatus::InitiatingRequest | ConnectionStatus::PendingAcceptance => {
                ConnectionState::Requested
            }
            ConnectionStatus::Provisioning => ConnectionState::Accepted,
            ConnectionStatus::Active => ConnectionState::Active,
            ConnectionStatus::Failed
            | ConnectionStatus::Rejected
            | ConnectionStatus::Expired
            | ConnectionStatus::Deleting
            | ConnectionStatus::Deleted => ConnectionState::Failed,
        }
    }

    /// The connection no longer exists or can never carry traffic again
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::Failed
                | ConnectionStatus::Rejected
                | ConnectionStatus::Expired
                | ConnectionStatus::Deleting
                | ConnectionStatus::Deleted
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::InitiatingRequest => "initiating-request",
            ConnectionStatus::PendingAcceptance => "pending-acceptance",
            ConnectionStatus::Provisioning => "provisioning",
            ConnectionStatus::Active => "active",
            ConnectionStatus::Failed => "failed",
            ConnectionStatus::Rejected => "rejected",
            ConnectionStatus::Expired => "expired",
            ConnectionStatus::Deleting => "deleting",
            ConnectionStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator view of a connection's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Request issued, waiting for the accepter side
    Requested,
    /// Accepted, provider still provisioning
    Accepted,
    Active,
    Failed,
}

/// Rejected state machine move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot move connection from {:?} to {:?}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

impl ConnectionState {
    /// Move to `next`. Staying put is always allowed; `Failed` is reachable
    /// from anywhere and terminal.
    pub fn transition(self, next: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        use ConnectionState::*;

        let allowed = match (self, next) {
            (from, to) if from == to => true,
            (Failed, _) => false,
            (_, Failed) => true,
            (Requested, Accepted) | (Requested, Active) | (Accepted, Active) => true,
            _ => false,
        };

        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Active)
    }
}

/// A connection as the provider describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub requester_vpc: VpcId,
    pub requester_account: AccountId,
    pub requester_region: Region,
    pub accepter_vpc: VpcId,
    pub accepter_account: AccountId,
    pub accepter_region: Region,
    pub status: ConnectionStatus,
    /// Requester side may resolve accepter private DNS names
    #[serde(default)]
    pub requester_dns_resolution: bool,
    /// Accepter side may resolve requester private DNS names
    #[serde(default)]
    pub accepter_dns_resolution: bool,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ConnectionRecord {
    /// True when this record links exactly these two VPCs, in either orientation
    pub fn links(&self, a: &VpcId, b: &VpcId) -> bool {
        (&self.requester_vpc == a && &self.accepter_vpc == b)
            || (&self.requester_vpc == b && &self.accepter_vpc == a)
    }
}

/// A peering connection bound to the two inventory peers it joins
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeeringConnection {
    pub id: ConnectionId,
    /// Peer whose context issued the request
    pub requester: PeerId,
    /// Peer whose context accepts the request
    pub accepter: PeerId,
    pub state: ConnectionState,
    pub status: ConnectionStatus,
    /// Requester and accepter differ in account or region
    pub cross_context: bool,
}

impl PeeringConnection {
    pub fn from_record(
        record: &ConnectionRecord,
        requester: PeerId,
        accepter: PeerId,
    ) -> Self {
        Self {
            id: record.id.clone(),
            requester,
            accepter,
            state: record.status.state(),
            status: record.status,
            cross_context: record.requester_account != record.accepter_account
                || record.requester_region != record.accepter_region,
        }
    }

    /// Apply a freshly observed provider status through the state machine
    pub fn observe(&mut self, status: ConnectionStatus) -> Result<(), InvalidTransition> {
        self.state = self.state.transition(status.state())?;
        self.status = status;
        Ok(())
    }

    /// Which side of this connection a peer is on
    pub fn side_of(&self, peer: &PeerId) -> Option<PeeringSide> {
        if &self.requester == peer {
            Some(PeeringSide::Requester)
        } else if &self.accepter == peer {
            Some(PeeringSide::Accepter)
        } else {
            None
        }
    }
}

/// Side of a peering connection, as the provider names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeeringSide {
    Requester,
    Accepter,
}

impl fmt::Display for PeeringSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeeringSide::Requester => f.write_str("requester"),
            PeeringSide::Accepter => f.write_str("accepter"),
        }
    }
}
