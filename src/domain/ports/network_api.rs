//! Network API Port
//!
//! One `NetworkApi` value is an authenticated handle scoped to a single
//! account and region. Every read and mutation the orchestrator performs
//! against the provider goes through this trait. The application layer
//! never sees which adapter sits behind it; the in-memory cloud is the one
//! that ships.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::{ConnectionRecord, ExistingRoute, PeeringSide};
use crate::domain::value_objects::{
    AccountId, Cidr, ConnectionId, MarkerTag, Region, RouteTableId, SubnetId, VpcId,
};

/// Result alias for provider calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Provider error, classified for retry decisions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request rate exceeded
    #[error("throttled: {0}")]
    Throttled(String),
    /// Request did not complete in time
    #[error("timed out: {0}")]
    Timeout(String),
    /// Endpoint unreachable or returned a server error
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Request rejected as malformed or semantically invalid
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Throttling and network-level failures are worth retrying; validation
    /// and permission errors are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::Throttled(_) | ApiError::Timeout(_) | ApiError::Unavailable(_)
        )
    }
}

/// VPC attributes the orchestrator needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcInfo {
    pub vpc_id: VpcId,
    pub account_id: AccountId,
    pub region: Region,
    /// Primary CIDR block
    pub cidr: Cidr,
}

/// Parameters of a new peering request, issued from the requester context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringRequest {
    pub requester_vpc: VpcId,
    pub accepter_vpc: VpcId,
    pub accepter_account: AccountId,
    pub accepter_region: Region,
    pub tags: BTreeMap<String, String>,
}

/// A route table with its associations and routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTableInfo {
    pub id: RouteTableId,
    pub vpc_id: VpcId,
    /// The VPC main route table
    #[serde(default)]
    pub main: bool,
    /// Subnets explicitly associated with this table
    #[serde(default)]
    pub subnets: Vec<SubnetId>,
    #[serde(default)]
    pub routes: Vec<ExistingRoute>,
}

/// Provider operations, scoped to one credential context
#[async_trait]
pub trait NetworkApi: Send + Sync {
    /// Account and region this handle acts in
    fn scope(&self) -> (AccountId, Region);

    async fn describe_vpc(&self, vpc: &VpcId) -> ApiResult<VpcInfo>;

    /// Connections linking the two VPCs, in either orientation and any status
    async fn find_connections(&self, a: &VpcId, b: &VpcId) -> ApiResult<Vec<ConnectionRecord>>;

    /// `Ok(None)` when the provider has no record of the connection
    async fn describe_connection(&self, id: &ConnectionId) -> ApiResult<Option<ConnectionRecord>>;

    async fn request_connection(&self, request: &PeeringRequest) -> ApiResult<ConnectionRecord>;

    /// Accept a pending request; must be called from the accepter context
    async fn accept_connection(&self, id: &ConnectionId) -> ApiResult<ConnectionRecord>;

    async fn delete_connection(&self, id: &ConnectionId) -> ApiResult<()>;

    /// Set remote DNS resolution for one side; must be called from that side's context
    async fn set_dns_resolution(
        &self,
        id: &ConnectionId,
        side: PeeringSide,
        enabled: bool,
    ) -> ApiResult<()>;

    async fn route_tables(&self, vpc: &VpcId) -> ApiResult<Vec<RouteTableInfo>>;

    /// Subnets in the VPC carrying exactly this marker tag
    async fn tagged_subnets(&self, vpc: &VpcId, marker: &MarkerTag) -> ApiResult<Vec<SubnetId>>;

    async fn routes(&self, table: &RouteTableId) -> ApiResult<Vec<ExistingRoute>>;

    async fn create_route(
        &self,
        table: &RouteTableId,
        destination: Cidr,
        connection: &ConnectionId,
    ) -> ApiResult<()>;

    /// Repoint an existing route at a different connection
    async fn replace_route(
        &self,
        table: &RouteTableId,
        destination: Cidr,
        connection: &ConnectionId,
    ) -> ApiResult<()>;

    async fn delete_route(&self, table: &RouteTableId, destination: Cidr) -> ApiResult<()>;
}
