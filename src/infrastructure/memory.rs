//! In-memory cloud
//!
//! A small model of VPCs, subnets, route tables and peering connections that
//! implements [`NetworkApi`] with the same scoping rules as the real
//! provider: a handle only sees resources in its own account and region,
//! only the accepter side may accept, and each side may only change its own
//! DNS option.
//!
//! Used by the test suite and by `--simulate`, where the state round-trips
//! through a JSON file.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    ConnectionRecord, ConnectionStatus, ExistingRoute, Peer, PeeringSide, RouteTarget,
};
use crate::domain::ports::{
    ApiError, ApiResult, AuthError, ContextFactory, NetworkApi, PeeringRequest, RouteTableInfo,
    VpcInfo,
};
use crate::domain::value_objects::{
    AccountId, Cidr, ConnectionId, MarkerTag, Region, RouteTableId, SubnetId, VpcId,
};

/// A VPC in the simulated cloud
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpcRecord {
    pub account_id: AccountId,
    pub region: Region,
    pub cidr: Cidr,
}

/// A subnet and its tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRecord {
    pub vpc_id: VpcId,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Count of mutating calls, for idempotence checks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationCounters {
    pub connections_requested: usize,
    pub connections_accepted: usize,
    pub connections_deleted: usize,
    pub dns_updates: usize,
    pub routes_created: usize,
    pub routes_replaced: usize,
    pub routes_deleted: usize,
}

impl MutationCounters {
    pub fn total(&self) -> usize {
        self.connections_requested
            + self.connections_accepted
            + self.connections_deleted
            + self.dns_updates
            + self.routes_created
            + self.routes_replaced
            + self.routes_deleted
    }
}

/// Injected failures; never persisted
#[derive(Debug, Clone, Default)]
struct Faults {
    /// Operation name -> number of upcoming calls to throttle
    throttle: BTreeMap<String, u32>,
    /// Operation name -> error returned on every call
    fail: BTreeMap<String, ApiError>,
    /// Accounts whose accept calls are refused
    reject_accepts: BTreeSet<AccountId>,
}

/// Full simulated state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudState {
    #[serde(default)]
    pub vpcs: BTreeMap<VpcId, VpcRecord>,
    #[serde(default)]
    pub subnets: BTreeMap<SubnetId, SubnetRecord>,
    #[serde(default)]
    pub route_tables: BTreeMap<RouteTableId, RouteTableInfo>,
    #[serde(default)]
    pub connections: BTreeMap<ConnectionId, ConnectionRecord>,
    /// Role ARNs whose assumption is refused
    #[serde(default)]
    pub denied_roles: BTreeSet<String>,
    #[serde(default)]
    pub counters: MutationCounters,
    #[serde(default)]
    next_id: u64,
    #[serde(skip)]
    faults: Faults,
}

impl CloudState {
    fn allocate(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    fn check_fault(&mut self, operation: &str) -> ApiResult<()> {
        if let Some(err) = self.faults.fail.get(operation) {
            return Err(err.clone());
        }
        if let Some(remaining) = self.faults.throttle.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Throttled(format!("{} rate exceeded", operation)));
            }
        }
        Ok(())
    }
}

/// Shared handle to the simulated cloud
#[derive(Debug, Clone, Default)]
pub struct InMemoryCloud {
    state: Arc<Mutex<CloudState>>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: CloudState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CloudState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> CloudState {
        self.lock().clone()
    }

    pub fn counters(&self) -> MutationCounters {
        self.lock().counters
    }

    /// Create a VPC with its main route table; returns the main table id
    pub fn add_vpc(
        &self,
        vpc: impl Into<VpcId>,
        account: impl Into<AccountId>,
        region: impl Into<Region>,
        cidr: Cidr,
    ) -> RouteTableId {
        let vpc = vpc.into();
        let mut state = self.lock();
        state.vpcs.insert(
            vpc.clone(),
            VpcRecord {
                account_id: account.into(),
                region: region.into(),
                cidr,
            },
        );
        let id = RouteTableId::new(state.allocate("rtb"));
        state.route_tables.insert(
            id.clone(),
            RouteTableInfo {
                id: id.clone(),
                vpc_id: vpc,
                main: true,
                subnets: Vec::new(),
                routes: vec![ExistingRoute::new(cidr, RouteTarget::Local)],
            },
        );
        id
    }

    /// Add a non-main route table to a VPC
    pub fn add_route_table(&self, vpc: impl Into<VpcId>) -> RouteTableId {
        let vpc = vpc.into();
        let mut state = self.lock();
        let local = state.vpcs.get(&vpc).map(|record| record.cidr);
        let id = RouteTableId::new(state.allocate("rtb"));
        state.route_tables.insert(
            id.clone(),
            RouteTableInfo {
                id: id.clone(),
                vpc_id: vpc,
                main: false,
                subnets: Vec::new(),
                routes: local
                    .map(|cidr| vec![ExistingRoute::new(cidr, RouteTarget::Local)])
                    .unwrap_or_default(),
            },
        );
        id
    }

    /// Add a subnet, optionally associated with a table, carrying `tags`
    pub fn add_subnet<I, K, V>(
        &self,
        vpc: impl Into<VpcId>,
        table: Option<&RouteTableId>,
        tags: I,
    ) -> SubnetId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.lock();
        let id = SubnetId::new(state.allocate("subnet"));
        state.subnets.insert(
            id.clone(),
            SubnetRecord {
                vpc_id: vpc.into(),
                tags: tags
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            },
        );
        if let Some(table) = table {
            if let Some(info) = state.route_tables.get_mut(table) {
                info.subnets.push(id.clone());
            }
        }
        id
    }

    /// Put a tag on an existing subnet
    pub fn tag_subnet(&self, subnet: &SubnetId, key: impl Into<String>, value: impl Into<String>) {
        if let Some(record) = self.lock().subnets.get_mut(subnet) {
            record.tags.insert(key.into(), value.into());
        }
    }

    /// Insert a route directly, bypassing the API (external drift)
    pub fn add_route(&self, table: &RouteTableId, destination: Cidr, target: RouteTarget) {
        if let Some(info) = self.lock().route_tables.get_mut(table) {
            info.routes.retain(|route| route.destination != destination);
            info.routes.push(ExistingRoute::new(destination, target));
        }
    }

    /// Insert a connection record directly (external drift)
    pub fn add_connection(&self, record: ConnectionRecord) {
        self.lock().connections.insert(record.id.clone(), record);
    }

    pub fn set_connection_status(&self, id: &ConnectionId, status: ConnectionStatus) {
        if let Some(record) = self.lock().connections.get_mut(id) {
            record.status = status;
        }
    }

    pub fn routes_in(&self, table: &RouteTableId) -> Vec<ExistingRoute> {
        self.lock()
            .route_tables
            .get(table)
            .map(|info| info.routes.clone())
            .unwrap_or_default()
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<ConnectionRecord> {
        self.lock().connections.get(id).cloned()
    }

    pub fn connections(&self) -> Vec<ConnectionRecord> {
        self.lock().connections.values().cloned().collect()
    }

    pub fn deny_role(&self, role_arn: impl Into<String>) {
        self.lock().denied_roles.insert(role_arn.into());
    }

    /// Throttle the next `times` calls of `operation`
    pub fn throttle(&self, operation: &str, times: u32) {
        self.lock()
            .faults
            .throttle
            .insert(operation.to_string(), times);
    }

    /// Fail every call of `operation` with `error`
    pub fn fail(&self, operation: &str, error: ApiError) {
        self.lock().faults.fail.insert(operation.to_string(), error);
    }

    pub fn clear_fault(&self, operation: &str) {
        let mut state = self.lock();
        state.faults.fail.remove(operation);
        state.faults.throttle.remove(operation);
    }

    /// Refuse accept calls issued from `account`
    pub fn reject_accepts_from(&self, account: impl Into<AccountId>) {
        self.lock().faults.reject_accepts.insert(account.into());
    }

    pub fn allow_accepts_from(&self, account: &AccountId) {
        self.lock().faults.reject_accepts.remove(account);
    }

    /// Handle scoped to one account and region
    pub fn context(&self, account: impl Into<AccountId>, region: impl Into<Region>) -> MemoryApi {
        MemoryApi {
            cloud: self.clone(),
            account: account.into(),
            region: region.into(),
        }
    }
}

/// [`NetworkApi`] over the in-memory cloud
#[derive(Debug, Clone)]
pub struct MemoryApi {
    cloud: InMemoryCloud,
    account: AccountId,
    region: Region,
}

impl MemoryApi {
    fn owns_vpc(&self, state: &CloudState, vpc: &VpcId) -> bool {
        state
            .vpcs
            .get(vpc)
            .map(|record| record.account_id == self.account && record.region == self.region)
            .unwrap_or(false)
    }

    fn is_party(&self, record: &ConnectionRecord) -> bool {
        self.is_side(record, PeeringSide::Requester) || self.is_side(record, PeeringSide::Accepter)
    }

    fn is_side(&self, record: &ConnectionRecord, side: PeeringSide) -> bool {
        match side {
            PeeringSide::Requester => {
                record.requester_account == self.account && record.requester_region == self.region
            }
            PeeringSide::Accepter => {
                record.accepter_account == self.account && record.accepter_region == self.region
            }
        }
    }

    fn table_in_scope<'a>(
        &self,
        state: &'a mut CloudState,
        table: &RouteTableId,
    ) -> ApiResult<&'a mut RouteTableInfo> {
        let vpc = state
            .route_tables
            .get(table)
            .map(|info| info.vpc_id.clone())
            .ok_or_else(|| ApiError::NotFound(format!("route table {}", table)))?;
        if !self.owns_vpc(state, &vpc) {
            return Err(ApiError::NotFound(format!("route table {}", table)));
        }
        state
            .route_tables
            .get_mut(table)
            .ok_or_else(|| ApiError::NotFound(format!("route table {}", table)))
    }
}

#[async_trait]
impl NetworkApi for MemoryApi {
    fn scope(&self) -> (AccountId, Region) {
        (self.account.clone(), self.region.clone())
    }

    async fn describe_vpc(&self, vpc: &VpcId) -> ApiResult<VpcInfo> {
        let mut state = self.cloud.lock();
        state.check_fault("describe_vpc")?;
        if !self.owns_vpc(&state, vpc) {
            return Err(ApiError::NotFound(format!("vpc {}", vpc)));
        }
        let record = &state.vpcs[vpc];
        Ok(VpcInfo {
            vpc_id: vpc.clone(),
            account_id: record.account_id.clone(),
            region: record.region.clone(),
            cidr: record.cidr,
        })
    }

    async fn find_connections(&self, a: &VpcId, b: &VpcId) -> ApiResult<Vec<ConnectionRecord>> {
        let mut state = self.cloud.lock();
        state.check_fault("find_connections")?;
        Ok(state
            .connections
            .values()
            .filter(|record| record.links(a, b) && self.is_party(record))
            .cloned()
            .collect())
    }

    async fn describe_connection(&self, id: &ConnectionId) -> ApiResult<Option<ConnectionRecord>> {
        let mut state = self.cloud.lock();
        state.check_fault("describe_connection")?;
        let Some(record) = state.connections.get_mut(id) else {
            return Ok(None);
        };
        if !self.is_party(record) {
            return Ok(None);
        }
        // Cross-region acceptance finishes provisioning asynchronously
        if record.status == ConnectionStatus::Provisioning {
            record.status = ConnectionStatus::Active;
        }
        Ok(Some(record.clone()))
    }

    async fn request_connection(&self, request: &PeeringRequest) -> ApiResult<ConnectionRecord> {
        let mut state = self.cloud.lock();
        state.check_fault("request_connection")?;
        if !self.owns_vpc(&state, &request.requester_vpc) {
            return Err(ApiError::NotFound(format!("vpc {}", request.requester_vpc)));
        }
        let accepter = state
            .vpcs
            .get(&request.accepter_vpc)
            .filter(|record| {
                record.account_id == request.accepter_account
                    && record.region == request.accepter_region
            })
            .cloned()
            .ok_or_else(|| {
                ApiError::Validation(format!(
                    "peer vpc {} not found in {}/{}",
                    request.accepter_vpc, request.accepter_account, request.accepter_region
                ))
            })?;
        let requester_cidr = state.vpcs[&request.requester_vpc].cidr;
        if requester_cidr.contains(&accepter.cidr) || accepter.cidr.contains(&requester_cidr) {
            return Err(ApiError::Validation(format!(
                "overlapping CIDRs {} and {}",
                requester_cidr, accepter.cidr
            )));
        }

        let id = ConnectionId::new(state.allocate("pcx"));
        let record = ConnectionRecord {
            id: id.clone(),
            requester_vpc: request.requester_vpc.clone(),
            requester_account: self.account.clone(),
            requester_region: self.region.clone(),
            accepter_vpc: request.accepter_vpc.clone(),
            accepter_account: request.accepter_account.clone(),
            accepter_region: request.accepter_region.clone(),
            status: ConnectionStatus::PendingAcceptance,
            requester_dns_resolution: false,
            accepter_dns_resolution: false,
            tags: request.tags.clone(),
        };
        state.connections.insert(id, record.clone());
        state.counters.connections_requested += 1;
        Ok(record)
    }

    async fn accept_connection(&self, id: &ConnectionId) -> ApiResult<ConnectionRecord> {
        let mut state = self.cloud.lock();
        state.check_fault("accept_connection")?;
        if state.faults.reject_accepts.contains(&self.account) {
            return Err(ApiError::AccessDenied(format!(
                "account {} may not accept {}",
                self.account, id
            )));
        }
        let (record, accepted) = {
            let record = state
                .connections
                .get_mut(id)
                .ok_or_else(|| ApiError::NotFound(format!("peering connection {}", id)))?;
            if !self.is_side(record, PeeringSide::Accepter) {
                return Err(ApiError::AccessDenied(format!(
                    "{} can only be accepted by account {} in {}",
                    id, record.accepter_account, record.accepter_region
                )));
            }
            match record.status {
                ConnectionStatus::PendingAcceptance => {
                    record.status = if record.requester_region == record.accepter_region {
                        ConnectionStatus::Active
                    } else {
                        ConnectionStatus::Provisioning
                    };
                    (record.clone(), true)
                }
                ConnectionStatus::Provisioning | ConnectionStatus::Active => {
                    (record.clone(), false)
                }
                other => {
                    return Err(ApiError::Validation(format!(
                        "{} cannot be accepted in state {}",
                        id, other
                    )))
                }
            }
        };
        if accepted {
            state.counters.connections_accepted += 1;
        }
        Ok(record)
    }

    async fn delete_connection(&self, id: &ConnectionId) -> ApiResult<()> {
        let mut state = self.cloud.lock();
        state.check_fault("delete_connection")?;
        let party = state
            .connections
            .get(id)
            .map(|record| self.is_party(record))
            .unwrap_or(false);
        if !party {
            return Err(ApiError::NotFound(format!("peering connection {}", id)));
        }
        if let Some(record) = state.connections.get_mut(id) {
            record.status = ConnectionStatus::Deleted;
        }
        state.counters.connections_deleted += 1;
        Ok(())
    }

    async fn set_dns_resolution(
        &self,
        id: &ConnectionId,
        side: PeeringSide,
        enabled: bool,
    ) -> ApiResult<()> {
        let mut state = self.cloud.lock();
        state.check_fault("set_dns_resolution")?;
        let changed = {
            let record = state
                .connections
                .get_mut(id)
                .ok_or_else(|| ApiError::NotFound(format!("peering connection {}", id)))?;
            if !self.is_side(record, side) {
                return Err(ApiError::AccessDenied(format!(
                    "{} options of {} must be set from that side's account",
                    side, id
                )));
            }
            if record.status != ConnectionStatus::Active {
                return Err(ApiError::Validation(format!(
                    "{} is {}, DNS options require an active connection",
                    id, record.status
                )));
            }
            let flag = match side {
                PeeringSide::Requester => &mut record.requester_dns_resolution,
                PeeringSide::Accepter => &mut record.accepter_dns_resolution,
            };
            let changed = *flag != enabled;
            *flag = enabled;
            changed
        };
        if changed {
            state.counters.dns_updates += 1;
        }
        Ok(())
    }

    async fn route_tables(&self, vpc: &VpcId) -> ApiResult<Vec<RouteTableInfo>> {
        let mut state = self.cloud.lock();
        state.check_fault("route_tables")?;
        if !self.owns_vpc(&state, vpc) {
            return Err(ApiError::NotFound(format!("vpc {}", vpc)));
        }
        Ok(state
            .route_tables
            .values()
            .filter(|table| &table.vpc_id == vpc)
            .cloned()
            .collect())
    }

    async fn tagged_subnets(&self, vpc: &VpcId, marker: &MarkerTag) -> ApiResult<Vec<SubnetId>> {
        let mut state = self.cloud.lock();
        state.check_fault("tagged_subnets")?;
        if !self.owns_vpc(&state, vpc) {
            return Err(ApiError::NotFound(format!("vpc {}", vpc)));
        }
        Ok(state
            .subnets
            .iter()
            .filter(|(_, subnet)| &subnet.vpc_id == vpc && marker.matches(&subnet.tags))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn routes(&self, table: &RouteTableId) -> ApiResult<Vec<ExistingRoute>> {
        let mut state = self.cloud.lock();
        state.check_fault("routes")?;
        let info = self.table_in_scope(&mut state, table)?;
        Ok(info.routes.clone())
    }

    async fn create_route(
        &self,
        table: &RouteTableId,
        destination: Cidr,
        connection: &ConnectionId,
    ) -> ApiResult<()> {
        let mut state = self.cloud.lock();
        state.check_fault("create_route")?;
        let info = self.table_in_scope(&mut state, table)?;
        if info.routes.iter().any(|route| route.destination == destination) {
            return Err(ApiError::AlreadyExists(format!(
                "route {} in {}",
                destination, table
            )));
        }
        info.routes
            .push(ExistingRoute::via_connection(destination, connection.clone()));
        state.counters.routes_created += 1;
        Ok(())
    }

    async fn replace_route(
        &self,
        table: &RouteTableId,
        destination: Cidr,
        connection: &ConnectionId,
    ) -> ApiResult<()> {
        let mut state = self.cloud.lock();
        state.check_fault("replace_route")?;
        let info = self.table_in_scope(&mut state, table)?;
        let route = info
            .routes
            .iter_mut()
            .find(|route| route.destination == destination)
            .ok_or_else(|| ApiError::NotFound(format!("route {} in {}", destination, table)))?;
        *route = ExistingRoute::via_connection(destination, connection.clone());
        state.counters.routes_replaced += 1;
        Ok(())
    }

    async fn delete_route(&self, table: &RouteTableId, destination: Cidr) -> ApiResult<()> {
        let mut state = self.cloud.lock();
        state.check_fault("delete_route")?;
        let info = self.table_in_scope(&mut state, table)?;
        let before = info.routes.len();
        info.routes.retain(|route| route.destination != destination);
        if info.routes.len() == before {
            return Err(ApiError::NotFound(format!(
                "route {} in {}",
                destination, table
            )));
        }
        state.counters.routes_deleted += 1;
        Ok(())
    }
}

/// [`ContextFactory`] over the in-memory cloud
#[derive(Debug, Default)]
pub struct MemoryContextFactory {
    cloud: InMemoryCloud,
    assumptions: AtomicUsize,
}

impl MemoryContextFactory {
    pub fn new(cloud: InMemoryCloud) -> Self {
        Self {
            cloud,
            assumptions: AtomicUsize::new(0),
        }
    }

    /// Number of role assumptions performed so far
    pub fn assumptions(&self) -> usize {
        self.assumptions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContextFactory for MemoryContextFactory {
    async fn assume(&self, peer: &Peer) -> Result<Arc<dyn NetworkApi>, AuthError> {
        self.assumptions.fetch_add(1, Ordering::SeqCst);
        if self.cloud.lock().denied_roles.contains(&peer.role_arn) {
            return Err(AuthError::new(format!(
                "not authorized to assume {}",
                peer.role_arn
            )));
        }
        Ok(Arc::new(
            self.cloud
                .context(peer.account_id.clone(), peer.region.clone()),
        ))
    }
}
