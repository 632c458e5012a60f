//! Reusable inventories and cloud layouts.

use std::time::Duration;

use tether::application::{AcceptancePolicy, RunOptions};
use tether::domain::entities::RouteTarget;
use tether::domain::value_objects::{Cidr, RouteTableId};
use tether::infrastructure::RetryPolicy;
use tether::InMemoryCloud;

pub const PROD_CIDR: &str = "10.20.0.0/16";
pub const PCI_CIDR: &str = "10.21.0.0/16";

/// `prod` (app tier opted in) peered with `prod-pci` (DNS off on its side)
pub const PROD_PCI_INVENTORY: &str = r#"
peers:
  prod:
    vpc_id: vpc-prod
    account_id: "111111111111"
    region: us-east-1
    role_arn: arn:aws:iam::111111111111:role/tether-peering
    cidr: 10.20.0.0/16
    has_additional_routes: true
    route_tag: app
  prod-pci:
    vpc_id: vpc-pci
    account_id: "222222222222"
    region: us-east-1
    role_arn: arn:aws:iam::222222222222:role/tether-peering
    cidr: 10.21.0.0/16
    dns_resolution: false
    has_additional_routes: true
    route_tag: app
matrix:
  prod: [prod-pci]
"#;

pub fn cidr(s: &str) -> Cidr {
    s.parse().unwrap()
}

/// Route tables of one VPC in the fixture
#[derive(Debug, Clone)]
pub struct VpcTables {
    pub main: RouteTableId,
    pub app: RouteTableId,
    pub data: RouteTableId,
}

/// The cloud matching [`PROD_PCI_INVENTORY`]
#[derive(Debug, Clone)]
pub struct ProdPci {
    pub cloud: InMemoryCloud,
    pub prod: VpcTables,
    pub pci: VpcTables,
}

impl ProdPci {
    pub fn new() -> Self {
        let cloud = InMemoryCloud::new();
        let prod = seed_vpc(&cloud, "vpc-prod", "111111111111", PROD_CIDR, "tether:peering-source");
        let pci = seed_vpc(&cloud, "vpc-pci", "222222222222", PCI_CIDR, "tether:peering-target");
        Self { cloud, prod, pci }
    }

    pub fn next_hop(&self, table: &RouteTableId, destination: &str) -> Option<RouteTarget> {
        self.cloud
            .routes_in(table)
            .into_iter()
            .find(|r| r.destination == cidr(destination))
            .map(|r| r.target)
    }

    pub fn peering_routes(&self, table: &RouteTableId) -> usize {
        self.cloud
            .routes_in(table)
            .iter()
            .filter(|r| r.target.peering_connection().is_some())
            .count()
    }
}

/// A VPC with an `app` tier tagged with `marker_key = app` and an untagged `data` tier
fn seed_vpc(cloud: &InMemoryCloud, vpc: &str, account: &str, block: &str, marker_key: &str) -> VpcTables {
    let main = cloud.add_vpc(vpc, account, "us-east-1", cidr(block));
    let app = cloud.add_route_table(vpc);
    let data = cloud.add_route_table(vpc);
    cloud.add_subnet(vpc, Some(&app), [(marker_key, "app")]);
    cloud.add_subnet(vpc, Some(&app), [(marker_key, "app"), ("tier", "app")]);
    cloud.add_subnet(vpc, Some(&data), [("tier", "data")]);
    // Public subnet without an explicit association uses the main table
    cloud.add_subnet(vpc, None, [("tier", "public")]);
    VpcTables { main, app, data }
}

/// Millisecond-scale retry and acceptance polling
pub fn fast_options() -> RunOptions {
    RunOptions::default()
        .with_retry(RetryPolicy {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        })
        .with_acceptance(AcceptancePolicy {
            poll_attempts: 5,
            poll_interval: Duration::from_millis(1),
        })
}

/// Tool config that keeps CLI runs fast
pub const FAST_CONFIG: &str = r#"
[retry]
max_attempts = 3
initial_delay_ms = 1
max_delay_ms = 2

[acceptance]
poll_attempts = 3
poll_interval_ms = 1
"#;
