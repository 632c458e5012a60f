//! Scenario: One bad edge does not stop the others
//!
//! Journey: `prod` peers with several environments. One account refuses the
//! role, one is slow to accept, and the provider throttles route writes.
//!
//! Success Criteria:
//! - Each failure is attributed to its own edge
//! - Healthy edges finish
//! - The next run picks up where the last one stopped

use std::path::Path;
use std::sync::Arc;

use tether::application::{EdgeStatus, RouteOutcome};
use tether::config::{parse_inventory, InventoryFormat};
use tether::domain::value_objects::AccountId;
use tether::{MemoryContextFactory, Orchestrator, Topology};

use crate::common::*;

const DEV_ROLE: &str = "arn:aws:iam::333333333333:role/tether-peering";

/// Fixture inventory plus `dev` (333…, denied) and `dr` (444…, eu-west-1)
fn star_inventory() -> String {
    PROD_PCI_INVENTORY.replace(
        "matrix:\n  prod: [prod-pci]\n",
        r#"  dev:
    vpc_id: vpc-dev
    account_id: "333333333333"
    region: us-east-1
    role_arn: arn:aws:iam::333333333333:role/tether-peering
    cidr: 10.30.0.0/16
  dr:
    vpc_id: vpc-dr
    account_id: "444444444444"
    region: eu-west-1
    role_arn: arn:aws:iam::444444444444:role/tether-peering
    cidr: 10.40.0.0/16
matrix:
  prod: [prod-pci, dev, dr]
"#,
    )
}

fn star_cloud() -> ProdPci {
    let fixture = ProdPci::new();
    fixture
        .cloud
        .add_vpc("vpc-dev", "333333333333", "us-east-1", cidr("10.30.0.0/16"));
    fixture
        .cloud
        .add_vpc("vpc-dr", "444444444444", "eu-west-1", cidr("10.40.0.0/16"));
    fixture.cloud.deny_role(DEV_ROLE);
    fixture
}

fn star_topology() -> Topology {
    parse_inventory(&star_inventory(), InventoryFormat::Yaml, Path::new("peers.yaml"))
        .unwrap()
        .topology
}

fn edge_named<'a>(report: &'a serde_json::Value, target: &str) -> &'a serde_json::Value {
    report["edges"]
        .as_array()
        .unwrap()
        .iter()
        .find(|edge| edge["target"] == target)
        .unwrap_or_else(|| panic!("no edge to {target} in report"))
}

/// SCENARIO: a denied role fails its edge; the run exits 1; the others connect
#[test]
fn scenario_denied_role_is_isolated_through_cli() {
    let env = TestEnv::new();
    env.write("peers.yaml", &star_inventory());
    env.seed(&star_cloud().cloud);

    let result = env.run_sim(&["apply"]);

    assert_eq!(result.exit_code, 1, "output:\n{}", result.combined_output());
    let report = result.json();
    assert_eq!(report["tally"]["failed"], 1);
    assert_eq!(report["tally"]["succeeded"], 2);

    let dev = edge_named(&report, "dev");
    assert_eq!(dev["status"], "failed");
    assert_eq!(dev["errors"][0]["kind"], "authentication");
    assert_eq!(dev["errors"][0]["retryable"], false);

    assert_eq!(edge_named(&report, "prod-pci")["status"], "succeeded");
    assert_eq!(edge_named(&report, "dr")["status"], "succeeded");

    // Successful edges were persisted even though the run failed
    assert_eq!(env.cloud().connections().len(), 2);
}

/// SCENARIO: throttling, a stuck accept and a denied role in one run
#[tokio::test]
async fn scenario_mixed_failures_then_resume() {
    let fixture = star_cloud();
    let topology = star_topology();
    fixture.cloud.throttle("create_route", 2);
    fixture.cloud.reject_accepts_from("222222222222");

    let run = || {
        Orchestrator::new(
            Arc::new(MemoryContextFactory::new(fixture.cloud.clone())),
            fast_options(),
        )
    };

    // Run 1
    let first = run().apply(&topology).await;

    let pci = first.edge("prod", "prod-pci").unwrap();
    assert_eq!(pci.status, EdgeStatus::Degraded, "{:?}", pci.errors);
    assert_eq!(pci.errors[0].kind(), "partial_connection");

    let dev = first.edge("prod", "dev").unwrap();
    assert_eq!(dev.status, EdgeStatus::Failed);

    // Throttled route writes were retried within the budget
    let dr = first.edge("prod", "dr").unwrap();
    assert_eq!(dr.status, EdgeStatus::Succeeded, "{:?}", dr.errors);
    assert_eq!(first.exit_code(false), 1);

    // Run 2: the PCI account accepts again
    fixture
        .cloud
        .allow_accepts_from(&AccountId::from("222222222222"));
    let second = run().apply(&topology).await;

    let pci = second.edge("prod", "prod-pci").unwrap();
    assert_eq!(pci.status, EdgeStatus::Succeeded, "{:?}", pci.errors);
    let connection = pci.connection.as_ref().unwrap();
    assert!(!connection.created, "the pending connection should be resumed");
    assert!(connection.accepted);
    assert!(fixture.next_hop(&fixture.prod.app, PCI_CIDR).is_some());

    // dr was already done
    let dr = second.edge("prod", "dr").unwrap();
    assert!(dr
        .routes
        .iter()
        .all(|r| r.outcome == RouteOutcome::AlreadySatisfied));

    // Two connections requested in total: pci once, dr once
    assert_eq!(fixture.cloud.counters().connections_requested, 2);
}
