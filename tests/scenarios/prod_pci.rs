//! Scenario: Connecting production to the PCI environment
//!
//! Journey: An operator peers `prod` with `prod-pci`, where only the app
//! tier of each VPC may reach the other side.
//!
//! Steps:
//! 1. Validate the inventory
//! 2. Plan, then apply
//! 3. Re-run apply and see nothing change
//! 4. Audit the isolation property, before and after someone adds a route by hand
//! 5. Tear the edge down
//!
//! Success Criteria:
//! - Only main and marker-tagged tables ever route to the partner
//! - Repeated runs make no mutating calls
//! - Teardown leaves unrelated routes alone

use tether::domain::entities::RouteTarget;

use crate::common::*;

fn prepared() -> (TestEnv, ProdPci) {
    let env = TestEnv::new();
    env.write("peers.yaml", PROD_PCI_INVENTORY);
    let fixture = ProdPci::new();
    env.seed(&fixture.cloud);
    (env, fixture)
}

/// Rebind a fixture's table ids to the state the CLI wrote back
fn reloaded(env: &TestEnv, fixture: &ProdPci) -> ProdPci {
    ProdPci {
        cloud: env.cloud(),
        prod: fixture.prod.clone(),
        pci: fixture.pci.clone(),
    }
}

/// SCENARIO: validate, plan, apply
#[test]
fn scenario_connect_prod_to_pci() {
    let (env, fixture) = prepared();

    // Step 1: validation needs no provider
    let result = env.run(&["validate"]);
    assert!(result.success, "validate failed:\n{}", result.combined_output());
    let body = result.json();
    assert_eq!(body["valid"], true);
    assert_eq!(body["peers"], 2);

    // Step 2a: plan writes nothing
    let result = env.run_sim(&["plan"]);
    assert!(result.success, "plan failed:\n{}", result.combined_output());
    let plan = result.json();
    assert_eq!(plan["kind"], "plan");
    assert_eq!(plan["dry_run"], true);
    assert_eq!(env.cloud().counters().total(), 0);
    assert!(env.cloud().connections().is_empty());

    // Step 2b: apply connects main and app tables on both sides
    let result = env.run_sim(&["apply"]);
    assert!(result.success, "apply failed:\n{}", result.combined_output());
    let report = result.json();
    assert_eq!(report["edges"][0]["status"], "succeeded");
    assert_eq!(report["tally"]["routes_created"], 4);
    assert_eq!(report["tally"]["connections_created"], 1);

    let after = reloaded(&env, &fixture);
    let connections = after.cloud.connections();
    assert_eq!(connections.len(), 1);
    let via = Some(RouteTarget::PeeringConnection(connections[0].id.clone()));

    // prod requested; prod-pci opted out of DNS resolution on its side
    assert!(connections[0].requester_dns_resolution);
    assert!(!connections[0].accepter_dns_resolution);

    assert_eq!(after.next_hop(&after.prod.main, PCI_CIDR), via);
    assert_eq!(after.next_hop(&after.prod.app, PCI_CIDR), via);
    assert_eq!(after.next_hop(&after.pci.main, PROD_CIDR), via);
    assert_eq!(after.next_hop(&after.pci.app, PROD_CIDR), via);

    // Data tiers stay isolated
    assert_eq!(after.next_hop(&after.prod.data, PCI_CIDR), None);
    assert_eq!(after.next_hop(&after.pci.data, PROD_CIDR), None);
}

/// SCENARIO: the second apply is a no-op
#[test]
fn scenario_rerun_is_idempotent() {
    let (env, _fixture) = prepared();

    let first = env.run_sim(&["apply"]);
    assert!(first.success, "first apply failed:\n{}", first.combined_output());
    let counters = env.cloud().counters();

    let second = env.run_sim(&["apply"]);
    assert!(second.success, "second apply failed:\n{}", second.combined_output());
    let report = second.json();

    assert_eq!(env.cloud().counters(), counters, "second run mutated the cloud");
    assert_eq!(report["tally"]["routes_created"], 0);
    assert_eq!(report["tally"]["routes_satisfied"], 4);
    assert_eq!(report["tally"]["connections_created"], 0);
    assert_eq!(report["edges"][0]["connection"]["created"], false);
}

/// SCENARIO: audit passes after apply and catches a hand-added route
#[test]
fn scenario_audit_catches_manual_route() {
    let (env, fixture) = prepared();
    assert!(env.run_sim(&["apply"]).success);

    let result = env.run_sim(&["audit"]);
    assert!(result.success, "clean audit failed:\n{}", result.combined_output());
    assert_eq!(result.json()["findings"].as_array().unwrap().len(), 0);

    // Someone routes the PCI data tier to prod by hand
    let cloud = env.cloud();
    let pcx = cloud.connections()[0].id.clone();
    cloud.add_route(
        &fixture.pci.data,
        cidr(PROD_CIDR),
        RouteTarget::PeeringConnection(pcx),
    );
    env.seed(&cloud);

    let result = env.run_sim(&["audit"]);
    assert_eq!(result.exit_code, 1);
    let findings = result.json()["findings"].clone();
    assert_eq!(findings.as_array().unwrap().len(), 1);
    assert_eq!(findings[0]["peer"], "prod-pci");
    assert_eq!(findings[0]["table"], fixture.pci.data.as_str());
    assert_eq!(findings[0]["reason"], "not_marker_tagged");
}

/// SCENARIO: teardown removes what apply created and nothing else
#[test]
fn scenario_teardown_leaves_foreign_routes() {
    let (env, fixture) = prepared();
    assert!(env.run_sim(&["apply"]).success);

    // An unrelated route added after apply
    let cloud = env.cloud();
    cloud.add_route(
        &fixture.prod.main,
        cidr("0.0.0.0/0"),
        RouteTarget::Gateway("igw-0a1".to_string()),
    );
    env.seed(&cloud);

    let dry = env.run_sim(&["teardown", "--dry-run"]);
    assert!(dry.success, "teardown plan failed:\n{}", dry.combined_output());
    assert_eq!(peering_routes_total(&env, &fixture), 4);

    let result = env.run_sim(&["teardown", "--edge", "prod-pci:prod"]);
    assert!(result.success, "teardown failed:\n{}", result.combined_output());
    assert_eq!(result.json()["tally"]["routes_removed"], 4);

    let after = reloaded(&env, &fixture);
    assert_eq!(peering_routes_total(&env, &fixture), 0);
    assert!(after.cloud.connections().iter().all(|c| c.status.is_gone()));
    assert_eq!(
        after.next_hop(&after.prod.main, "0.0.0.0/0"),
        Some(RouteTarget::Gateway("igw-0a1".to_string()))
    );
}

/// SCENARIO: tearing down an edge the matrix does not declare is refused
#[test]
fn scenario_teardown_unknown_edge_is_refused() {
    let (env, _fixture) = prepared();

    let result = env.run_sim(&["teardown", "--edge", "prod:staging"]);

    assert_eq!(result.exit_code, 1);
    assert!(
        result.stderr.contains("is not in the inventory matrix"),
        "stderr:\n{}",
        result.stderr
    );
}

/// Peering routes across all six fixture tables, as persisted
fn peering_routes_total(env: &TestEnv, fixture: &ProdPci) -> usize {
    let after = reloaded(env, fixture);
    [
        &after.prod.main,
        &after.prod.app,
        &after.prod.data,
        &after.pci.main,
        &after.pci.app,
        &after.pci.data,
    ]
    .into_iter()
    .map(|table| after.peering_routes(table))
    .sum()
}
