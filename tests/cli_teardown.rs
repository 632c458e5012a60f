//! `tether teardown` removes what apply created.

mod common;

use common::*;

fn applied() -> (TestEnv, ProdPci) {
    let env = TestEnv::new();
    env.write("peers.yaml", PROD_PCI_INVENTORY);
    let fixture = ProdPci::new();
    env.seed(&fixture.cloud);
    let result = env.run_sim(&["apply"]);
    assert!(result.success, "{}", result.combined_output());
    (env, fixture)
}

#[test]
fn teardown_dry_run_lists_routes_and_keeps_them() {
    let (env, _fixture) = applied();
    let before = env.cloud().counters();

    let result = env.run_sim(&["teardown", "--dry-run"]);

    assert!(result.success, "{}", result.combined_output());
    let report = result.json();
    assert_eq!(report["kind"], "teardown");
    assert_eq!(report["dry_run"], true);
    let routes = report["edges"][0]["routes"].as_array().unwrap();
    assert_eq!(routes.len(), 4);
    assert!(routes.iter().all(|r| r["outcome"] == "would_remove"));
    assert_eq!(env.cloud().counters(), before);
}

#[test]
fn teardown_honours_dry_run_from_config() {
    let (env, _fixture) = applied();
    env.write("tether.toml", &format!("{}\n[run]\ndry_run = true\n", FAST_CONFIG));
    let before = env.cloud().counters();

    let result = env.run_sim(&["teardown"]);

    assert!(result.success, "{}", result.combined_output());
    let report = result.json();
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["tally"]["routes_removed"], 0);
    assert_eq!(env.cloud().counters(), before);
    assert!(env.cloud().connections().iter().all(|c| !c.status.is_gone()));
}

#[test]
fn teardown_text_summary() {
    let (env, _fixture) = applied();

    let result = env.run_with_env(
        &["teardown", "--simulate", env.state_path().to_str().unwrap()],
        &[("TETHER_OUTPUT", "text")],
    );

    assert!(result.success, "{}", result.combined_output());
    let summary = result.stdout.lines().last().unwrap_or_default();
    insta::assert_snapshot!(summary, @"Teardown finished: 1 succeeded, 0 degraded, 0 failed, 0 skipped");
}

#[test]
fn teardown_then_apply_reconnects() {
    let (env, fixture) = applied();

    assert!(env.run_sim(&["teardown"]).success);
    let cloud = env.cloud();
    assert_eq!(cloud.counters().connections_deleted, 1);
    assert_eq!(cloud.counters().routes_deleted, 4);
    assert_eq!(cloud.routes_in(&fixture.prod.main).len(), 1, "only the local route remains");

    let result = env.run_sim(&["apply"]);
    assert!(result.success, "{}", result.combined_output());
    assert_eq!(result.json()["tally"]["connections_created"], 1);
    assert_eq!(env.cloud().counters().connections_requested, 2);
}

#[test]
fn teardown_rejects_malformed_edge() {
    let (env, _fixture) = applied();

    let result = env.run_sim(&["teardown", "--edge", "prod"]);

    assert_eq!(result.exit_code, 2, "clap usage errors exit 2");
    assert!(result.stderr.contains("expected SOURCE:TARGET"), "{}", result.stderr);
}
