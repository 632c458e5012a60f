//! Property: a second apply over an unchanged world makes no mutating call.

use proptest::prelude::*;

use tether::application::RouteOutcome;
use tether::EdgeStatus;

use crate::world::{block_on, world_spec, World};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: apply twice == apply once, and the second run only observes.
    #[test]
    fn property_second_apply_is_a_no_op(spec in world_spec()) {
        let world = World::build(&spec);

        let first = block_on(world.orchestrator().apply(&world.topology));
        prop_assert!(first.edges.iter().all(|e| e.status == EdgeStatus::Succeeded), "{:?}", first.edges);
        let counters = world.cloud.counters();
        let snapshot = world.cloud.snapshot();

        let second = block_on(world.orchestrator().apply(&world.topology));

        prop_assert_eq!(world.cloud.counters(), counters);
        prop_assert_eq!(second.tally.routes_created, 0);
        prop_assert_eq!(second.tally.connections_created, 0);
        prop_assert_eq!(second.tally.routes_satisfied, first.tally.routes_created);
        prop_assert!(second.routes().all(|r| r.outcome == RouteOutcome::AlreadySatisfied));
        for table in &world.tables {
            prop_assert_eq!(
                world.cloud.routes_in(&table.id),
                snapshot.route_tables[&table.id].routes.clone()
            );
        }
    }

    /// PROPERTY: a dry run over a fresh world changes nothing.
    #[test]
    fn property_dry_run_never_mutates(spec in world_spec()) {
        let world = World::build(&spec);
        let orchestrator = tether::Orchestrator::new(
            std::sync::Arc::new(tether::MemoryContextFactory::new(world.cloud.clone())),
            crate::world::fast_options().dry_run(true),
        );

        let report = block_on(orchestrator.apply(&world.topology));

        prop_assert_eq!(world.cloud.counters().total(), 0);
        prop_assert!(world.cloud.connections().is_empty());
        prop_assert!(report.routes().all(|r| r.outcome == RouteOutcome::WouldCreate));
    }
}
