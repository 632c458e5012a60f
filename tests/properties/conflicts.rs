//! Property: routes owned by something else are never overwritten.

use std::collections::BTreeSet;

use proptest::prelude::*;

use tether::domain::entities::RouteTarget;
use tether::domain::value_objects::{Cidr, RouteTableId};

use crate::world::{block_on, world_spec, World};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: pre-existing transit gateway routes survive apply, and each
    /// one sitting where a peering route belongs is reported as a conflict.
    #[test]
    fn property_foreign_routes_survive_and_conflict(
        spec in world_spec(),
        picks in proptest::collection::vec(any::<proptest::sample::Index>(), 1..4),
    ) {
        let world = World::build(&spec);

        // Seed tgw routes toward a partner in randomly chosen tables
        let mut seeded: BTreeSet<(RouteTableId, Cidr)> = BTreeSet::new();
        let mut expected_conflicts = 0;
        for pick in &picks {
            let table = pick.get(&world.tables);
            let destination = *table.partners.iter().next().unwrap();
            if seeded.insert((table.id.clone(), destination)) {
                world.cloud.add_route(
                    &table.id,
                    destination,
                    RouteTarget::TransitGateway("tgw-0f00".to_string()),
                );
                if table.expected.contains(&destination) {
                    expected_conflicts += 1;
                }
            }
        }

        let report = block_on(world.orchestrator().apply(&world.topology));

        for (table, destination) in &seeded {
            prop_assert_eq!(
                world.next_hop(table, destination),
                Some(RouteTarget::TransitGateway("tgw-0f00".to_string()))
            );
        }
        prop_assert_eq!(report.tally.conflicts, expected_conflicts);
        prop_assert_eq!(report.tally.failed > 0, expected_conflicts > 0);
    }
}
