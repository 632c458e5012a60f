//! Property: only main and marker-tagged tables ever route to a partner.

use proptest::prelude::*;

use crate::world::{block_on, world_spec, World};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: after apply, each table routes exactly its expected partners.
    #[test]
    fn property_routes_land_only_in_eligible_tables(spec in world_spec()) {
        let world = World::build(&spec);

        block_on(world.orchestrator().apply(&world.topology));

        for table in &world.tables {
            prop_assert_eq!(
                world.peering_destinations(&table.id),
                table.expected.clone(),
                "table {} (main: {})", table.id, table.main
            );
        }
    }

    /// PROPERTY: a VPC that has not opted in is touched in its main table only.
    #[test]
    fn property_opted_out_vpcs_use_main_only(spec in world_spec()) {
        let world = World::build(&spec);

        block_on(world.orchestrator().apply(&world.topology));

        let report = block_on(world.orchestrator().audit(&world.topology));
        prop_assert!(report.is_clean(), "{:?}", report.findings);

        for table in world.tables.iter().filter(|t| !t.main && t.expected.is_empty()) {
            prop_assert!(world.peering_destinations(&table.id).is_empty());
        }
    }
}
