//! Random hub-and-spoke worlds for property tests.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use tether::application::{AcceptancePolicy, RunOptions};
use tether::domain::entities::RouteTarget;
use tether::domain::value_objects::{Cidr, RouteTableId};
use tether::infrastructure::RetryPolicy;
use tether::{InMemoryCloud, MemoryContextFactory, Orchestrator, Peer, PeeringMatrix, Topology};

const SOURCE_KEY: &str = "tether:peering-source";
const TARGET_KEY: &str = "tether:peering-target";
const ROUTE_TAG: &str = "app";

/// How the subnets behind one non-main table are tagged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagChoice {
    Untagged,
    Source,
    Target,
    /// One subnet tagged for each role
    Both,
    /// Right key, wrong route tag value
    WrongValue,
}

impl TagChoice {
    fn tags(self) -> Vec<Vec<(&'static str, &'static str)>> {
        match self {
            TagChoice::Untagged => vec![vec![("tier", "data")]],
            TagChoice::Source => vec![vec![(SOURCE_KEY, ROUTE_TAG)]],
            TagChoice::Target => vec![vec![(TARGET_KEY, ROUTE_TAG)]],
            TagChoice::Both => vec![vec![(SOURCE_KEY, ROUTE_TAG)], vec![(TARGET_KEY, ROUTE_TAG)]],
            TagChoice::WrongValue => vec![vec![(SOURCE_KEY, "other"), (TARGET_KEY, "other")]],
        }
    }

    /// Whether a table tagged this way is eligible for a peer playing the source role
    fn marks_source(self) -> bool {
        matches!(self, TagChoice::Source | TagChoice::Both)
    }

    fn marks_target(self) -> bool {
        matches!(self, TagChoice::Target | TagChoice::Both)
    }
}

/// One VPC: opt-in flag plus its non-main tables
#[derive(Debug, Clone)]
pub struct VpcSpec {
    pub has_additional_routes: bool,
    pub tables: Vec<TagChoice>,
}

/// A hub peered with every spoke; the hub is the source on every edge
#[derive(Debug, Clone)]
pub struct WorldSpec {
    pub hub: VpcSpec,
    pub spokes: Vec<VpcSpec>,
}

pub fn tag_choice() -> impl Strategy<Value = TagChoice> {
    prop_oneof![
        Just(TagChoice::Untagged),
        Just(TagChoice::Source),
        Just(TagChoice::Target),
        Just(TagChoice::Both),
        Just(TagChoice::WrongValue),
    ]
}

pub fn vpc_spec() -> impl Strategy<Value = VpcSpec> {
    (any::<bool>(), proptest::collection::vec(tag_choice(), 0..4)).prop_map(
        |(has_additional_routes, tables)| VpcSpec {
            has_additional_routes,
            tables,
        },
    )
}

pub fn world_spec() -> impl Strategy<Value = WorldSpec> {
    (vpc_spec(), proptest::collection::vec(vpc_spec(), 1..5))
        .prop_map(|(hub, spokes)| WorldSpec { hub, spokes })
}

/// A table in the built world and the partner CIDRs it must route
#[derive(Debug, Clone)]
pub struct TableExpectation {
    pub id: RouteTableId,
    pub main: bool,
    pub expected: BTreeSet<Cidr>,
    /// Partner CIDRs this table may never route, eligible or not
    pub partners: BTreeSet<Cidr>,
}

pub struct World {
    pub cloud: InMemoryCloud,
    pub topology: Topology,
    pub tables: Vec<TableExpectation>,
}

fn hub_cidr() -> Cidr {
    "10.0.0.0/16".parse().unwrap()
}

fn spoke_cidr(index: usize) -> Cidr {
    format!("10.{}.0.0/16", index + 1).parse().unwrap()
}

impl World {
    pub fn build(spec: &WorldSpec) -> Self {
        let cloud = InMemoryCloud::new();
        let spoke_cidrs: BTreeSet<Cidr> = (0..spec.spokes.len()).map(spoke_cidr).collect();
        let hub_only: BTreeSet<Cidr> = [hub_cidr()].into_iter().collect();

        let mut tables = Vec::new();
        let mut peers = Vec::new();
        let mut matrix = PeeringMatrix::new();

        let hub = add_vpc(&cloud, "hub", "100000000000", hub_cidr(), &spec.hub);
        tables.extend(expectations(
            &hub,
            &spec.hub,
            TagChoice::marks_source,
            &spoke_cidrs,
        ));
        peers.push(peer("hub", "100000000000", hub_cidr(), &spec.hub));

        for (index, spoke) in spec.spokes.iter().enumerate() {
            let name = format!("spoke{}", index + 1);
            let account = format!("{:012}", 200_000_000_000u64 + index as u64);
            let layout = add_vpc(&cloud, &name, &account, spoke_cidr(index), spoke);
            tables.extend(expectations(&layout, spoke, TagChoice::marks_target, &hub_only));
            peers.push(peer(&name, &account, spoke_cidr(index), spoke));
            matrix = matrix.connect("hub", name.as_str());
        }

        let topology = Topology::build(peers, &matrix).unwrap();
        Self {
            cloud,
            topology,
            tables,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::new(MemoryContextFactory::new(self.cloud.clone())),
            fast_options(),
        )
    }

    /// Partner destinations a table routes over peering connections
    pub fn peering_destinations(&self, table: &RouteTableId) -> BTreeSet<Cidr> {
        self.cloud
            .routes_in(table)
            .into_iter()
            .filter(|route| route.target.peering_connection().is_some())
            .map(|route| route.destination)
            .collect()
    }

    pub fn next_hop(&self, table: &RouteTableId, destination: &Cidr) -> Option<RouteTarget> {
        self.cloud
            .routes_in(table)
            .into_iter()
            .find(|route| &route.destination == destination)
            .map(|route| route.target)
    }
}

struct Layout {
    main: RouteTableId,
    tables: Vec<(RouteTableId, TagChoice)>,
}

fn add_vpc(cloud: &InMemoryCloud, name: &str, account: &str, cidr: Cidr, spec: &VpcSpec) -> Layout {
    let vpc = format!("vpc-{}", name);
    let main = cloud.add_vpc(vpc.as_str(), account, "us-east-1", cidr);
    let tables = spec
        .tables
        .iter()
        .map(|choice| {
            let table = cloud.add_route_table(vpc.as_str());
            for tags in choice.tags() {
                cloud.add_subnet(vpc.as_str(), Some(&table), tags);
            }
            (table, *choice)
        })
        .collect();
    Layout { main, tables }
}

fn expectations(
    layout: &Layout,
    spec: &VpcSpec,
    eligible: fn(TagChoice) -> bool,
    partners: &BTreeSet<Cidr>,
) -> Vec<TableExpectation> {
    let mut out = vec![TableExpectation {
        id: layout.main.clone(),
        main: true,
        expected: partners.clone(),
        partners: partners.clone(),
    }];
    for (table, choice) in &layout.tables {
        let routed = spec.has_additional_routes && eligible(*choice);
        out.push(TableExpectation {
            id: table.clone(),
            main: false,
            expected: if routed {
                partners.clone()
            } else {
                BTreeSet::new()
            },
            partners: partners.clone(),
        });
    }
    out
}

fn peer(name: &str, account: &str, cidr: Cidr, spec: &VpcSpec) -> Peer {
    Peer::new(name, format!("vpc-{}", name), account, "us-east-1")
        .with_cidr(cidr)
        .with_additional_routes(spec.has_additional_routes)
        .with_route_tag(ROUTE_TAG)
}

pub fn fast_options() -> RunOptions {
    RunOptions::default()
        .with_concurrency(3)
        .with_retry(RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
        })
        .with_acceptance(AcceptancePolicy {
            poll_attempts: 2,
            poll_interval: Duration::from_millis(1),
        })
}

/// Drive an async run from inside a proptest case
pub fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
        .block_on(future)
}
