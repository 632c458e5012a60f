//! Peering edges and the peering matrix
//!
//! The matrix may be declared asymmetrically (`a: [b]` without `b: [a]`) but a
//! connection is always bidirectional, so `{a: [b], b: [a]}` is one edge.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::PeerId;

/// Ordered (source, target) pair of peers
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeeringEdge {
    pub source: PeerId,
    pub target: PeerId,
}

impl PeeringEdge {
    pub fn new(source: impl Into<PeerId>, target: impl Into<PeerId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Check whether a peer is either end of this edge
    pub fn involves(&self, peer: &PeerId) -> bool {
        &self.source == peer || &self.target == peer
    }

    /// Orientation-independent key
    pub fn unordered_key(&self) -> (PeerId, PeerId) {
        if self.source <= self.target {
            (self.source.clone(), self.target.clone())
        } else {
            (self.target.clone(), self.source.clone())
        }
    }

    pub fn is_self_edge(&self) -> bool {
        self.source == self.target
    }
}

impl fmt::Display for PeeringEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

/// Declarative mapping of source peer to the peers it connects to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeeringMatrix {
    entries: BTreeMap<PeerId, Vec<PeerId>>,
}

impl PeeringMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one declared connection
    pub fn connect(mut self, source: impl Into<PeerId>, target: impl Into<PeerId>) -> Self {
        self.entries
            .entry(source.into())
            .or_default()
            .push(target.into());
        self
    }

    /// Every declared (source, target) pair, in declaration order per source
    pub fn declared(&self) -> impl Iterator<Item = PeeringEdge> + '_ {
        self.entries.iter().flat_map(|(source, targets)| {
            targets
                .iter()
                .map(move |target| PeeringEdge::new(source.clone(), target.clone()))
        })
    }

    /// Unique edges to process: self-edges dropped, reverse duplicates
    /// collapsed onto their first declaration.
    pub fn edges(&self) -> Vec<PeeringEdge> {
        let mut seen = BTreeSet::new();
        self.declared()
            .filter(|edge| !edge.is_self_edge())
            .filter(|edge| seen.insert(edge.unordered_key()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|targets| targets.is_empty())
    }
}
