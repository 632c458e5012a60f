//! Marker tag value object
//!
//! Subnets opt into cross-VPC routes purely by carrying a marker tag. The key
//! encodes which side of the edge the owning peer plays; the value is the
//! owning peer's route tag.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which end of a peering edge a peer is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeeringRole {
    /// The peer that declared the edge (connection requester)
    Source,
    /// The peer named in the source's target list (connection accepter)
    Target,
}

impl PeeringRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeeringRole::Source => "source",
            PeeringRole::Target => "target",
        }
    }
}

impl fmt::Display for PeeringRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag key/value pair that marks a subnet as participating in peering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerTag {
    pub key: String,
    pub value: String,
}

impl MarkerTag {
    /// Build the marker for `role` under `prefix`, e.g. `tether:peering-source=app`
    pub fn new(prefix: &str, role: PeeringRole, value: impl Into<String>) -> Self {
        Self {
            key: Self::key_for(prefix, role),
            value: value.into(),
        }
    }

    /// Tag key used for `role` under `prefix`
    pub fn key_for(prefix: &str, role: PeeringRole) -> String {
        format!("{}:peering-{}", prefix, role)
    }

    /// Check whether a tag set carries this marker
    pub fn matches<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        tags.into_iter()
            .any(|(key, value)| key == &self.key && value == &self.value)
    }
}

impl fmt::Display for MarkerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
