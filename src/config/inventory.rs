//! Inventory loading
//!
//! The inventory declares peers and the peering matrix. Peers may be written
//! as a map keyed by name or as a list of entries carrying `name`:
//!
//! ```yaml
//! peers:
//!   prod:
//!     vpc_id: vpc-0a1
//!     account_id: "111111111111"
//!     region: us-east-1
//!     role_arn: arn:aws:iam::111111111111:role/peering
//!     has_additional_routes: true
//!     route_tag: app
//! matrix:
//!   prod: [prod-pci]
//! ```
//!
//! Missing or malformed fields become [`ConfigViolation`]s collected together
//! with the registry checks, so one pass reports every problem.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;

use crate::domain::entities::{Peer, PeeringMatrix};
use crate::domain::services::{RegistryBuilder, Topology};
use crate::domain::value_objects::Cidr;
use crate::error::{ConfigViolation, ConfigurationError, TetherError, TetherResult};

use super::loader::{unknown_key_warning, ConfigWarning};

/// Serialization format of an inventory file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryFormat {
    Yaml,
    Toml,
}

impl InventoryFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            _ => None,
        }
    }
}

/// A validated inventory
#[derive(Debug, Clone)]
pub struct Inventory {
    pub topology: Topology,
    pub warnings: Vec<ConfigWarning>,
}

/// Account ids are often written unquoted in YAML
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AccountSpec {
    Text(String),
    Number(u64),
}

impl AccountSpec {
    fn into_string(self) -> String {
        match self {
            AccountSpec::Text(s) => s,
            AccountSpec::Number(n) => format!("{:012}", n),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PeerSpec {
    /// Only meaningful in list form
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vpc_id: String,
    #[serde(default)]
    account_id: Option<AccountSpec>,
    #[serde(default)]
    region: String,
    #[serde(default)]
    role_arn: String,
    #[serde(default)]
    cidr: Option<String>,
    #[serde(default = "default_true")]
    dns_resolution: bool,
    #[serde(default)]
    has_additional_routes: bool,
    #[serde(default)]
    route_tag: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Peers in declaration order, from either the map or the list form
#[derive(Debug, Clone, Default)]
struct PeerList(Vec<(Option<String>, PeerSpec)>);

impl<'de> Deserialize<'de> for PeerList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PeerListVisitor;

        impl<'de> Visitor<'de> for PeerListVisitor {
            type Value = PeerList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of peer name to peer, or a list of peers with `name`")
            }

            fn visit_map<A>(self, mut map: A) -> Result<PeerList, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut peers = Vec::new();
                while let Some((name, spec)) = map.next_entry::<String, PeerSpec>()? {
                    peers.push((Some(name), spec));
                }
                Ok(PeerList(peers))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<PeerList, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut peers = Vec::new();
                while let Some(spec) = seq.next_element::<PeerSpec>()? {
                    peers.push((None, spec));
                }
                Ok(PeerList(peers))
            }

            fn visit_unit<E: de::Error>(self) -> Result<PeerList, E> {
                Ok(PeerList::default())
            }
        }

        deserializer.deserialize_any(PeerListVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    peers: PeerList,
    #[serde(default)]
    matrix: PeeringMatrix,
}

/// Read and validate an inventory file
pub fn load_inventory(path: &Path) -> TetherResult<Inventory> {
    let format = InventoryFormat::from_path(path).ok_or_else(|| {
        TetherError::Configuration(ConfigurationError {
            violations: vec![ConfigViolation::new(
                "inventory",
                format!(
                    "unsupported inventory extension for {} (expected .yaml, .yml or .toml)",
                    path.display()
                ),
            )],
        })
    })?;
    let content = fs::read_to_string(path)?;
    parse_inventory(&content, format, path)
}

/// Parse and validate inventory text; `file` is used for warnings only
pub fn parse_inventory(content: &str, format: InventoryFormat, file: &Path) -> TetherResult<Inventory> {
    let mut unknown_paths: Vec<String> = Vec::new();
    let record = |p: serde_ignored::Path<'_>| unknown_paths.push(p.to_string());

    let parsed: InventoryFile = match format {
        InventoryFormat::Yaml => {
            serde_ignored::deserialize(serde_yaml_ng::Deserializer::from_str(content), record)?
        }
        InventoryFormat::Toml => {
            serde_ignored::deserialize(toml::de::Deserializer::new(content), record)?
        }
    };

    let warnings = unknown_paths
        .iter()
        .map(|p| unknown_key_warning(file, content, p, INVENTORY_KEYS))
        .collect();

    let topology = build_topology(parsed)?;
    Ok(Inventory { topology, warnings })
}

fn build_topology(file: InventoryFile) -> Result<Topology, ConfigurationError> {
    let mut builder = RegistryBuilder::new();

    if file.peers.0.is_empty() {
        builder.reject(ConfigViolation::new("peers", "inventory declares no peers"));
    }

    for (index, (key, spec)) in file.peers.0.into_iter().enumerate() {
        let name = match (key, &spec.name) {
            (Some(key), Some(name)) if &key != name => {
                builder.reject(ConfigViolation::new(
                    format!("peers.{}.name", key),
                    format!("'{}' does not match the map key", name),
                ));
                key
            }
            (Some(key), _) => key,
            (None, Some(name)) => name.clone(),
            (None, None) => {
                builder.reject(ConfigViolation::new(
                    format!("peers[{}].name", index),
                    "must not be empty",
                ));
                continue;
            }
        };
        add_peer(&mut builder, name, spec);
    }

    builder.build(&file.matrix)
}

fn add_peer(builder: &mut RegistryBuilder, name: String, spec: PeerSpec) {
    let account = spec
        .account_id
        .map(AccountSpec::into_string)
        .unwrap_or_default();

    let mut peer = Peer::new(name.as_str(), spec.vpc_id, account, spec.region)
        .with_role_arn(spec.role_arn)
        .with_dns_resolution(spec.dns_resolution)
        .with_additional_routes(spec.has_additional_routes);
    if let Some(tag) = spec.route_tag {
        peer = peer.with_route_tag(tag);
    }

    if let Some(raw) = spec.cidr {
        match raw.trim().parse::<Cidr>() {
            Ok(cidr) if cidr == cidr.trunc() => peer = peer.with_cidr(cidr),
            Ok(cidr) => builder.reject(ConfigViolation::new(
                format!("peers.{}.cidr", name),
                format!("'{}' has host bits set (did you mean {}?)", raw, cidr.trunc()),
            )),
            Err(_) => builder.reject(ConfigViolation::new(
                format!("peers.{}.cidr", name),
                format!("'{}' is not a valid CIDR block", raw),
            )),
        }
    }

    builder.add(peer);
}

const INVENTORY_KEYS: &[&str] = &[
    "peers",
    "matrix",
    "name",
    "vpc_id",
    "account_id",
    "region",
    "role_arn",
    "cidr",
    "dns_resolution",
    "has_additional_routes",
    "route_tag",
];
