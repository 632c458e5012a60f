//! Identifier value objects
//!
//! Thin string newtypes so a VPC id can never be passed where a route table
//! id is expected. Provider ids (`vpc-…`, `rtb-…`, `pcx-…`) are opaque here.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Name of a peer in the inventory
    PeerId
);
string_id!(
    /// Provider VPC identifier
    VpcId
);
string_id!(
    /// Cloud account identifier
    AccountId
);
string_id!(
    /// Provider region name
    Region
);
string_id!(
    /// Route table identifier
    RouteTableId
);
string_id!(SubnetId);
string_id!(
    /// Peering connection identifier
    ConnectionId
);

impl ConnectionId {
    const PLANNED: &'static str = "pcx-planned";

    /// Placeholder next hop used while planning a connection that does not exist yet
    pub fn planned() -> Self {
        Self(Self::PLANNED.to_string())
    }

    pub fn is_planned(&self) -> bool {
        self.0 == Self::PLANNED
    }
}
