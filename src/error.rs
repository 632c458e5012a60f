//! Error types for Tether
//!
//! Library errors use `thiserror`; the binary wraps them in `anyhow`.
//!
//! Two families live here:
//! - [`TetherError`] and [`ConfigurationError`] abort a run before any API call.
//! - [`EdgeError`] is attributed to a single peering edge and collected into the
//!   run report. It never aborts unrelated edges.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::domain::ports::ApiError;
use crate::domain::value_objects::{ConnectionId, PeerId, RouteTableId};

/// Result type alias for Tether operations
pub type TetherResult<T> = Result<T, TetherError>;

/// Main error type for run-level failures
#[derive(Error, Debug)]
pub enum TetherError {
    /// Inventory or configuration failed validation
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Another process holds the simulated state file
    #[error("state file {path} is locked by another run")]
    StateLocked { path: PathBuf },

    /// A command needs cloud access but no provider was selected
    #[error("no provider configured; pass --simulate <state.json>")]
    MissingProvider,
}

/// A single problem found while validating the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigViolation {
    /// Dotted location, e.g. `peers.prod.vpc_id` or `matrix.prod`
    pub location: String,
    pub message: String,
}

impl ConfigViolation {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Every violation found in one validation pass.
///
/// Never constructed empty; callers check [`ConfigurationError::from_violations`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationError {
    pub violations: Vec<ConfigViolation>,
}

impl ConfigurationError {
    /// `Ok(())` when there is nothing to report.
    pub fn from_violations(violations: Vec<ConfigViolation>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { violations })
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid inventory ({} violation{})",
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

/// Errors attributed to one peering edge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdgeError {
    /// Role assumption into the peer's account was rejected
    #[error("authentication failed for peer '{peer}': {message}")]
    Authentication { peer: PeerId, message: String },

    /// Throttling or timeouts that outlasted the retry budget
    #[error("{operation} kept failing transiently: {message}")]
    TransientApi { operation: String, message: String },

    /// An existing route points somewhere else
    #[error("route table {table} already routes {destination} via {competing}")]
    RouteConflict {
        table: RouteTableId,
        destination: String,
        competing: String,
    },

    /// Connection exists but is not active yet; the next run resumes it
    #[error("peering connection {connection} is not active: {message}")]
    PartialConnection {
        connection: ConnectionId,
        message: String,
    },

    /// Non-transient provider failure
    #[error("{operation} failed: {message}")]
    Api { operation: String, message: String },

    /// The run was cancelled before this step started
    #[error("cancelled before completion")]
    Cancelled,
}

impl EdgeError {
    /// Attribute a provider failure to `operation`, keeping the transient split
    pub fn from_api(operation: &str, err: ApiError) -> Self {
        if err.is_transient() {
            Self::TransientApi {
                operation: operation.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Api {
                operation: operation.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Stable identifier used in the JSON report
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "authentication",
            Self::TransientApi { .. } => "transient_api",
            Self::RouteConflict { .. } => "route_conflict",
            Self::PartialConnection { .. } => "partial_connection",
            Self::Api { .. } => "api",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether simply running again can clear this error.
    pub fn is_retryable_next_run(&self) -> bool {
        matches!(
            self,
            Self::TransientApi { .. } | Self::PartialConnection { .. } | Self::Cancelled
        )
    }
}

impl Serialize for EdgeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("EdgeError", 3)?;
        state.serialize_field("kind", self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("retryable", &self.is_retryable_next_run())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_violation() {
        let err = ConfigurationError {
            violations: vec![
                ConfigViolation::new("peers.prod.vpc_id", "must not be empty"),
                ConfigViolation::new("matrix.prod", "peer 'prod' cannot peer with itself"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "invalid inventory (2 violations)\n  - peers.prod.vpc_id: must not be empty\n  - matrix.prod: peer 'prod' cannot peer with itself"
        );
    }

    #[test]
    fn test_from_violations_empty_is_ok() {
        assert!(ConfigurationError::from_violations(Vec::new()).is_ok());
    }

    #[test]
    fn test_route_conflict_display_names_table() {
        let err = EdgeError::RouteConflict {
            table: RouteTableId::from("rtb-1"),
            destination: "10.21.0.0/16".to_string(),
            competing: "tgw-9".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "route table rtb-1 already routes 10.21.0.0/16 via tgw-9"
        );
        assert_eq!(err.kind(), "route_conflict");
        assert!(!err.is_retryable_next_run());
    }

    #[test]
    fn test_partial_connection_is_retryable() {
        let err = EdgeError::PartialConnection {
            connection: ConnectionId::from("pcx-1"),
            message: "acceptance rejected".to_string(),
        };
        assert!(err.is_retryable_next_run());
    }

    #[test]
    fn test_edge_error_serializes_kind() {
        let json = serde_json::to_value(EdgeError::Cancelled).unwrap();
        assert_eq!(json["kind"], "cancelled");
        assert_eq!(json["retryable"], true);
    }

    #[test]
    fn test_from_api_keeps_transient_split() {
        let transient = EdgeError::from_api("create_route", ApiError::Throttled("slow".into()));
        assert_eq!(transient.kind(), "transient_api");
        let fatal = EdgeError::from_api("create_route", ApiError::Validation("bad".into()));
        assert_eq!(fatal.kind(), "api");
        assert_eq!(fatal.to_string(), "create_route failed: invalid request: bad");
    }
}
