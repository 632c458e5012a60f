//! Context Factory Port
//!
//! Produces a [`NetworkApi`] handle authenticated into a peer's account and
//! region, typically by assuming the peer's role.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::NetworkApi;
use crate::domain::entities::Peer;

/// Role assumption was rejected or the resulting identity is unusable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trait for establishing per-peer credential contexts
#[async_trait]
pub trait ContextFactory: Send + Sync {
    /// Authenticate into `peer`'s account and region
    async fn assume(&self, peer: &Peer) -> Result<Arc<dyn NetworkApi>, AuthError>;
}
