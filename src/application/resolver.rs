//! Credential Context Resolver
//!
//! Resolves each peer into an authenticated [`NetworkApi`] handle at most
//! once per run. Concurrent edges asking for the same peer wait on the same
//! in-flight assumption; failures are cached too, so every edge touching a
//! peer whose role was rejected fails fast with the same error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::domain::entities::Peer;
use crate::domain::ports::{AuthError, ContextFactory, NetworkApi};
use crate::domain::value_objects::PeerId;
use crate::error::EdgeError;

type CachedContext = Arc<OnceCell<Result<Arc<dyn NetworkApi>, AuthError>>>;

/// A peer together with the handle authenticated into its account
#[derive(Clone)]
pub struct PeerContext {
    pub peer: Peer,
    pub api: Arc<dyn NetworkApi>,
}

impl std::fmt::Debug for PeerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerContext")
            .field("peer", &self.peer.id)
            .field("scope", &self.api.scope())
            .finish()
    }
}

/// Per-run cache of peer contexts
pub struct ContextResolver {
    factory: Arc<dyn ContextFactory>,
    cache: Mutex<HashMap<PeerId, CachedContext>>,
}

impl ContextResolver {
    pub fn new(factory: Arc<dyn ContextFactory>) -> Self {
        Self {
            factory,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, peer: &PeerId) -> CachedContext {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.entry(peer.clone()).or_default().clone()
    }

    /// Authenticate into `peer`'s account, reusing an earlier result
    pub async fn resolve(&self, peer: &Peer) -> Result<PeerContext, EdgeError> {
        let slot = self.slot(&peer.id);
        let result = slot
            .get_or_init(|| async {
                debug!(peer = %peer.id, role = %peer.role_arn, "Assuming role");
                let result = self.factory.assume(peer).await;
                if let Err(e) = &result {
                    warn!(peer = %peer.id, error = %e, "Role assumption rejected");
                }
                result
            })
            .await;

        match result {
            Ok(api) => Ok(PeerContext {
                peer: peer.clone(),
                api: Arc::clone(api),
            }),
            Err(e) => Err(EdgeError::Authentication {
                peer: peer.id.clone(),
                message: e.message.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::{InMemoryCloud, MemoryContextFactory};

    fn peer(id: &str, account: &str) -> Peer {
        Peer::new(id, format!("vpc-{}", id), account, "us-east-1")
    }

    #[tokio::test]
    async fn resolves_each_peer_once() {
        let factory = Arc::new(MemoryContextFactory::new(InMemoryCloud::new()));
        let resolver = ContextResolver::new(factory.clone());
        let prod = peer("prod", "111");

        for _ in 0..3 {
            let ctx = resolver.resolve(&prod).await.unwrap();
            assert_eq!(ctx.api.scope().0.as_str(), "111");
        }
        resolver.resolve(&peer("pci", "222")).await.unwrap();

        assert_eq!(factory.assumptions(), 2);
    }

    #[tokio::test]
    async fn concurrent_resolution_shares_one_assumption() {
        let factory = Arc::new(MemoryContextFactory::new(InMemoryCloud::new()));
        let resolver = ContextResolver::new(factory.clone());
        let prod = peer("prod", "111");

        let (a, b) = tokio::join!(resolver.resolve(&prod), resolver.resolve(&prod));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(factory.assumptions(), 1);
    }

    #[tokio::test]
    async fn rejected_role_is_cached_as_authentication_error() {
        let cloud = InMemoryCloud::new();
        let prod = peer("prod", "111");
        cloud.deny_role(prod.role_arn.clone());
        let factory = Arc::new(MemoryContextFactory::new(cloud));
        let resolver = ContextResolver::new(factory.clone());

        for _ in 0..2 {
            let err = resolver.resolve(&prod).await.unwrap_err();
            assert_eq!(err.kind(), "authentication");
        }
        assert_eq!(factory.assumptions(), 1);
    }
}
