//! Use Case Factory
//!
//! Wires the orchestrator to a provider. The only shipped provider is the
//! simulated cloud persisted in a locked state file.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::{Orchestrator, RunOptions};
use crate::error::{TetherError, TetherResult};
use crate::infrastructure::{InMemoryCloud, MemoryContextFactory, StateFile};

/// An opened `--simulate` state file and the cloud loaded from it
pub struct Simulation {
    state: StateFile,
    cloud: InMemoryCloud,
}

impl Simulation {
    /// Lock and load the state file; a missing file starts an empty cloud
    pub fn open(path: impl Into<PathBuf>) -> TetherResult<Self> {
        let state = StateFile::open(path)?;
        let cloud = state.load()?;
        debug!(path = %state.path().display(), "Loaded simulated cloud");
        Ok(Self { state, cloud })
    }

    /// `MissingProvider` unless a state file was given
    pub fn require(path: Option<PathBuf>) -> TetherResult<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Err(TetherError::MissingProvider),
        }
    }

    pub fn cloud(&self) -> &InMemoryCloud {
        &self.cloud
    }

    /// Write mutations back to disk
    pub fn persist(&self) -> TetherResult<()> {
        self.state.save(&self.cloud)?;
        info!(path = %self.state.path().display(), "Saved simulated cloud");
        Ok(())
    }
}

/// Create an orchestrator against the simulated cloud
pub fn create_orchestrator(
    cloud: &InMemoryCloud,
    options: RunOptions,
    cancel: CancellationToken,
) -> Orchestrator {
    let factory = Arc::new(MemoryContextFactory::new(cloud.clone()));
    Orchestrator::new(factory, options).with_cancellation(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn require_without_path_is_missing_provider() {
        assert!(matches!(
            Simulation::require(None),
            Err(TetherError::MissingProvider)
        ));
    }

    #[test]
    fn persist_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cloud.json");

        {
            let sim = Simulation::open(&path).unwrap();
            sim.cloud()
                .add_vpc("vpc-a", "111", "us-east-1", "10.0.0.0/16".parse().unwrap());
            sim.persist().unwrap();
        }

        let sim = Simulation::open(&path).unwrap();
        assert_eq!(sim.cloud().snapshot().vpcs.len(), 1);
    }

    #[test]
    fn orchestrator_shares_cancellation() {
        let cloud = InMemoryCloud::new();
        let token = CancellationToken::new();
        let orchestrator = create_orchestrator(&cloud, RunOptions::default(), token.clone());
        token.cancel();
        assert!(orchestrator.cancellation().is_cancelled());
    }
}
