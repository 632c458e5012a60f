//! Simulation state file
//!
//! Persists the in-memory cloud at a JSON path for `--simulate` runs. A
//! sidecar `.lock` file is held exclusively for the whole run so two
//! invocations against the same state cannot interleave.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{TetherError, TetherResult};
use crate::infrastructure::memory::{CloudState, InMemoryCloud};

/// Exclusive handle on a simulation state file
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    lock_file: File,
}

impl StateFile {
    /// Lock the state at `path`; fails fast if another run holds it
    pub fn open(path: impl Into<PathBuf>) -> TetherResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock_path = lock_path(&path);
        let lock_file = File::create(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| TetherError::StateLocked { path: path.clone() })?;

        debug!(path = %path.display(), "Locked simulation state");
        Ok(Self { path, lock_file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cloud; a missing or empty file is an empty cloud
    pub fn load(&self) -> TetherResult<InMemoryCloud> {
        if !self.path.exists() {
            return Ok(InMemoryCloud::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(InMemoryCloud::new());
        }
        let state: CloudState = serde_json::from_str(&content)?;
        Ok(InMemoryCloud::from_state(state))
    }

    pub fn save(&self, cloud: &InMemoryCloud) -> TetherResult<()> {
        let content = serde_json::to_string_pretty(&cloud.snapshot())?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Drop for StateFile {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}
