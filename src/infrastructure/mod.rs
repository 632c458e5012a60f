//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `memory` - In-process provider (`NetworkApi` + `ContextFactory`)
//! - `state_file` - Locked JSON persistence for the simulated cloud
//! - `retry` - Backoff for transient provider errors

pub mod memory;
pub mod retry;
pub mod state_file;

// Re-export for convenience
pub use memory::{CloudState, InMemoryCloud, MemoryApi, MemoryContextFactory, MutationCounters};
pub use retry::{retry_api, retry_with_backoff, RetryPolicy};
pub use state_file::StateFile;
