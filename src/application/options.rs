//! Run Options
//!
//! Knobs shared by every use case in a run. Built from the loaded
//! configuration plus CLI overrides.

use std::time::Duration;

use crate::infrastructure::retry::RetryPolicy;

/// Default marker tag key prefix
pub const DEFAULT_TAG_PREFIX: &str = "tether";

/// Bounded wait for a freshly accepted connection to become active
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptancePolicy {
    pub poll_attempts: u32,
    pub poll_interval: Duration,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            poll_attempts: 10,
            poll_interval: Duration::from_millis(1000),
        }
    }
}

/// Options for one reconciliation pass
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum edges processed at once
    pub concurrency: usize,
    /// Read and plan only
    pub dry_run: bool,
    pub retry: RetryPolicy,
    /// Prefix for marker and management tag keys
    pub tag_prefix: String,
    pub acceptance: AcceptancePolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            dry_run: false,
            retry: RetryPolicy::default(),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            acceptance: AcceptancePolicy::default(),
        }
    }
}

impl RunOptions {
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_acceptance(mut self, acceptance: AcceptancePolicy) -> Self {
        self.acceptance = acceptance;
        self
    }

    pub fn with_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.tag_prefix = prefix.into();
        self
    }

    /// Tag key marking connections this tool created
    pub fn managed_tag_key(&self) -> String {
        format!("{}:managed", self.tag_prefix)
    }
}
