//! Manager configuration.

use crate::{CoreError, CoreResult};

/// Default prefix for generated simulation-thread names.
pub const DEFAULT_THREAD_PREFIX: &str = "SimulationThread";

/// Settings for one simulation manager.
///
/// Typically built in code; with the `serde` feature it can also be loaded
/// from a file by the application crate.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManagerConfig {
    /// Manager name used in logs and `Display`.  `None` generates
    /// `SimulationManager-N`.
    pub name: Option<String>,

    /// Seed of the default seed source.  The same seed always produces the
    /// same per-thread RNG streams for top-level forks.
    pub seed: u64,

    /// Prefix for generated thread names (`<prefix>-N`).  Also used for the
    /// native thread name when a fork supplies no name.
    pub thread_name_prefix: String,

    /// Native stack size for each simulation thread.  `None` keeps the
    /// platform default.
    pub stack_size: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name:               None,
            seed:               0,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            stack_size:         None,
        }
    }
}

impl ManagerConfig {
    /// Check the settings before a manager is built from them.
    pub fn validate(&self) -> CoreResult<()> {
        if self.thread_name_prefix.is_empty() {
            return Err(CoreError::Config("thread_name_prefix must not be empty".into()));
        }
        if self.stack_size == Some(0) {
            return Err(CoreError::Config("stack_size must be non-zero".into()));
        }
        if matches!(&self.name, Some(n) if n.is_empty()) {
            return Err(CoreError::Config("manager name must not be empty".into()));
        }
        Ok(())
    }
}
