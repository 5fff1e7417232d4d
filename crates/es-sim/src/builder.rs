//! Fluent builder for constructing a [`SimulationManager`].

use std::sync::Arc;

use es_core::{ManagerConfig, MixingRngFactory, RngFactory, SimRng};
use tracing::info;

use crate::SimResult;
use crate::manager::{ManagerShared, SimulationManager, next_manager_id};
use crate::observer::SchedulerObserver;

/// Fluent builder for [`SimulationManager`].
///
/// Every input is optional:
///
/// | Method                 | Default                                   |
/// |------------------------|-------------------------------------------|
/// | `.config(c)`           | `ManagerConfig::default()`                |
/// | `.name(n)`             | `SimulationManager-N`                     |
/// | `.seed(s)`             | `0`                                       |
/// | `.thread_name_prefix(p)` | `"SimulationThread"`                    |
/// | `.stack_size(n)`       | platform default                          |
/// | `.rng_factory(f)`      | `MixingRngFactory::default()`             |
/// | `.seed_source(r)`      | `rng_factory.from_seed(seed)`             |
/// | `.observer(o)`         | none                                      |
///
/// The thread that calls [`build`](Self::build) becomes the manager thread.
///
/// # Example
///
/// ```rust,ignore
/// let manager = SimulationManager::builder()
///     .name("bus")
///     .seed(42)
///     .observer(Arc::new(TurnCounter::default()))
///     .build()?;
/// ```
pub struct SimulationManagerBuilder {
    config:      ManagerConfig,
    rng_factory: Option<Arc<dyn RngFactory>>,
    seed_source: Option<SimRng>,
    observers:   Vec<Arc<dyn SchedulerObserver>>,
}

impl SimulationManagerBuilder {
    pub fn new() -> Self {
        Self {
            config:      ManagerConfig::default(),
            rng_factory: None,
            seed_source: None,
            observers:   Vec::new(),
        }
    }

    /// Replace all settings at once.
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.config.stack_size = Some(bytes);
        self
    }

    /// Factory for top-level threads; forked threads inherit their
    /// parent's.
    pub fn rng_factory(mut self, factory: Arc<dyn RngFactory>) -> Self {
        self.rng_factory = Some(factory);
        self
    }

    /// RNG that seeds top-level threads.  Overrides `seed`.
    pub fn seed_source(mut self, source: SimRng) -> Self {
        self.seed_source = Some(source);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn SchedulerObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Validate the configuration and return a manager owned by the calling
    /// thread.
    pub fn build(self) -> SimResult<SimulationManager> {
        self.config.validate()?;
        Ok(self.assemble())
    }

    pub(crate) fn assemble(self) -> SimulationManager {
        let id = next_manager_id();
        let name = self
            .config
            .name
            .clone()
            .unwrap_or_else(|| format!("SimulationManager-{}", id.get()));
        let factory = self
            .rng_factory
            .unwrap_or_else(|| Arc::new(MixingRngFactory::default()));
        let seed_source = self
            .seed_source
            .unwrap_or_else(|| factory.from_seed(self.config.seed));

        info!(manager = %name, seed = self.config.seed, "simulation manager created");
        let shared = ManagerShared::new(id, name, self.config, factory, seed_source, self.observers);
        SimulationManager { shared: Arc::new(shared) }
    }
}

impl Default for SimulationManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
