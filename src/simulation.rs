//! Flock builder.

use crate::boids::{BoidStore, BoidTable};
use crate::config::FlockConfig;
use crate::cycle::Flock;
use crate::error::FlockError;
use crate::executor::{TaskGraph, WorkerPool};

/// A flock builder.
///
/// Use method chaining to configure, then call `.build()` to start a run.
///
/// ```ignore
/// let mut flock = Simulation::new()
///     .with_config(FlockConfig::cell_restricted())
///     .with_boids(scatter(1_000, &SpawnConfig::default(), 42))
///     .with_worker_threads(4)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct Simulation {
    config: FlockConfig,
    boids: Option<BoidStore>,
    worker_threads: usize,
}

impl Simulation {
    /// Builder with the default configuration, no boids and one worker per
    /// core.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: FlockConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the population. Accepts a [`BoidTable`] or a [`BoidStore`] the
    /// host keeps a clone of.
    pub fn with_boids(mut self, boids: impl Into<BoidStore>) -> Self {
        self.boids = Some(boids.into());
        self
    }

    /// Worker threads for the pool built by [`build`](Self::build). `0`
    /// means one per core.
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Validate the configuration, build a worker pool and start the run.
    pub fn build(self) -> Result<Flock<WorkerPool>, FlockError> {
        self.config.validate()?;
        let pool = WorkerPool::new(self.worker_threads)?;
        tracing::debug!(threads = pool.threads(), "worker pool ready");
        self.build_with(pool)
    }

    /// Start the run on a caller-supplied executor.
    pub fn build_with<G: TaskGraph>(self, graph: G) -> Result<Flock<G>, FlockError> {
        let store = self
            .boids
            .unwrap_or_else(|| BoidStore::new(BoidTable::new()));
        Flock::new(self.config, store, graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::executor::Inline;
    use glam::{Quat, Vec3};

    #[test]
    fn test_build_sizes_run() {
        let mut table = BoidTable::new();
        table.push(Vec3::ONE, Quat::IDENTITY, 1.0);
        table.push(-Vec3::ONE, Quat::IDENTITY, 1.0);

        let flock = Simulation::new().with_boids(table).build_with(Inline).unwrap();
        assert_eq!(flock.len(), 2);
        assert!(flock.state().is_idle());
    }

    #[test]
    fn test_build_without_boids_is_empty() {
        let flock = Simulation::new().build_with(Inline).unwrap();
        assert!(flock.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = FlockConfig::default().with_perception_radius(-1.0);
        let err = Simulation::new().with_config(config).build().unwrap_err();
        assert!(matches!(
            err,
            FlockError::InvalidConfig(ConfigError::PerceptionRadius(_))
        ));
    }

    #[test]
    fn test_shared_store() {
        let store = BoidStore::new(BoidTable::new());
        let flock = Simulation::new()
            .with_boids(store.clone())
            .with_worker_threads(2)
            .build()
            .unwrap();
        store.write().push(Vec3::ZERO, Quat::IDENTITY, 1.0);
        assert_eq!(flock.store().len(), 1);
    }
}
