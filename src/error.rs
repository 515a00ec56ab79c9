//! Error types for steerflock.
//!
//! The steering step itself has no recoverable failure modes: degenerate
//! vectors contribute nothing and an empty flock is a no-op. What can fail is
//! building a run (bad configuration, worker pool) and feeding a run a
//! population whose size no longer matches its buffers.

use std::fmt;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Perception radius must be finite and greater than zero.
    PerceptionRadius(f32),
    /// Containment radius must be finite and greater than zero.
    ContainmentRadius(f32),
    /// A blend weight is NaN or infinite.
    BlendWeight(&'static str, f32),
    /// Wander bound or rate is negative or not finite.
    Wander(f32),
    /// Base speed must be finite and non-negative.
    BaseSpeed(f32),
    /// Batch size must be at least 1.
    BatchSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::PerceptionRadius(r) => {
                write!(f, "perception radius must be positive and finite, got {}", r)
            }
            ConfigError::ContainmentRadius(r) => {
                write!(f, "containment radius must be positive and finite, got {}", r)
            }
            ConfigError::BlendWeight(name, w) => {
                write!(f, "blend weight `{}` must be finite, got {}", name, w)
            }
            ConfigError::Wander(w) => {
                write!(f, "wander bound must be finite and non-negative, got {}", w)
            }
            ConfigError::BaseSpeed(s) => {
                write!(f, "base speed must be finite and non-negative, got {}", s)
            }
            ConfigError::BatchSize => write!(f, "batch size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur when building or stepping a flock.
#[derive(Debug)]
pub enum FlockError {
    /// Configuration failed validation.
    InvalidConfig(ConfigError),
    /// The worker pool could not be created.
    ThreadPool(rayon::ThreadPoolBuildError),
    /// The live population no longer matches the buffers sized at run start.
    PopulationChanged {
        /// Boid count the run was started with.
        expected: usize,
        /// Boid count found in the store this frame.
        found: usize,
    },
}

impl fmt::Display for FlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlockError::InvalidConfig(e) => write!(f, "Invalid flock configuration: {}", e),
            FlockError::ThreadPool(e) => write!(f, "Failed to build worker pool: {}", e),
            FlockError::PopulationChanged { expected, found } => write!(
                f,
                "Boid population changed mid-run: started with {}, store now holds {}. \
                 Entities must not be added or removed while a flock is running.",
                expected, found
            ),
        }
    }
}

impl std::error::Error for FlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FlockError::InvalidConfig(e) => Some(e),
            FlockError::ThreadPool(e) => Some(e),
            FlockError::PopulationChanged { .. } => None,
        }
    }
}

impl From<ConfigError> for FlockError {
    fn from(e: ConfigError) -> Self {
        FlockError::InvalidConfig(e)
    }
}

impl From<rayon::ThreadPoolBuildError> for FlockError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        FlockError::ThreadPool(e)
    }
}
