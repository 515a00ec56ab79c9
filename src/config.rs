//! Flock configuration.
//!
//! Every tunable of the steering cycle lives in [`FlockConfig`]. The defaults
//! reproduce the all-boid scan variant; [`FlockConfig::cell_restricted`] and
//! [`FlockConfig::speed_scaled`] reproduce the other two known variants. The
//! variants differ in constants and in which scan/integration strategy they
//! use, and are kept as separate presets rather than blended together.
//!
//! # Example
//!
//! ```ignore
//! let config = FlockConfig::default()
//!     .with_perception_radius(20.0)
//!     .with_cycle_budget(Duration::from_millis(250))
//!     .with_seed(7);
//! config.validate()?;
//! ```

use crate::error::ConfigError;
use std::time::Duration;

/// Which boids the solver considers as neighbour candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Every other boid is a candidate. The octant index is still built each
    /// cycle but does not narrow the search. O(N²) per cycle.
    #[default]
    AllBoids,

    /// Only boids in the same octant are candidates.
    ///
    /// Neighbours just across an axis plane are invisible in this mode, even
    /// when they are within the perception radius. That is a property of the
    /// 8-cell octant partition.
    SharedCell,
}

/// What the solver writes and how the integrator consumes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IntegrationMode {
    /// Solver emits a unit steering direction. Apply moves each boid along it
    /// and turns the boid to face it.
    #[default]
    Direction,

    /// Solver emits the displaced position and the new orientation, computed
    /// from the snapshot. Apply assigns both directly, discarding the coast
    /// progress made while the cycle was in flight.
    Pose,
}

/// Random perturbation of each boid's own heading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Wander {
    /// Each Euler angle is drawn uniformly from `±angle` radians.
    Angle(f32),

    /// Each Euler angle is drawn uniformly from `±rate * delta_time` radians,
    /// using the frame delta at dispatch.
    PerSecond(f32),
}

impl Wander {
    /// Bound on each Euler angle for a cycle dispatched with `delta_time`.
    pub fn bound(&self, delta_time: f32) -> f32 {
        match *self {
            Wander::Angle(angle) => angle,
            Wander::PerSecond(rate) => rate * delta_time,
        }
    }

    fn raw(&self) -> f32 {
        match *self {
            Wander::Angle(v) | Wander::PerSecond(v) => v,
        }
    }
}

impl Default for Wander {
    fn default() -> Self {
        Wander::Angle(10f32.to_radians())
    }
}

/// Weights of the four steering terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendWeights {
    /// Own (wandered) heading.
    pub forward: f32,
    /// Average neighbour heading.
    pub alignment: f32,
    /// Pull toward the neighbourhood centre.
    pub cohesion: f32,
    /// Push away from the neighbourhood.
    pub separation: f32,
}

impl BlendWeights {
    pub const fn new(forward: f32, alignment: f32, cohesion: f32, separation: f32) -> Self {
        Self {
            forward,
            alignment,
            cohesion,
            separation,
        }
    }

    pub fn sum(&self) -> f32 {
        self.forward + self.alignment + self.cohesion + self.separation
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("forward", self.forward),
            ("alignment", self.alignment),
            ("cohesion", self.cohesion),
            ("separation", self.separation),
        ];
        for (name, weight) in named {
            if !weight.is_finite() {
                return Err(ConfigError::BlendWeight(name, weight));
            }
        }
        Ok(())
    }
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self::new(0.25, 0.4, 0.2, 0.15)
    }
}

/// Configuration for a flock run.
#[derive(Clone, Debug, PartialEq)]
pub struct FlockConfig {
    /// Neighbours strictly closer than this contribute to steering.
    pub perception_radius: f32,
    /// Boids farther than this from the origin are pushed back toward it.
    pub containment_radius: f32,
    /// Wall-clock time a steering cycle is given before its result is applied.
    pub cycle_budget: Duration,
    /// Steering term weights.
    pub weights: BlendWeights,
    /// Heading perturbation.
    pub wander: Wander,
    /// Units per second.
    pub base_speed: f32,
    /// Multiply `base_speed` by each boid's own speed.
    pub scale_by_boid_speed: bool,
    /// Neighbour candidate strategy.
    pub scan: ScanMode,
    /// Solver output / apply strategy.
    pub integration: IntegrationMode,
    /// Seed of the run-level generator that seeds every cycle.
    pub seed: u64,
    /// Minimum number of boids handed to one worker at a time.
    pub batch_size: usize,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            perception_radius: 30.0,
            containment_radius: 1000.0,
            cycle_budget: Duration::from_millis(500),
            weights: BlendWeights::default(),
            wander: Wander::default(),
            base_speed: 5.0,
            scale_by_boid_speed: false,
            scan: ScanMode::AllBoids,
            integration: IntegrationMode::Direction,
            seed: 404,
            batch_size: 64,
        }
    }
}

impl FlockConfig {
    /// Short-range variant that only scans the boid's own octant.
    pub fn cell_restricted() -> Self {
        Self {
            perception_radius: 10.0,
            scan: ScanMode::SharedCell,
            ..Self::default()
        }
    }

    /// Variant whose motion and wander scale with per-boid speed and frame
    /// delta, and whose solver emits full poses.
    pub fn speed_scaled() -> Self {
        Self {
            weights: BlendWeights::new(0.3, 0.4, 0.1, 0.2),
            wander: Wander::PerSecond(10.0),
            scale_by_boid_speed: true,
            integration: IntegrationMode::Pose,
            ..Self::default()
        }
    }

    pub fn with_perception_radius(mut self, radius: f32) -> Self {
        self.perception_radius = radius;
        self
    }

    pub fn with_containment_radius(mut self, radius: f32) -> Self {
        self.containment_radius = radius;
        self
    }

    pub fn with_cycle_budget(mut self, budget: Duration) -> Self {
        self.cycle_budget = budget;
        self
    }

    pub fn with_weights(mut self, weights: BlendWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_wander(mut self, wander: Wander) -> Self {
        self.wander = wander;
        self
    }

    pub fn with_base_speed(mut self, speed: f32) -> Self {
        self.base_speed = speed;
        self
    }

    pub fn with_scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_integration(mut self, integration: IntegrationMode) -> Self {
        self.integration = integration;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Check every field for values the solver cannot work with.
    ///
    /// A weight sum far from 1.0 is allowed (it only changes how hard boids
    /// turn) but is logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.perception_radius.is_finite() && self.perception_radius > 0.0) {
            return Err(ConfigError::PerceptionRadius(self.perception_radius));
        }
        if !(self.containment_radius.is_finite() && self.containment_radius > 0.0) {
            return Err(ConfigError::ContainmentRadius(self.containment_radius));
        }
        self.weights.validate()?;
        let wander = self.wander.raw();
        if !(wander.is_finite() && wander >= 0.0) {
            return Err(ConfigError::Wander(wander));
        }
        if !(self.base_speed.is_finite() && self.base_speed >= 0.0) {
            return Err(ConfigError::BaseSpeed(self.base_speed));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::BatchSize);
        }

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 0.1 {
            tracing::warn!(sum, "blend weights do not sum to ~1.0");
        }
        Ok(())
    }
}
