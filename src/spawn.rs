//! Initial population helpers.
//!
//! The core never creates or destroys boids; a host scatters them once
//! before the run starts. [`scatter`] produces the bootstrap population,
//! drawing each boid from its own [`SpawnContext`] so a boid's attributes
//! depend only on its index and the seed.

use crate::boids::BoidTable;
use glam::{EulerRot, Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

/// Population size used by the demo when none is given.
pub const DEFAULT_COUNT: usize = 10;

/// Seed used by the demo when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// Shape of a scattered population.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnConfig {
    /// Positions are uniform in the cube `[-half_extent, half_extent)³`.
    pub half_extent: f32,
    /// Per-boid speeds are uniform in `[1, max_speed)`.
    pub max_speed: f32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            half_extent: 200.0,
            max_speed: 3.0,
        }
    }
}

/// Seeded random helpers for placing one boid.
pub struct SpawnContext {
    rng: SmallRng,
}

impl SpawnContext {
    /// Context for boid `index`. The same `(index, seed)` pair always yields
    /// the same numbers.
    pub fn new(index: usize, seed: u64) -> Self {
        let stream = (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        Self {
            rng: SmallRng::seed_from_u64(seed ^ stream),
        }
    }

    /// Random f32 in `[min, max)`. Returns `min` for an empty range.
    #[inline]
    pub fn random_range(&mut self, min: f32, max: f32) -> f32 {
        if max <= min {
            return min;
        }
        self.rng.gen_range(min..max)
    }

    /// Random point inside a cube of given half-size, centered at origin.
    pub fn random_in_cube(&mut self, half_size: f32) -> Vec3 {
        Vec3::new(
            self.random_range(-half_size, half_size),
            self.random_range(-half_size, half_size),
            self.random_range(-half_size, half_size),
        )
    }

    /// Orientation from three Euler angles each uniform in ±180°.
    pub fn random_orientation(&mut self) -> Quat {
        Quat::from_euler(
            EulerRot::ZXY,
            self.random_range(-PI, PI),
            self.random_range(-PI, PI),
            self.random_range(-PI, PI),
        )
        .normalize()
    }
}

/// Scatter `count` boids according to `config`.
pub fn scatter(count: usize, config: &SpawnConfig, seed: u64) -> BoidTable {
    let mut table = BoidTable::with_capacity(count);
    for index in 0..count {
        let mut ctx = SpawnContext::new(index, seed);
        let position = ctx.random_in_cube(config.half_extent);
        let orientation = ctx.random_orientation();
        let speed = ctx.random_range(1.0, config.max_speed);
        table.push(position, orientation, speed);
    }
    tracing::debug!(count, seed, half_extent = config.half_extent, "scattered boids");
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_respects_bounds() {
        let config = SpawnConfig::default();
        let table = scatter(500, &config, DEFAULT_SEED);

        assert_eq!(table.len(), 500);
        for ((p, q), s) in table
            .positions()
            .iter()
            .zip(table.orientations())
            .zip(table.speeds())
        {
            assert!(p.abs().max_element() <= 200.0);
            assert!((q.length() - 1.0).abs() < 1e-4);
            assert!((1.0..3.0).contains(s));
        }
    }

    #[test]
    fn test_scatter_is_seeded() {
        let config = SpawnConfig::default();
        let a = scatter(20, &config, 9);
        let b = scatter(20, &config, 9);
        let c = scatter(20, &config, 10);

        assert_eq!(a.positions(), b.positions());
        assert_ne!(a.positions(), c.positions());
    }

    #[test]
    fn test_degenerate_speed_range() {
        let config = SpawnConfig {
            half_extent: 0.0,
            max_speed: 1.0,
        };
        let table = scatter(3, &config, 1);
        assert!(table.speeds().iter().all(|&s| s == 1.0));
        assert!(table.positions().iter().all(|&p| p == Vec3::ZERO));
    }

    #[test]
    fn test_context_depends_on_index_and_seed() {
        let first = SpawnContext::new(4, 11).random_in_cube(50.0);
        assert_eq!(first, SpawnContext::new(4, 11).random_in_cube(50.0));
        assert_ne!(first, SpawnContext::new(5, 11).random_in_cube(50.0));
    }
}
