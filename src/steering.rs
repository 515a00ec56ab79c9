//! Neighbour steering solver.
//!
//! For each boid the solver scans its candidate neighbours in the snapshot,
//! builds the classic cohesion / alignment / separation terms from those
//! within the perception radius, blends them with the boid's own (slightly
//! randomised) heading and a containment pull, and writes one
//! [`SteeringOutput`] per boid.
//!
//! # Blend
//!
//! ```text
//! force = w_forward    * wandered_forward
//!       + w_alignment  * avg_heading
//!       + w_cohesion   * toward_center
//!       + w_separation * away_from_neighbors
//!       + containment                      (|pos| > containment_radius)
//! direction = normalize(force)
//! ```
//!
//! Every normalisation is zero-guarded: a degenerate vector contributes
//! nothing rather than NaN.

use crate::boids::{forward, look_rotation, up};
use crate::config::{BlendWeights, FlockConfig, IntegrationMode, ScanMode};
use crate::integrate::Motion;
use crate::snapshot::SnapshotEntry;
use crate::spatial::{octant_of, OctantIndex, CELL_COUNT};
use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Quat, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Solver result for one boid.
///
/// In [`IntegrationMode::Direction`] `value` is the unit steering direction
/// (zero when the force was degenerate). In [`IntegrationMode::Pose`] it is
/// the new position and `orientation` the new orientation. `cycle` is the
/// number of the cycle that wrote the slot; zero means never written.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SteeringOutput {
    pub value: [f32; 3],
    pub cycle: u32,
    pub orientation: [f32; 4],
}

impl SteeringOutput {
    #[inline]
    pub fn value(&self) -> Vec3 {
        Vec3::from_array(self.value)
    }

    #[inline]
    pub fn orientation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }
}

/// Everything the solver needs for one cycle, fixed at dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleParams {
    /// Cycle number, starting at 1.
    pub cycle: u32,
    /// Seed every per-boid generator of this cycle derives from.
    pub seed: u64,
    pub perception_radius: f32,
    pub containment_radius: f32,
    pub weights: BlendWeights,
    /// Resolved wander bound in radians.
    pub wander_bound: f32,
    pub scan: ScanMode,
    pub integration: IntegrationMode,
    /// Speeds and frame delta at dispatch, for pose output.
    pub motion: Motion,
}

impl CycleParams {
    pub fn new(config: &FlockConfig, cycle: u32, seed: u64, delta_time: f32) -> Self {
        Self {
            cycle,
            seed,
            perception_radius: config.perception_radius,
            containment_radius: config.containment_radius,
            weights: config.weights,
            wander_bound: config.wander.bound(delta_time),
            scan: config.scan,
            integration: config.integration,
            motion: Motion::new(config, delta_time),
        }
    }
}

/// Flocking terms gathered from a boid's neighbourhood.
///
/// All three vectors are unit length when `in_range > 0` (unless they
/// cancelled out exactly) and zero otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Neighborhood {
    pub avg_heading: Vec3,
    pub toward_center: Vec3,
    pub away_from_neighbors: Vec3,
    pub in_range: u32,
}

/// Full breakdown of one boid's steering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Steering {
    pub neighborhood: Neighborhood,
    /// Own forward after the wander rotation.
    pub heading: Vec3,
    /// Pull back toward the origin; zero inside the containment radius.
    pub containment: Vec3,
    /// Weighted blend plus containment, before normalisation.
    pub force: Vec3,
    /// `force` normalised, or zero if `force` was degenerate.
    pub direction: Vec3,
}

/// Generator for boid `index` in the cycle seeded with `seed`.
///
/// Derived from the index rather than shared, so a boid draws the same
/// numbers whichever worker computes it.
pub fn boid_rng(seed: u64, index: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Accumulate the flocking terms for boid `i` over `candidates`.
///
/// `i` itself is skipped if it appears among the candidates.
pub fn gather(
    i: usize,
    snapshot: &[SnapshotEntry],
    candidates: impl IntoIterator<Item = usize>,
    perception_radius: f32,
) -> Neighborhood {
    let position = snapshot[i].position();

    let mut avg_heading = Vec3::ZERO;
    let mut toward_center = Vec3::ZERO;
    let mut away = Vec3::ZERO;
    let mut in_range = 0u32;

    for j in candidates {
        if j == i {
            continue;
        }
        let other = &snapshot[j];
        let other_position = other.position();
        if other_position.distance(position) < perception_radius {
            avg_heading += forward(other.orientation());
            toward_center += other_position;
            away += other_position - position;
            in_range += 1;
        }
    }

    if in_range == 0 {
        return Neighborhood::default();
    }

    let count = in_range as f32;
    Neighborhood {
        avg_heading: avg_heading.normalize_or_zero(),
        toward_center: (toward_center / count - position).normalize_or_zero(),
        away_from_neighbors: (away / count * -1.0).normalize_or_zero(),
        in_range,
    }
}

/// Rotate `heading` by a random Euler rotation with each angle in `±bound`.
pub fn wander(heading: Vec3, bound: f32, rng: &mut impl Rng) -> Vec3 {
    if bound <= 0.0 {
        return heading;
    }
    let rotation = Quat::from_euler(
        EulerRot::ZXY,
        rng.gen_range(-bound..=bound),
        rng.gen_range(-bound..=bound),
        rng.gen_range(-bound..=bound),
    );
    rotation * heading
}

/// Compute the steering of boid `i` against `candidates`.
pub fn steer(
    i: usize,
    snapshot: &[SnapshotEntry],
    candidates: impl IntoIterator<Item = usize>,
    params: &CycleParams,
    rng: &mut impl Rng,
) -> Steering {
    let entry = &snapshot[i];
    let position = entry.position();
    let neighborhood = gather(i, snapshot, candidates, params.perception_radius);
    let heading = wander(forward(entry.orientation()), params.wander_bound, rng);

    let w = &params.weights;
    let mut force = heading * w.forward
        + neighborhood.avg_heading * w.alignment
        + neighborhood.toward_center * w.cohesion
        + neighborhood.away_from_neighbors * w.separation;

    let containment = if position.length() > params.containment_radius {
        (-position).normalize_or_zero()
    } else {
        Vec3::ZERO
    };
    force += containment;

    Steering {
        neighborhood,
        heading,
        containment,
        force,
        direction: force.normalize_or_zero(),
    }
}

impl Steering {
    /// Encode this result for boid `entry` in the layout `params` asks for.
    pub fn to_output(&self, entry: &SnapshotEntry, params: &CycleParams) -> SteeringOutput {
        let orientation = entry.orientation();
        let facing = look_rotation(self.direction, up(orientation));

        let (value, orientation) = match params.integration {
            IntegrationMode::Direction => (self.direction, facing.unwrap_or(orientation)),
            IntegrationMode::Pose => {
                let step = params.motion.step(entry.speed());
                match facing {
                    Some(facing) => (entry.position() + self.direction * step, facing),
                    // Degenerate force: keep heading, move as a coast step would
                    None => (entry.position() + forward(orientation) * step, orientation),
                }
            }
        };

        SteeringOutput {
            value: value.to_array(),
            cycle: params.cycle,
            orientation: orientation.to_array(),
        }
    }
}

/// Fill `output` with one steering result per boid.
///
/// Reads only `snapshot` and `index`. Each boid writes its own slot, so the
/// pass needs no synchronisation beyond the iterator's split.
///
/// # Panics
///
/// If `output` and `snapshot` differ in length.
pub fn solve(
    snapshot: &[SnapshotEntry],
    index: &OctantIndex,
    params: &CycleParams,
    output: &mut [SteeringOutput],
) {
    assert_eq!(
        snapshot.len(),
        output.len(),
        "output buffer does not match the snapshot"
    );
    output.fill(SteeringOutput::zeroed());

    let count = snapshot.len();
    let cells: Option<[Vec<u32>; CELL_COUNT]> = match params.scan {
        ScanMode::AllBoids => None,
        ScanMode::SharedCell => Some(std::array::from_fn(|c| index.cell(c as u8))),
    };

    output
        .par_iter_mut()
        .enumerate()
        .with_min_len(params.motion.batch_size.max(1))
        .for_each(|(i, slot)| {
            let mut rng = boid_rng(params.seed, i);
            let steering = match &cells {
                None => steer(i, snapshot, 0..count, params, &mut rng),
                Some(cells) => {
                    let cell = &cells[octant_of(snapshot[i].position()) as usize];
                    steer(i, snapshot, cell.iter().map(|&j| j as usize), params, &mut rng)
                }
            };
            *slot = steering.to_output(&snapshot[i], params);
        });
}
