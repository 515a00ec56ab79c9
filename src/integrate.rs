//! Motion integration.
//!
//! Two steps write to the live table:
//!
//! - [`coast`] moves every boid straight ahead. It runs on every frame a
//!   steering result is not ready, so motion never stalls on the solver.
//! - [`apply`] consumes a finished cycle's output buffer, once per cycle.

use crate::boids::{forward, look_rotation, up, BoidTable};
use crate::config::{FlockConfig, IntegrationMode};
use crate::steering::SteeringOutput;
use rayon::prelude::*;

/// Per-boid speed resolution shared by both steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub base_speed: f32,
    pub scale_by_boid_speed: bool,
    pub delta_time: f32,
    pub batch_size: usize,
}

impl Motion {
    pub fn new(config: &FlockConfig, delta_time: f32) -> Self {
        Self {
            base_speed: config.base_speed,
            scale_by_boid_speed: config.scale_by_boid_speed,
            delta_time,
            batch_size: config.batch_size,
        }
    }

    /// Distance a boid with speed attribute `boid_speed` covers this frame.
    #[inline]
    pub fn step(&self, boid_speed: f32) -> f32 {
        let speed = if self.scale_by_boid_speed {
            self.base_speed * boid_speed
        } else {
            self.base_speed
        };
        speed * self.delta_time
    }
}

/// Translate every boid along its own forward axis.
pub fn coast(live: &mut BoidTable, motion: &Motion) {
    let (positions, orientations, speeds) = live.columns_mut();
    positions
        .par_iter_mut()
        .zip(orientations.par_iter())
        .zip(speeds.par_iter())
        .with_min_len(motion.batch_size.max(1))
        .for_each(|((position, &orientation), &speed)| {
            *position += forward(orientation) * motion.step(speed);
        });
}

/// Write a finished cycle's results into the live table.
///
/// Returns the number of slots consumed, i.e. stamped with `cycle`. Slots
/// carrying any other stamp were not written by this cycle and are left
/// alone; with a correctly scheduled cycle that never happens.
///
/// # Panics
///
/// If `output` and `live` differ in length.
pub fn apply(
    live: &mut BoidTable,
    output: &[SteeringOutput],
    mode: IntegrationMode,
    cycle: u32,
    motion: &Motion,
) -> usize {
    assert_eq!(
        live.len(),
        output.len(),
        "output buffer does not match the live population"
    );

    let (positions, orientations, speeds) = live.columns_mut();
    positions
        .par_iter_mut()
        .zip(orientations.par_iter_mut())
        .zip(speeds.par_iter())
        .zip(output.par_iter())
        .with_min_len(motion.batch_size.max(1))
        .map(|(((position, orientation), &speed), out)| {
            if out.cycle != cycle {
                return 0usize;
            }
            match mode {
                IntegrationMode::Direction => {
                    let direction = out.value();
                    match look_rotation(direction, up(*orientation)) {
                        Some(facing) => {
                            *position += direction * motion.step(speed);
                            *orientation = facing;
                        }
                        None => *position += forward(*orientation) * motion.step(speed),
                    }
                }
                IntegrationMode::Pose => {
                    *position = out.value();
                    *orientation = out.orientation().normalize();
                }
            }
            1
        })
        .sum()
}
