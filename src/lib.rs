//! # steerflock
//!
//! Multi-threaded boids steering for a host engine that owns the boids.
//!
//! steerflock runs the expensive part of flocking (every boid looking at its
//! neighbours) as a background cycle on a worker pool, while the live boid
//! table keeps moving every frame. The host hands over a table of positions,
//! orientations and speeds, then calls [`Flock::update`] once per frame.
//!
//! ## Quick Start
//!
//! ```ignore
//! use steerflock::prelude::*;
//!
//! fn main() -> Result<(), FlockError> {
//!     let mut flock = Simulation::new()
//!         .with_config(FlockConfig::default())
//!         .with_boids(scatter(1_000, &SpawnConfig::default(), 42))
//!         .build()?;
//!
//!     let mut time = Time::new();
//!     loop {
//!         time.update();
//!         let report = flock.update(&time)?;
//!         if report.action == FrameAction::Apply {
//!             println!("cycle {} applied to {} boids", report.cycle, report.applied);
//!         }
//!     }
//! }
//! ```
//!
//! ## The steering cycle
//!
//! A cycle has four stages:
//!
//! 1. **Snapshot**: copy the live table into a private buffer.
//! 2. **Hash**: bucket boids into the 8 octants around the origin.
//! 3. **Solve**: compute cohesion, alignment, separation, wander and
//!    containment for every boid, reading only the snapshot.
//! 4. **Apply**: write the result back to the live table.
//!
//! Stages 1 and 2 run side by side on the dispatch frame. Stage 3 keeps
//! running in the background across frames; meanwhile each frame "coasts"
//! every boid forward along its current heading. Once the cycle budget
//! (500 ms by default) has elapsed, the next frame waits for the solver and
//! applies its result.
//!
//! ## Variants
//!
//! [`FlockConfig`] carries the knobs that differ between flock styles:
//!
//! - [`FlockConfig::default`] scans every boid as a neighbour candidate.
//! - [`FlockConfig::cell_restricted`] only scans boids in the same octant.
//! - [`FlockConfig::speed_scaled`] scales motion by each boid's own speed
//!   and applies poses computed by the solver.
//!
//! ## Threading
//!
//! Jobs run on a [`WorkerPool`] (a rayon thread pool) through the
//! [`TaskGraph`] interface. Tests and single-threaded hosts can use
//! [`Inline`], which runs every job on the calling thread.
//!
//! The live table sits behind a [`BoidStore`]. Do not hold one of its guards
//! across a call to [`Flock::update`].

pub mod boids;
pub mod config;
pub mod cycle;
pub mod error;
pub mod executor;
pub mod integrate;
mod simulation;
pub mod snapshot;
pub mod spatial;
pub mod spawn;
pub mod steering;
pub mod time;

pub use boids::{BoidStore, BoidTable};
pub use bytemuck;
pub use config::{BlendWeights, FlockConfig, IntegrationMode, ScanMode, Wander};
pub use cycle::{CycleState, Flock, FrameAction, FrameReport};
pub use error::{ConfigError, FlockError};
pub use executor::{Inline, TaskGraph, TaskHandle, WorkerPool};
pub use glam::{Quat, Vec3};
pub use simulation::Simulation;
pub use spawn::{scatter, SpawnConfig, SpawnContext};
pub use steering::SteeringOutput;
pub use time::{FrameClock, ManualClock, Time};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use steerflock::prelude::*;
/// ```
///
/// This imports:
/// - [`Simulation`] - the flock builder
/// - [`Flock`], [`FrameAction`], [`FrameReport`] - the running flock
/// - [`FlockConfig`] and its parts
/// - [`scatter`], [`SpawnConfig`] - initial population
/// - [`Time`], [`ManualClock`] - frame clocks
/// - [`Vec3`], [`Quat`] - glam types
pub mod prelude {
    pub use crate::boids::{BoidStore, BoidTable};
    pub use crate::config::{BlendWeights, FlockConfig, IntegrationMode, ScanMode, Wander};
    pub use crate::cycle::{Flock, FrameAction, FrameReport};
    pub use crate::error::FlockError;
    pub use crate::executor::{Inline, WorkerPool};
    pub use crate::simulation::Simulation;
    pub use crate::spawn::{scatter, SpawnConfig};
    pub use crate::time::{FrameClock, ManualClock, Time};
    pub use crate::{Quat, Vec3};
}
