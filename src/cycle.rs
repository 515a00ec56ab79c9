//! Steering cycle scheduling.
//!
//! Steering is O(N²) (or O(N²/cells)) and too slow to run every frame, so
//! it runs as a background cycle that may span several frames:
//!
//! ```text
//!            dispatch + coast                 apply
//!   Idle ─────────────────────► InFlight ──────────────► Idle
//!                                 │  ▲
//!                                 └──┘ coast while elapsed < budget
//! ```
//!
//! On a dispatch frame the snapshot copier and the octant hash builder run
//! side by side on the worker pool. Once both have joined, the solver is
//! queued and left running, and the frame coasts. Frames that find the cycle
//! still inside its wall-clock budget only coast. The first frame past the
//! budget waits for the solver and applies its output.
//!
//! Coast and apply steps run on the calling thread, outside the worker pool,
//! so a coast frame never waits on the solver.
//!
//! The budget is wall-clock, not frame-count based, so how many frames a
//! cycle spans depends on frame rate.

use crate::boids::BoidStore;
use crate::config::FlockConfig;
use crate::error::FlockError;
use crate::executor::{TaskGraph, TaskHandle, WorkerPool};
use crate::integrate::{self, Motion};
use crate::snapshot::{self, SnapshotEntry};
use crate::spatial::{OctantIndex, OctantStats};
use crate::steering::{self, CycleParams, SteeringOutput};
use crate::time::FrameClock;
use bytemuck::Zeroable;
use parking_lot::RwLock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a frame update did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAction {
    /// Started a new steering cycle and coasted.
    Dispatch,
    /// Coasted while a cycle was in flight.
    Coast,
    /// Waited for the in-flight cycle and applied its result.
    Apply,
}

/// Scheduler state.
#[derive(Clone, Debug, Default)]
pub enum CycleState {
    /// No steering cycle in flight.
    #[default]
    Idle,
    /// A solver has been dispatched and may still be running.
    SteeringInFlight {
        /// Wall-clock reading at dispatch.
        dispatched_at: Duration,
        /// Number of the in-flight cycle.
        cycle: u32,
        /// Completion of the solver job.
        solver: TaskHandle,
    },
}

impl CycleState {
    /// Action for a frame at wall-clock `now`, given the cycle budget.
    pub fn next_action(&self, now: Duration, budget: Duration) -> FrameAction {
        match self {
            CycleState::Idle => FrameAction::Dispatch,
            CycleState::SteeringInFlight { dispatched_at, .. } => {
                if now.saturating_sub(*dispatched_at) >= budget {
                    FrameAction::Apply
                } else {
                    FrameAction::Coast
                }
            }
        }
    }

    /// Number of the in-flight cycle, or 0 when idle.
    pub fn cycle(&self) -> u32 {
        match self {
            CycleState::Idle => 0,
            CycleState::SteeringInFlight { cycle, .. } => *cycle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CycleState::Idle)
    }
}

/// Summary of one [`Flock::update`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameReport {
    pub action: FrameAction,
    /// Cycle dispatched, in flight, or applied this frame; 0 if none.
    pub cycle: u32,
    /// Output slots consumed by an apply step.
    pub applied: usize,
}

/// Transient per-run buffers. Sized once; cleared, never reallocated.
struct CycleBuffers {
    snapshot: RwLock<Vec<SnapshotEntry>>,
    index: OctantIndex,
    output: RwLock<Vec<SteeringOutput>>,
}

impl CycleBuffers {
    fn new(count: usize) -> Self {
        Self {
            snapshot: RwLock::new(vec![SnapshotEntry::zeroed(); count]),
            index: OctantIndex::with_capacity(count),
            output: RwLock::new(vec![SteeringOutput::zeroed(); count]),
        }
    }
}

/// A running flock: the per-run context of the steering cycle.
///
/// Created by [`Simulation::build`](crate::Simulation::build). The boid count
/// is fixed for the lifetime of the flock.
pub struct Flock<G: TaskGraph = WorkerPool> {
    config: FlockConfig,
    store: BoidStore,
    graph: G,
    buffers: Arc<CycleBuffers>,
    count: usize,
    rng: SmallRng,
    state: CycleState,
    cycles_dispatched: u32,
    cycles_completed: u64,
}

impl<G: TaskGraph> Flock<G> {
    /// Start a run over the boids currently in `store`.
    pub fn new(config: FlockConfig, store: BoidStore, graph: G) -> Result<Self, FlockError> {
        config.validate()?;
        let count = store.len();
        tracing::debug!(
            boids = count,
            scan = ?config.scan,
            integration = ?config.integration,
            "flock run started"
        );

        Ok(Self {
            rng: SmallRng::seed_from_u64(config.seed),
            buffers: Arc::new(CycleBuffers::new(count)),
            config,
            store,
            graph,
            count,
            state: CycleState::Idle,
            cycles_dispatched: 0,
            cycles_completed: 0,
        })
    }

    /// Advance one frame.
    ///
    /// Fails if the store no longer holds the number of boids the run
    /// started with. A mismatch found before any stage runs leaves the state
    /// untouched; one found under a stage's guard abandons the cycle.
    pub fn update(&mut self, clock: &impl FrameClock) -> Result<FrameReport, FlockError> {
        self.check_population(self.store.len())?;

        let now = clock.now();
        let delta_time = clock.delta();
        let motion = Motion::new(&self.config, delta_time);

        let state = std::mem::take(&mut self.state);
        match (state.next_action(now, self.config.cycle_budget), state) {
            (FrameAction::Apply, CycleState::SteeringInFlight { cycle, solver, .. }) => {
                self.apply(cycle, &solver, &motion)
            }
            (FrameAction::Coast, in_flight) => {
                let cycle = in_flight.cycle();
                self.state = in_flight;
                self.coast(&motion)?;
                tracing::trace!(cycle, "coast");
                Ok(FrameReport {
                    action: FrameAction::Coast,
                    cycle,
                    applied: 0,
                })
            }
            _ => self.dispatch(now, delta_time, &motion),
        }
    }

    fn check_population(&self, found: usize) -> Result<(), FlockError> {
        if found == self.count {
            Ok(())
        } else {
            Err(FlockError::PopulationChanged {
                expected: self.count,
                found,
            })
        }
    }

    fn dispatch(
        &mut self,
        now: Duration,
        delta_time: f32,
        motion: &Motion,
    ) -> Result<FrameReport, FlockError> {
        let batch_size = self.config.batch_size;
        let count = self.count;
        // Length seen by a reader whose guard disagreed with the buffers
        let mismatch = Arc::new(AtomicUsize::new(count));

        let copy = {
            let store = self.store.clone();
            let buffers = Arc::clone(&self.buffers);
            let mismatch = Arc::clone(&mismatch);
            self.graph.spawn(
                &[],
                Box::new(move || {
                    let live = store.read();
                    if live.len() != count {
                        mismatch.store(live.len(), Ordering::Release);
                        return;
                    }
                    snapshot::capture(&live, &mut buffers.snapshot.write(), batch_size);
                }),
            )
        };
        let hash = {
            let store = self.store.clone();
            let buffers = Arc::clone(&self.buffers);
            let mismatch = Arc::clone(&mismatch);
            self.graph.spawn(
                &[],
                Box::new(move || {
                    let live = store.read();
                    if live.len() != count {
                        mismatch.store(live.len(), Ordering::Release);
                        return;
                    }
                    buffers.index.rebuild(live.positions(), batch_size);
                }),
            )
        };
        let readers_done = self.graph.join(&[copy, hash]);
        self.graph.wait(&readers_done);
        self.check_population(mismatch.load(Ordering::Acquire))?;

        self.cycles_dispatched = self.cycles_dispatched.wrapping_add(1).max(1);
        let cycle = self.cycles_dispatched;
        let params = CycleParams::new(&self.config, cycle, self.rng.gen(), delta_time);
        let solver = {
            let buffers = Arc::clone(&self.buffers);
            self.graph.spawn(
                &[],
                Box::new(move || {
                    let snapshot = buffers.snapshot.read();
                    let mut output = buffers.output.write();
                    steering::solve(&snapshot, &buffers.index, &params, &mut output);
                }),
            )
        };
        self.state = CycleState::SteeringInFlight {
            dispatched_at: now,
            cycle,
            solver,
        };
        tracing::debug!(cycle, boids = self.count, "steering cycle dispatched");

        self.coast(motion)?;
        Ok(FrameReport {
            action: FrameAction::Dispatch,
            cycle,
            applied: 0,
        })
    }

    /// Coast on the calling thread. The worker pool may be busy with a
    /// solver, and coast frames must not queue behind it.
    fn coast(&self, motion: &Motion) -> Result<(), FlockError> {
        let mut live = self.store.write();
        self.check_population(live.len())?;
        integrate::coast(&mut live, motion);
        Ok(())
    }

    fn apply(
        &mut self,
        cycle: u32,
        solver: &TaskHandle,
        motion: &Motion,
    ) -> Result<FrameReport, FlockError> {
        self.graph.wait(solver);

        let output = self.buffers.output.read();
        let mut live = self.store.write();
        self.check_population(live.len())?;
        let applied = integrate::apply(&mut live, &output, self.config.integration, cycle, motion);
        drop(live);
        drop(output);

        debug_assert_eq!(applied, self.count, "every output slot is consumed once per cycle");
        self.cycles_completed += 1;
        tracing::debug!(cycle, applied, "steering cycle applied");

        Ok(FrameReport {
            action: FrameAction::Apply,
            cycle,
            applied,
        })
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }

    /// Handle to the live boid table.
    pub fn store(&self) -> &BoidStore {
        &self.store
    }

    /// Number of boids in this run.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Cycles whose results have been applied.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Occupancy of the octant index built by the latest cycle.
    pub fn octant_stats(&self) -> OctantStats {
        self.buffers.index.stats()
    }

    /// Run `f` over the output buffer.
    ///
    /// Returns `None` while a solver is writing it.
    pub fn with_output<R>(&self, f: impl FnOnce(&[SteeringOutput]) -> R) -> Option<R> {
        self.buffers.output.try_read().map(|output| f(&output))
    }

    /// Output buffer as raw bytes, for upload to an engine-side buffer.
    pub fn output_bytes(&self) -> Option<Vec<u8>> {
        self.with_output(|output| bytemuck::cast_slice(output).to_vec())
    }

    /// Wait for any in-flight cycle to finish and end the run.
    ///
    /// The cycle's result is discarded. Dropping the flock does the same.
    pub fn finish(self) {}
}

impl<G: TaskGraph> Drop for Flock<G> {
    fn drop(&mut self) {
        if let CycleState::SteeringInFlight { cycle, solver, .. } = &self.state {
            tracing::debug!(cycle, "waiting for in-flight cycle before releasing buffers");
            self.graph.wait(solver);
        }
    }
}

impl<G: TaskGraph> std::fmt::Debug for Flock<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flock")
            .field("boids", &self.count)
            .field("state", &self.state)
            .field("cycles_completed", &self.cycles_completed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boids::BoidTable;
    use crate::config::{IntegrationMode, Wander};
    use crate::executor::{Inline, Job};
    use crate::time::ManualClock;
    use glam::{Quat, Vec3};
    use std::sync::atomic::AtomicBool;

    const BUDGET: Duration = Duration::from_millis(500);

    fn in_flight(at_ms: u64) -> CycleState {
        CycleState::SteeringInFlight {
            dispatched_at: Duration::from_millis(at_ms),
            cycle: 1,
            solver: TaskHandle::completed(),
        }
    }

    fn flock_of(table: BoidTable, config: FlockConfig) -> Flock<Inline> {
        Flock::new(config, BoidStore::new(table), Inline).unwrap()
    }

    /// Runs jobs inline, but adds a boid to the store just before the first
    /// job it is given.
    struct GrowsBeforeFirstJob {
        store: BoidStore,
        armed: AtomicBool,
    }

    impl TaskGraph for GrowsBeforeFirstJob {
        fn spawn(&self, after: &[TaskHandle], job: Job) -> TaskHandle {
            if self.armed.swap(false, Ordering::SeqCst) {
                self.store.write().push(Vec3::ZERO, Quat::IDENTITY, 1.0);
            }
            Inline.spawn(after, job)
        }
    }

    fn line_of(count: usize) -> BoidTable {
        let mut table = BoidTable::new();
        for i in 0..count {
            table.push(Vec3::new(i as f32 * 4.0 - 20.0, 1.0, 1.0), Quat::IDENTITY, 1.0);
        }
        table
    }

    #[test]
    fn test_transitions() {
        let idle = CycleState::Idle;
        assert_eq!(idle.next_action(Duration::ZERO, BUDGET), FrameAction::Dispatch);

        let flying = in_flight(1000);
        assert_eq!(flying.next_action(Duration::from_millis(1200), BUDGET), FrameAction::Coast);
        assert_eq!(flying.next_action(Duration::from_millis(1499), BUDGET), FrameAction::Coast);
        assert_eq!(flying.next_action(Duration::from_millis(1500), BUDGET), FrameAction::Apply);
        assert_eq!(flying.next_action(Duration::from_millis(9000), BUDGET), FrameAction::Apply);
        // Clock behind the dispatch reading counts as no time elapsed
        assert_eq!(flying.next_action(Duration::from_millis(10), BUDGET), FrameAction::Coast);
    }

    #[test]
    fn test_full_cycle_sequence() {
        let mut flock = flock_of(line_of(10), FlockConfig::default());
        let mut clock = ManualClock::new(1.0 / 60.0);

        let r = flock.update(&clock).unwrap();
        assert_eq!(r.action, FrameAction::Dispatch);
        assert_eq!(r.cycle, 1);

        clock.advance(Duration::from_millis(200));
        let r = flock.update(&clock).unwrap();
        assert_eq!(r.action, FrameAction::Coast);
        assert_eq!(r.cycle, 1);

        clock.advance(Duration::from_millis(300));
        let r = flock.update(&clock).unwrap();
        assert_eq!(r.action, FrameAction::Apply);
        assert_eq!(r.applied, 10);
        assert!(flock.state().is_idle());
        assert_eq!(flock.cycles_completed(), 1);

        let r = flock.update(&clock).unwrap();
        assert_eq!(r.action, FrameAction::Dispatch);
        assert_eq!(r.cycle, 2);
    }

    #[test]
    fn test_output_written_once_per_cycle() {
        let mut flock = flock_of(line_of(12), FlockConfig::default());
        let mut clock = ManualClock::new(0.02);

        for expected_cycle in 1..=3u32 {
            flock.update(&clock).unwrap();
            clock.advance(BUDGET);
            let r = flock.update(&clock).unwrap();
            assert_eq!(r.applied, 12);

            let stamps_ok = flock
                .with_output(|out| out.iter().all(|o| o.cycle == expected_cycle))
                .unwrap();
            assert!(stamps_ok);
        }
    }

    #[test]
    fn test_dispatch_frame_coasts() {
        let mut table = BoidTable::new();
        table.push(Vec3::ZERO, Quat::IDENTITY, 1.0);
        let mut flock = flock_of(table, FlockConfig::default());

        flock.update(&ManualClock::new(1.0)).unwrap();
        assert_eq!(flock.store().read().positions()[0], Vec3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_solver_sees_pose_from_before_the_coast() {
        let mut table = BoidTable::new();
        table.push(Vec3::new(3.0, 3.0, 3.0), Quat::IDENTITY, 1.0);
        let config = FlockConfig::default()
            .with_wander(Wander::Angle(0.0))
            .with_integration(IntegrationMode::Pose);
        let mut flock = flock_of(table, config);

        let mut clock = ManualClock::new(1.0);
        flock.update(&clock).unwrap();
        clock.advance(BUDGET);
        clock.delta = 0.0;
        flock.update(&clock).unwrap();

        // Pose assigned from the snapshot (3,3,3) plus one dispatch-delta step
        let p = flock.store().read().positions()[0];
        assert!((p - Vec3::new(3.0, 3.0, 8.0)).length() < 1e-3, "{:?}", p);
    }

    #[test]
    fn test_population_change_is_rejected() {
        let mut flock = flock_of(line_of(3), FlockConfig::default());
        flock
            .store()
            .write()
            .push(Vec3::ZERO, Quat::IDENTITY, 1.0);

        match flock.update(&ManualClock::new(0.1)) {
            Err(FlockError::PopulationChanged { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 4);
            }
            other => panic!("expected PopulationChanged, got {:?}", other),
        }
        assert!(flock.state().is_idle());
    }

    #[test]
    fn test_population_change_under_reader_guard() {
        let store = BoidStore::new(line_of(3));
        let graph = GrowsBeforeFirstJob {
            store: store.clone(),
            armed: AtomicBool::new(true),
        };
        let mut flock = Flock::new(FlockConfig::default(), store, graph).unwrap();

        match flock.update(&ManualClock::new(1.0)) {
            Err(FlockError::PopulationChanged { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 4);
            }
            other => panic!("expected PopulationChanged, got {:?}", other),
        }
        // No solver queued and nothing coasted
        assert!(flock.state().is_idle());
        assert_eq!(flock.store().read().positions()[0], Vec3::new(-20.0, 1.0, 1.0));
    }

    #[test]
    fn test_empty_flock_cycles() {
        let mut flock = flock_of(BoidTable::new(), FlockConfig::default());
        let mut clock = ManualClock::new(0.1);

        assert_eq!(flock.update(&clock).unwrap().action, FrameAction::Dispatch);
        clock.advance(BUDGET);
        let r = flock.update(&clock).unwrap();
        assert_eq!(r.action, FrameAction::Apply);
        assert_eq!(r.applied, 0);
        assert_eq!(flock.output_bytes().unwrap().len(), 0);
    }

    #[test]
    fn test_output_bytes_layout() {
        let mut flock = flock_of(line_of(4), FlockConfig::default());
        let clock = ManualClock::new(0.1);
        flock.update(&clock).unwrap();

        let bytes = flock.output_bytes().unwrap();
        assert_eq!(bytes.len(), 4 * std::mem::size_of::<SteeringOutput>());
    }
}
