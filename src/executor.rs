//! Task-graph execution.
//!
//! A steering cycle is a small DAG of jobs: the snapshot copier and the hash
//! builder run side by side, and the solver runs after both. [`TaskGraph`] is
//! the minimal interface the cycle scheduler needs to express that:
//!
//! - `spawn(after, job)` queues `job` to run once every handle in `after`
//!   has completed and returns a handle for it,
//! - `join(handles)` returns a handle that completes when all of them have,
//! - `wait(handle)` blocks the caller until the handle completes.
//!
//! [`WorkerPool`] runs jobs on a rayon thread pool; parallel iterators used
//! inside a job fan out over the same pool. A job is handed to the pool only
//! once its dependencies are done, so no worker ever blocks waiting for
//! another job. [`Inline`] runs every job immediately on the calling thread,
//! which makes multi-frame scheduling deterministic in tests.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A unit of work submitted to a [`TaskGraph`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Completion handle for a spawned job.
///
/// Cloning shares the handle.
#[derive(Clone)]
pub struct TaskHandle {
    node: Arc<TaskNode>,
}

impl TaskHandle {
    /// Handle that is already complete.
    pub fn completed() -> Self {
        let handle = Self::pending();
        handle.node.complete();
        handle
    }

    fn pending() -> Self {
        Self {
            node: Arc::new(TaskNode::default()),
        }
    }

    /// Whether the job (and therefore all of its dependencies) has finished.
    pub fn is_complete(&self) -> bool {
        self.node.state.lock().done
    }

    /// Block until the job has finished.
    pub fn wait(&self) {
        let mut state = self.node.state.lock();
        while !state.done {
            self.node.finished.wait(&mut state);
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[derive(Default)]
struct TaskNode {
    state: Mutex<NodeState>,
    finished: Condvar,
}

#[derive(Default)]
struct NodeState {
    done: bool,
    dependents: Vec<Arc<PendingJob>>,
}

impl TaskNode {
    /// Register `job` to be released when this node completes.
    ///
    /// Returns `false` if the node has already completed, in which case the
    /// caller releases the dependency itself.
    fn add_dependent(&self, job: &Arc<PendingJob>) -> bool {
        let mut state = self.state.lock();
        if state.done {
            return false;
        }
        state.dependents.push(Arc::clone(job));
        true
    }

    /// Mark complete, wake waiters, and hand back the jobs that were waiting.
    fn complete(&self) -> Vec<Arc<PendingJob>> {
        let dependents = {
            let mut state = self.state.lock();
            state.done = true;
            std::mem::take(&mut state.dependents)
        };
        self.finished.notify_all();
        dependents
    }
}

/// A job waiting for its dependency count to reach zero.
struct PendingJob {
    remaining: AtomicUsize,
    job: Mutex<Option<Job>>,
    node: Arc<TaskNode>,
}

impl PendingJob {
    /// Drop one outstanding dependency. Returns `true` for the caller that
    /// released the last one.
    fn release(&self) -> bool {
        self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

/// Minimal fork/join task-graph executor.
pub trait TaskGraph: Send + Sync {
    /// Run `job` after every handle in `after` has completed.
    fn spawn(&self, after: &[TaskHandle], job: Job) -> TaskHandle;

    /// Handle that completes once all of `handles` have.
    fn join(&self, handles: &[TaskHandle]) -> TaskHandle {
        self.spawn(handles, Box::new(|| {}))
    }

    /// Block the calling thread until `handle` completes.
    ///
    /// Must not be called from inside a job.
    fn wait(&self, handle: &TaskHandle) {
        handle.wait();
    }
}

/// Executor backed by a fixed-size rayon thread pool.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Pool with `threads` workers; `0` picks rayon's default (one per core).
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("steerflock-worker-{}", i))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn submit(pool: &Arc<rayon::ThreadPool>, pending: Arc<PendingJob>) {
        let worker_pool = Arc::clone(pool);
        pool.spawn(move || {
            if let Some(job) = pending.job.lock().take() {
                job();
            }
            for dependent in pending.node.complete() {
                if dependent.release() {
                    Self::submit(&worker_pool, dependent);
                }
            }
        });
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl TaskGraph for WorkerPool {
    fn spawn(&self, after: &[TaskHandle], job: Job) -> TaskHandle {
        let handle = TaskHandle::pending();
        // One extra count guards against release while still registering
        let pending = Arc::new(PendingJob {
            remaining: AtomicUsize::new(after.len() + 1),
            job: Mutex::new(Some(job)),
            node: Arc::clone(&handle.node),
        });

        for dependency in after {
            if !dependency.node.add_dependent(&pending) {
                pending.release();
            }
        }
        if pending.release() {
            Self::submit(&self.pool, pending);
        }
        handle
    }
}

/// Executor that runs every job to completion inside `spawn`.
///
/// Dependencies are always complete by the time a job is spawned, because
/// they ran when they were spawned.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl TaskGraph for Inline {
    fn spawn(&self, after: &[TaskHandle], job: Job) -> TaskHandle {
        debug_assert!(after.iter().all(TaskHandle::is_complete));
        job();
        TaskHandle::completed()
    }
}
