use std::num::NonZero;
use std::panic;
use std::sync::Arc;
use std::thread;

use core_topology::{AffinityMask, CoreTopology};

use crate::core_worker::CoreWorker;
use crate::queue::JobQueue;
use crate::{BuildError, DrainMode, InvalidJobShape, Job};

/// Configures and starts a [`SiblingPool`].
///
/// Obtained via [`SiblingPool::builder()`]. Every knob has a hardware-derived default,
/// so `SiblingPool::builder().build()` yields a pool covering the whole machine.
#[derive(Debug, Default)]
#[must_use]
pub struct SiblingPoolBuilder {
    cores: Option<NonZero<usize>>,
    lanes_per_core: Option<NonZero<usize>>,
    topology: Option<CoreTopology>,
}

impl SiblingPoolBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// How many physical cores the pool occupies. Defaults to every physical core of the
    /// system.
    ///
    /// Cores are taken in topology order starting from core 0; requesting more cores than
    /// the system has fails at [`build()`][Self::build] time.
    pub fn cores(mut self, cores: NonZero<usize>) -> Self {
        self.cores = Some(cores);
        self
    }

    /// How many slots each job carries and how many threads serve each core. Defaults to
    /// the system's logical processors divided by the selected core count, minimum 1.
    ///
    /// On typical hyperthreaded hardware the default is 2, one thread per sibling logical
    /// processor of a core.
    pub fn lanes_per_core(mut self, lanes_per_core: NonZero<usize>) -> Self {
        self.lanes_per_core = Some(lanes_per_core);
        self
    }

    /// The topology to place workers on. Defaults to
    /// [`CoreTopology::current()`].
    ///
    /// Mainly useful for handing a pool a simulated topology in tests.
    pub fn topology(mut self, topology: CoreTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Starts the pool: one pinned thread group per selected core, all idle until jobs
    /// arrive.
    ///
    /// # Errors
    ///
    /// Fails if the topology cannot be resolved or the requested core count exceeds the
    /// hardware. A failed build starts no threads.
    pub fn build(self) -> Result<SiblingPool, BuildError> {
        let topology = match self.topology {
            Some(topology) => topology,
            None => CoreTopology::current()?.clone(),
        };

        let core_count = self
            .cores
            .map_or_else(|| topology.physical_core_count(), NonZero::get);

        // Resolve every mask before starting any thread, so a core selection that does
        // not fit the hardware fails without leaving a partially-running pool behind.
        let masks = (0..core_count)
            .map(|index| topology.affinity_mask(index).cloned())
            .collect::<Result<Vec<AffinityMask>, _>>()?;

        let lanes_per_core = self.lanes_per_core.map_or_else(
            || (topology.logical_processor_count() / core_count).max(1),
            NonZero::get,
        );

        let queue = Arc::new(JobQueue::new());

        let workers = masks
            .into_iter()
            .enumerate()
            .map(|(index, mask)| {
                CoreWorker::start(
                    index,
                    mask,
                    topology.clone(),
                    Arc::clone(&queue),
                    lanes_per_core,
                )
            })
            .collect();

        Ok(SiblingPool {
            queue,
            workers,
            core_count,
            lanes_per_core,
            closed: false,
        })
    }
}

/// A worker pool that executes each job entirely on one physical core.
///
/// A job is an ordered set of exactly [`lanes_per_core()`][Self::lanes_per_core]
/// callables. All of them start together on threads pinned to the sibling logical
/// processors of a single physical core, so they cooperate through that core's caches.
/// Concurrently running jobs always occupy distinct cores.
///
/// Jobs queue in FIFO order and are picked up by whichever core frees up first; the
/// queue is unbounded and [`submit()`][Self::submit] never blocks. The pool gives no
/// completion signal of its own; see [`task()`][crate::task] for a per-callable handle.
///
/// # Example
///
/// ```
/// use sibling_pool::{DrainMode, Job, SiblingPool};
///
/// let mut pool = SiblingPool::builder().build().unwrap();
///
/// let job = Job::from_slots(
///     (0..pool.lanes_per_core()).map(|slot| {
///         Box::new(move || println!("slot {slot}")) as sibling_pool::JobFn
///     }),
/// );
/// pool.submit(job).unwrap();
///
/// pool.close(DrainMode::FinishQueued);
/// ```
#[derive(Debug)]
pub struct SiblingPool {
    queue: Arc<JobQueue>,
    workers: Vec<CoreWorker>,
    core_count: usize,
    lanes_per_core: usize,
    closed: bool,
}

impl SiblingPool {
    /// Starts configuring a pool.
    #[must_use]
    pub fn builder() -> SiblingPoolBuilder {
        SiblingPoolBuilder::new()
    }

    /// Enqueues a job for execution on whichever core frees up first. Never blocks.
    ///
    /// Queued jobs execute in submission order, though on a multi-core pool jobs running
    /// on different cores overlap and complete in no particular order.
    ///
    /// # Errors
    ///
    /// Rejects the job without enqueueing it if its slot count differs from
    /// [`lanes_per_core()`][Self::lanes_per_core]; the error carries the job back to the
    /// caller.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been closed.
    pub fn submit(&self, job: Job) -> Result<(), InvalidJobShape> {
        assert!(!self.closed, "submitted a job to a closed pool");

        if job.slot_count() != self.lanes_per_core {
            return Err(InvalidJobShape::new(job, self.lanes_per_core));
        }

        self.queue.push(job);
        Ok(())
    }

    /// The number of physical cores serving this pool.
    #[must_use]
    pub fn core_count(&self) -> usize {
        self.core_count
    }

    /// The number of slots every submitted job must have, which is also the number of
    /// threads serving each core.
    #[must_use]
    pub fn lanes_per_core(&self) -> usize {
        self.lanes_per_core
    }

    /// The number of jobs waiting to be dispatched. Observational only; the value may be
    /// stale by the time the caller acts on it.
    #[must_use]
    pub fn queued_job_count(&self) -> usize {
        self.queue.len()
    }

    /// Shuts the pool down and waits for every worker thread to exit.
    ///
    /// [`DrainMode::FinishQueued`] executes everything queued at call time first;
    /// [`DrainMode::AbandonQueued`] discards queued jobs whole and only lets jobs already
    /// on a core finish. Idempotent: later calls (and the eventual drop) do nothing.
    ///
    /// # Panics
    ///
    /// If any job slot panicked, the first such panic payload is re-raised here, after
    /// all workers have been joined. The work of other cores is not lost; they drain
    /// normally before the payload surfaces.
    pub fn close(&mut self, mode: DrainMode) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.queue.request_shutdown(mode);

        let mut first_failure = None;

        for worker in self.workers.drain(..) {
            if let Err(payload) = worker.join() {
                if first_failure.is_none() {
                    first_failure = Some(payload);
                }
            }
        }

        if let Some(payload) = first_failure {
            panic::resume_unwind(payload);
        }
    }
}

impl Drop for SiblingPool {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // During an unwind we must not join (the panic may originate under a caller that
        // still holds resources the jobs need) and must not double-panic. The workers
        // see the shutdown request and exit on their own.
        if thread::panicking() {
            self.queue.request_shutdown(DrainMode::AbandonQueued);
            return;
        }

        self.close(DrainMode::FinishQueued);
    }
}

#[cfg(test)]
mod tests {
    use core_topology::fake::FakeTopologyBuilder;
    use core_topology::TopologyError;
    use new_zealand::nz;

    use super::*;

    fn fake_topology(cores: usize, processors_per_core: usize) -> CoreTopology {
        CoreTopology::fake(FakeTopologyBuilder::from_counts(cores, processors_per_core))
            .expect("fake topology construction does not fail")
    }

    #[test]
    fn defaults_cover_the_whole_machine() {
        let mut pool = SiblingPool::builder()
            .topology(fake_topology(4, 2))
            .build()
            .unwrap();

        assert_eq!(pool.core_count(), 4);
        assert_eq!(pool.lanes_per_core(), 2);
        assert_eq!(pool.queued_job_count(), 0);

        pool.close(DrainMode::FinishQueued);
    }

    #[test]
    fn core_selection_limits_the_pool() {
        let mut pool = SiblingPool::builder()
            .topology(fake_topology(4, 2))
            .cores(nz!(2))
            .build()
            .unwrap();

        assert_eq!(pool.core_count(), 2);

        // Lanes derive from the selected cores, not from the whole machine.
        assert_eq!(pool.lanes_per_core(), 4);

        pool.close(DrainMode::FinishQueued);
    }

    #[test]
    fn requesting_more_cores_than_exist_fails_cleanly() {
        let result = SiblingPool::builder()
            .topology(fake_topology(2, 2))
            .cores(nz!(3))
            .build();

        assert!(matches!(
            result,
            Err(BuildError::Topology(
                TopologyError::CoreIndexOutOfRange {
                    index: 2,
                    core_count: 2,
                }
            ))
        ));
    }

    #[test]
    fn shape_mismatch_returns_the_job() {
        let mut pool = SiblingPool::builder()
            .topology(fake_topology(1, 2))
            .build()
            .unwrap();

        let job = Job::new().with_slot(Box::new(|| {}));
        let error = pool.submit(job).unwrap_err();

        assert_eq!(error.actual(), 1);
        assert_eq!(error.expected(), 2);
        assert_eq!(pool.queued_job_count(), 0);

        // The rejected job comes back intact and can be reshaped and resubmitted.
        let job = error.into_job().with_slot(Box::new(|| {}));
        pool.submit(job).unwrap();

        pool.close(DrainMode::FinishQueued);
    }

    #[test]
    fn close_twice_is_a_no_op() {
        let mut pool = SiblingPool::builder()
            .topology(fake_topology(2, 2))
            .build()
            .unwrap();

        pool.close(DrainMode::FinishQueued);
        pool.close(DrainMode::AbandonQueued);
    }

    #[test]
    #[should_panic(expected = "submitted a job to a closed pool")]
    fn submit_after_close_is_a_programming_error() {
        let mut pool = SiblingPool::builder()
            .topology(fake_topology(1, 1))
            .build()
            .unwrap();

        pool.close(DrainMode::FinishQueued);

        _ = pool.submit(Job::new().with_slot(Box::new(|| {})));
    }
}
