use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::Job;

/// What to do with queued but not yet dispatched jobs when a pool shuts down.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DrainMode {
    /// Every job already in the queue at shutdown time executes before the pool
    /// terminates. Jobs in flight also complete.
    FinishQueued,

    /// Queued jobs are discarded whole; only jobs already dispatched to a core run to
    /// completion. A discarded job executes none of its slots.
    AbandonQueued,
}

/// Why a waiting core worker was woken.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum WorkSignal {
    /// A job may be present. The woken worker must still win the [`JobQueue::try_pop()`]
    /// race; losing it simply means waiting again.
    JobMaybeAvailable,

    /// The worker must exit its serve loop.
    Terminate,
}

/// Unbounded FIFO job queue shared by every core worker of one pool.
///
/// The queue carries the pool's shutdown word alongside the jobs, under the same lock, so
/// a shutdown request and a wakeup can never be reordered against each other and a worker
/// can never miss either.
///
/// By policy the queue applies no back-pressure; a producer that outpaces the workers
/// grows the queue without bound.
#[derive(Debug)]
pub(crate) struct JobQueue {
    inner: Mutex<QueueInner>,
    work_available: Condvar,
}

#[derive(Debug)]
struct QueueInner {
    jobs: VecDeque<Job>,
    shutdown: Option<DrainMode>,
}

impl JobQueue {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                jobs: VecDeque::new(),
                shutdown: None,
            }),
            work_available: Condvar::new(),
        }
    }

    /// Appends a job and wakes one idle worker. Never blocks.
    pub(crate) fn push(&self, job: Job) {
        let mut inner = self.lock_inner();

        inner.jobs.push_back(job);
        drop(inner);

        self.work_available.notify_one();
    }

    /// Removes and returns the oldest queued job, if any.
    ///
    /// This is the sole arbiter of the dequeue race: several workers may be woken for one
    /// job and all but the winner observe `None` here.
    pub(crate) fn try_pop(&self) -> Option<Job> {
        self.lock_inner().jobs.pop_front()
    }

    /// The number of jobs currently queued. Observational only; the value may be stale by
    /// the time the caller acts on it.
    pub(crate) fn len(&self) -> usize {
        self.lock_inner().jobs.len()
    }

    /// Blocks until there may be a job to pop or the queue has shut down.
    pub(crate) fn await_work(&self) -> WorkSignal {
        let mut inner = self.lock_inner();

        loop {
            match inner.shutdown {
                Some(DrainMode::AbandonQueued) => return WorkSignal::Terminate,
                Some(DrainMode::FinishQueued) if inner.jobs.is_empty() => {
                    return WorkSignal::Terminate;
                }
                _ => {}
            }

            if !inner.jobs.is_empty() {
                return WorkSignal::JobMaybeAvailable;
            }

            inner = self
                .work_available
                .wait(inner)
                .expect("job queue lock is never poisoned");
        }
    }

    /// Records the shutdown request and wakes every waiting worker.
    ///
    /// The first request wins; a later request with a different mode changes nothing.
    pub(crate) fn request_shutdown(&self, mode: DrainMode) {
        let mut inner = self.lock_inner();

        if inner.shutdown.is_none() {
            inner.shutdown = Some(mode);
        }
        drop(inner);

        self.work_available.notify_all();
    }

    fn lock_inner(&self) -> MutexGuard<'_, QueueInner> {
        self.inner
            .lock()
            .expect("job queue lock is never poisoned")
    }
}
