use std::fmt::{self, Debug};

/// One unit of work within a job. Executes exactly once, on a thread pinned to the
/// logical processors of the physical core the job was dispatched to.
pub type JobFn = Box<dyn FnOnce() + Send + 'static>;

/// An ordered set of callables that execute concurrently on one physical core.
///
/// Slot 0 runs on the core's dispatching thread; each further slot runs on one of the
/// core's lane threads. All slots of one job start together and the job completes only
/// once every slot has returned. Different jobs never share a core at the same time.
///
/// A pool only accepts jobs whose slot count equals its
/// [`lanes_per_core()`][crate::SiblingPool::lanes_per_core].
///
/// # Example
///
/// ```
/// use sibling_pool::Job;
///
/// let job = Job::new()
///     .with_slot(Box::new(|| println!("slot 0")))
///     .with_slot(Box::new(|| println!("slot 1")));
///
/// assert_eq!(job.slot_count(), 2);
/// ```
#[must_use]
pub struct Job {
    slots: Vec<JobFn>,
}

impl Job {
    /// Starts building a job with no slots.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Appends one slot to the job.
    pub fn with_slot(mut self, slot: JobFn) -> Self {
        self.slots.push(slot);
        self
    }

    /// Builds a job from an existing sequence of slots, preserving their order.
    pub fn from_slots(slots: impl IntoIterator<Item = JobFn>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    /// The number of slots in this job.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn into_slots(self) -> Vec<JobFn> {
        self.slots
    }
}

impl Default for Job {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("slot_count", &self.slots.len())
            .finish()
    }
}
