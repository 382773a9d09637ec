use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use thiserror::Error;

use crate::JobFn;

/// Wraps a result-producing callable into a job slot plus a handle for retrieving the
/// result.
///
/// The returned [`JobFn`] invokes `f` under a panic guard and ships the outcome to the
/// [`TaskHandle`]. Because the guard catches the unwind, a panic inside `f` does not
/// take the executing core out of service; it surfaces to the waiting caller instead.
/// This makes `task()` the right wrapper for untrusted or experimental job bodies, at
/// the cost of hiding their failures from the pool.
///
/// This is a caller-side convenience; the pool itself attaches no meaning to it and
/// accepts any [`JobFn`] in any slot.
///
/// # Example
///
/// ```
/// use sibling_pool::{DrainMode, Job, SiblingPool, task};
///
/// let mut pool = SiblingPool::builder().build().unwrap();
///
/// let (slots, handles): (Vec<_>, Vec<_>) =
///     (0..pool.lanes_per_core()).map(|i| task(move || i * i)).unzip();
///
/// pool.submit(Job::from_slots(slots)).unwrap();
/// pool.close(DrainMode::FinishQueued);
///
/// let squares: Vec<usize> = handles
///     .into_iter()
///     .map(|handle| handle.wait().unwrap())
///     .collect();
/// assert_eq!(squares[0], 0);
/// ```
pub fn task<F, R>(f: F) -> (JobFn, TaskHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();

    let slot = Box::new(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(f));

        // The receiver may already be gone; the outcome is simply discarded then.
        _ = sender.send(outcome);
    });

    (slot, TaskHandle { receiver })
}

/// Receives the outcome of one callable wrapped via [`task()`].
pub struct TaskHandle<R> {
    receiver: oneshot::Receiver<thread::Result<R>>,
}

impl<R> Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").finish_non_exhaustive()
    }
}

impl<R> TaskHandle<R> {
    /// Blocks until the wrapped callable has run, returning its result.
    ///
    /// Returns immediately if it already ran.
    ///
    /// # Errors
    ///
    /// [`TaskError::Panicked`] if the callable panicked, carrying the panic payload.
    /// [`TaskError::Abandoned`] if the callable was destroyed without running, e.g.
    /// because its job was still queued when the pool shut down with
    /// [`DrainMode::AbandonQueued`][crate::DrainMode::AbandonQueued].
    pub fn wait(self) -> Result<R, TaskError> {
        match self.receiver.recv() {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(payload)) => Err(TaskError::Panicked { payload }),
            Err(oneshot::RecvError) => Err(TaskError::Abandoned),
        }
    }
}

/// Why a wrapped callable produced no result.
#[derive(Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The callable panicked while executing.
    #[error("the task panicked while executing")]
    Panicked {
        /// The panic payload, as `std::thread::JoinHandle::join()` would deliver it.
        payload: Box<dyn Any + Send>,
    },

    /// The callable was destroyed without ever executing.
    #[error("the task was discarded before it could execute")]
    Abandoned,
}

impl Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked { .. } => f.debug_struct("Panicked").finish_non_exhaustive(),
            Self::Abandoned => f.write_str("Abandoned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_travels_to_the_handle() {
        let (slot, handle) = task(|| 2 + 2);

        slot();

        assert_eq!(handle.wait().unwrap(), 4);
    }

    #[test]
    fn panic_is_contained_and_reported() {
        let (slot, handle) = task(|| -> u32 { panic!("task failure") });

        // The slot itself returns normally despite the panic inside the callable.
        slot();

        let error = handle.wait().unwrap_err();
        let TaskError::Panicked { payload } = error else {
            panic!("expected a panic outcome, got: {error:?}");
        };
        assert_eq!(*payload.downcast_ref::<&str>().unwrap(), "task failure");
    }

    #[test]
    fn dropping_the_slot_abandons_the_task() {
        let (slot, handle) = task(|| 42);

        drop(slot);

        assert!(matches!(handle.wait(), Err(TaskError::Abandoned)));
    }

    #[test]
    fn dropping_the_handle_does_not_disturb_the_slot() {
        let (slot, handle) = task(|| 42);

        drop(handle);
        slot();
    }
}
