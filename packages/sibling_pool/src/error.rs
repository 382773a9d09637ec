use std::fmt::{self, Debug};

use core_topology::TopologyError;
use thiserror::Error;

use crate::Job;

/// Errors that can occur when constructing a pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The processor topology could not be resolved, or the requested core selection does
    /// not fit the hardware.
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// A job was rejected at submit time because its slot count does not match the pool's
/// lane count.
///
/// Nothing was enqueued and no worker state changed. The rejected job is carried inside
/// the error and can be recovered via [`into_job()`][Self::into_job], for example to
/// rebuild it with the correct shape.
#[derive(Error)]
#[error("job has {actual} slots but this pool dispatches jobs of exactly {expected} slots")]
pub struct InvalidJobShape {
    actual: usize,
    expected: usize,
    job: Job,
}

impl InvalidJobShape {
    pub(crate) fn new(job: Job, expected: usize) -> Self {
        Self {
            actual: job.slot_count(),
            expected,
            job,
        }
    }

    /// The slot count of the rejected job.
    #[must_use]
    pub fn actual(&self) -> usize {
        self.actual
    }

    /// The slot count this pool requires.
    #[must_use]
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Recovers the rejected job.
    #[must_use]
    pub fn into_job(self) -> Job {
        self.job
    }
}

impl Debug for InvalidJobShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidJobShape")
            .field("actual", &self.actual)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(BuildError: Send, Sync, Debug);
    assert_impl_all!(InvalidJobShape: Send, Debug);

    #[test]
    fn invalid_shape_names_both_counts() {
        let job = Job::new().with_slot(Box::new(|| {}));
        let error = InvalidJobShape::new(job, 4);

        let message = error.to_string();
        assert!(message.contains('1'), "message was: {message}");
        assert!(message.contains('4'), "message was: {message}");
    }

    #[test]
    fn rejected_job_is_recoverable_intact() {
        let job = Job::new().with_slot(Box::new(|| {}));
        let error = InvalidJobShape::new(job, 2);

        assert_eq!(error.actual(), 1);
        assert_eq!(error.expected(), 2);
        assert_eq!(error.into_job().slot_count(), 1);
    }
}
