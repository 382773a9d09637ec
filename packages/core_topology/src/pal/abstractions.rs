use nonempty::NonEmpty;

use crate::ProcessorId;
use crate::error::Result;

/// The contract every platform backend must satisfy.
///
/// All operating system topology and affinity calls go through this trait, enabling
/// them to be mocked or faked in tests.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Send + Sync + 'static {
    /// Enumerates the physical cores of the system, each as the non-empty set of logical
    /// processor IDs belonging to that core, ordered by lowest member.
    fn physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>>;

    /// Binds the calling thread so it may only be scheduled on the given logical processors.
    fn pin_current_thread(&self, processors: &NonEmpty<ProcessorId>);
}
