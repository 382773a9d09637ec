use std::fmt::{self, Display};

use nonempty::NonEmpty;

use crate::ProcessorId;

/// Opaque identifier of the logical processors belonging to one physical core.
///
/// A mask is obtained from [`CoreTopology::affinity_mask()`][1] or from
/// [`PhysicalCore::affinity_mask()`][2] and handed to
/// [`CoreTopology::pin_current_thread()`][3] to bind the calling thread to that core.
/// It is immutable once constructed and cheap to clone.
///
/// The individual processor IDs are exposed for diagnostics only; the mask should
/// otherwise be treated as opaque.
///
/// [1]: crate::CoreTopology::affinity_mask
/// [2]: crate::PhysicalCore::affinity_mask
/// [3]: crate::CoreTopology::pin_current_thread
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct AffinityMask {
    processors: NonEmpty<ProcessorId>,
}

impl AffinityMask {
    #[must_use]
    pub(crate) fn new(processors: NonEmpty<ProcessorId>) -> Self {
        Self { processors }
    }

    /// The number of logical processors covered by this mask.
    #[must_use]
    #[inline]
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Iterates over the logical processor IDs covered by this mask, in ascending order.
    pub fn processors(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.processors.iter().copied()
    }

    #[must_use]
    pub(crate) fn as_nonempty(&self) -> &NonEmpty<ProcessorId> {
        &self.processors
    }
}

impl Display for AffinityMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = cpulist::emit(self.processors.iter().copied());
        write!(f, "{list}")
    }
}
