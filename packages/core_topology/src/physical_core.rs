use std::fmt::{self, Display};

use crate::{AffinityMask, CoreId};

/// A physical processor core present on the system, together with the affinity mask
/// covering its logical processors.
///
/// On hardware with symmetric multithreading (hyperthreading), one physical core
/// typically exposes two or more logical processors that share the core's L1/L2 caches.
/// On hardware without it, each physical core maps to exactly one logical processor.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PhysicalCore {
    id: CoreId,
    mask: AffinityMask,
}

impl PhysicalCore {
    #[must_use]
    pub(crate) fn new(id: CoreId, mask: AffinityMask) -> Self {
        Self { id, mask }
    }

    /// The crate-assigned ID of this core; see [`CoreId`] for numbering rules.
    #[must_use]
    #[inline]
    pub fn id(&self) -> CoreId {
        self.id
    }

    /// The affinity mask covering this core's logical processors.
    #[must_use]
    #[inline]
    pub fn affinity_mask(&self) -> &AffinityMask {
        &self.mask
    }

    /// The number of logical processors this core exposes.
    #[must_use]
    #[inline]
    pub fn logical_processor_count(&self) -> usize {
        self.mask.processor_count()
    }
}

impl Display for PhysicalCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core {} [processors {}]", self.id, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;

    use super::*;

    #[test]
    fn smoke_test() {
        let core = PhysicalCore::new(1, AffinityMask::new(nonempty![2, 3]));

        assert_eq!(core.id(), 1);
        assert_eq!(core.logical_processor_count(), 2);
        assert_eq!(core.affinity_mask().to_string(), "2-3");

        let displayed = core.to_string();
        assert!(displayed.contains("core 1"), "displayed as: {displayed}");
    }
}
