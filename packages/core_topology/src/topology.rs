use std::sync::{Arc, OnceLock};

use itertools::Itertools;
use nonempty::NonEmpty;

#[cfg(any(test, feature = "test-util"))]
use crate::fake::{FakePlatform, FakeTopologyBuilder, PinEvent};
#[cfg(test)]
use crate::pal::MockPlatform;
use crate::pal::{Platform, PlatformFacade};
use crate::{AffinityMask, CoreId, PhysicalCore, TopologyError, error::Result};

/// A snapshot of the processor topology of the system: which logical processors exist and
/// how they group into physical cores.
///
/// Obtain the process-wide instance via [`CoreTopology::current()`]; it is resolved on
/// first use and cached for the lifetime of the process. Hot-plugged processors appearing
/// after that point are not observed, which keeps every caller operating against the same
/// view of the hardware.
///
/// Cores are addressed by index in `0..physical_core_count()`. The mapping from index to
/// hardware is stable for the lifetime of the process.
///
/// # Example
///
/// ```
/// use core_topology::CoreTopology;
///
/// let topology = CoreTopology::current().unwrap();
///
/// println!(
///     "{} physical cores, {} logical processors",
///     topology.physical_core_count(),
///     topology.logical_processor_count(),
/// );
///
/// // Pin the current thread to the first physical core.
/// let mask = topology.affinity_mask(0).unwrap();
/// topology.pin_current_thread(mask);
/// ```
#[derive(Clone, Debug)]
pub struct CoreTopology {
    inner: Arc<TopologyInner>,
}

#[derive(Debug)]
struct TopologyInner {
    platform: PlatformFacade,
    cores: Vec<PhysicalCore>,
    logical_processor_count: usize,
}

static CURRENT: OnceLock<CoreTopology> = OnceLock::new();

impl CoreTopology {
    /// Returns the topology of the system the process is executing on.
    ///
    /// The topology is queried from the operating system on first call and cached for the
    /// lifetime of the process. Query failures are not cached, so a later call may succeed
    /// if the failure was transient.
    ///
    /// # Errors
    ///
    /// Returns an error if the operating system query fails or returns data we are unable
    /// to interpret.
    pub fn current() -> Result<&'static Self> {
        if let Some(existing) = CURRENT.get() {
            return Ok(existing);
        }

        // Concurrent first calls may each resolve a topology; all but one are discarded.
        // The platform is the same for all of them, so the results are interchangeable.
        let resolved = Self::new(PlatformFacade::target())?;
        Ok(CURRENT.get_or_init(|| resolved))
    }

    /// Creates a topology backed by simulated hardware, for testing.
    ///
    /// Pinning requests against a fake topology are recorded instead of applied; see
    /// [`pin_events()`][Self::pin_events].
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::NoProcessors`] if the builder describes no cores.
    #[cfg(any(test, feature = "test-util"))]
    pub fn fake(builder: FakeTopologyBuilder) -> Result<Self> {
        Self::new(PlatformFacade::from_fake(FakePlatform::from_builder(
            builder,
        )))
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Result<Self> {
        Self::new(PlatformFacade::from_mock(mock))
    }

    fn new(platform: PlatformFacade) -> Result<Self> {
        let mut raw_cores = platform.physical_cores()?;

        // Core IDs are assigned in ascending order of the lowest member processor,
        // independent of the order the platform reported the cores in.
        raw_cores.sort_unstable_by_key(|processors| *processors.first());

        let logical_processor_count = raw_cores.iter().map(NonEmpty::len).sum();

        #[expect(
            clippy::cast_possible_truncation,
            reason = "unrealistic to have more than u32::MAX physical cores"
        )]
        let cores = raw_cores
            .into_iter()
            .enumerate()
            .map(|(index, processors)| {
                PhysicalCore::new(index as CoreId, AffinityMask::new(processors))
            })
            .collect_vec();

        Ok(Self {
            inner: Arc::new(TopologyInner {
                platform,
                cores,
                logical_processor_count,
            }),
        })
    }

    /// The number of physical cores on the system.
    #[must_use]
    #[inline]
    pub fn physical_core_count(&self) -> usize {
        self.inner.cores.len()
    }

    /// The total number of logical processors on the system, across all physical cores.
    #[must_use]
    #[inline]
    pub fn logical_processor_count(&self) -> usize {
        self.inner.logical_processor_count
    }

    /// The physical cores of the system, ordered by core ID.
    #[must_use]
    #[inline]
    pub fn physical_cores(&self) -> &[PhysicalCore] {
        &self.inner.cores
    }

    /// The affinity mask covering the logical processors of the physical core at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::CoreIndexOutOfRange`] if the system has `index` or fewer
    /// physical cores.
    pub fn affinity_mask(&self, index: usize) -> Result<&AffinityMask> {
        self.inner
            .cores
            .get(index)
            .map(PhysicalCore::affinity_mask)
            .ok_or(TopologyError::CoreIndexOutOfRange {
                index,
                core_count: self.inner.cores.len(),
            })
    }

    /// Binds the calling thread to the logical processors covered by `mask`.
    ///
    /// The binding persists for the lifetime of the thread or until changed by another
    /// call. Masks are only obtainable from a topology, so the request is always valid by
    /// construction; operating system level failures to apply a valid mask are considered
    /// unrecoverable.
    pub fn pin_current_thread(&self, mask: &AffinityMask) {
        self.inner.platform.pin_current_thread(mask.as_nonempty());
    }

    /// The pinning requests recorded so far, in the order they were made.
    ///
    /// Only available on topologies created via [`fake()`][Self::fake].
    ///
    /// # Panics
    ///
    /// Panics if this topology is not backed by simulated hardware.
    #[cfg(any(test, feature = "test-util"))]
    #[must_use]
    pub fn pin_events(&self) -> Vec<PinEvent> {
        self.inner
            .platform
            .as_fake()
            .expect("pin_events() is only supported on fake topologies")
            .pin_events()
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::thread;

    use nonempty::nonempty;
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(CoreTopology: Send, Sync, Clone);

    #[test]
    fn current_is_cached() {
        let first = CoreTopology::current().unwrap();
        let second = CoreTopology::current().unwrap();

        assert!(ptr::eq(first, second));
    }

    #[test]
    fn cores_are_ordered_by_lowest_member() {
        let mut mock = MockPlatform::new();
        mock.expect_physical_cores()
            .return_once(|| Ok(vec![nonempty![4, 5], nonempty![0, 1], nonempty![2, 3]]));

        let topology = CoreTopology::from_mock(mock).unwrap();

        assert_eq!(topology.physical_core_count(), 3);
        assert_eq!(topology.logical_processor_count(), 6);

        let first_members: Vec<_> = topology
            .physical_cores()
            .iter()
            .map(|core| core.affinity_mask().processors().next().unwrap())
            .collect();
        assert_eq!(first_members, vec![0, 2, 4]);

        let ids: Vec<_> = topology.physical_cores().iter().map(PhysicalCore::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn affinity_mask_rejects_out_of_range_index() {
        let topology = CoreTopology::fake(FakeTopologyBuilder::from_counts(2, 2)).unwrap();

        assert!(topology.affinity_mask(1).is_ok());

        let error = topology.affinity_mask(2).unwrap_err();
        assert!(matches!(
            error,
            TopologyError::CoreIndexOutOfRange {
                index: 2,
                core_count: 2,
            }
        ));
    }

    #[test]
    fn fake_records_pins_with_calling_thread() {
        let topology = CoreTopology::fake(FakeTopologyBuilder::from_counts(2, 2)).unwrap();

        let clone = topology.clone();
        let pinned_thread = thread::spawn(move || {
            let mask = clone.affinity_mask(1).unwrap();
            clone.pin_current_thread(mask);
            thread::current().id()
        })
        .join()
        .unwrap();

        let events = topology.pin_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].thread(), pinned_thread);
        assert_eq!(events[0].processors(), &[2, 3]);
    }

    #[test]
    fn fallback_platform_yields_usable_topology() {
        let topology = CoreTopology::new(PlatformFacade::fallback()).unwrap();

        assert!(topology.physical_core_count() >= 1);

        // Pinning is accepted on every backend even when it cannot take effect.
        let mask = topology.affinity_mask(0).unwrap();
        topology.pin_current_thread(mask);
    }

    #[test]
    fn empty_fake_is_rejected() {
        assert!(matches!(
            CoreTopology::fake(FakeTopologyBuilder::new()),
            Err(TopologyError::NoProcessors)
        ));
    }
}
