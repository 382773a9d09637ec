//! Fake hardware for testing code that consumes topology information.
//!
//! The fake platform serves a caller-defined set of physical cores and records every
//! pinning request instead of touching the operating system, so tests behave identically
//! on every machine they run on.
//!
//! Enabled via the `test-util` feature.

use std::sync::Mutex;
use std::thread::{self, ThreadId};

use nonempty::NonEmpty;

use crate::error::Result;
use crate::pal::Platform;
use crate::{ProcessorId, TopologyError};

/// Describes the simulated hardware that a fake [`CoreTopology`][crate::CoreTopology]
/// will expose.
///
/// # Example
///
/// ```
/// use core_topology::CoreTopology;
/// use core_topology::fake::FakeTopologyBuilder;
///
/// // Two hyperthreaded cores with interleaved processor numbering.
/// let topology = CoreTopology::fake(
///     FakeTopologyBuilder::new().core([0, 2]).core([1, 3]),
/// )
/// .unwrap();
///
/// assert_eq!(topology.physical_core_count(), 2);
/// assert_eq!(topology.logical_processor_count(), 4);
/// ```
#[derive(Debug, Default)]
pub struct FakeTopologyBuilder {
    cores: Vec<NonEmpty<ProcessorId>>,
}

impl FakeTopologyBuilder {
    /// Starts describing a machine with no processors.
    ///
    /// At least one core must be added before the description is usable; resolving an
    /// empty description yields [`TopologyError::NoProcessors`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Describes a uniform machine with `core_count` physical cores of
    /// `processors_per_core` logical processors each, numbered sequentially.
    #[must_use]
    pub fn from_counts(core_count: usize, processors_per_core: usize) -> Self {
        assert!(core_count > 0, "a machine must have at least one core");
        assert!(
            processors_per_core > 0,
            "a core must have at least one processor"
        );

        let mut builder = Self::new();

        for core in 0..core_count {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "simulated machines of this size are not a realistic test input"
            )]
            let first = (core * processors_per_core) as ProcessorId;

            builder = builder.core((0..processors_per_core).map(|offset| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "bounded by the assertion above"
                )]
                let offset = offset as ProcessorId;
                first + offset
            }));
        }

        builder
    }

    /// Adds one physical core holding the given logical processors.
    ///
    /// # Panics
    ///
    /// Panics if `processors` is empty.
    #[must_use]
    pub fn core(mut self, processors: impl IntoIterator<Item = ProcessorId>) -> Self {
        let processors: Vec<ProcessorId> = processors.into_iter().collect();

        self.cores.push(
            NonEmpty::from_vec(processors).expect("a core must have at least one processor"),
        );

        self
    }
}

/// One recorded call to pin a thread onto a set of processors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PinEvent {
    thread: ThreadId,
    processors: Vec<ProcessorId>,
}

impl PinEvent {
    /// The thread that requested the pinning.
    #[must_use]
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// The logical processors the thread asked to be pinned to.
    #[must_use]
    pub fn processors(&self) -> &[ProcessorId] {
        &self.processors
    }
}

/// Platform backend that serves simulated hardware and records pinning requests.
#[derive(Debug)]
pub(crate) struct FakePlatform {
    cores: Vec<NonEmpty<ProcessorId>>,
    pin_events: Mutex<Vec<PinEvent>>,
}

impl FakePlatform {
    pub(crate) fn from_builder(builder: FakeTopologyBuilder) -> Self {
        Self {
            cores: builder.cores,
            pin_events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn pin_events(&self) -> Vec<PinEvent> {
        self.pin_events
            .lock()
            .expect("fake platform lock is never poisoned")
            .clone()
    }
}

impl Platform for FakePlatform {
    fn physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>> {
        if self.cores.is_empty() {
            return Err(TopologyError::NoProcessors);
        }

        Ok(self.cores.clone())
    }

    fn pin_current_thread(&self, processors: &NonEmpty<ProcessorId>) {
        self.pin_events
            .lock()
            .expect("fake platform lock is never poisoned")
            .push(PinEvent {
                thread: thread::current().id(),
                processors: processors.iter().copied().collect(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_counts_numbers_processors_sequentially() {
        let platform = FakePlatform::from_builder(FakeTopologyBuilder::from_counts(2, 2));

        let cores = platform.physical_cores().unwrap();

        assert_eq!(cores.len(), 2);
        assert_eq!(cores[0], nonempty::nonempty![0, 1]);
        assert_eq!(cores[1], nonempty::nonempty![2, 3]);
    }

    #[test]
    fn empty_description_reports_no_processors() {
        let platform = FakePlatform::from_builder(FakeTopologyBuilder::new());

        assert!(matches!(
            platform.physical_cores(),
            Err(TopologyError::NoProcessors)
        ));
    }

    #[test]
    fn pin_requests_are_recorded_per_thread() {
        let platform = FakePlatform::from_builder(FakeTopologyBuilder::from_counts(1, 2));

        platform.pin_current_thread(&nonempty::nonempty![0, 1]);

        let events = platform.pin_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].thread(), thread::current().id());
        assert_eq!(events[0].processors(), &[0, 1]);
    }
}
