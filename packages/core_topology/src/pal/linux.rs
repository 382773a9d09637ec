//! Linux platform backend.
//!
//! Physical core membership is derived from sysfs: the set of online processors comes from
//! `/sys/devices/system/cpu/online` and each processor's core siblings from its
//! `topology/thread_siblings_list`, both in the Linux cpulist format. Thread pinning uses
//! `sched_setaffinity()` on the calling thread.

mod bindings;
pub(crate) use bindings::*;

mod filesystem;
pub(crate) use filesystem::*;

use std::mem;

use libc::cpu_set_t;
use nonempty::NonEmpty;

use crate::error::Result;
use crate::pal::Platform;
use crate::{ProcessorId, TopologyError};

/// The platform backend for the real operating system that the build is targeting.
///
/// The filesystem and FFI components are injectable so PAL unit tests can substitute mocks;
/// production code always uses [`BUILD_TARGET_PLATFORM`].
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform<FS = RealFilesystem, B = RealBindings> {
    fs: FS,
    bindings: B,
}

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform {
    fs: RealFilesystem,
    bindings: RealBindings,
};

impl<FS: Filesystem, B: Bindings> BuildTargetPlatform<FS, B> {
    #[cfg(test)]
    pub(crate) fn with_components(fs: FS, bindings: B) -> Self {
        Self { fs, bindings }
    }

    fn enumerate_physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>> {
        let online_raw = self
            .fs
            .cpu_online_cpulist()
            .map_err(|source| TopologyError::QueryFailed { source })?;

        // cpulist::parse() returns ascending deduplicated items, so binary search below
        // is valid without further sorting.
        let online: Vec<ProcessorId> = cpulist::parse(online_raw.trim())
            .map_err(|source| TopologyError::MalformedTopologyData { source })?;

        let mut cores = Vec::new();

        for &processor in &online {
            let siblings_raw = self
                .fs
                .thread_siblings_cpulist(processor)
                .map_err(|source| TopologyError::QueryFailed { source })?;

            let mut siblings = cpulist::parse(siblings_raw.trim())
                .map_err(|source| TopologyError::MalformedTopologyData { source })?;

            siblings.retain(|sibling| online.binary_search(sibling).is_ok());

            // Every member of a core reports the same sibling list, so each core is
            // emitted exactly once, by its lowest-numbered member.
            if siblings.first() == Some(&processor) {
                cores.push(
                    NonEmpty::from_vec(siblings)
                        .expect("an online processor is always its own sibling"),
                );
            }
        }

        if cores.is_empty() {
            return Err(TopologyError::NoProcessors);
        }

        Ok(cores)
    }
}

impl<FS: Filesystem, B: Bindings> Platform for BuildTargetPlatform<FS, B> {
    fn physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>> {
        self.enumerate_physical_cores()
    }

    fn pin_current_thread(&self, processors: &NonEmpty<ProcessorId>) {
        // SAFETY: All zeroes is a valid cpu_set_t.
        let mut cpuset: cpu_set_t = unsafe { mem::zeroed() };

        for &processor in processors {
            // SAFETY: No safety requirements; out-of-range indexes are ignored by the macro.
            unsafe { libc::CPU_SET(processor as usize, &mut cpuset) };
        }

        self.bindings
            .sched_setaffinity_current(&cpuset)
            .expect("failed to apply a thread affinity mask built from online processors");
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use nonempty::nonempty;

    use super::*;

    fn platform_with_fs(fs: MockFilesystem) -> BuildTargetPlatform<MockFilesystem, MockBindings> {
        BuildTargetPlatform::with_components(fs, MockBindings::new())
    }

    #[test]
    fn groups_processors_by_sibling_list() {
        // A classic 2-core 4-thread hyperthreaded layout where sibling pairs interleave.
        let mut fs = MockFilesystem::new();
        fs.expect_cpu_online_cpulist()
            .return_once(|| Ok("0-3".to_string()));
        fs.expect_thread_siblings_cpulist()
            .returning(|processor| match processor {
                0 | 2 => Ok("0,2\n".to_string()),
                1 | 3 => Ok("1,3\n".to_string()),
                _ => panic!("unexpected processor {processor}"),
            });

        let cores = platform_with_fs(fs).physical_cores().unwrap();

        assert_eq!(cores, vec![nonempty![0, 2], nonempty![1, 3]]);
    }

    #[test]
    fn single_threaded_cores_each_form_their_own_group() {
        let mut fs = MockFilesystem::new();
        fs.expect_cpu_online_cpulist()
            .return_once(|| Ok("0-1\n".to_string()));
        fs.expect_thread_siblings_cpulist()
            .returning(|processor| Ok(format!("{processor}")));

        let cores = platform_with_fs(fs).physical_cores().unwrap();

        assert_eq!(cores, vec![nonempty![0], nonempty![1]]);
    }

    #[test]
    fn offline_siblings_are_ignored() {
        // Processor 2 is listed as a sibling of 0 but is not online.
        let mut fs = MockFilesystem::new();
        fs.expect_cpu_online_cpulist()
            .return_once(|| Ok("0-1".to_string()));
        fs.expect_thread_siblings_cpulist()
            .returning(|processor| match processor {
                0 => Ok("0,2".to_string()),
                1 => Ok("1,3".to_string()),
                _ => panic!("unexpected processor {processor}"),
            });

        let cores = platform_with_fs(fs).physical_cores().unwrap();

        assert_eq!(cores, vec![nonempty![0], nonempty![1]]);
    }

    #[test]
    fn io_failure_is_query_failed() {
        let mut fs = MockFilesystem::new();
        fs.expect_cpu_online_cpulist()
            .return_once(|| Err(io::Error::new(io::ErrorKind::NotFound, "no sysfs")));

        let error = platform_with_fs(fs).physical_cores().unwrap_err();

        assert!(matches!(error, TopologyError::QueryFailed { .. }));
    }

    #[test]
    fn garbage_cpulist_is_malformed_topology_data() {
        let mut fs = MockFilesystem::new();
        fs.expect_cpu_online_cpulist()
            .return_once(|| Ok("zero-through-three".to_string()));

        let error = platform_with_fs(fs).physical_cores().unwrap_err();

        assert!(matches!(error, TopologyError::MalformedTopologyData { .. }));
    }

    #[test]
    fn pin_builds_cpuset_from_processor_ids() {
        let mut bindings = MockBindings::new();
        bindings
            .expect_sched_setaffinity_current()
            .withf(|cpuset| {
                // SAFETY: No safety requirements; reads a bit from a valid set.
                unsafe {
                    libc::CPU_ISSET(0, cpuset)
                        && libc::CPU_ISSET(2, cpuset)
                        && !libc::CPU_ISSET(1, cpuset)
                        && !libc::CPU_ISSET(3, cpuset)
                }
            })
            .return_once(|_| Ok(()));

        let platform = BuildTargetPlatform::with_components(MockFilesystem::new(), bindings);

        platform.pin_current_thread(&nonempty![0, 2]);
    }

    #[test]
    fn real_filesystem_enumerates_at_least_one_core() {
        let platform = BuildTargetPlatform {
            fs: RealFilesystem,
            bindings: RealBindings,
        };

        let cores = platform.physical_cores().unwrap();
        assert!(!cores.is_empty());
    }
}
