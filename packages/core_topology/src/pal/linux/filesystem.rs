use std::{fs, io};

use crate::ProcessorId;

/// The sysfs reads performed by the Linux platform backend.
///
/// All filesystem access goes through this trait, enabling PAL unit tests to substitute a
/// mock filesystem. Whenever possible, tests should still use the real filesystem for
/// maximum realism.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Send + Sync + 'static {
    /// Contents of `/sys/devices/system/cpu/online`: the cpulist of online processors.
    fn cpu_online_cpulist(&self) -> io::Result<String>;

    /// Contents of `/sys/devices/system/cpu/cpuN/topology/thread_siblings_list`:
    /// the cpulist of logical processors sharing processor N's physical core.
    fn thread_siblings_cpulist(&self, processor: ProcessorId) -> io::Result<String>;
}

/// The virtual filesystem for the real operating system that the build is targeting.
#[derive(Debug, Default)]
pub(crate) struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn cpu_online_cpulist(&self) -> io::Result<String> {
        fs::read_to_string("/sys/devices/system/cpu/online")
    }

    fn thread_siblings_cpulist(&self, processor: ProcessorId) -> io::Result<String> {
        fs::read_to_string(format!(
            "/sys/devices/system/cpu/cpu{processor}/topology/thread_siblings_list"
        ))
    }
}
