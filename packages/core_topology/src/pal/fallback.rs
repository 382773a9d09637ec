use std::num::NonZeroUsize;
use std::sync::OnceLock;
use std::thread;

use nonempty::NonEmpty;

use crate::ProcessorId;
use crate::error::Result;
use crate::pal::Platform;

/// Fallback platform backend for operating systems without native support.
///
/// This implementation provides graceful degradation on unsupported platforms:
/// processor count comes from `std::thread::available_parallelism()`, every logical
/// processor is treated as its own single-processor physical core (no sibling
/// information is available), and pinning operations succeed without actually
/// constraining the thread.
///
/// Code compiled against this backend still functions correctly but sees none of the
/// cache-locality benefits of real core pinning.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

static PROCESSOR_COUNT: OnceLock<usize> = OnceLock::new();

impl BuildTargetPlatform {
    fn processor_count() -> usize {
        *PROCESSOR_COUNT.get_or_init(|| {
            thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}

impl Platform for BuildTargetPlatform {
    fn physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>> {
        let cores = (0..Self::processor_count())
            .map(|id| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "unrealistic to have more than u32::MAX processors"
                )]
                let id = id as ProcessorId;

                NonEmpty::singleton(id)
            })
            .collect();

        Ok(cores)
    }

    fn pin_current_thread(&self, _processors: &NonEmpty<ProcessorId>) {
        // There is no portable pinning primitive; threads remain freely schedulable.
    }
}
