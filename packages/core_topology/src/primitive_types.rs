/// Identifies a specific logical processor.
///
/// This matches the numeric identifier used by standard tooling of the operating system
/// (e.g. the values that appear in Linux cpulist strings).
///
/// The values are not guaranteed to be sequential/contiguous, an aspect that is likewise
/// not guaranteed by operating system tooling.
pub type ProcessorId = u32;

/// Identifies a specific physical processor core.
///
/// Core IDs are assigned by this crate: cores are numbered `0..physical_core_count()` in
/// ascending order of their lowest logical processor ID. They are stable for the lifetime
/// of a topology snapshot but carry no meaning to operating system tooling.
pub type CoreId = u32;
