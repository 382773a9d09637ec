use std::fmt::{self, Debug};
#[cfg(any(test, feature = "test-util"))]
use std::sync::Arc;

use nonempty::NonEmpty;

#[cfg(any(test, feature = "test-util"))]
use crate::fake::FakePlatform;
#[cfg(test)]
use crate::pal::MockPlatform;
#[cfg(test)]
use crate::pal::fallback::BuildTargetPlatform as FallbackPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};
use crate::{ProcessorId, error::Result};

/// Enum to hide the real/fake/mock choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Fallback(&'static FallbackPlatform),

    #[cfg(any(test, feature = "test-util"))]
    Fake(Arc<FakePlatform>),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn fallback() -> Self {
        Self::Fallback(&crate::pal::fallback::BUILD_TARGET_PLATFORM)
    }

    #[cfg(any(test, feature = "test-util"))]
    pub(crate) fn from_fake(fake: FakePlatform) -> Self {
        Self::Fake(Arc::new(fake))
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }

    #[cfg(any(test, feature = "test-util"))]
    pub(crate) fn as_fake(&self) -> Option<&FakePlatform> {
        match self {
            Self::Fake(fake) => Some(fake),
            _ => None,
        }
    }
}

impl Platform for PlatformFacade {
    fn physical_cores(&self) -> Result<Vec<NonEmpty<ProcessorId>>> {
        match self {
            Self::Target(platform) => platform.physical_cores(),
            #[cfg(test)]
            Self::Fallback(platform) => platform.physical_cores(),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(platform) => platform.physical_cores(),
            #[cfg(test)]
            Self::Mock(platform) => platform.physical_cores(),
        }
    }

    fn pin_current_thread(&self, processors: &NonEmpty<ProcessorId>) {
        match self {
            Self::Target(platform) => platform.pin_current_thread(processors),
            #[cfg(test)]
            Self::Fallback(platform) => platform.pin_current_thread(processors),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(platform) => platform.pin_current_thread(processors),
            #[cfg(test)]
            Self::Mock(platform) => platform.pin_current_thread(processors),
        }
    }
}

impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Fallback(inner) => inner.fmt(f),
            #[cfg(any(test, feature = "test-util"))]
            Self::Fake(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(_) => f.write_str("MockPlatform"),
        }
    }
}
