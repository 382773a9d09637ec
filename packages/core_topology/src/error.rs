use std::io;

use thiserror::Error;

/// Errors that can occur when querying processor topology.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TopologyError {
    /// A physical core was requested by index but the system does not have that many cores.
    #[error(
        "physical core index {index} is out of range: the system reports {core_count} physical cores"
    )]
    CoreIndexOutOfRange {
        /// The requested core index.
        index: usize,

        /// The number of physical cores the system actually reports.
        core_count: usize,
    },

    /// The operating system query for processor topology failed.
    #[error("failed to query processor topology from the operating system")]
    QueryFailed {
        /// The underlying operating system error.
        #[source]
        source: io::Error,
    },

    /// The operating system returned topology data we were unable to interpret.
    #[error("the operating system reported processor topology data in an unexpected format")]
    MalformedTopologyData {
        /// The parse failure for the offending value.
        #[source]
        source: cpulist::Error,
    },

    /// The operating system reported no online processors, which should be impossible
    /// given that this code is executing on one.
    #[error("the operating system reported no online processors")]
    NoProcessors,
}

/// A specialized `Result` type for topology operations, returning the crate's
/// [`TopologyError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, TopologyError>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(TopologyError: Send, Sync, Debug);

    #[test]
    fn out_of_range_names_both_counts() {
        let error = TopologyError::CoreIndexOutOfRange {
            index: 8,
            core_count: 4,
        };

        let message = error.to_string();
        assert!(message.contains('8'), "message was: {message}");
        assert!(message.contains('4'), "message was: {message}");
    }

    #[test]
    fn query_failed_preserves_source() {
        use std::error::Error;

        let error = TopologyError::QueryFailed {
            source: io::Error::new(io::ErrorKind::NotFound, "no sysfs here"),
        };

        assert!(error.source().is_some());
    }
}
