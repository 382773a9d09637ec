//! Work with the physical core layout of the system: enumerate the physical processor
//! cores, discover which logical processors each core exposes, and pin threads to the
//! logical processors of a chosen core.
//!
//! Threads sharing a physical core also share that core's caches, so collaborating
//! threads pinned to sibling logical processors communicate through warm cache lines
//! instead of memory. This crate provides the topology facts and the pinning primitive;
//! the `sibling_pool` crate builds a worker pool on top of them.
//!
//! # Example
//!
//! ```
//! use core_topology::CoreTopology;
//!
//! let topology = CoreTopology::current().unwrap();
//!
//! for core in topology.physical_cores() {
//!     println!("{core}");
//! }
//! ```
//!
//! # Testing with simulated hardware
//!
//! With the `test-util` feature enabled, the [`fake`] module allows tests to describe
//! arbitrary hardware and to observe pinning requests without touching the operating
//! system.

mod affinity_mask;
mod error;
mod pal;
mod physical_core;
mod primitive_types;
mod topology;

pub use affinity_mask::*;
pub use error::TopologyError;
pub use physical_core::*;
pub use primitive_types::*;
pub use topology::*;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
