//! A worker pool that keeps every job on the sibling logical processors of one physical
//! core.
//!
//! Threads that share a physical core also share its L1/L2 caches. For workloads where a
//! small group of threads cooperates on the same data, scheduling that group onto one
//! core turns their communication into cache hits. This crate packages that idea as a
//! pool: a [`Job`] is an ordered set of callables, one per "lane" of a core, and the
//! pool guarantees all of them run concurrently on threads pinned to a single physical
//! core, with different jobs never sharing a core.
//!
//! Topology discovery and pinning come from the `core_topology` crate.
//!
//! # Example
//!
//! ```
//! use sibling_pool::{DrainMode, Job, JobFn, SiblingPool};
//!
//! let mut pool = SiblingPool::builder().build().unwrap();
//!
//! // Each job carries one callable per lane of a core.
//! let job = Job::from_slots(
//!     (0..pool.lanes_per_core())
//!         .map(|slot| Box::new(move || println!("slot {slot}")) as JobFn),
//! );
//!
//! pool.submit(job).unwrap();
//! pool.close(DrainMode::FinishQueued);
//! ```
//!
//! # Failure policy
//!
//! A panic in a job slot is never swallowed: it takes the affected core out of service
//! and re-surfaces from [`SiblingPool::close()`]. Callers who want per-callable failure
//! isolation instead wrap their work with [`task()`], which catches the panic and
//! delivers it to a [`TaskHandle`].

mod core_worker;
mod error;
mod job;
mod pool;
mod queue;
mod task;

pub use error::*;
pub use job::*;
pub use pool::*;
pub use queue::DrainMode;
pub use task::*;
