//! Submits a handful of jobs and shows which thread each slot lands on.
//!
//! All slots of one job report sibling threads of the same physical core; slots of
//! concurrently running jobs report threads of different cores.

use std::error::Error;
use std::thread;

use sibling_pool::{DrainMode, Job, JobFn, SiblingPool};

fn main() -> Result<(), Box<dyn Error>> {
    let mut pool = SiblingPool::builder().build()?;

    println!(
        "pool: {} cores, {} lanes per core",
        pool.core_count(),
        pool.lanes_per_core()
    );

    for job_index in 0..4 {
        let slots = (0..pool.lanes_per_core()).map(move |slot| {
            Box::new(move || {
                println!(
                    "job {job_index} slot {slot} on thread {:?}",
                    thread::current().id()
                );
            }) as JobFn
        });

        pool.submit(Job::from_slots(slots))?;
    }

    pool.close(DrainMode::FinishQueued);
    Ok(())
}
