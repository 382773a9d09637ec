//! Pins a worker thread to the first physical core and does some work there.

use std::error::Error;
use std::thread;

use core_topology::CoreTopology;

fn main() -> Result<(), Box<dyn Error>> {
    let topology = CoreTopology::current()?;
    let mask = topology.affinity_mask(0)?.clone();

    let worker = thread::spawn(move || {
        let topology = CoreTopology::current().expect("topology was already resolved above");
        topology.pin_current_thread(&mask);

        println!("worker pinned to processors {mask}");

        // Anything executed from here on stays on that core.
        (0..1_000_000_u64).sum::<u64>()
    });

    let sum = worker.join().expect("worker does not panic");
    println!("worker computed {sum}");

    Ok(())
}
