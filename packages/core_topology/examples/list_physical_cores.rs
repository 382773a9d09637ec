//! Prints every physical core on the system and the logical processors it exposes.

use std::error::Error;

use core_topology::CoreTopology;

fn main() -> Result<(), Box<dyn Error>> {
    let topology = CoreTopology::current()?;

    println!(
        "{} physical cores, {} logical processors",
        topology.physical_core_count(),
        topology.logical_processor_count(),
    );

    for core in topology.physical_cores() {
        println!("{core}");
    }

    Ok(())
}
