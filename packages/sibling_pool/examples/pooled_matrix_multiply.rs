//! Multiplies two matrices with each row band computed by one job.
//!
//! The lanes of a job interleave over the band's rows, so at any moment the sibling
//! threads of one core stream through the same columns of the right-hand matrix. Those
//! columns stay hot in the core's shared cache instead of being fetched separately per
//! thread, which is the payoff of core-local scheduling for this kind of workload.

use std::error::Error;
use std::sync::Arc;

use sibling_pool::{DrainMode, Job, SiblingPool, task};

const N: usize = 256;

fn main() -> Result<(), Box<dyn Error>> {
    let mut pool = SiblingPool::builder().build()?;
    let lanes = pool.lanes_per_core();

    // a[i][j] = i + j, b = identity, so the product must equal a.
    let a: Arc<Vec<f64>> = Arc::new(
        (0..N * N)
            .map(|cell| (cell / N + cell % N) as f64)
            .collect(),
    );
    let b: Arc<Vec<f64>> = Arc::new(
        (0..N * N)
            .map(|cell| if cell / N == cell % N { 1.0 } else { 0.0 })
            .collect(),
    );

    // A couple of bands per core keeps every core busy until the work runs out.
    let band_count = (pool.core_count() * 2).min(N);
    let rows_per_band = N.div_ceil(band_count);

    let mut handles = Vec::new();

    for band in 0..band_count {
        let band_rows = band * rows_per_band..((band + 1) * rows_per_band).min(N);

        let (slots, slot_handles): (Vec<_>, Vec<_>) = (0..lanes)
            .map(|slot| {
                let a = Arc::clone(&a);
                let b = Arc::clone(&b);

                // Lane `slot` takes every `lanes`-th row of the band.
                let rows: Vec<usize> = band_rows.clone().skip(slot).step_by(lanes).collect();

                task(move || {
                    rows.into_iter()
                        .map(|row| {
                            let values: Vec<f64> = (0..N)
                                .map(|col| {
                                    (0..N).map(|k| a[row * N + k] * b[k * N + col]).sum()
                                })
                                .collect();
                            (row, values)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .unzip();

        pool.submit(Job::from_slots(slots))?;
        handles.extend(slot_handles);
    }

    pool.close(DrainMode::FinishQueued);

    let mut product = vec![0.0; N * N];
    for handle in handles {
        for (row, values) in handle.wait()? {
            product[row * N..(row + 1) * N].copy_from_slice(&values);
        }
    }

    assert_eq!(product, *a, "multiplying by the identity must reproduce a");
    println!("{N}x{N} multiply verified across {band_count} jobs");

    Ok(())
}
