use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use core_topology::{AffinityMask, CoreTopology};

use crate::queue::{JobQueue, WorkSignal};
use crate::{Job, JobFn};

/// One physical core in service of a pool.
///
/// Owns the core's dispatching thread, which in turn owns one lane thread per job slot
/// beyond the first. Every thread of the group pins itself to the core's affinity mask
/// before touching any work, so all slots of a dispatched job execute on sibling logical
/// processors of the same core.
///
/// The dispatching thread runs slot 0 of each job itself and releases the remaining slots
/// to the lanes, then waits on a barrier until every lane has finished. A panic in any
/// slot takes the whole core out of service: slot 0 unwinds the dispatching thread
/// directly, and a lane transports its panic payload to the dispatching thread, which
/// re-raises it once the barrier opens. The payload surfaces when the pool joins the
/// core.
#[derive(Debug)]
pub(crate) struct CoreWorker {
    thread: JoinHandle<()>,
}

impl CoreWorker {
    /// Starts serving the queue on a new thread group pinned to `mask`.
    pub(crate) fn start(
        core_index: usize,
        mask: AffinityMask,
        topology: CoreTopology,
        queue: Arc<JobQueue>,
        lanes_per_core: usize,
    ) -> Self {
        let thread = thread::Builder::new()
            .name(format!("core-{core_index}"))
            .spawn(move || {
                core_thread_main(core_index, &mask, &topology, &queue, lanes_per_core);
            })
            .expect("failed to spawn core worker thread");

        Self { thread }
    }

    /// Waits for the core's thread group to exit.
    ///
    /// An `Err` carries the panic payload of the job slot that took this core out of
    /// service.
    pub(crate) fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}

/// State shared between a core's dispatching thread and its lanes. One instance per core,
/// reused across every job the core executes.
struct LaneShared {
    state: Mutex<LaneState>,

    /// Signaled by the dispatching thread when slots are released or terminate is set.
    dispatch: Condvar,

    /// Signaled by the lane that brings `lanes_remaining` to zero.
    lanes_idle: Condvar,
}

struct LaneState {
    /// Pending work per lane; `Some` means the lane has a slot to run. Lane `i` always
    /// receives slot `i + 1` of the job.
    slots: Vec<Option<JobFn>>,

    /// Lanes still working on the current job. The dispatching thread waits for zero
    /// before completing the job.
    lanes_remaining: usize,

    terminate: bool,

    /// Panic payload of the first lane slot that unwound during the current job.
    failure: Option<Box<dyn Any + Send>>,
}

impl LaneShared {
    fn new(lane_count: usize) -> Self {
        Self {
            state: Mutex::new(LaneState {
                slots: (0..lane_count).map(|_| None).collect(),
                lanes_remaining: 0,
                terminate: false,
                failure: None,
            }),
            dispatch: Condvar::new(),
            lanes_idle: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LaneState> {
        self.state
            .lock()
            .expect("lane monitor lock is never poisoned")
    }

    fn request_terminate(&self) {
        self.lock_state().terminate = true;
        self.dispatch.notify_all();
    }
}

fn core_thread_main(
    core_index: usize,
    mask: &AffinityMask,
    topology: &CoreTopology,
    queue: &JobQueue,
    lanes_per_core: usize,
) {
    topology.pin_current_thread(mask);

    let lane_count = lanes_per_core.saturating_sub(1);
    let shared = Arc::new(LaneShared::new(lane_count));

    let lanes: Vec<_> = (0..lane_count)
        .map(|lane| {
            let shared = Arc::clone(&shared);
            let mask = mask.clone();
            let topology = topology.clone();

            thread::Builder::new()
                .name(format!("core-{core_index}-lane-{lane}"))
                .spawn(move || lane_main(&shared, lane, &topology, &mask))
                .expect("failed to spawn lane worker thread")
        })
        .collect();

    // Lane teardown must run even when a job slot unwinds the serve loop, so the panic
    // is intercepted here and re-raised after the lanes have been joined.
    let served = panic::catch_unwind(AssertUnwindSafe(|| serve(queue, &shared)));

    shared.request_terminate();

    for lane in lanes {
        lane.join()
            .expect("lane workers transport slot panics instead of unwinding");
    }

    if let Err(payload) = served {
        panic::resume_unwind(payload);
    }
}

/// Takes jobs from the queue until shutdown. Runs on the core's dispatching thread.
fn serve(queue: &JobQueue, shared: &LaneShared) {
    loop {
        match queue.await_work() {
            WorkSignal::Terminate => return,
            WorkSignal::JobMaybeAvailable => {
                // Several cores may have been woken for this job; losing the pop race
                // just means going back to waiting.
                if let Some(job) = queue.try_pop() {
                    execute(job, shared);
                }
            }
        }
    }
}

/// Runs one job to completion: releases slots 1.. to the lanes, runs slot 0 here, then
/// waits for the barrier and re-raises any lane failure.
fn execute(job: Job, shared: &LaneShared) {
    let mut slots = job.into_slots().into_iter();

    let own_slot = slots
        .next()
        .expect("submit validation rejects jobs with zero slots");

    {
        let mut state = shared.lock_state();

        assert_eq!(
            state.lanes_remaining, 0,
            "dispatched a job while lanes are still working on the previous one"
        );

        let mut lane_count = 0;
        for (lane, slot) in slots.enumerate() {
            state.slots[lane] = Some(slot);
            lane_count += 1;
        }
        state.lanes_remaining = lane_count;
    }
    shared.dispatch.notify_all();

    // Uncaught on purpose: a panic in slot 0 unwinds this thread and takes the core out
    // of service immediately.
    own_slot();

    let mut state = shared.lock_state();
    while state.lanes_remaining > 0 {
        state = shared
            .lanes_idle
            .wait(state)
            .expect("lane monitor lock is never poisoned");
    }

    if let Some(payload) = state.failure.take() {
        drop(state);
        panic::resume_unwind(payload);
    }
}

/// Entry point of one lane thread. Runs slot `lane + 1` of each job dispatched to this
/// core, then exits when told to terminate.
fn lane_main(shared: &LaneShared, lane: usize, topology: &CoreTopology, mask: &AffinityMask) {
    topology.pin_current_thread(mask);

    let mut state = shared.lock_state();

    loop {
        if state.terminate {
            return;
        }

        if let Some(slot) = state.slots[lane].take() {
            drop(state);

            // The unwind is not resumed here; the payload travels to the dispatching
            // thread, which re-raises it after the barrier opens.
            let outcome = panic::catch_unwind(AssertUnwindSafe(slot));

            state = shared.lock_state();

            if let Err(payload) = outcome {
                if state.failure.is_none() {
                    state.failure = Some(payload);
                }
            }

            state.lanes_remaining -= 1;
            if state.lanes_remaining == 0 {
                shared.lanes_idle.notify_one();
            }
        } else {
            state = shared
                .dispatch
                .wait(state)
                .expect("lane monitor lock is never poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use core_topology::fake::FakeTopologyBuilder;

    use crate::DrainMode;

    use super::*;

    fn fake_single_core_worker(lanes_per_core: usize) -> (Arc<JobQueue>, CoreTopology, CoreWorker) {
        let topology = CoreTopology::fake(FakeTopologyBuilder::from_counts(1, lanes_per_core))
            .expect("fake topology construction does not fail");
        let queue = Arc::new(JobQueue::new());

        let mask = topology
            .affinity_mask(0)
            .expect("core 0 exists by construction")
            .clone();

        let worker = CoreWorker::start(
            0,
            mask,
            topology.clone(),
            Arc::clone(&queue),
            lanes_per_core,
        );

        (queue, topology, worker)
    }

    fn counting_job(slots: usize, counter: &Arc<AtomicUsize>) -> Job {
        Job::from_slots((0..slots).map(|_| {
            let counter = Arc::clone(counter);
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }) as JobFn
        }))
    }

    #[test]
    fn runs_every_slot_of_every_job() {
        let (queue, _topology, worker) = fake_single_core_worker(3);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            queue.push(counting_job(3, &counter));
        }
        queue.request_shutdown(DrainMode::FinishQueued);

        worker.join().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn every_thread_of_the_group_pins_to_the_core_mask() {
        let (queue, topology, worker) = fake_single_core_worker(2);

        queue.request_shutdown(DrainMode::FinishQueued);
        worker.join().unwrap();

        let events = topology.pin_events();

        // One pin per thread: the dispatching thread and one lane.
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].thread(), events[1].thread());

        for event in &events {
            assert_eq!(event.processors(), &[0, 1]);
        }
    }

    #[test]
    fn slot_zero_panic_surfaces_at_join() {
        let (queue, _topology, worker) = fake_single_core_worker(2);

        queue.push(Job::from_slots([
            Box::new(|| -> () { panic!("boom in slot 0") }) as JobFn,
            Box::new(|| {}) as JobFn,
        ]));
        queue.request_shutdown(DrainMode::FinishQueued);

        let payload = worker.join().unwrap_err();
        let message = payload
            .downcast_ref::<&str>()
            .expect("panic payload is the literal panic message");
        assert_eq!(*message, "boom in slot 0");
    }

    #[test]
    fn lane_panic_surfaces_at_join() {
        let (queue, _topology, worker) = fake_single_core_worker(2);

        queue.push(Job::from_slots([
            Box::new(|| {}) as JobFn,
            Box::new(|| -> () { panic!("boom in lane") }) as JobFn,
        ]));
        queue.request_shutdown(DrainMode::FinishQueued);

        let payload = worker.join().unwrap_err();
        let message = payload
            .downcast_ref::<&str>()
            .expect("panic payload is the literal panic message");
        assert_eq!(*message, "boom in lane");
    }

    #[test]
    fn single_lane_core_runs_jobs_without_lane_threads() {
        let (queue, topology, worker) = fake_single_core_worker(1);
        let counter = Arc::new(AtomicUsize::new(0));

        queue.push(counting_job(1, &counter));
        queue.request_shutdown(DrainMode::FinishQueued);
        worker.join().unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(topology.pin_events().len(), 1);
    }
}
