//! Parallel gate-batch execution.
//!
//! Every gate released by a manage phase is evaluated concurrently, one
//! task per gate, with a join barrier at the end of the batch. Workers see
//! only their own gate plus the shared oracle, so no locking is needed:
//! batches are disjoint by construction.

use std::sync::{Arc, OnceLock};

use rayon::{ThreadPool, ThreadPoolBuilder, prelude::*};

use super::gate::{EvalParams, Gate, GateError};
use crate::fhe::BinFheOracle;

static GATE_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();

/// Process-wide worker pool, one thread per physical core. A single gate
/// keeps a core busy for tens to hundreds of ms, so hyperthread siblings
/// add nothing and thread migrations only cost cache state; each worker is
/// therefore pinned to its own physical core where the platform allows it.
fn gate_pool() -> &'static Arc<ThreadPool> {
    GATE_POOL.get_or_init(|| {
        let workers = num_cpus::get_physical().max(1);
        let plan = pinning_plan(workers);
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .start_handler(move |worker| {
                // pinning is best effort; not every platform supports it
                if let Some(core) = plan.get(worker) {
                    let _ = core_affinity::set_for_current(*core);
                }
            })
            .build()
            .or_else(|_| ThreadPoolBuilder::new().num_threads(workers).build())
            .expect("gate worker pool");
        Arc::new(pool)
    })
}

/// One core id per worker. When the OS enumerates twice as many logical
/// cores as we want workers, hyperthread siblings are listed adjacently, so
/// striding by two lands each worker on a distinct physical core. An empty
/// plan leaves every worker unpinned.
fn pinning_plan(workers: usize) -> Vec<core_affinity::CoreId> {
    let Some(cores) = core_affinity::get_core_ids() else {
        return Vec::new();
    };
    let stride = if cores.len() >= 2 * workers { 2 } else { 1 };
    cores.into_iter().step_by(stride).take(workers).collect()
}

/// Evaluate the whole batch in parallel and join. The first gate error
/// aborts the batch at the join point.
pub fn execute_batch<O>(
    batch: &mut [Gate<O::Ciphertext>],
    params: &EvalParams<'_, O>,
) -> Result<(), GateError>
where
    O: BinFheOracle,
{
    gate_pool().install(|| {
        batch
            .par_iter_mut()
            .try_for_each(|gate| gate.evaluate(params))
    })
}
