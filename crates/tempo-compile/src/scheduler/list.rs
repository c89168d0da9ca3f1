//! Resource-constrained list scheduling.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use tracing::trace;

use super::TieBreak;
use crate::depgraph::DependencyGraph;
use crate::error::{CompileError, CompileResult};
use crate::resource::{ResourceModel, ResourceRequest};

/// Ready-set key: earliest ready cycle first, then the tie-break priority,
/// then program order.
type ReadyKey = (u64, Reverse<u64>, usize);

/// Schedule `graph` as soon as possible, committing every instruction into
/// `model`. Returns the start cycle of each instruction.
pub(crate) fn schedule_asap(
    graph: &DependencyGraph,
    requests: &[ResourceRequest],
    model: &mut ResourceModel,
    tie_break: TieBreak,
) -> CompileResult<Vec<u64>> {
    // A cycle would leave some instruction never ready.
    graph.topological_order()?;

    let n = graph.len();
    let priority = match tie_break {
        TieBreak::First => vec![0; n],
        TieBreak::CriticalPath => graph.remaining()?,
    };

    let mut pending: Vec<usize> = (0..n).map(|i| graph.predecessors(i).count()).collect();
    let mut ready_at = vec![0_u64; n];
    let mut start = vec![0_u64; n];
    let mut ready: BTreeSet<ReadyKey> = (0..n)
        .filter(|&i| pending[i] == 0)
        .map(|i| (0, Reverse(priority[i]), i))
        .collect();

    let mut scheduled = 0;
    while let Some((cycle, _, op)) = ready.pop_first() {
        let at = model.earliest_feasible(&requests[op], cycle);
        model.commit(op, &requests[op], at)?;
        start[op] = at;
        scheduled += 1;
        trace!(op, ready = cycle, start = at, "scheduled");

        let end = at + graph.duration(op);
        for (succ, _) in graph.successors(op) {
            ready_at[succ] = ready_at[succ].max(end);
            pending[succ] -= 1;
            if pending[succ] == 0 {
                ready.insert((ready_at[succ], Reverse(priority[succ]), succ));
            }
        }
    }

    if scheduled != n {
        let node = pending.iter().position(|&p| p > 0).unwrap_or(0);
        return Err(CompileError::MalformedGraph { node });
    }
    Ok(start)
}

/// Schedule `graph` as late as possible: schedule the reversed graph as soon
/// as possible and mirror the result around its makespan.
///
/// `model` must be empty; it is replaced by the mirrored occupancy.
pub(crate) fn schedule_alap(
    graph: &DependencyGraph,
    requests: &[ResourceRequest],
    model: &mut ResourceModel,
    tie_break: TieBreak,
) -> CompileResult<Vec<u64>> {
    let reversed = graph.reversed();
    let mut mirror = model.empty_reversed();
    let backwards = schedule_asap(&reversed, requests, &mut mirror, tie_break)?;

    let makespan = backwards
        .iter()
        .enumerate()
        .map(|(i, &s)| s + graph.duration(i))
        .max()
        .unwrap_or(0);

    let start: Vec<u64> = backwards
        .iter()
        .enumerate()
        .map(|(i, &s)| makespan - s - graph.duration(i))
        .collect();

    // Re-committing op by op could pick different slots and fail; mirroring
    // keeps every slot the reverse pass chose, and reflection preserves
    // which intervals overlap.
    *model = mirror.mirrored(makespan);
    Ok(start)
}
