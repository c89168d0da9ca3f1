//! Uniform rebalancing of an ASAP schedule.
//!
//! A backward scan over the cycles moves instructions to later cycles so that
//! every bundle reaches the running average width of the bundles still to
//! go. An instruction only moves when it still completes before each of its
//! successors starts and before the makespan, and when its resources are free
//! at the new cycle. The makespan never grows.

use tracing::{debug, trace};

use crate::depgraph::DependencyGraph;
use crate::error::CompileResult;
use crate::resource::{ResourceModel, ResourceRequest};

/// Rebalance `start`, an ASAP schedule of `graph` committed into `model`.
pub(crate) fn rebalance(
    graph: &DependencyGraph,
    requests: &[ResourceRequest],
    model: &mut ResourceModel,
    start: &mut [u64],
) -> CompileResult<()> {
    let n = graph.len();
    let makespan = (0..n).map(|i| start[i] + graph.duration(i)).max().unwrap_or(0);
    if n == 0 || makespan == 0 {
        return Ok(());
    }
    let remaining = graph.remaining()?;

    // Zero-duration instructions may start at the makespan itself.
    let horizon = start.iter().max().map_or(0, |&last| last + 1).max(makespan);
    let mut bundles: Vec<Vec<usize>> = vec![vec![]; horizon as usize];
    for (op, &cycle) in start.iter().enumerate() {
        bundles[cycle as usize].push(op);
    }

    let mut to_go = n;
    let mut non_empty = bundles.iter().filter(|b| !b.is_empty()).count();
    let mut moved = 0_usize;

    for cycle in (0..bundles.len()).rev() {
        if non_empty == 0 {
            break;
        }
        let mut pred = cycle;
        while pred > 0 && (bundles[cycle].len() as f64) < to_go as f64 / non_empty as f64 {
            let from = pred - 1;
            let target = cycle as u64;

            let mut candidates: Vec<usize> = bundles[from]
                .iter()
                .copied()
                .filter(|&op| {
                    let end = target + graph.duration(op);
                    end <= makespan && graph.successors(op).all(|(succ, _)| end <= start[succ])
                })
                .collect();
            candidates.sort_by_key(|&op| (remaining[op], op));

            let mut chosen = None;
            for op in candidates {
                model.release(op);
                if model.is_feasible(&requests[op], target) {
                    model.commit(op, &requests[op], target)?;
                    chosen = Some(op);
                    break;
                }
                model.commit(op, &requests[op], start[op])?;
            }

            let Some(op) = chosen else {
                pred -= 1;
                continue;
            };

            bundles[from].retain(|&o| o != op);
            if bundles[from].is_empty() {
                non_empty -= 1;
            }
            if bundles[cycle].is_empty() {
                non_empty += 1;
            }
            bundles[cycle].push(op);
            trace!(op, from = start[op], to = target, "rebalanced");
            start[op] = target;
            moved += 1;
        }

        to_go -= bundles[cycle].len();
        if !bundles[cycle].is_empty() {
            non_empty -= 1;
        }
    }

    debug!(moved, makespan, "uniform rebalancing done");
    Ok(())
}
