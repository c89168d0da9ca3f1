//! Routing alternatives and their scoring.

use serde::{Deserialize, Serialize};
use tempo_ir::{Instruction, QubitId};

use super::layout::Virt2Real;
use super::past::Past;
use super::place_swap;
use crate::error::{CompileError, CompileResult};
use crate::platform::Platform;

/// One way to make a two-qubit gate's operands adjacent.
///
/// Along a shortest path from the first operand's physical qubit to the
/// second's, the first operand is swapped forward up to `path[split]` and the
/// second backward down to `path[split + 1]`, where the gate then executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    path: Vec<u32>,
    split: usize,
}

impl Alternative {
    /// The path, from the first operand to the second.
    pub fn path(&self) -> &[u32] {
        &self.path
    }

    /// Swaps moving the first operand along the path.
    pub fn source_swaps(&self) -> Vec<(u32, u32)> {
        (0..self.split).map(|i| (self.path[i], self.path[i + 1])).collect()
    }

    /// Swaps moving the second operand back along the path.
    pub fn target_swaps(&self) -> Vec<(u32, u32)> {
        ((self.split + 2)..self.path.len())
            .rev()
            .map(|j| (self.path[j], self.path[j - 1]))
            .collect()
    }

    /// All swaps, source side first.
    pub fn swaps(&self) -> Vec<(u32, u32)> {
        let mut swaps = self.source_swaps();
        swaps.extend(self.target_swaps());
        swaps
    }

    /// Edge the gate executes on.
    pub fn gate_edge(&self) -> (u32, u32) {
        (self.path[self.split], self.path[self.split + 1])
    }

    /// `layout` after every swap of this alternative.
    pub fn apply(&self, layout: &Virt2Real) -> Virt2Real {
        let mut layout = layout.clone();
        for (r0, r1) in self.swaps() {
            layout.swap(r0, r1);
        }
        layout
    }
}

/// Every alternative for a gate between physical qubits `p0` and `p1`: up to
/// `limit` shortest paths, each split at every hop. Order is deterministic.
pub fn alternatives(platform: &Platform, p0: u32, p1: u32, limit: usize) -> CompileResult<Vec<Alternative>> {
    let paths = platform.shortest_paths(p0, p1, limit)?;
    let mut out = vec![];
    for path in paths {
        let hops = path.len().saturating_sub(1);
        for split in 0..hops {
            out.push(Alternative {
                path: path.clone(),
                split,
            });
        }
    }
    Ok(out)
}

/// Cost of an alternative; lower is better. Compared on extension first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    /// Cycle at which the routed gate completes in the mapped past.
    pub extension: u64,
    /// Summed distance of the upcoming two-qubit gates.
    pub lookahead: u64,
}

/// What a [`RouteCost`] can look at while scoring.
pub struct RouteContext<'a> {
    pub(crate) platform: &'a Platform,
    pub(crate) past: &'a mut Past,
    pub(crate) layout: &'a Virt2Real,
    pub(crate) gate: &'a Instruction,
    pub(crate) lookahead: &'a [[QubitId; 2]],
    pub(crate) use_moves: bool,
}

impl RouteContext<'_> {
    /// The platform being routed on.
    pub fn platform(&self) -> &Platform {
        self.platform
    }

    /// Mapping before the alternative.
    pub fn layout(&self) -> &Virt2Real {
        self.layout
    }

    /// The gate being routed, with logical operands.
    pub fn gate(&self) -> &Instruction {
        self.gate
    }

    /// Upcoming two-qubit gates, logical operands.
    pub fn lookahead(&self) -> &[[QubitId; 2]] {
        self.lookahead
    }

    /// Summed physical distance of the upcoming two-qubit gates under
    /// `layout`.
    pub fn lookahead_distance(&self, layout: &Virt2Real) -> CompileResult<u64> {
        let mut total = 0;
        for &[a, b] in self.lookahead {
            let (Some(pa), Some(pb)) = (layout.real(a), layout.real(b)) else {
                continue;
            };
            total += u64::from(self.platform.distance(pa, pb)?);
        }
        Ok(total)
    }

    /// Completion cycle of the gate when `alternative` is appended to the
    /// mapped past. The past is left untouched.
    pub fn extension(&mut self, alternative: &Alternative) -> CompileResult<u64> {
        let mut layout = self.layout.clone();
        let mut trial = self.past.trial();
        for (r0, r1) in alternative.swaps() {
            place_swap(&mut trial, &mut layout, r0, r1, self.use_moves)?;
        }
        let physical = self.gate.try_remap(|q| {
            layout.real(q).map(QubitId).ok_or_else(|| CompileError::UnresolvedOperand {
                index: trial.output().len(),
                operand: q.to_string(),
            })
        })?;
        let (p0, _) = alternative.gate_edge();
        trial.add(physical)?;
        Ok(trial.free_cycle(p0))
    }
}

/// A routing heuristic: scores alternatives, lower is better.
pub trait RouteCost: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Score `alternative` in `context`.
    fn score(&self, alternative: &Alternative, context: &mut RouteContext<'_>) -> CompileResult<Score>;
}

/// Lookahead distance only.
pub struct LookaheadCost;

impl RouteCost for LookaheadCost {
    fn name(&self) -> &str {
        "lookahead"
    }

    fn score(&self, alternative: &Alternative, context: &mut RouteContext<'_>) -> CompileResult<Score> {
        let layout = alternative.apply(context.layout());
        Ok(Score {
            extension: 0,
            lookahead: context.lookahead_distance(&layout)?,
        })
    }
}

/// Minimal extension of the mapped past, then lookahead distance.
pub struct MinExtendCost;

impl RouteCost for MinExtendCost {
    fn name(&self) -> &str {
        "minextend"
    }

    fn score(&self, alternative: &Alternative, context: &mut RouteContext<'_>) -> CompileResult<Score> {
        let extension = context.extension(alternative)?;
        let layout = alternative.apply(context.layout());
        Ok(Score {
            extension,
            lookahead: context.lookahead_distance(&layout)?,
        })
    }
}
