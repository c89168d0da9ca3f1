//! Qubit mapping and routing.
//!
//! The [`Mapper`] walks a logical kernel in program order, keeps a live
//! [`Virt2Real`] mapping and emits a physical kernel in which the operands of
//! every two-qubit gate are adjacent on the platform topology. When they are
//! not, it enumerates [`Alternative`]s along shortest paths, scores them with
//! a [`RouteCost`] and applies the cheapest one by inserting swaps (or moves,
//! when one side is known to be in |0>).
//!
//! The emitted instructions are scheduled incrementally into a [`Past`] so
//! that extension-based heuristics can compare the cycle cost of candidate
//! swaps.

mod alter;
mod layout;
mod past;

pub use alter::{Alternative, LookaheadCost, MinExtendCost, RouteContext, RouteCost, Score, alternatives};
pub use layout::{RealState, Virt2Real, interaction_placement};
pub use past::{Past, Trial};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempo_ir::{CircuitLevel, Instruction, IrError, Kernel, MOVE, QubitId, SWAP};
use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::platform::Platform;

/// Routing heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapperKind {
    /// No routing; the kernel is passed through on the identity mapping.
    None,
    /// Lookahead distance.
    Base,
    /// Lookahead distance, resource-constrained past.
    #[serde(rename = "baserc")]
    BaseRc,
    /// Minimal extension of the mapped past.
    #[default]
    #[serde(rename = "minextend")]
    MinExtend,
    /// Minimal extension of the resource-constrained mapped past.
    #[serde(rename = "minextendrc")]
    MinExtendRc,
}

impl MapperKind {
    fn resource_constrained(self) -> bool {
        matches!(self, MapperKind::BaseRc | MapperKind::MinExtendRc)
    }
}

/// Which swaps of the winning alternative are applied before re-routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectSwaps {
    /// All of them.
    #[default]
    All,
    /// The first one.
    One,
    /// Whichever of the first source-side and target-side swap starts
    /// earlier.
    Earliest,
}

/// Which of several equally scored alternatives wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteTieBreak {
    /// First in enumeration order.
    #[default]
    First,
    /// Last in enumeration order.
    Last,
}

/// Starting mapping of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPlacement {
    /// Logical qubit `i` on physical qubit `i`.
    #[default]
    Identity,
    /// Greedy placement by two-qubit interaction counts.
    Interaction,
}

/// Mapper settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Routing heuristic.
    pub kind: MapperKind,
    /// Number of upcoming two-qubit gates considered by the lookahead.
    pub lookahead_window: usize,
    /// Replace swaps with a fresh qubit by moves.
    pub use_moves: bool,
    /// Swap selection.
    pub select_swaps: SelectSwaps,
    /// Tie-break between equal alternatives.
    pub tie_break: RouteTieBreak,
    /// Maximum shortest paths enumerated per gate.
    pub path_limit: usize,
    /// Starting mapping.
    pub initial_placement: InitialPlacement,
    /// Treat logical qubits as |0> until first used.
    pub assume_zero_init_state: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            kind: MapperKind::MinExtend,
            lookahead_window: 8,
            use_moves: false,
            select_swaps: SelectSwaps::All,
            tie_break: RouteTieBreak::First,
            path_limit: 64,
            initial_placement: InitialPlacement::Identity,
            assume_zero_init_state: false,
        }
    }
}

/// Lifecycle of a [`Mapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperState {
    /// Ready to map one kernel.
    Initialized,
    /// Mapping in progress, or aborted.
    Routing,
    /// The kernel has been mapped.
    Finalized,
}

/// A routed kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedKernel {
    /// Physical kernel on the platform's qubits.
    pub kernel: Kernel,
    /// Mapping before the first instruction.
    pub initial: Virt2Real,
    /// Mapping after the last instruction.
    pub final_layout: Virt2Real,
    /// Swaps inserted.
    pub swaps: usize,
    /// Moves inserted in place of swaps.
    pub moves: usize,
    /// Swaps between two fresh qubits, applied to the mapping only.
    pub elided: usize,
    /// Makespan of the mapped past; the final schedule may differ.
    pub makespan: u64,
}

/// What [`place_swap`] emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SwapOutcome {
    Swapped,
    Moved,
    Elided,
}

/// Exchange what physical qubits `r0` and `r1` host, emitting the cheapest
/// instruction that does so.
pub(crate) fn place_swap(
    past: &mut Past,
    layout: &mut Virt2Real,
    r0: u32,
    r1: u32,
    use_moves: bool,
) -> CompileResult<SwapOutcome> {
    let outcome = match (layout.state(r0), layout.state(r1)) {
        (RealState::Fresh, RealState::Fresh) => SwapOutcome::Elided,
        (RealState::Live, RealState::Fresh) if use_moves => {
            past.add(Instruction::two(MOVE, QubitId(r0), QubitId(r1)))?;
            SwapOutcome::Moved
        }
        (RealState::Fresh, RealState::Live) if use_moves => {
            past.add(Instruction::two(MOVE, QubitId(r1), QubitId(r0)))?;
            SwapOutcome::Moved
        }
        _ => {
            past.add(Instruction::two(SWAP, QubitId(r0), QubitId(r1)))?;
            SwapOutcome::Swapped
        }
    };
    layout.swap(r0, r1);
    Ok(outcome)
}

/// Routes one logical kernel onto a platform.
pub struct Mapper {
    platform: Arc<Platform>,
    config: MapperConfig,
    cost: Box<dyn RouteCost>,
    state: MapperState,
}

impl Mapper {
    /// Create a mapper with the cost function selected by `config.kind`.
    pub fn new(platform: Arc<Platform>, config: MapperConfig) -> Self {
        let cost: Box<dyn RouteCost> = match config.kind {
            MapperKind::MinExtend | MapperKind::MinExtendRc => Box::new(MinExtendCost),
            MapperKind::None | MapperKind::Base | MapperKind::BaseRc => Box::new(LookaheadCost),
        };
        Self {
            platform,
            config,
            cost,
            state: MapperState::Initialized,
        }
    }

    /// Replace the cost function.
    #[must_use]
    pub fn with_cost(mut self, cost: impl RouteCost + 'static) -> Self {
        self.cost = Box::new(cost);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MapperState {
        self.state
    }

    /// Map `kernel`. A mapper maps exactly one kernel.
    pub fn map(&mut self, kernel: &Kernel) -> CompileResult<MappedKernel> {
        if self.state != MapperState::Initialized {
            return Err(CompileError::InvalidState {
                component: "mapper",
                state: format!("{:?}", self.state),
            });
        }
        self.state = MapperState::Routing;
        let mapped = self.route(kernel)?;
        self.state = MapperState::Finalized;
        Ok(mapped)
    }

    fn route(&self, kernel: &Kernel) -> CompileResult<MappedKernel> {
        let platform = &self.platform;
        if kernel.num_qubits() > platform.num_qubits() {
            return Err(CompileError::KernelTooLarge {
                required: kernel.num_qubits(),
                available: platform.num_qubits(),
            });
        }
        check_operands(kernel)?;

        let assume_zero = self.config.assume_zero_init_state;
        let initial = match self.config.initial_placement {
            InitialPlacement::Identity => Virt2Real::identity(kernel.num_qubits(), platform.num_qubits(), assume_zero),
            InitialPlacement::Interaction => interaction_placement(kernel, platform, assume_zero),
        };

        let mut router = Router {
            platform,
            config: &self.config,
            cost: self.cost.as_ref(),
            layout: initial.clone(),
            past: Past::new(
                Arc::clone(platform),
                kernel.num_cregs(),
                self.config.kind.resource_constrained(),
            ),
            swaps: 0,
            moves: 0,
            elided: 0,
        };

        let instructions = kernel.instructions();
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.is_two_qubit() && self.config.kind != MapperKind::None {
                let window = lookahead_window(&instructions[index + 1..], self.config.lookahead_window);
                router.route_gate(index, instruction, &window)?;
            }
            router.emit(index, instruction)?;
        }

        let Router {
            layout,
            past,
            swaps,
            moves,
            elided,
            ..
        } = router;
        let makespan = past.max_free_cycle();
        debug!(
            kernel = kernel.name(),
            swaps, moves, elided, makespan, "kernel mapped"
        );

        let physical = Kernel::from_instructions(
            kernel.name(),
            platform.num_qubits(),
            kernel.num_cregs(),
            past.into_output(),
        )
        .with_level(CircuitLevel::Physical);

        Ok(MappedKernel {
            kernel: physical,
            initial,
            final_layout: layout,
            swaps,
            moves,
            elided,
            makespan,
        })
    }
}

/// Operands outside the kernel and repeated qubits are rejected up front.
fn check_operands(kernel: &Kernel) -> CompileResult<()> {
    for (index, instruction) in kernel.instructions().iter().enumerate() {
        let qubits = instruction.qubits();
        if let Some(q) = qubits.iter().find(|q| q.0 >= kernel.num_qubits()) {
            return Err(CompileError::UnresolvedOperand {
                index,
                operand: q.to_string(),
            });
        }
        let cregs = instruction.written_cregs().iter().copied().chain(instruction.condition_cregs());
        for c in cregs {
            if c.0 >= kernel.num_cregs() {
                return Err(CompileError::UnresolvedOperand {
                    index,
                    operand: c.to_string(),
                });
            }
        }
        if let [a, b] = qubits {
            if a == b {
                return Err(IrError::DuplicateQubit {
                    qubit: *a,
                    gate_name: Some(instruction.name.clone()),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Operand pairs of the next `size` two-qubit gates, up to the first fence.
fn lookahead_window(upcoming: &[Instruction], size: usize) -> Vec<[QubitId; 2]> {
    upcoming
        .iter()
        .take_while(|i| !i.is_fence())
        .filter_map(|i| match i.qubits() {
            [a, b] if i.is_two_qubit() => Some([*a, *b]),
            _ => None,
        })
        .take(size)
        .collect()
}

/// Mutable routing state for one kernel.
struct Router<'a> {
    platform: &'a Arc<Platform>,
    config: &'a MapperConfig,
    cost: &'a dyn RouteCost,
    layout: Virt2Real,
    past: Past,
    swaps: usize,
    moves: usize,
    elided: usize,
}

impl Router<'_> {
    fn physical(&self, index: usize, q: QubitId) -> CompileResult<u32> {
        self.layout.real(q).ok_or_else(|| CompileError::UnresolvedOperand {
            index,
            operand: q.to_string(),
        })
    }

    /// Insert swaps until the operands of `gate` are adjacent.
    fn route_gate(&mut self, index: usize, gate: &Instruction, window: &[[QubitId; 2]]) -> CompileResult<()> {
        let [a, b] = [gate.qubits()[0], gate.qubits()[1]];
        let diameter = self.platform.diameter() as usize;
        let mut inserted = 0;

        loop {
            let (p0, p1) = (self.physical(index, a)?, self.physical(index, b)?);
            if self.platform.is_adjacent(p0, p1) {
                return Ok(());
            }
            // Fails with `Unreachable` on a disconnected topology.
            let distance = self.platform.distance(p0, p1)?;

            let best = self.select(index, gate, window, p0, p1)?;
            let chosen = match self.config.select_swaps {
                SelectSwaps::All => best.swaps(),
                SelectSwaps::One => best.swaps().into_iter().take(1).collect(),
                SelectSwaps::Earliest => self.earliest_swap(&best)?.into_iter().collect(),
            };
            if chosen.is_empty() || inserted + chosen.len() > diameter {
                return Err(CompileError::InvalidState {
                    component: "router",
                    state: format!("no progress routing instruction {index} at distance {distance}"),
                });
            }

            for (r0, r1) in chosen {
                let use_moves = self.use_moves();
                let outcome = place_swap(&mut self.past, &mut self.layout, r0, r1, use_moves)?;
                trace!(index, r0, r1, ?outcome, "swap placed");
                match outcome {
                    SwapOutcome::Swapped => self.swaps += 1,
                    SwapOutcome::Moved => self.moves += 1,
                    SwapOutcome::Elided => self.elided += 1,
                }
                inserted += 1;
            }
        }
    }

    fn use_moves(&self) -> bool {
        self.config.use_moves && self.platform.supports_move()
    }

    /// Score every alternative and keep the best by the configured tie-break.
    fn select(
        &mut self,
        index: usize,
        gate: &Instruction,
        window: &[[QubitId; 2]],
        p0: u32,
        p1: u32,
    ) -> CompileResult<Alternative> {
        let candidates = alternatives(self.platform, p0, p1, self.config.path_limit)?;
        let use_moves = self.use_moves();
        let mut context = RouteContext {
            platform: self.platform,
            past: &mut self.past,
            layout: &self.layout,
            gate,
            lookahead: window,
            use_moves,
        };

        let mut best: Option<(Score, Alternative)> = None;
        for alternative in candidates {
            let score = self.cost.score(&alternative, &mut context)?;
            let better = match (&best, self.config.tie_break) {
                (None, _) => true,
                (Some((current, _)), RouteTieBreak::First) => score < *current,
                (Some((current, _)), RouteTieBreak::Last) => score <= *current,
            };
            if better {
                best = Some((score, alternative));
            }
        }

        let (score, alternative) = best.ok_or(CompileError::Unreachable { from: p0, to: p1 })?;
        debug!(
            index,
            cost = self.cost.name(),
            path = ?alternative.path(),
            extension = score.extension,
            lookahead = score.lookahead,
            "alternative selected"
        );
        Ok(alternative)
    }

    /// The first source-side or target-side swap of `alternative`, whichever
    /// would start earlier; source side on a tie.
    fn earliest_swap(&mut self, alternative: &Alternative) -> CompileResult<Option<(u32, u32)>> {
        let source = alternative.source_swaps().first().copied();
        let target = alternative.target_swaps().first().copied();
        let (Some(s), Some(t)) = (source, target) else {
            return Ok(source.or(target));
        };
        let start_s = self.trial_start(s)?;
        let start_t = self.trial_start(t)?;
        Ok(Some(if start_t < start_s { t } else { s }))
    }

    fn trial_start(&mut self, (r0, r1): (u32, u32)) -> CompileResult<u64> {
        let mut trial = self.past.trial();
        trial.add(Instruction::two(SWAP, QubitId(r0), QubitId(r1)))
    }

    /// Emit `instruction` on its current physical operands.
    fn emit(&mut self, index: usize, instruction: &Instruction) -> CompileResult<()> {
        let physical = instruction.try_remap(|q| self.physical(index, q).map(QubitId))?;
        let initializes = self
            .platform
            .instruction_info(&physical)?
            .is_some_and(|info| info.initializes);
        if !physical.is_fence() {
            let state = if initializes {
                RealState::Fresh
            } else {
                RealState::Live
            };
            for q in physical.qubits() {
                self.layout.set_state(q.0, state);
            }
        }
        self.past.add(physical)?;
        Ok(())
    }
}
