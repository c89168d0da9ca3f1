//! Dependency graph over the instructions of one kernel.
//!
//! Nodes are instruction indices; an edge `a -> b` means `b` may not start
//! before `a` has finished. Edges only ever point from earlier to later
//! instructions, so a freshly built graph is acyclic.
//!
//! Every operand (qubit or classical register) tracks its last writer, the
//! readers since that writer and the commuting users since that writer.
//! Reads commute with reads and commuting accesses (e.g. CNOT targets)
//! commute with each other; every other pair of accesses is ordered.

use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tempo_ir::{CregId, Instruction, InstructionKind, Kernel, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::platform::{Access, Platform};

/// The hazard an edge orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    /// Read after write.
    Raw,
    /// Write after write.
    Waw,
    /// Write after read.
    War,
    /// Read after read, only without commutation.
    Rar,
    /// Write after commuting access.
    Wad,
    /// Commuting access after write.
    Daw,
    /// Commuting access after read.
    Dar,
    /// Read after commuting access.
    Rad,
    /// Commuting access after commuting access, only without commutation.
    Dad,
    /// Added by a caller through [`DependencyGraph::add_dependency`].
    Explicit,
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DepKind::Raw => "RAW",
            DepKind::Waw => "WAW",
            DepKind::War => "WAR",
            DepKind::Rar => "RAR",
            DepKind::Wad => "WAD",
            DepKind::Daw => "DAW",
            DepKind::Dar => "DAR",
            DepKind::Rad => "RAD",
            DepKind::Dad => "DAD",
            DepKind::Explicit => "explicit",
        };
        f.write_str(s)
    }
}

/// The operand that caused a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A qubit.
    Qubit(QubitId),
    /// A classical register.
    Creg(CregId),
    /// No particular operand.
    None,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Qubit(q) => write!(f, "{q}"),
            Operand::Creg(c) => write!(f, "{c}"),
            Operand::None => f.write_str("-"),
        }
    }
}

/// Edge payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Hazard kind.
    pub kind: DepKind,
    /// Operand the hazard is on.
    pub operand: Operand,
    /// Duration of the source instruction in cycles.
    pub weight: u64,
}

/// Per-operand bookkeeping while building.
#[derive(Debug, Clone, Default)]
struct Tracker {
    last_writer: Option<usize>,
    readers: Vec<usize>,
    commuters: Vec<usize>,
}

/// The dependency graph of one kernel.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<usize, Dependency>,
    durations: Vec<u64>,
}

impl DependencyGraph {
    /// Build the graph of `kernel`, taking durations and operand accesses
    /// from `platform`.
    ///
    /// With `commute` disabled, reads and commuting accesses are ordered too
    /// (RAR and DAD edges), giving program order on every operand.
    pub fn build(kernel: &Kernel, platform: &Platform, commute: bool) -> CompileResult<Self> {
        let num_qubits = kernel.num_qubits() as usize;
        let num_cregs = kernel.num_cregs() as usize;

        let mut builder = Builder {
            graph: DiGraph::with_capacity(kernel.len(), kernel.len() * 2),
            durations: Vec::with_capacity(kernel.len()),
            trackers: vec![Tracker::default(); num_qubits + num_cregs],
            num_qubits,
            commute,
        };

        for (index, instruction) in kernel.instructions().iter().enumerate() {
            let accesses = operand_accesses(index, instruction, platform, num_qubits, num_cregs)?;
            let duration = platform.instruction_duration(instruction)?;
            builder.durations.push(duration);
            let node = builder.graph.add_node(index);
            debug_assert_eq!(node.index(), index);
            for (slot, access) in accesses {
                builder.access(index, slot, access);
            }
        }

        Ok(Self {
            graph: builder.graph,
            durations: builder.durations,
        })
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Check if the graph has no instructions.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Number of dependency edges.
    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Duration of instruction `index` in cycles.
    pub fn duration(&self, index: usize) -> u64 {
        self.durations[index]
    }

    /// Durations of all instructions.
    pub fn durations(&self) -> &[u64] {
        &self.durations
    }

    /// Incoming dependencies of `index`.
    pub fn predecessors(&self, index: usize) -> impl Iterator<Item = (usize, &Dependency)> + '_ {
        self.graph
            .edges_directed(NodeIndex::new(index), Direction::Incoming)
            .map(|e| (e.source().index(), e.weight()))
    }

    /// Outgoing dependencies of `index`.
    pub fn successors(&self, index: usize) -> impl Iterator<Item = (usize, &Dependency)> + '_ {
        self.graph
            .edges_directed(NodeIndex::new(index), Direction::Outgoing)
            .map(|e| (e.target().index(), e.weight()))
    }

    /// All edges as `(from, to, dependency)`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, &Dependency)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), e.weight()))
    }

    /// Check if `to` directly depends on `from`.
    pub fn depends_on(&self, to: usize, from: usize) -> bool {
        self.graph
            .find_edge(NodeIndex::new(from), NodeIndex::new(to))
            .is_some()
    }

    /// Add an ordering constraint from `from` to `to`.
    ///
    /// Unlike edges added by [`build`](Self::build), such an edge may point
    /// backwards and close a cycle; scheduling then fails with
    /// [`CompileError::MalformedGraph`].
    pub fn add_dependency(&mut self, from: usize, to: usize) -> CompileResult<()> {
        let len = self.len();
        for index in [from, to] {
            if index >= len {
                return Err(CompileError::UnresolvedOperand {
                    index,
                    operand: format!("node {index} of {len}"),
                });
            }
        }
        self.graph.add_edge(
            NodeIndex::new(from),
            NodeIndex::new(to),
            Dependency {
                kind: DepKind::Explicit,
                operand: Operand::None,
                weight: self.durations[from],
            },
        );
        Ok(())
    }

    /// Instructions in a dependency-respecting order.
    pub fn topological_order(&self) -> CompileResult<Vec<usize>> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(NodeIndex::index).collect())
            .map_err(|cycle| CompileError::MalformedGraph {
                node: cycle.node_id().index(),
            })
    }

    /// The same graph with every edge reversed, for ALAP scheduling.
    ///
    /// Edge weights are recomputed so they still carry the duration of the
    /// (new) source instruction.
    pub fn reversed(&self) -> Self {
        let mut graph = self.graph.clone();
        graph.reverse();
        for edge in graph.edge_indices() {
            if let Some((source, _)) = graph.edge_endpoints(edge) {
                graph[edge].weight = self.durations[source.index()];
            }
        }
        Self {
            graph,
            durations: self.durations.clone(),
        }
    }

    /// Length in cycles of the longest chain starting at each instruction,
    /// the instruction's own duration included.
    pub fn remaining(&self) -> CompileResult<Vec<u64>> {
        let order = self.topological_order()?;
        let mut remaining = self.durations.clone();
        for &node in order.iter().rev() {
            let tail = self
                .successors(node)
                .map(|(succ, _)| remaining[succ])
                .max()
                .unwrap_or(0);
            remaining[node] = self.durations[node] + tail;
        }
        Ok(remaining)
    }
}

/// Operand slot (qubits first, then registers) with the access made.
type SlotAccess = (usize, Access);

struct Builder {
    graph: DiGraph<usize, Dependency>,
    durations: Vec<u64>,
    trackers: Vec<Tracker>,
    num_qubits: usize,
    commute: bool,
}

impl Builder {
    fn operand(&self, slot: usize) -> Operand {
        if slot < self.num_qubits {
            Operand::Qubit(QubitId(slot as u32))
        } else {
            Operand::Creg(CregId((slot - self.num_qubits) as u32))
        }
    }

    fn edge(&mut self, from: usize, to: usize, kind: DepKind, operand: Operand) {
        if from == to {
            return;
        }
        let (a, b) = (NodeIndex::new(from), NodeIndex::new(to));
        if self.graph.find_edge(a, b).is_none() {
            let weight = self.durations[from];
            self.graph.add_edge(
                a,
                b,
                Dependency {
                    kind,
                    operand,
                    weight,
                },
            );
        }
    }

    fn access(&mut self, index: usize, slot: usize, access: Access) {
        let operand = self.operand(slot);
        let mut tracker = std::mem::take(&mut self.trackers[slot]);

        match access {
            Access::Write => {
                if let Some(writer) = tracker.last_writer {
                    self.edge(writer, index, DepKind::Waw, operand);
                }
                for &reader in &tracker.readers {
                    self.edge(reader, index, DepKind::War, operand);
                }
                for &commuter in &tracker.commuters {
                    self.edge(commuter, index, DepKind::Wad, operand);
                }
                tracker.last_writer = Some(index);
                tracker.readers.clear();
                tracker.commuters.clear();
            }
            Access::Read => {
                if let Some(writer) = tracker.last_writer {
                    self.edge(writer, index, DepKind::Raw, operand);
                }
                for &commuter in &tracker.commuters {
                    self.edge(commuter, index, DepKind::Rad, operand);
                }
                if !self.commute {
                    for &reader in &tracker.readers {
                        self.edge(reader, index, DepKind::Rar, operand);
                    }
                }
                tracker.commuters.clear();
                if !tracker.readers.contains(&index) {
                    tracker.readers.push(index);
                }
            }
            Access::Commute => {
                if let Some(writer) = tracker.last_writer {
                    self.edge(writer, index, DepKind::Daw, operand);
                }
                for &reader in &tracker.readers {
                    self.edge(reader, index, DepKind::Dar, operand);
                }
                if !self.commute {
                    for &commuter in &tracker.commuters {
                        self.edge(commuter, index, DepKind::Dad, operand);
                    }
                }
                tracker.readers.clear();
                if !tracker.commuters.contains(&index) {
                    tracker.commuters.push(index);
                }
            }
        }

        self.trackers[slot] = tracker;
    }
}

/// Resolve every operand access of one instruction, checking ranges.
///
/// Condition registers are read before the instruction's own operands are
/// touched, so a measurement conditioned on its own target register still
/// gets a proper RAW edge against the previous writer.
fn operand_accesses(
    index: usize,
    instruction: &Instruction,
    platform: &Platform,
    num_qubits: usize,
    num_cregs: usize,
) -> CompileResult<Vec<SlotAccess>> {
    let qubit_slot = |q: QubitId| {
        if q.index() < num_qubits {
            Ok(q.index())
        } else {
            Err(CompileError::UnresolvedOperand {
                index,
                operand: q.to_string(),
            })
        }
    };
    let creg_slot = |c: CregId| {
        if c.index() < num_cregs {
            Ok(num_qubits + c.index())
        } else {
            Err(CompileError::UnresolvedOperand {
                index,
                operand: c.to_string(),
            })
        }
    };

    let mut accesses = vec![];
    for creg in instruction.condition_cregs() {
        accesses.push((creg_slot(creg)?, Access::Read));
    }

    match &instruction.kind {
        InstructionKind::SingleQubit { .. } | InstructionKind::TwoQubit { .. } => {
            let info = platform.instruction_info(instruction)?;
            for (i, &q) in instruction.qubits().iter().enumerate() {
                let access = info.map_or(Access::Write, |g| g.access(i));
                accesses.push((qubit_slot(q)?, access));
            }
        }
        InstructionKind::Measure { qubit, creg } => {
            accesses.push((qubit_slot(*qubit)?, Access::Write));
            if let Some(creg) = creg {
                accesses.push((creg_slot(*creg)?, Access::Write));
            }
        }
        InstructionKind::Classical { cregs } => {
            for &creg in cregs {
                accesses.push((creg_slot(creg)?, Access::Write));
            }
        }
        InstructionKind::Wait { qubits, .. } if qubits.is_empty() => {
            accesses.extend((0..num_qubits + num_cregs).map(|slot| (slot, Access::Write)));
        }
        InstructionKind::Wait { qubits, .. } => {
            for &q in qubits {
                accesses.push((qubit_slot(q)?, Access::Write));
            }
        }
    }
    Ok(accesses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ir::ClassicalCondition;

    fn platform() -> Platform {
        Platform::linear(4).unwrap()
    }

    fn build(kernel: &Kernel, commute: bool) -> DependencyGraph {
        DependencyGraph::build(kernel, &platform(), commute).unwrap()
    }

    #[test]
    fn test_disjoint_gates_are_independent() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.gate("y", QubitId(1)).unwrap();

        let graph = build(&kernel, true);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.num_edges(), 0);
    }

    #[test]
    fn test_measure_then_gate_is_waw() {
        let mut kernel = Kernel::new("k", 1, 1);
        kernel.measure(QubitId(0), CregId(0)).unwrap();
        kernel.gate("x", QubitId(0)).unwrap();

        let graph = build(&kernel, true);
        let (from, dep) = graph.predecessors(1).next().unwrap();
        assert_eq!(from, 0);
        assert_eq!(dep.kind, DepKind::Waw);
        assert_eq!(dep.weight, 15);
    }

    #[test]
    fn test_cnots_sharing_control_commute() {
        let mut kernel = Kernel::new("k", 3, 0);
        kernel.cnot(QubitId(0), QubitId(1)).unwrap();
        kernel.cnot(QubitId(0), QubitId(2)).unwrap();

        assert!(!build(&kernel, true).depends_on(1, 0));

        let strict = build(&kernel, false);
        assert!(strict.depends_on(1, 0));
        assert_eq!(strict.predecessors(1).next().unwrap().1.kind, DepKind::Rar);
    }

    #[test]
    fn test_cnots_sharing_target_commute() {
        let mut kernel = Kernel::new("k", 3, 0);
        kernel.cnot(QubitId(0), QubitId(2)).unwrap();
        kernel.cnot(QubitId(1), QubitId(2)).unwrap();

        assert!(!build(&kernel, true).depends_on(1, 0));
        assert_eq!(
            build(&kernel, false).predecessors(1).next().unwrap().1.kind,
            DepKind::Dad
        );
    }

    #[test]
    fn test_control_then_target_is_ordered() {
        // q1 is a target first and a control second.
        let mut kernel = Kernel::new("k", 3, 0);
        kernel.cnot(QubitId(0), QubitId(1)).unwrap();
        kernel.cnot(QubitId(1), QubitId(2)).unwrap();

        let graph = build(&kernel, true);
        let (_, dep) = graph.predecessors(1).next().unwrap();
        assert_eq!(dep.kind, DepKind::Rad);
        assert_eq!(dep.operand, Operand::Qubit(QubitId(1)));
    }

    #[test]
    fn test_phase_gate_commutes_with_control() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.cnot(QubitId(0), QubitId(1)).unwrap();
        kernel.gate("z", QubitId(0)).unwrap();
        kernel.gate("x", QubitId(0)).unwrap();

        let graph = build(&kernel, true);
        assert!(!graph.depends_on(1, 0));
        // The X writes q0 and must follow both readers.
        assert!(graph.depends_on(2, 0));
        assert!(graph.depends_on(2, 1));
    }

    #[test]
    fn test_condition_reads_register() {
        let mut kernel = Kernel::new("k", 2, 1);
        kernel.measure(QubitId(0), CregId(0)).unwrap();
        kernel
            .gate_if("x", QubitId(1), ClassicalCondition::Unary(CregId(0)))
            .unwrap();

        let graph = build(&kernel, true);
        let (from, dep) = graph.predecessors(1).next().unwrap();
        assert_eq!(from, 0);
        assert_eq!(dep.kind, DepKind::Raw);
        assert_eq!(dep.operand, Operand::Creg(CregId(0)));
    }

    #[test]
    fn test_global_barrier_orders_everything() {
        let mut kernel = Kernel::new("k", 3, 1);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.classical("ldi", &[CregId(0)]).unwrap();
        kernel.barrier_all().unwrap();
        kernel.gate("x", QubitId(2)).unwrap();

        let graph = build(&kernel, true);
        assert!(graph.depends_on(2, 0));
        assert!(graph.depends_on(2, 1));
        assert!(graph.depends_on(3, 2));
    }

    #[test]
    fn test_unresolved_operand() {
        let kernel = Kernel::from_instructions(
            "k",
            2,
            0,
            vec![
                Instruction::single("x", QubitId(0)),
                Instruction::two("cz", QubitId(0), QubitId(3)),
            ],
        );
        let err = DependencyGraph::build(&kernel, &platform(), true).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedOperand { index: 1, .. }));
    }

    #[test]
    fn test_unknown_instruction() {
        let kernel =
            Kernel::from_instructions("k", 1, 0, vec![Instruction::single("warp", QubitId(0))]);
        let err = DependencyGraph::build(&kernel, &platform(), true).unwrap_err();
        assert!(matches!(err, CompileError::UnknownInstruction { .. }));
    }

    #[test]
    fn test_remaining_critical_path() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap(); // 1
        kernel.cnot(QubitId(0), QubitId(1)).unwrap(); // 2
        kernel.gate("x", QubitId(1)).unwrap(); // 1

        let graph = build(&kernel, true);
        assert_eq!(graph.remaining().unwrap(), vec![4, 3, 1]);
    }

    #[test]
    fn test_reversed_weights() {
        let mut kernel = Kernel::new("k", 1, 1);
        kernel.measure(QubitId(0), CregId(0)).unwrap();
        kernel.gate("x", QubitId(0)).unwrap();

        let reversed = build(&kernel, true).reversed();
        let (from, dep) = reversed.predecessors(0).next().unwrap();
        assert_eq!(from, 1);
        assert_eq!(dep.weight, 1);
    }

    #[test]
    fn test_cycle_detected() {
        let mut kernel = Kernel::new("k", 1, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.gate("y", QubitId(0)).unwrap();

        let mut graph = build(&kernel, true);
        assert_eq!(graph.topological_order().unwrap(), vec![0, 1]);

        graph.add_dependency(1, 0).unwrap();
        assert!(matches!(
            graph.topological_order(),
            Err(CompileError::MalformedGraph { .. })
        ));
        assert!(graph.remaining().is_err());
    }
}
