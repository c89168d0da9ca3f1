//! Platform model: topology, instruction table and shared resources.
//!
//! A [`Platform`] is built once from a [`PlatformConfig`] and never changes
//! afterwards. It is `Send + Sync` and meant to be shared through an `Arc`
//! by every kernel compiled against it.

pub mod config;
pub mod topology;

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tempo_ir::instruction::{MEASURE, MOVE};
use tempo_ir::{Instruction, InstructionKind};

use crate::error::{CompileError, CompileResult};

pub use config::{
    Access, BufferConfig, CouplerConfig, EdgeConfig, InstructionConfig, PlatformConfig,
    ResourceClass, ResourcesConfig, TopologyConfig, UnitConfig,
};
pub use topology::Topology;

/// Resolved instruction table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateInfo {
    /// Position in the platform's instruction table.
    pub id: u32,
    /// Instruction name.
    pub name: String,
    /// Duration in cycles.
    pub duration: u64,
    /// Fixed operand count, if any.
    pub operands: Option<usize>,
    /// Shared hardware the instruction drives.
    pub class: ResourceClass,
    /// Per-operand access.
    pub signature: Vec<Access>,
    /// Leaves its qubit in the ground state.
    pub initializes: bool,
}

impl GateInfo {
    /// How the instruction uses operand `index`.
    pub fn access(&self, index: usize) -> Access {
        self.signature.get(index).copied().unwrap_or(Access::Write)
    }
}

/// Kinds of shared resources, each with its own occupancy table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// A physical qubit.
    Qubit,
    /// A drive unit.
    Drive,
    /// A readout unit.
    Readout,
    /// A coupler, or a pair of mutually exclusive couplers.
    Coupler,
    /// A qubit's frequency, detuned by flux pulses on nearby edges.
    Detuned,
}

/// One shared resource unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceUnit {
    /// The qubit itself.
    Qubit(u32),
    /// Drive unit by index.
    Drive(u32),
    /// Readout unit by index.
    Readout(u32),
    /// The coupler on an edge, by edge id.
    Coupler(u32),
    /// Exclusion between two conflicting couplers, lower edge id first.
    CouplerPair(u32, u32),
    /// Frequency of a qubit that flux pulses may detune.
    Detuned(u32),
}

/// How overlapping instructions may share one unit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Sharing {
    /// Never shared.
    Exclusive,
    /// Shared by instructions carrying the same tag.
    Tagged(u32),
    /// Shared by instructions starting in the same cycle.
    SameStart,
}

impl ResourceUnit {
    /// The occupancy table this unit lives in.
    pub fn kind(self) -> ResourceKind {
        match self {
            ResourceUnit::Qubit(_) => ResourceKind::Qubit,
            ResourceUnit::Drive(_) => ResourceKind::Drive,
            ResourceUnit::Readout(_) => ResourceKind::Readout,
            ResourceUnit::Coupler(_) | ResourceUnit::CouplerPair(..) => ResourceKind::Coupler,
            ResourceUnit::Detuned(_) => ResourceKind::Detuned,
        }
    }
}

impl fmt::Display for ResourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceUnit::Qubit(q) => write!(f, "qubit {q}"),
            ResourceUnit::Drive(u) => write!(f, "drive unit {u}"),
            ResourceUnit::Readout(u) => write!(f, "readout unit {u}"),
            ResourceUnit::Coupler(e) => write!(f, "coupler {e}"),
            ResourceUnit::CouplerPair(a, b) => write!(f, "couplers {a}/{b}"),
            ResourceUnit::Detuned(q) => write!(f, "detuned qubit {q}"),
        }
    }
}

/// Qubit-to-unit assignment of a drive or readout bank.
#[derive(Debug, Clone)]
struct UnitBank {
    unit_of: Vec<Option<u32>>,
    capacity: u32,
    shared: bool,
}

impl UnitBank {
    fn new(config: &UnitConfig, num_qubits: u32) -> Self {
        let mut unit_of = vec![None; num_qubits as usize];
        for (&unit, qubits) in &config.connection_map {
            for &q in qubits {
                unit_of[q as usize] = Some(unit);
            }
        }
        Self {
            unit_of,
            capacity: config.capacity,
            shared: config.shared,
        }
    }
}

/// An immutable target device description.
#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    cycle_time_ns: u64,
    topology: Topology,
    gates: FxHashMap<String, GateInfo>,
    /// `(low, high)` qubit pair to edge id.
    edge_ids: FxHashMap<(u32, u32), u32>,
    qubit_resources: bool,
    drive: Option<UnitBank>,
    readout: Option<UnitBank>,
    /// Edge id to conflicting edge ids, symmetric. `None` disables couplers.
    coupler_conflicts: Option<FxHashMap<u32, Vec<u32>>>,
    /// Edge id to the qubits a flux pulse on it detunes.
    detunes: FxHashMap<u32, Vec<u32>>,
    /// Qubits some edge detunes.
    detunable: Vec<bool>,
    /// Buffer cycles between bundle classes.
    buffers: FxHashMap<(ResourceClass, ResourceClass), u64>,
}

impl Platform {
    /// Validate a description and build the platform.
    pub fn new(config: PlatformConfig) -> CompileResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Build a shared platform from a JSON description.
    pub fn from_json_str(json: &str) -> CompileResult<Arc<Self>> {
        Self::new(PlatformConfig::from_json_str(json)?).map(Arc::new)
    }

    /// Build a shared platform from a YAML description.
    pub fn from_yaml_str(yaml: &str) -> CompileResult<Arc<Self>> {
        Self::new(PlatformConfig::from_yaml_str(yaml)?).map(Arc::new)
    }

    /// Linear chain with the built-in instruction table.
    pub fn linear(n: u32) -> CompileResult<Self> {
        Self::new(PlatformConfig::linear(n))
    }

    /// Grid with the built-in instruction table.
    pub fn grid(width: u32, height: u32) -> CompileResult<Self> {
        Self::new(PlatformConfig::grid(width, height))
    }

    /// Star with the built-in instruction table.
    pub fn star(n: u32) -> CompileResult<Self> {
        Self::new(PlatformConfig::star(n))
    }

    /// Build from a description already known to be valid.
    fn build(config: PlatformConfig) -> Self {
        let n = config.qubit_count;
        let topology = Topology::new(n, config.topology.edges.iter().map(|e| (e.src, e.dst)));

        let mut edge_ids = FxHashMap::default();
        for (pos, edge) in config.topology.edges.iter().enumerate() {
            let pair = (edge.src.min(edge.dst), edge.src.max(edge.dst));
            edge_ids.entry(pair).or_insert(edge.id.unwrap_or(pos as u32));
        }

        let cycle = config.cycle_time_ns;
        let gates = config
            .instructions
            .iter()
            .enumerate()
            .map(|(id, (name, entry))| {
                let duration = entry
                    .duration_cycles
                    .or_else(|| entry.duration_ns.map(|ns| ns.div_ceil(cycle)))
                    .unwrap_or(0);
                let class = entry
                    .resource_class
                    .unwrap_or_else(|| infer_class(name, entry.operands));
                let info = GateInfo {
                    id: id as u32,
                    name: name.clone(),
                    duration,
                    operands: entry.operands,
                    class,
                    signature: entry.signature.clone(),
                    initializes: entry.initializes,
                };
                (name.clone(), info)
            })
            .collect();

        let coupler_conflicts = config.resources.couplers.as_ref().map(|couplers| {
            let mut conflicts: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
            for (&edge, others) in &couplers.conflicts {
                for &other in others.iter().filter(|&&o| o != edge) {
                    conflicts.entry(edge).or_default().push(other);
                    conflicts.entry(other).or_default().push(edge);
                }
            }
            for list in conflicts.values_mut() {
                list.sort_unstable();
                list.dedup();
            }
            conflicts
        });

        let mut detunes: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        let mut detunable = vec![false; n as usize];
        for (&edge, qubits) in config.resources.detuned_qubits.iter().flatten() {
            for &q in qubits {
                detunable[q as usize] = true;
            }
            detunes.insert(edge, qubits.clone());
        }

        let buffers = config
            .buffers
            .iter()
            .map(|b| ((b.from, b.to), b.duration_ns.div_ceil(cycle)))
            .collect();

        Self {
            name: config.name,
            cycle_time_ns: cycle,
            topology,
            gates,
            edge_ids,
            qubit_resources: config.resources.qubits,
            drive: config.resources.drive_units.as_ref().map(|u| UnitBank::new(u, n)),
            readout: config
                .resources
                .readout_units
                .as_ref()
                .map(|u| UnitBank::new(u, n)),
            coupler_conflicts,
            detunes,
            detunable,
            buffers,
        }
    }

    /// Platform name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.topology.num_qubits()
    }

    /// Cycle length in nanoseconds.
    pub fn cycle_time_ns(&self) -> u64 {
        self.cycle_time_ns
    }

    /// The connectivity graph.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Largest distance between two connected qubits.
    pub fn diameter(&self) -> u32 {
        self.topology.diameter()
    }

    fn check_qubit(&self, qubit: u32) -> CompileResult<()> {
        if qubit < self.num_qubits() {
            Ok(())
        } else {
            Err(CompileError::InvalidQubit {
                qubit,
                num_qubits: self.num_qubits(),
            })
        }
    }

    /// Neighbors of a physical qubit, ascending.
    pub fn neighbors(&self, qubit: u32) -> CompileResult<&[u32]> {
        self.check_qubit(qubit)?;
        Ok(self.topology.neighbors(qubit))
    }

    /// Check if two qubits share an edge.
    #[inline]
    pub fn is_adjacent(&self, q1: u32, q2: u32) -> bool {
        self.topology.is_adjacent(q1, q2)
    }

    /// Shortest-path hop count between two physical qubits.
    pub fn distance(&self, q1: u32, q2: u32) -> CompileResult<u32> {
        self.check_qubit(q1)?;
        self.check_qubit(q2)?;
        self.topology
            .distance(q1, q2)
            .ok_or(CompileError::Unreachable { from: q1, to: q2 })
    }

    /// Up to `limit` shortest paths between two physical qubits.
    pub fn shortest_paths(&self, q1: u32, q2: u32, limit: usize) -> CompileResult<Vec<Vec<u32>>> {
        self.distance(q1, q2)?;
        Ok(self.topology.shortest_paths(q1, q2, limit))
    }

    /// Instruction table entry, if present.
    pub fn gate_info(&self, name: &str) -> Option<&GateInfo> {
        self.gates.get(name)
    }

    /// Check if the instruction table has `name`.
    pub fn has_instruction(&self, name: &str) -> bool {
        self.gates.contains_key(name)
    }

    /// Whether MOVE can stand in for SWAP on this platform.
    pub fn supports_move(&self) -> bool {
        self.gates
            .get(MOVE)
            .is_some_and(|g| g.operands.is_none_or(|n| n == 2))
    }

    fn lookup(&self, name: &str, operand_count: usize) -> CompileResult<&GateInfo> {
        self.gates
            .get(name)
            .filter(|g| g.operands.is_none_or(|n| n == operand_count))
            .ok_or_else(|| CompileError::UnknownInstruction {
                name: name.to_string(),
                operands: operand_count,
            })
    }

    /// Duration in cycles of `name` applied to `operand_count` qubits.
    pub fn duration(&self, name: &str, operand_count: usize) -> CompileResult<u64> {
        self.lookup(name, operand_count).map(|g| g.duration)
    }

    /// Duration in cycles of a concrete instruction.
    ///
    /// An explicit override wins; waits and barriers take their own cycle
    /// count; everything else comes from the instruction table.
    pub fn instruction_duration(&self, instruction: &Instruction) -> CompileResult<u64> {
        if let Some(cycles) = instruction.duration {
            return Ok(cycles);
        }
        match &instruction.kind {
            InstructionKind::Wait { cycles, .. } => Ok(*cycles),
            _ => self.duration(&instruction.name, instruction.operand_count()),
        }
    }

    /// Table entry of a concrete instruction; `None` for waits and barriers.
    pub fn instruction_info(&self, instruction: &Instruction) -> CompileResult<Option<&GateInfo>> {
        match instruction.kind {
            InstructionKind::Wait { .. } => Ok(None),
            _ => self
                .lookup(&instruction.name, instruction.operand_count())
                .map(Some),
        }
    }

    /// Units an instruction named `name` needs on `qubit`: the qubit itself
    /// and, depending on its class, the qubit's drive or readout unit.
    pub fn resource_units_for(&self, qubit: u32, name: &str) -> CompileResult<Vec<ResourceUnit>> {
        self.check_qubit(qubit)?;
        let info = self.gates.get(name).ok_or_else(|| CompileError::UnknownInstruction {
            name: name.to_string(),
            operands: 1,
        })?;
        Ok(self.qubit_units(qubit, info.class))
    }

    fn qubit_units(&self, qubit: u32, class: ResourceClass) -> Vec<ResourceUnit> {
        let mut units = vec![];
        if self.qubit_resources {
            units.push(ResourceUnit::Qubit(qubit));
        }
        if class == ResourceClass::Drive && self.detunable[qubit as usize] {
            units.push(ResourceUnit::Detuned(qubit));
        }
        let unit = match class {
            ResourceClass::Drive => self
                .drive
                .as_ref()
                .and_then(|bank| bank.unit_of[qubit as usize])
                .map(ResourceUnit::Drive),
            ResourceClass::Readout => self
                .readout
                .as_ref()
                .and_then(|bank| bank.unit_of[qubit as usize])
                .map(ResourceUnit::Readout),
            ResourceClass::Flux | ResourceClass::None => None,
        };
        units.extend(unit);
        units
    }

    /// Coupler units a flux instruction named `name` needs on edge `q0-q1`.
    ///
    /// Empty when couplers are not modelled, when the qubits share no edge,
    /// or when the instruction is not a flux instruction.
    pub fn coupler_units_for(&self, q0: u32, q1: u32, name: &str) -> CompileResult<Vec<ResourceUnit>> {
        self.check_qubit(q0)?;
        self.check_qubit(q1)?;
        let info = self.lookup(name, 2)?;
        Ok(self.coupler_units(q0, q1, info.class))
    }

    fn coupler_units(&self, q0: u32, q1: u32, class: ResourceClass) -> Vec<ResourceUnit> {
        let Some(conflicts) = &self.coupler_conflicts else {
            return vec![];
        };
        if class != ResourceClass::Flux {
            return vec![];
        }
        let Some(&edge) = self.edge_ids.get(&(q0.min(q1), q0.max(q1))) else {
            return vec![];
        };
        let mut units = vec![ResourceUnit::Coupler(edge)];
        for &other in conflicts.get(&edge).into_iter().flatten() {
            units.push(ResourceUnit::CouplerPair(edge.min(other), edge.max(other)));
        }
        units
    }

    /// Qubits a flux instruction on edge `q0-q1` detunes while it runs.
    fn detuned_units(&self, q0: u32, q1: u32, class: ResourceClass) -> Vec<ResourceUnit> {
        if class != ResourceClass::Flux {
            return vec![];
        }
        self.edge_ids
            .get(&(q0.min(q1), q0.max(q1)))
            .and_then(|edge| self.detunes.get(edge))
            .map(|qubits| qubits.iter().map(|&q| ResourceUnit::Detuned(q)).collect())
            .unwrap_or_default()
    }

    /// Every unit a concrete instruction occupies for its whole duration.
    pub fn units_for_instruction(&self, instruction: &Instruction) -> CompileResult<Vec<ResourceUnit>> {
        let Some(info) = self.instruction_info(instruction)? else {
            return Ok(vec![]);
        };
        let mut units = vec![];
        for qubit in instruction.qubits() {
            self.check_qubit(qubit.0)?;
            units.extend(self.qubit_units(qubit.0, info.class));
        }
        if let InstructionKind::TwoQubit { qubits: [q0, q1] } = instruction.kind {
            units.extend(self.coupler_units(q0.0, q1.0, info.class));
            units.extend(self.detuned_units(q0.0, q1.0, info.class));
        }
        Ok(units)
    }

    /// How instructions like `info` share `unit`.
    ///
    /// Shared drive units serve overlapping runs of the same operation and
    /// shared readout units serve measurements starting together. A detuned
    /// qubit serves any number of overlapping flux pulses, or its own drive,
    /// but never both at once.
    pub fn unit_sharing(&self, unit: ResourceUnit, info: &GateInfo) -> Sharing {
        match unit {
            ResourceUnit::Drive(_) if self.drive.as_ref().is_some_and(|b| b.shared) => {
                Sharing::Tagged(info.id)
            }
            ResourceUnit::Readout(_) if self.readout.as_ref().is_some_and(|b| b.shared) => {
                Sharing::SameStart
            }
            ResourceUnit::Detuned(_) => Sharing::Tagged(info.class as u32),
            _ => Sharing::Exclusive,
        }
    }

    /// Resource class of a concrete instruction; waits and barriers have
    /// none.
    pub fn instruction_class(&self, instruction: &Instruction) -> CompileResult<ResourceClass> {
        Ok(self
            .instruction_info(instruction)?
            .map_or(ResourceClass::None, |info| info.class))
    }

    /// Idle cycles between a bundle holding a `from` instruction and a
    /// following bundle holding a `to` instruction.
    pub fn buffer_cycles(&self, from: ResourceClass, to: ResourceClass) -> u64 {
        self.buffers.get(&(from, to)).copied().unwrap_or(0)
    }

    /// Whether any buffer delay is configured.
    pub fn has_buffers(&self) -> bool {
        self.buffers.values().any(|&cycles| cycles > 0)
    }

    /// Number of instructions a unit can serve at once.
    pub fn unit_capacity(&self, unit: ResourceUnit) -> u32 {
        match unit {
            ResourceUnit::Drive(_) => self.drive.as_ref().map_or(1, |b| b.capacity),
            ResourceUnit::Readout(_) => self.readout.as_ref().map_or(1, |b| b.capacity),
            _ => 1,
        }
    }
}

/// Resource class for table entries that do not name one.
fn infer_class(name: &str, operands: Option<usize>) -> ResourceClass {
    if name.starts_with(MEASURE) {
        ResourceClass::Readout
    } else {
        match operands {
            Some(0) => ResourceClass::None,
            Some(2) => ResourceClass::Flux,
            _ => ResourceClass::Drive,
        }
    }
}
