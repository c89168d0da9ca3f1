//! Serializable platform description.
//!
//! A [`PlatformConfig`] is the already-loaded description of a device. It is
//! checked and turned into an immutable [`Platform`](super::Platform) by
//! [`Platform::new`](super::Platform::new).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

fn default_cycle_time_ns() -> u64 {
    20
}

fn default_capacity() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// How an instruction uses one of its operands, for dependency analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Changes the operand; orders against everything.
    Write,
    /// Reads the operand in the Z basis; reads commute with each other.
    Read,
    /// Acts on the operand in the X basis (e.g. a CNOT target); such
    /// operations commute with each other.
    Commute,
}

/// Which shared hardware an instruction drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Microwave drive through the qubit's drive unit.
    Drive,
    /// Flux pulse through the coupler between two qubits.
    Flux,
    /// Readout through the qubit's readout unit.
    Readout,
    /// Only the qubits themselves.
    None,
}

/// One entry of the instruction table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionConfig {
    /// Duration in nanoseconds, rounded up to whole cycles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ns: Option<u64>,
    /// Duration in cycles; takes precedence over `duration_ns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_cycles: Option<u64>,
    /// Expected number of qubit operands, if fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operands: Option<usize>,
    /// Resource class; inferred from name and arity when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_class: Option<ResourceClass>,
    /// Per-operand access; missing entries are `write`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signature: Vec<Access>,
    /// Leaves its qubit in the ground state.
    #[serde(default)]
    pub initializes: bool,
}

impl InstructionConfig {
    fn cycles(cycles: u64, operands: usize, class: ResourceClass) -> Self {
        Self {
            duration_cycles: Some(cycles),
            operands: Some(operands),
            resource_class: Some(class),
            ..Self::default()
        }
    }

    fn ns(ns: u64, operands: usize, class: ResourceClass) -> Self {
        Self {
            duration_ns: Some(ns),
            operands: Some(operands),
            resource_class: Some(class),
            ..Self::default()
        }
    }

    #[must_use]
    fn with_signature(mut self, signature: &[Access]) -> Self {
        self.signature = signature.to_vec();
        self
    }
}

/// A topology edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Edge id used by coupler conflicts; defaults to the list position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// One endpoint.
    pub src: u32,
    /// Other endpoint.
    pub dst: u32,
}

/// Connectivity section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Undirected edges.
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
}

/// A bank of shared units (drive lines or readout units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Number of units.
    pub count: u32,
    /// Instructions one unit can serve concurrently.
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Unit index to the qubits it serves.
    pub connection_map: BTreeMap<u32, Vec<u32>>,
    /// Let overlapping instructions share a unit: on drive units when they
    /// run the same operation, on readout units when they start in the same
    /// cycle. A shared bank has capacity 1.
    #[serde(default)]
    pub shared: bool,
}

impl UnitConfig {
    /// An unshared bank of `count` units of capacity 1.
    pub fn new(count: u32, connection_map: BTreeMap<u32, Vec<u32>>) -> Self {
        Self {
            count,
            capacity: 1,
            connection_map,
            shared: false,
        }
    }

    /// Set the per-unit capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Mark the bank as shared.
    #[must_use]
    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }
}

/// Coupler section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouplerConfig {
    /// Edge id to the edges that cannot run a flux pulse at the same time.
    #[serde(default)]
    pub conflicts: BTreeMap<u32, Vec<u32>>,
}

/// Resource section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Each qubit runs one instruction at a time.
    #[serde(default = "default_true")]
    pub qubits: bool,
    /// Shared drive units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_units: Option<UnitConfig>,
    /// Shared readout units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readout_units: Option<UnitConfig>,
    /// Couplers, one per edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub couplers: Option<CouplerConfig>,
    /// Edge id to the qubits a flux pulse on that edge detunes. A detuned
    /// qubit cannot be driven while the pulse lasts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detuned_qubits: Option<BTreeMap<u32, Vec<u32>>>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            qubits: true,
            drive_units: None,
            readout_units: None,
            couplers: None,
            detuned_qubits: None,
        }
    }
}

/// Idle time inserted between a bundle holding `from` instructions and the
/// next bundle holding `to` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Class in the earlier bundle.
    pub from: ResourceClass,
    /// Class in the later bundle.
    pub to: ResourceClass,
    /// Delay in nanoseconds, rounded up to whole cycles.
    pub duration_ns: u64,
}

/// Complete platform description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Platform name.
    pub name: String,
    /// Number of physical qubits.
    pub qubit_count: u32,
    /// Length of one cycle in nanoseconds.
    #[serde(default = "default_cycle_time_ns")]
    pub cycle_time_ns: u64,
    /// Connectivity.
    #[serde(default)]
    pub topology: TopologyConfig,
    /// Instruction table.
    #[serde(default = "default_instructions")]
    pub instructions: BTreeMap<String, InstructionConfig>,
    /// Shared resources.
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Delays between bundles of different classes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<BufferConfig>,
}

/// The built-in instruction table, for a 20 ns cycle.
pub fn default_instructions() -> BTreeMap<String, InstructionConfig> {
    use Access::{Commute, Read};
    use ResourceClass::{Drive, Flux, Readout};

    let mut table = BTreeMap::new();
    for name in ["i", "x", "y", "h", "rx", "ry", "x90", "y90", "mx90", "my90"] {
        table.insert(name.to_string(), InstructionConfig::ns(20, 1, Drive));
    }
    for name in ["z", "s", "sdag", "t", "tdag", "rz"] {
        table.insert(
            name.to_string(),
            InstructionConfig::ns(20, 1, Drive).with_signature(&[Read]),
        );
    }
    table.insert(
        "prepz".to_string(),
        InstructionConfig {
            initializes: true,
            ..InstructionConfig::ns(200, 1, ResourceClass::None)
        },
    );
    table.insert("measure".to_string(), InstructionConfig::ns(300, 1, Readout));
    table.insert(
        "cnot".to_string(),
        InstructionConfig::ns(40, 2, Flux).with_signature(&[Read, Commute]),
    );
    table.insert(
        "cz".to_string(),
        InstructionConfig::ns(40, 2, Flux).with_signature(&[Read, Read]),
    );
    table.insert("swap".to_string(), InstructionConfig::ns(120, 2, Flux));
    table.insert("move".to_string(), InstructionConfig::ns(80, 2, Flux));
    for name in ["ldi", "not", "and", "or", "xor", "add"] {
        table.insert(
            name.to_string(),
            InstructionConfig::cycles(1, 0, ResourceClass::None),
        );
    }
    table
}

impl PlatformConfig {
    /// A platform with no edges and the built-in instruction table.
    pub fn new(name: impl Into<String>, qubit_count: u32) -> Self {
        Self {
            name: name.into(),
            qubit_count,
            cycle_time_ns: default_cycle_time_ns(),
            topology: TopologyConfig::default(),
            instructions: default_instructions(),
            resources: ResourcesConfig::default(),
            buffers: vec![],
        }
    }

    /// Parse a JSON description.
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a YAML description.
    pub fn from_yaml_str(yaml: &str) -> CompileResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Add an undirected edge.
    #[must_use]
    pub fn with_edge(mut self, src: u32, dst: u32) -> Self {
        self.topology.edges.push(EdgeConfig { id: None, src, dst });
        self
    }

    /// Replace the resource section.
    #[must_use]
    pub fn with_resources(mut self, resources: ResourcesConfig) -> Self {
        self.resources = resources;
        self
    }

    /// Add a delay between bundles of two classes.
    #[must_use]
    pub fn with_buffer(mut self, from: ResourceClass, to: ResourceClass, duration_ns: u64) -> Self {
        self.buffers.push(BufferConfig {
            from,
            to,
            duration_ns,
        });
        self
    }

    /// Add or replace an instruction table entry.
    #[must_use]
    pub fn with_instruction(mut self, name: impl Into<String>, entry: InstructionConfig) -> Self {
        self.instructions.insert(name.into(), entry);
        self
    }

    /// Linear chain `0 - 1 - ... - (n-1)`.
    pub fn linear(n: u32) -> Self {
        (0..n.saturating_sub(1)).fold(Self::new(format!("linear{n}"), n), |cfg, i| {
            cfg.with_edge(i, i + 1)
        })
    }

    /// `width x height` grid, row-major numbering.
    pub fn grid(width: u32, height: u32) -> Self {
        let mut cfg = Self::new(format!("grid{width}x{height}"), width * height);
        for row in 0..height {
            for col in 0..width {
                let q = row * width + col;
                if col + 1 < width {
                    cfg = cfg.with_edge(q, q + 1);
                }
                if row + 1 < height {
                    cfg = cfg.with_edge(q, q + width);
                }
            }
        }
        cfg
    }

    /// Star with qubit 0 in the center.
    pub fn star(n: u32) -> Self {
        (1..n).fold(Self::new(format!("star{n}"), n), |cfg, i| cfg.with_edge(0, i))
    }

    /// Check the description for internal consistency.
    pub fn validate(&self) -> CompileResult<()> {
        let err = |msg: String| Err(CompileError::Configuration(msg));

        if self.qubit_count == 0 {
            return err("qubit_count must be positive".into());
        }
        if self.cycle_time_ns == 0 {
            return err("cycle_time_ns must be positive".into());
        }

        let mut ids = vec![];
        for (pos, edge) in self.topology.edges.iter().enumerate() {
            if edge.src >= self.qubit_count || edge.dst >= self.qubit_count {
                return err(format!(
                    "edge {}-{} names a qubit outside 0..{}",
                    edge.src, edge.dst, self.qubit_count
                ));
            }
            if edge.src == edge.dst {
                return err(format!("edge {}-{} is a self loop", edge.src, edge.dst));
            }
            let id = edge.id.unwrap_or(pos as u32);
            if ids.contains(&id) {
                return err(format!("duplicate edge id {id}"));
            }
            ids.push(id);
        }

        for (name, entry) in &self.instructions {
            if entry.duration_ns.is_none() && entry.duration_cycles.is_none() {
                return err(format!("instruction '{name}' has no duration"));
            }
            if let Some(n) = entry.operands {
                if !entry.signature.is_empty() && entry.signature.len() != n {
                    return err(format!(
                        "instruction '{name}' has {n} operands but a signature of {}",
                        entry.signature.len()
                    ));
                }
            }
        }

        for (label, units) in [
            ("drive_units", &self.resources.drive_units),
            ("readout_units", &self.resources.readout_units),
        ] {
            let Some(units) = units else { continue };
            if units.capacity == 0 {
                return err(format!("{label} capacity must be positive"));
            }
            if units.shared && units.capacity != 1 {
                return err(format!("{label}: a shared bank has capacity 1"));
            }
            let mut assigned = vec![false; self.qubit_count as usize];
            for (&unit, qubits) in &units.connection_map {
                if unit >= units.count {
                    return err(format!("{label}: unit {unit} exceeds count {}", units.count));
                }
                for &q in qubits {
                    let Some(slot) = assigned.get_mut(q as usize) else {
                        return err(format!("{label}: unit {unit} names unknown qubit {q}"));
                    };
                    if *slot {
                        return err(format!("{label}: qubit {q} is served by two units"));
                    }
                    *slot = true;
                }
            }
        }

        if let Some(couplers) = &self.resources.couplers {
            for (edge, others) in &couplers.conflicts {
                for id in std::iter::once(edge).chain(others) {
                    if !ids.contains(id) {
                        return err(format!("coupler conflict names unknown edge {id}"));
                    }
                }
            }
        }

        if let Some(detuned) = &self.resources.detuned_qubits {
            for (edge, qubits) in detuned {
                if !ids.contains(edge) {
                    return err(format!("detuned_qubits names unknown edge {edge}"));
                }
                if let Some(q) = qubits.iter().find(|&&q| q >= self.qubit_count) {
                    return err(format!("edge {edge} detunes unknown qubit {q}"));
                }
            }
        }

        let mut pairs = vec![];
        for buffer in &self.buffers {
            if buffer.from == ResourceClass::None || buffer.to == ResourceClass::None {
                return err("buffers only apply between drive, flux and readout".into());
            }
            let pair = (buffer.from, buffer.to);
            if pairs.contains(&pair) {
                return err(format!("duplicate buffer {:?} -> {:?}", buffer.from, buffer.to));
            }
            pairs.push(pair);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let cfg = PlatformConfig::from_json_str(r#"{ "name": "tiny", "qubit_count": 2 }"#).unwrap();
        assert_eq!(cfg.cycle_time_ns, 20);
        assert!(cfg.resources.qubits);
        assert!(cfg.instructions.contains_key("cnot"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_yaml_description() {
        let yaml = "
name: yaml-chip
qubit_count: 3
cycle_time_ns: 10
topology:
  edges:
    - { src: 0, dst: 1 }
    - { src: 1, dst: 2 }
instructions:
  x: { duration_ns: 25, operands: 1 }
  cz: { duration_cycles: 4, operands: 2, resource_class: flux, signature: [read, read] }
";
        let cfg = PlatformConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.topology.edges.len(), 2);
        assert_eq!(cfg.instructions["cz"].signature, vec![Access::Read, Access::Read]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_grid_edges() {
        let cfg = PlatformConfig::grid(3, 2);
        assert_eq!(cfg.qubit_count, 6);
        // 2 rows x 2 horizontal + 3 vertical
        assert_eq!(cfg.topology.edges.len(), 7);
    }

    #[test]
    fn test_rejects_bad_edge() {
        let cfg = PlatformConfig::linear(3).with_edge(2, 5);
        assert!(matches!(cfg.validate(), Err(CompileError::Configuration(_))));
    }

    #[test]
    fn test_rejects_missing_duration() {
        let cfg = PlatformConfig::linear(2).with_instruction("mystery", InstructionConfig::default());
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("mystery"));
    }

    #[test]
    fn test_rejects_qubit_on_two_units() {
        let units = UnitConfig::new(2, BTreeMap::from([(0, vec![0, 1]), (1, vec![1])]));
        let cfg = PlatformConfig::linear(2).with_resources(ResourcesConfig {
            readout_units: Some(units),
            ..ResourcesConfig::default()
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let units = UnitConfig::new(1, BTreeMap::from([(0, vec![0])])).with_capacity(0);
        let cfg = PlatformConfig::linear(2).with_resources(ResourcesConfig {
            drive_units: Some(units),
            ..ResourcesConfig::default()
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_shared_bank_needs_capacity_one() {
        let units = UnitConfig::new(1, BTreeMap::from([(0, vec![0, 1])]))
            .with_capacity(2)
            .shared();
        let cfg = PlatformConfig::linear(2).with_resources(ResourcesConfig {
            drive_units: Some(units),
            ..ResourcesConfig::default()
        });
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("capacity 1"));
    }

    #[test]
    fn test_detuned_qubits_checked() {
        let resources = |detuned| ResourcesConfig {
            detuned_qubits: Some(BTreeMap::from([detuned])),
            ..ResourcesConfig::default()
        };
        assert!(PlatformConfig::linear(3).with_resources(resources((0, vec![2]))).validate().is_ok());
        assert!(PlatformConfig::linear(3).with_resources(resources((7, vec![2]))).validate().is_err());
        assert!(PlatformConfig::linear(3).with_resources(resources((1, vec![3]))).validate().is_err());
    }

    #[test]
    fn test_buffers_from_yaml() {
        let yaml = "
name: buffered
qubit_count: 2
topology:
  edges:
    - { src: 0, dst: 1 }
buffers:
  - { from: drive, to: flux, duration_ns: 30 }
  - { from: flux, to: readout, duration_ns: 20 }
";
        let cfg = PlatformConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.buffers.len(), 2);
        assert_eq!(cfg.buffers[0].from, ResourceClass::Drive);
        assert!(cfg.validate().is_ok());

        let dup = cfg.clone().with_buffer(ResourceClass::Drive, ResourceClass::Flux, 10);
        assert!(dup.validate().is_err());
        let none = cfg.with_buffer(ResourceClass::None, ResourceClass::Flux, 10);
        assert!(none.validate().is_err());
    }
}
