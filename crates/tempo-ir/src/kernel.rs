//! Kernels: basic blocks of instructions compiled as one unit.

use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{ClassicalCondition, Instruction};
use crate::qubit::{CregId, QubitId};

/// How qubit operands of a kernel are to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitLevel {
    /// Operands name logical qubits (before mapping).
    #[default]
    Logical,
    /// Operands name physical qubits of the platform (after mapping).
    Physical,
}

/// A named, ordered list of instructions over a fixed set of qubits and
/// classical registers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kernel {
    name: String,
    num_qubits: u32,
    #[serde(default)]
    num_cregs: u32,
    #[serde(default)]
    level: CircuitLevel,
    instructions: Vec<Instruction>,
}

impl Kernel {
    /// Create an empty logical kernel.
    pub fn new(name: impl Into<String>, num_qubits: u32, num_cregs: u32) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_cregs,
            level: CircuitLevel::Logical,
            instructions: vec![],
        }
    }

    /// Create a kernel from an already decomposed instruction list.
    ///
    /// Operands are not validated here; the compiler reports out-of-range
    /// operands together with the offending instruction index.
    pub fn from_instructions(
        name: impl Into<String>,
        num_qubits: u32,
        num_cregs: u32,
        instructions: Vec<Instruction>,
    ) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_cregs,
            level: CircuitLevel::Logical,
            instructions,
        }
    }

    /// Set the circuit level.
    #[must_use]
    pub fn with_level(mut self, level: CircuitLevel) -> Self {
        self.level = level;
        self
    }

    /// Kernel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of qubits the operands range over.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Number of classical registers the operands range over.
    pub fn num_cregs(&self) -> u32 {
        self.num_cregs
    }

    /// Logical or physical operands.
    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    /// Instructions in program order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the kernel has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Consume the kernel and return its instructions.
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Append an instruction after validating its operands.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.check(&instruction)?;
        self.instructions.push(instruction);
        Ok(self)
    }

    /// Validate every instruction's operands against the declared counts.
    pub fn validate(&self) -> IrResult<()> {
        self.instructions.iter().try_for_each(|inst| self.check(inst))
    }

    fn check(&self, instruction: &Instruction) -> IrResult<()> {
        let gate_name = || Some(instruction.name.clone());
        let qubits = instruction.qubits();
        for (i, &qubit) in qubits.iter().enumerate() {
            if qubit.0 >= self.num_qubits {
                return Err(IrError::QubitOutOfRange {
                    qubit,
                    num_qubits: self.num_qubits,
                    gate_name: gate_name(),
                });
            }
            if qubits[..i].contains(&qubit) {
                return Err(IrError::DuplicateQubit {
                    qubit,
                    gate_name: gate_name(),
                });
            }
        }
        let cregs = instruction
            .written_cregs()
            .iter()
            .copied()
            .chain(instruction.condition_cregs());
        for creg in cregs {
            if creg.0 >= self.num_cregs {
                return Err(IrError::CregOutOfRange {
                    creg,
                    num_cregs: self.num_cregs,
                    gate_name: gate_name(),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Builder shorthands
    // =========================================================================

    /// Apply a named single-qubit gate.
    pub fn gate(&mut self, name: &str, qubit: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::single(name, qubit))
    }

    /// Apply a named two-qubit gate.
    pub fn gate2(&mut self, name: &str, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.apply(Instruction::two(name, q0, q1))
    }

    /// Apply a conditional single-qubit gate.
    pub fn gate_if(
        &mut self,
        name: &str,
        qubit: QubitId,
        condition: ClassicalCondition,
    ) -> IrResult<&mut Self> {
        self.apply(Instruction::single(name, qubit).with_condition(condition))
    }

    /// Apply a CNOT.
    pub fn cnot(&mut self, control: QubitId, target: QubitId) -> IrResult<&mut Self> {
        self.gate2("cnot", control, target)
    }

    /// Apply a CZ.
    pub fn cz(&mut self, q0: QubitId, q1: QubitId) -> IrResult<&mut Self> {
        self.gate2("cz", q0, q1)
    }

    /// Measure a qubit into a register.
    pub fn measure(&mut self, qubit: QubitId, creg: CregId) -> IrResult<&mut Self> {
        self.apply(Instruction::measure(qubit, creg))
    }

    /// Wait on the given qubits.
    pub fn wait(&mut self, qubits: &[QubitId], cycles: u64) -> IrResult<&mut Self> {
        self.apply(Instruction::wait(qubits.iter().copied(), cycles))
    }

    /// Fence the given qubits.
    pub fn barrier(&mut self, qubits: &[QubitId]) -> IrResult<&mut Self> {
        self.apply(Instruction::barrier(qubits.iter().copied()))
    }

    /// Fence every qubit and register.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        self.apply(Instruction::barrier([]))
    }

    /// Apply a classical operation.
    pub fn classical(&mut self, name: &str, cregs: &[CregId]) -> IrResult<&mut Self> {
        self.apply(Instruction::classical(name, cregs.iter().copied()))
    }
}
