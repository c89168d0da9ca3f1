//! Kernel instructions.
//!
//! Instructions are a closed set of categories. The category decides which
//! operands an instruction carries; the instruction name is only used by the
//! platform to look up durations and resource classes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::qubit::{CregId, QubitId};

/// Name used for routing SWAPs.
pub const SWAP: &str = "swap";
/// Name used for routing MOVEs.
pub const MOVE: &str = "move";
/// Name used for full ordering fences.
pub const BARRIER: &str = "barrier";
/// Name used for explicit waits.
pub const WAIT: &str = "wait";
/// Name used for measurements.
pub const MEASURE: &str = "measure";

/// The category of an instruction together with its operands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// A gate on one qubit.
    SingleQubit {
        /// Target qubit.
        qubit: QubitId,
    },
    /// A gate on two qubits. Operand order is significant (control, target).
    TwoQubit {
        /// Operand qubits.
        qubits: [QubitId; 2],
    },
    /// Measurement of a qubit, optionally into a classical register.
    Measure {
        /// Measured qubit.
        qubit: QubitId,
        /// Destination register.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        creg: Option<CregId>,
    },
    /// A classical operation writing the given registers.
    Classical {
        /// Registers written by the operation.
        cregs: Vec<CregId>,
    },
    /// A wait of a fixed number of cycles, fencing the given qubits.
    ///
    /// An empty qubit list fences every qubit and register of the kernel.
    /// A wait of zero cycles is a barrier.
    Wait {
        /// Fenced qubits, empty for all.
        qubits: Vec<QubitId>,
        /// Wait duration in cycles.
        cycles: u64,
    },
}

/// A read-only predicate over classical registers gating an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicalCondition {
    /// Execute when the register is set.
    Unary(CregId),
    /// Execute when the register is clear.
    Not(CregId),
    /// Execute when both registers are set.
    And(CregId, CregId),
    /// Execute when either register is set.
    Or(CregId, CregId),
    /// Execute when exactly one register is set.
    Xor(CregId, CregId),
}

impl ClassicalCondition {
    /// Registers read by the predicate.
    pub fn registers(&self) -> Vec<CregId> {
        match *self {
            Self::Unary(c) | Self::Not(c) => vec![c],
            Self::And(a, b) | Self::Or(a, b) | Self::Xor(a, b) => vec![a, b],
        }
    }
}

impl fmt::Display for ClassicalCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary(c) => write!(f, "{c}"),
            Self::Not(c) => write!(f, "!{c}"),
            Self::And(a, b) => write!(f, "{a} & {b}"),
            Self::Or(a, b) => write!(f, "{a} | {b}"),
            Self::Xor(a, b) => write!(f, "{a} ^ {b}"),
        }
    }
}

/// A complete instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Instruction name, resolved against the platform's instruction table.
    pub name: String,
    /// Category and operands.
    pub kind: InstructionKind,
    /// Optional classical predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ClassicalCondition>,
    /// Optional duration in cycles overriding the platform's table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl Instruction {
    fn with_kind(name: impl Into<String>, kind: InstructionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            condition: None,
            duration: None,
        }
    }

    /// Create a single-qubit gate.
    pub fn single(name: impl Into<String>, qubit: QubitId) -> Self {
        Self::with_kind(name, InstructionKind::SingleQubit { qubit })
    }

    /// Create a two-qubit gate.
    pub fn two(name: impl Into<String>, q0: QubitId, q1: QubitId) -> Self {
        Self::with_kind(name, InstructionKind::TwoQubit { qubits: [q0, q1] })
    }

    /// Create a measurement writing `creg`.
    pub fn measure(qubit: QubitId, creg: CregId) -> Self {
        Self::with_kind(
            MEASURE,
            InstructionKind::Measure {
                qubit,
                creg: Some(creg),
            },
        )
    }

    /// Create a measurement whose result is not stored in a register.
    pub fn measure_discard(qubit: QubitId) -> Self {
        Self::with_kind(MEASURE, InstructionKind::Measure { qubit, creg: None })
    }

    /// Create a classical operation.
    pub fn classical(name: impl Into<String>, cregs: impl IntoIterator<Item = CregId>) -> Self {
        Self::with_kind(
            name,
            InstructionKind::Classical {
                cregs: cregs.into_iter().collect(),
            },
        )
    }

    /// Create a wait on the given qubits (all qubits when empty).
    pub fn wait(qubits: impl IntoIterator<Item = QubitId>, cycles: u64) -> Self {
        Self::with_kind(
            WAIT,
            InstructionKind::Wait {
                qubits: qubits.into_iter().collect(),
                cycles,
            },
        )
    }

    /// Create a barrier on the given qubits (all qubits when empty).
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self::with_kind(
            BARRIER,
            InstructionKind::Wait {
                qubits: qubits.into_iter().collect(),
                cycles: 0,
            },
        )
    }

    /// Attach a classical condition.
    #[must_use]
    pub fn with_condition(mut self, condition: ClassicalCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Override the platform duration.
    #[must_use]
    pub fn with_duration(mut self, cycles: u64) -> Self {
        self.duration = Some(cycles);
        self
    }

    /// Qubit operands in operand order.
    pub fn qubits(&self) -> &[QubitId] {
        match &self.kind {
            InstructionKind::SingleQubit { qubit } | InstructionKind::Measure { qubit, .. } => {
                std::slice::from_ref(qubit)
            }
            InstructionKind::TwoQubit { qubits } => qubits,
            InstructionKind::Classical { .. } => &[],
            InstructionKind::Wait { qubits, .. } => qubits,
        }
    }

    /// Registers written by this instruction.
    pub fn written_cregs(&self) -> &[CregId] {
        match &self.kind {
            InstructionKind::Measure { creg, .. } => creg.as_slice(),
            InstructionKind::Classical { cregs } => cregs,
            _ => &[],
        }
    }

    /// Registers read by this instruction's condition.
    pub fn condition_cregs(&self) -> Vec<CregId> {
        self.condition
            .as_ref()
            .map(ClassicalCondition::registers)
            .unwrap_or_default()
    }

    /// Number of operands used to look up the platform duration.
    pub fn operand_count(&self) -> usize {
        self.qubits().len()
    }

    /// Whether this is a two-qubit gate.
    pub fn is_two_qubit(&self) -> bool {
        matches!(self.kind, InstructionKind::TwoQubit { .. })
    }

    /// Whether this instruction fences its qubits.
    pub fn is_fence(&self) -> bool {
        matches!(self.kind, InstructionKind::Wait { .. })
    }

    /// Whether this fence covers every qubit and register.
    pub fn is_global_fence(&self) -> bool {
        matches!(&self.kind, InstructionKind::Wait { qubits, .. } if qubits.is_empty())
    }

    /// Whether this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure { .. })
    }

    /// Produce a copy with every qubit operand passed through `f`.
    ///
    /// The original is left untouched; name, condition and duration are kept.
    pub fn try_remap<E>(
        &self,
        mut f: impl FnMut(QubitId) -> Result<QubitId, E>,
    ) -> Result<Instruction, E> {
        let kind = match &self.kind {
            InstructionKind::SingleQubit { qubit } => {
                InstructionKind::SingleQubit { qubit: f(*qubit)? }
            }
            InstructionKind::TwoQubit { qubits: [q0, q1] } => InstructionKind::TwoQubit {
                qubits: [f(*q0)?, f(*q1)?],
            },
            InstructionKind::Measure { qubit, creg } => InstructionKind::Measure {
                qubit: f(*qubit)?,
                creg: *creg,
            },
            InstructionKind::Classical { cregs } => InstructionKind::Classical {
                cregs: cregs.clone(),
            },
            InstructionKind::Wait { qubits, cycles } => InstructionKind::Wait {
                qubits: qubits.iter().map(|&q| f(q)).collect::<Result<_, _>>()?,
                cycles: *cycles,
            },
        };
        Ok(Instruction {
            name: self.name.clone(),
            kind,
            condition: self.condition.clone(),
            duration: self.duration,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(condition) = &self.condition {
            write!(f, "cond({condition}) ")?;
        }
        write!(f, "{}", self.name)?;
        let mut operands: Vec<String> = self.qubits().iter().map(ToString::to_string).collect();
        operands.extend(self.written_cregs().iter().map(ToString::to_string));
        if let InstructionKind::Wait { cycles, .. } = self.kind {
            if cycles > 0 {
                operands.push(cycles.to_string());
            }
        }
        if !operands.is_empty() {
            write!(f, " {}", operands.join(", "))?;
        }
        Ok(())
    }
}
