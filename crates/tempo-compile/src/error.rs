//! Error types for the compilation crate.

use thiserror::Error;

/// Errors that can occur during platform loading and kernel compilation.
///
/// None of these are recovered inside the crate: each one aborts the
/// current kernel and is handed to the caller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] tempo_ir::IrError),

    /// Malformed platform or compiler configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// JSON configuration could not be parsed.
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration could not be parsed.
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// An instruction references a qubit or register outside the kernel.
    #[error("Instruction {index} references unresolved operand {operand}")]
    UnresolvedOperand {
        /// Index of the offending instruction in its kernel.
        index: usize,
        /// The operand, formatted.
        operand: String,
    },

    /// A physical qubit index outside the platform.
    #[error("Qubit {qubit} is not part of the {num_qubits}-qubit platform")]
    InvalidQubit {
        /// The offending qubit.
        qubit: u32,
        /// Number of qubits on the platform.
        num_qubits: u32,
    },

    /// No platform entry for the instruction.
    #[error("Unknown instruction '{name}' with {operands} operand(s)")]
    UnknownInstruction {
        /// Instruction name.
        name: String,
        /// Operand count used for the lookup.
        operands: usize,
    },

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle through instruction {node}")]
    MalformedGraph {
        /// An instruction on the cycle.
        node: usize,
    },

    /// A commit was attempted on occupied resources.
    #[error("Resource conflict: instruction {op} cannot occupy {unit} at cycle {cycle}")]
    ResourceConflict {
        /// The instruction being committed.
        op: usize,
        /// First conflicting cycle.
        cycle: u64,
        /// The occupied resource unit, formatted.
        unit: String,
    },

    /// Two qubits are not connected on the topology.
    #[error("Qubits {from} and {to} are not connected")]
    Unreachable {
        /// Source qubit.
        from: u32,
        /// Destination qubit.
        to: u32,
    },

    /// The kernel needs more qubits than the platform has.
    #[error("Kernel requires {required} qubits but platform only has {available}")]
    KernelTooLarge {
        /// Qubits used by the kernel.
        required: u32,
        /// Qubits on the platform.
        available: u32,
    },

    /// A component was driven outside its state machine.
    #[error("{component} cannot run in state {state}")]
    InvalidState {
        /// The component.
        component: &'static str,
        /// The state it was in.
        state: String,
    },

    /// A pass needs a platform but none was provided.
    #[error("Missing platform")]
    MissingPlatform,

    /// A pass needs a schedule but no scheduling pass ran.
    #[error("Missing schedule")]
    MissingSchedule,

    /// A produced schedule failed a verification check.
    #[error("Verification '{check}' failed at instruction {index}: {detail}")]
    VerificationFailed {
        /// Name of the failed check.
        check: &'static str,
        /// Offending instruction.
        index: usize,
        /// What went wrong.
        detail: String,
    },

    /// An error raised while compiling a named kernel.
    #[error("Kernel '{kernel}': {source}")]
    Kernel {
        /// Kernel name.
        kernel: String,
        /// The underlying error.
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Attach the kernel name, unless already attached.
    pub fn in_kernel(self, kernel: &str) -> Self {
        match self {
            err @ CompileError::Kernel { .. } => err,
            err => CompileError::Kernel {
                kernel: kernel.to_string(),
                source: Box::new(err),
            },
        }
    }

    /// The error without kernel context.
    pub fn root(&self) -> &CompileError {
        match self {
            CompileError::Kernel { source, .. } => source.root(),
            err => err,
        }
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;
