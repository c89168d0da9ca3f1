//! Error types for the IR crate.

use crate::qubit::{CregId, QubitId};
use thiserror::Error;

/// Errors that can occur while building kernels and programs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// Qubit index outside the kernel's declared qubit count.
    #[error("Qubit {qubit} out of range for {num_qubits} qubits{}", format_gate_context(.gate_name))]
    QubitOutOfRange {
        /// The offending qubit.
        qubit: QubitId,
        /// Declared number of qubits.
        num_qubits: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Classical register index outside the kernel's declared register count.
    #[error("Register {creg} out of range for {num_cregs} registers{}", format_gate_context(.gate_name))]
    CregOutOfRange {
        /// The offending register.
        creg: CregId,
        /// Declared number of registers.
        num_cregs: u32,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Duplicate qubit in operation.
    #[error("Duplicate qubit {qubit} in operation{}", format_gate_context(.gate_name))]
    DuplicateQubit {
        /// The duplicate qubit.
        qubit: QubitId,
        /// Optional gate name for context.
        gate_name: Option<String>,
    },

    /// Two kernels of one program share a name.
    #[error("Duplicate kernel name '{0}'")]
    DuplicateKernel(String),

    /// A loop unit that would never execute its body.
    #[error("Loop '{0}' must iterate at least once")]
    EmptyLoop(String),
}

/// Helper function to format optional gate context.
#[allow(clippy::ref_option)]
fn format_gate_context(gate_name: &Option<String>) -> String {
    match gate_name {
        Some(name) => format!(" (gate: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
