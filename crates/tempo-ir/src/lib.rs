//! Tempo Kernel Intermediate Representation
//!
//! This crate provides the data structures consumed by the Tempo scheduling
//! and mapping core: instructions, kernels and programs.
//!
//! # Core Components
//!
//! - **Qubits and registers**: [`QubitId`], [`CregId`]
//! - **Instructions**: [`Instruction`], a name plus a closed [`InstructionKind`]
//!   (single-qubit, two-qubit, measurement, classical, wait/barrier) and an
//!   optional [`ClassicalCondition`]
//! - **Kernels**: [`Kernel`], a basic block compiled as one unit
//! - **Programs**: [`Program`], a tree of kernels, loops and branches
//!
//! # Example
//!
//! ```rust
//! use tempo_ir::{CregId, Kernel, QubitId};
//!
//! let mut kernel = Kernel::new("bell", 2, 2);
//! kernel.gate("h", QubitId(0)).unwrap();
//! kernel.cnot(QubitId(0), QubitId(1)).unwrap();
//! kernel.measure(QubitId(0), CregId(0)).unwrap();
//! kernel.measure(QubitId(1), CregId(1)).unwrap();
//!
//! assert_eq!(kernel.len(), 4);
//! ```

pub mod error;
pub mod instruction;
pub mod kernel;
pub mod program;
pub mod qubit;

pub use error::{IrError, IrResult};
pub use instruction::{BARRIER, ClassicalCondition, Instruction, InstructionKind, MEASURE, MOVE, SWAP, WAIT};
pub use kernel::{CircuitLevel, Kernel};
pub use program::{Program, Unit};
pub use qubit::{CregId, QubitId};
