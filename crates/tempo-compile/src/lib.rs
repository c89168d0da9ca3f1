//! Tempo Scheduling and Mapping Core
//!
//! This crate turns kernels of the Tempo IR into timed, hardware-legal
//! instruction streams for a described platform. It implements the same
//! pass-based architecture as an LLVM-style pipeline: a [`PassManager`] runs
//! routing, scheduling and verification passes over a kernel, sharing state
//! through a [`PropertySet`].
//!
//! # Overview
//!
//! Compiling a kernel:
//! 1. **Routing**: map logical qubits onto the platform topology, inserting
//!    swaps (or moves) so every two-qubit gate acts on coupled qubits
//! 2. **Scheduling**: build the dependency graph and assign start cycles,
//!    ASAP, ALAP or uniformly, under the platform's resource constraints
//! 3. **Verification**: re-check dependencies, resources and connectivity
//!
//! # Architecture
//!
//! ```text
//! Platform (JSON / YAML)         Kernel / Program
//!       │                              │
//!       ▼                              ▼
//! ┌──────────┐     ┌──────────────────────────────┐
//! │ Platform │ ──► │ Compiler                     │
//! └──────────┘     │  └─ PassManager ◄── PropertySet
//!                  │       ├── RoutingPass        │
//!                  │       ├── SchedulingPass     │
//!                  │       └── ScheduleVerification
//!                  └──────────────────────────────┘
//!                                  │
//!                                  ▼
//!                    CompiledKernel / CompiledProgram
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tempo_compile::{Compiler, CompilerConfig, Platform};
//! use tempo_ir::{CregId, Kernel, QubitId};
//!
//! let platform = Arc::new(Platform::linear(3).unwrap());
//! let compiler = Compiler::new(platform, CompilerConfig::default()).unwrap();
//!
//! let mut kernel = Kernel::new("bell", 3, 1);
//! kernel.gate("h", QubitId(0)).unwrap();
//! kernel.cnot(QubitId(0), QubitId(1)).unwrap();
//! kernel.measure(QubitId(1), CregId(0)).unwrap();
//!
//! let compiled = compiler.compile_kernel(&kernel).unwrap();
//! // h (1) + cnot (2) + measure (15)
//! assert_eq!(compiled.makespan(), 18);
//! ```
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait to add a compilation pass:
//!
//! ```rust
//! use tempo_compile::{CompileResult, Pass, PassKind, PropertySet};
//! use tempo_ir::Kernel;
//!
//! struct CountGates;
//!
//! impl Pass for CountGates {
//!     fn name(&self) -> &str { "count_gates" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&self, kernel: &mut Kernel, props: &mut PropertySet) -> CompileResult<()> {
//!         props.insert(kernel.len());
//!         Ok(())
//!     }
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod depgraph;
pub mod error;
pub mod manager;
pub mod mapper;
pub mod pass;
pub mod passes;
pub mod platform;
pub mod property;
pub mod resource;
pub mod scheduler;

pub use compiler::{CompiledKernel, CompiledProgram, CompiledUnit, Compiler};
pub use config::CompilerConfig;
pub use depgraph::{DepKind, Dependency, DependencyGraph, Operand};
pub use error::{CompileError, CompileResult};
pub use manager::{PassManager, PassManagerBuilder};
pub use mapper::{MappedKernel, Mapper, MapperConfig, MapperKind, Virt2Real};
pub use pass::{Pass, PassKind};
pub use platform::{Platform, PlatformConfig, ResourceUnit};
pub use property::{PropertySet, RoutingStats};
pub use resource::{ResourceModel, ResourceRequest};
pub use scheduler::{Direction, ListScheduler, Schedule, SchedulerConfig, TieBreak};
