//! Compiler driver: kernels and whole programs.

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tempo_ir::{Kernel, Program, Unit};
use tracing::{info, instrument};

use crate::config::CompilerConfig;
use crate::error::{CompileError, CompileResult};
use crate::manager::PassManagerBuilder;
use crate::mapper::MappedKernel;
use crate::platform::Platform;
use crate::scheduler::Schedule;

/// A compiled kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledKernel {
    /// Schedule of the kernel that was finally emitted.
    pub schedule: Schedule,
    /// Routing result, when the kernel was routed.
    pub mapping: Option<MappedKernel>,
}

impl CompiledKernel {
    /// Kernel name.
    pub fn name(&self) -> &str {
        self.schedule.kernel()
    }

    /// Cycles the kernel occupies.
    pub fn makespan(&self) -> u64 {
        self.schedule.makespan()
    }
}

/// A compiled program unit with its fixed duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompiledUnit {
    /// A kernel, by position in [`CompiledProgram::kernels`].
    Kernel {
        /// Kernel name.
        name: String,
        /// Position in the program's kernel list.
        index: usize,
        /// Makespan of the kernel.
        duration: u64,
    },
    /// A loop occupying `iterations` times its body.
    Loop {
        /// Loop label.
        name: String,
        /// Number of iterations.
        iterations: u64,
        /// Compiled body.
        body: Vec<CompiledUnit>,
        /// Total cycles.
        duration: u64,
    },
    /// A branch occupying its longer arm.
    Branch {
        /// Branch label.
        name: String,
        /// Compiled `then` arm.
        then_body: Vec<CompiledUnit>,
        /// Compiled `else` arm.
        else_body: Vec<CompiledUnit>,
        /// Total cycles.
        duration: u64,
    },
}

impl CompiledUnit {
    /// Cycles the unit occupies.
    pub fn duration(&self) -> u64 {
        match self {
            CompiledUnit::Kernel { duration, .. }
            | CompiledUnit::Loop { duration, .. }
            | CompiledUnit::Branch { duration, .. } => *duration,
        }
    }
}

/// A compiled program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Program name.
    pub name: String,
    /// Compiled kernels, depth first in program order.
    pub kernels: Vec<CompiledKernel>,
    /// Unit tree mirroring the program.
    pub units: Vec<CompiledUnit>,
}

impl CompiledProgram {
    /// Total cycles of the top-level units.
    pub fn duration(&self) -> u64 {
        total(&self.units)
    }
}

fn total(units: &[CompiledUnit]) -> u64 {
    units.iter().map(CompiledUnit::duration).sum()
}

/// Compiles kernels and programs for one platform with one configuration.
///
/// ```
/// use std::sync::Arc;
/// use tempo_compile::{Compiler, CompilerConfig, Platform};
/// use tempo_ir::{Kernel, QubitId};
///
/// let compiler = Compiler::new(Arc::new(Platform::linear(4).unwrap()), CompilerConfig::default()).unwrap();
///
/// let mut kernel = Kernel::new("main", 4, 0);
/// kernel.cnot(QubitId(0), QubitId(3)).unwrap();
///
/// let compiled = compiler.compile_kernel(&kernel).unwrap();
/// assert_eq!(compiled.mapping.unwrap().swaps, 2);
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    platform: Arc<Platform>,
    config: CompilerConfig,
}

impl Compiler {
    /// Create a compiler; the configuration is validated here.
    pub fn new(platform: Arc<Platform>, config: CompilerConfig) -> CompileResult<Self> {
        config.validate()?;
        Ok(Self { platform, config })
    }

    /// The target platform.
    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// The configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Route (unless disabled), schedule and verify one kernel.
    ///
    /// Errors carry the kernel name.
    #[instrument(skip(self, kernel), fields(kernel = kernel.name()))]
    pub fn compile_kernel(&self, kernel: &Kernel) -> CompileResult<CompiledKernel> {
        self.compile_kernel_inner(kernel)
            .map_err(|err| err.in_kernel(kernel.name()))
    }

    fn compile_kernel_inner(&self, kernel: &Kernel) -> CompileResult<CompiledKernel> {
        let (pm, mut props) = PassManagerBuilder::from_config(Arc::clone(&self.platform), self.config).build();
        let mut kernel = kernel.clone();
        pm.run(&mut kernel, &mut props)?;

        let schedule = props.schedule.take().ok_or(CompileError::MissingSchedule)?;
        let mapping = match (props.routing, props.initial_layout.take(), props.final_layout.take()) {
            (Some(stats), Some(initial), Some(final_layout)) => Some(MappedKernel {
                kernel,
                initial,
                final_layout,
                swaps: stats.swaps,
                moves: stats.moves,
                elided: stats.elided,
                makespan: stats.makespan,
            }),
            _ => None,
        };

        info!(
            makespan = schedule.makespan(),
            instructions = schedule.len(),
            swaps = mapping.as_ref().map_or(0, |m| m.swaps),
            "kernel compiled"
        );
        Ok(CompiledKernel { schedule, mapping })
    }

    /// Compile every kernel of `program`, in parallel, and size the
    /// control-flow units around them.
    ///
    /// The result does not depend on thread timing. When several kernels
    /// fail, the error of the first one in program order is returned.
    #[instrument(skip(self, program), fields(program = program.name()))]
    pub fn compile_program(&self, program: &Program) -> CompileResult<CompiledProgram> {
        program.validate()?;
        let kernels = program.kernels();

        let results: Vec<CompileResult<CompiledKernel>> =
            kernels.par_iter().map(|k| self.compile_kernel(k)).collect();
        let kernels = results.into_iter().collect::<CompileResult<Vec<_>>>()?;

        let mut next = 0;
        let units = size_units(program.units(), &kernels, &mut next);
        let compiled = CompiledProgram {
            name: program.name().to_string(),
            kernels,
            units,
        };
        info!(
            kernels = compiled.kernels.len(),
            duration = compiled.duration(),
            "program compiled"
        );
        Ok(compiled)
    }
}

/// Mirror `units`, consuming compiled kernels in depth-first order.
fn size_units(units: &[Unit], kernels: &[CompiledKernel], next: &mut usize) -> Vec<CompiledUnit> {
    units
        .iter()
        .map(|unit| match unit {
            Unit::Kernel(kernel) => {
                let index = *next;
                *next += 1;
                CompiledUnit::Kernel {
                    name: kernel.name().to_string(),
                    index,
                    duration: kernels.get(index).map_or(0, CompiledKernel::makespan),
                }
            }
            Unit::Loop {
                name,
                body,
                iterations,
            } => {
                let body = size_units(body, kernels, next);
                CompiledUnit::Loop {
                    name: name.clone(),
                    iterations: *iterations,
                    duration: iterations.saturating_mul(total(&body)),
                    body,
                }
            }
            Unit::Branch {
                name,
                then_body,
                else_body,
                ..
            } => {
                let then_body = size_units(then_body, kernels, next);
                let else_body = size_units(else_body, kernels, next);
                CompiledUnit::Branch {
                    name: name.clone(),
                    duration: total(&then_body).max(total(&else_body)),
                    then_body,
                    else_body,
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{MapperConfig, MapperKind};
    use tempo_ir::{ClassicalCondition, CregId, QubitId};

    fn compiler() -> Compiler {
        Compiler::new(Arc::new(Platform::linear(4).unwrap()), CompilerConfig::default()).unwrap()
    }

    fn kernel(name: &str, gates: usize) -> Kernel {
        let mut k = Kernel::new(name, 2, 1);
        for _ in 0..gates {
            k.gate("x", QubitId(0)).unwrap();
        }
        k
    }

    #[test]
    fn test_compile_kernel_without_mapper() {
        let config = CompilerConfig {
            mapper: MapperConfig {
                kind: MapperKind::None,
                ..MapperConfig::default()
            },
            ..CompilerConfig::default()
        };
        let compiler = Compiler::new(Arc::new(Platform::linear(2).unwrap()), config).unwrap();
        let compiled = compiler.compile_kernel(&kernel("k", 3)).unwrap();
        assert!(compiled.mapping.is_none());
        assert_eq!(compiled.makespan(), 3);
        assert_eq!(compiled.name(), "k");
    }

    #[test]
    fn test_errors_carry_kernel_name() {
        let mut k = Kernel::new("bad", 1, 0);
        k.gate("frobnicate", QubitId(0)).unwrap();
        let err = compiler().compile_kernel(&k).unwrap_err();
        assert!(matches!(&err, CompileError::Kernel { kernel, .. } if kernel == "bad"));
        assert!(matches!(err.root(), CompileError::UnknownInstruction { .. }));
    }

    #[test]
    fn test_program_durations() {
        let mut program = Program::new("p");
        program.add_kernel(kernel("init", 2));
        program.add_loop("repeat", vec![Unit::Kernel(kernel("body", 3))], 4);
        program.add_branch(
            "choose",
            ClassicalCondition::Unary(CregId(0)),
            vec![Unit::Kernel(kernel("then", 5))],
            vec![Unit::Kernel(kernel("else", 1))],
        );

        let compiled = compiler().compile_program(&program).unwrap();
        assert_eq!(compiled.kernels.len(), 4);
        let names: Vec<_> = compiled.kernels.iter().map(CompiledKernel::name).collect();
        assert_eq!(names, vec!["init", "body", "then", "else"]);

        assert_eq!(compiled.units[0].duration(), 2);
        assert_eq!(compiled.units[1].duration(), 12);
        assert_eq!(compiled.units[2].duration(), 5);
        assert_eq!(compiled.duration(), 19);
    }

    #[test]
    fn test_program_reports_first_failure() {
        let mut bad1 = Kernel::new("bad1", 1, 0);
        bad1.gate("nope", QubitId(0)).unwrap();
        let mut bad2 = Kernel::new("bad2", 1, 0);
        bad2.gate("nope", QubitId(0)).unwrap();

        let mut program = Program::new("p");
        program.add_kernel(kernel("ok", 1));
        program.add_kernel(bad1);
        program.add_kernel(bad2);

        let err = compiler().compile_program(&program).unwrap_err();
        assert!(matches!(&err, CompileError::Kernel { kernel, .. } if kernel == "bad1"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CompilerConfig {
            mapper: MapperConfig {
                path_limit: 0,
                ..MapperConfig::default()
            },
            ..CompilerConfig::default()
        };
        assert!(Compiler::new(Arc::new(Platform::linear(2).unwrap()), config).is_err());
    }
}
