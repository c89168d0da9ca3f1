//! Programs: a tree of scheduling units.
//!
//! Control-flow units are opaque to the scheduler. Their bodies are compiled
//! on their own and the enclosing unit takes a fixed number of cycles.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::ClassicalCondition;
use crate::kernel::Kernel;

/// One node of a program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// A kernel compiled as one scheduling unit.
    Kernel(Kernel),
    /// A body repeated a fixed number of times.
    Loop {
        /// Loop label.
        name: String,
        /// Units executed on each iteration.
        body: Vec<Unit>,
        /// Number of iterations.
        iterations: u64,
    },
    /// A two-way branch on a classical predicate.
    Branch {
        /// Branch label.
        name: String,
        /// Predicate selecting `then_body`.
        condition: ClassicalCondition,
        /// Units executed when the predicate holds.
        then_body: Vec<Unit>,
        /// Units executed otherwise.
        else_body: Vec<Unit>,
    },
}

impl Unit {
    /// Unit label.
    pub fn name(&self) -> &str {
        match self {
            Unit::Kernel(kernel) => kernel.name(),
            Unit::Loop { name, .. } | Unit::Branch { name, .. } => name,
        }
    }
}

/// An ordered list of units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    name: String,
    units: Vec<Unit>,
}

impl Program {
    /// Create an empty program.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: vec![],
        }
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Top-level units.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Append a kernel.
    pub fn add_kernel(&mut self, kernel: Kernel) -> &mut Self {
        self.units.push(Unit::Kernel(kernel));
        self
    }

    /// Append a loop.
    pub fn add_loop(&mut self, name: impl Into<String>, body: Vec<Unit>, iterations: u64) -> &mut Self {
        self.units.push(Unit::Loop {
            name: name.into(),
            body,
            iterations,
        });
        self
    }

    /// Append a branch.
    pub fn add_branch(
        &mut self,
        name: impl Into<String>,
        condition: ClassicalCondition,
        then_body: Vec<Unit>,
        else_body: Vec<Unit>,
    ) -> &mut Self {
        self.units.push(Unit::Branch {
            name: name.into(),
            condition,
            then_body,
            else_body,
        });
        self
    }

    /// All kernels, depth first in program order.
    pub fn kernels(&self) -> Vec<&Kernel> {
        fn walk<'a>(units: &'a [Unit], out: &mut Vec<&'a Kernel>) {
            for unit in units {
                match unit {
                    Unit::Kernel(kernel) => out.push(kernel),
                    Unit::Loop { body, .. } => walk(body, out),
                    Unit::Branch {
                        then_body,
                        else_body,
                        ..
                    } => {
                        walk(then_body, out);
                        walk(else_body, out);
                    }
                }
            }
        }
        let mut out = vec![];
        walk(&self.units, &mut out);
        out
    }

    /// Check kernel name uniqueness, loop counts and every kernel's operands.
    pub fn validate(&self) -> IrResult<()> {
        fn walk<'a>(units: &'a [Unit], seen: &mut FxHashSet<&'a str>) -> IrResult<()> {
            for unit in units {
                match unit {
                    Unit::Kernel(kernel) => {
                        if !seen.insert(kernel.name()) {
                            return Err(IrError::DuplicateKernel(kernel.name().to_string()));
                        }
                        kernel.validate()?;
                    }
                    Unit::Loop {
                        name,
                        body,
                        iterations,
                    } => {
                        if *iterations == 0 {
                            return Err(IrError::EmptyLoop(name.clone()));
                        }
                        walk(body, seen)?;
                    }
                    Unit::Branch {
                        then_body,
                        else_body,
                        ..
                    } => {
                        walk(then_body, seen)?;
                        walk(else_body, seen)?;
                    }
                }
            }
            Ok(())
        }
        walk(&self.units, &mut FxHashSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qubit::{CregId, QubitId};

    fn kernel(name: &str) -> Kernel {
        let mut k = Kernel::new(name, 2, 1);
        k.gate("x", QubitId(0)).unwrap();
        k
    }

    #[test]
    fn test_kernels_depth_first() {
        let mut program = Program::new("p");
        program
            .add_kernel(kernel("init"))
            .add_loop("repeat", vec![Unit::Kernel(kernel("body"))], 10)
            .add_branch(
                "feedback",
                ClassicalCondition::Unary(CregId(0)),
                vec![Unit::Kernel(kernel("yes"))],
                vec![Unit::Kernel(kernel("no"))],
            );

        let names: Vec<_> = program.kernels().iter().map(|k| k.name()).collect();
        assert_eq!(names, vec!["init", "body", "yes", "no"]);
        assert!(program.validate().is_ok());
    }

    #[test]
    fn test_duplicate_kernel_name() {
        let mut program = Program::new("p");
        program.add_kernel(kernel("k")).add_kernel(kernel("k"));
        assert!(matches!(
            program.validate(),
            Err(IrError::DuplicateKernel(name)) if name == "k"
        ));
    }

    #[test]
    fn test_zero_iteration_loop() {
        let mut program = Program::new("p");
        program.add_loop("never", vec![Unit::Kernel(kernel("k"))], 0);
        assert!(matches!(program.validate(), Err(IrError::EmptyLoop(_))));
    }
}
