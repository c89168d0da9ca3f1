//! Verification of produced schedules.
//!
//! These checks re-derive what the scheduler and router promise and fail
//! loudly when a result breaks it: every dependency is respected, no
//! resource is double booked, and two-qubit gates of physical kernels only
//! act on adjacent qubits.

use std::sync::Arc;

use tempo_ir::{CircuitLevel, Kernel};
use tracing::debug;

use crate::depgraph::DependencyGraph;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;
use crate::resource::ResourceModel;
use crate::scheduler::SchedulerConfig;

/// Analysis pass checking the stored schedule against the kernel.
pub struct ScheduleVerification {
    config: SchedulerConfig,
}

impl ScheduleVerification {
    /// Verify schedules produced with `config`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }
}

impl Pass for ScheduleVerification {
    fn name(&self) -> &str {
        "schedule_verification"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, kernel: &mut Kernel, properties: &mut PropertySet) -> CompileResult<()> {
        let platform = Arc::clone(properties.require_platform()?);
        let schedule = properties.schedule.as_ref().ok_or(CompileError::MissingSchedule)?;
        if schedule.len() != kernel.len() {
            return Err(CompileError::VerificationFailed {
                check: "length",
                index: schedule.len().min(kernel.len()),
                detail: format!("{} scheduled for {} instructions", schedule.len(), kernel.len()),
            });
        }
        let start = schedule.start_cycles();

        // Dependencies.
        let graph = DependencyGraph::build(kernel, &platform, self.config.commute)?;
        for (from, to, dep) in graph.edges() {
            if start[to] < start[from] + dep.weight {
                return Err(CompileError::VerificationFailed {
                    check: "dependencies",
                    index: to,
                    detail: format!(
                        "{} on {} needs cycle {} but starts at {}",
                        dep.kind,
                        dep.operand,
                        start[from] + dep.weight,
                        start[to]
                    ),
                });
            }
        }

        // Resources: replaying every commit must succeed.
        if self.config.resource_constrained {
            let mut model = ResourceModel::new(Arc::clone(&platform));
            for entry in schedule.iter() {
                let request = model.request(&entry.instruction, entry.duration)?;
                model
                    .commit(entry.index, &request, entry.cycle)
                    .map_err(|err| CompileError::VerificationFailed {
                        check: "resources",
                        index: entry.index,
                        detail: err.to_string(),
                    })?;
            }
        }

        // Connectivity.
        if kernel.level() == CircuitLevel::Physical {
            for (index, instruction) in kernel.instructions().iter().enumerate() {
                if let [a, b] = instruction.qubits() {
                    if instruction.is_two_qubit() && !platform.is_adjacent(a.0, b.0) {
                        return Err(CompileError::VerificationFailed {
                            check: "adjacency",
                            index,
                            detail: format!("{instruction} acts on non-adjacent qubits"),
                        });
                    }
                }
            }
        }

        debug!(instructions = schedule.len(), "schedule verified");
        Ok(())
    }

    fn should_run(&self, _kernel: &Kernel, properties: &PropertySet) -> bool {
        properties.schedule.is_some()
    }
}
