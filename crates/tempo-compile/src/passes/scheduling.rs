//! Scheduling pass.

use std::sync::Arc;

use tempo_ir::Kernel;
use tracing::debug;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;
use crate::scheduler::{ListScheduler, SchedulerConfig};

/// Schedules the kernel and stores the result in the `PropertySet`.
pub struct SchedulingPass {
    config: SchedulerConfig,
}

impl SchedulingPass {
    /// Create a scheduling pass.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }
}

impl Pass for SchedulingPass {
    fn name(&self) -> &str {
        "scheduling"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, kernel: &mut Kernel, properties: &mut PropertySet) -> CompileResult<()> {
        let platform = Arc::clone(properties.require_platform()?);
        let schedule = ListScheduler::new(platform, self.config).schedule(kernel)?;
        debug!(
            makespan = schedule.makespan(),
            bundles = schedule.stats().bundles,
            "schedule stored"
        );
        properties.schedule = Some(schedule);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompileError;
    use crate::platform::Platform;
    use tempo_ir::QubitId;

    #[test]
    fn test_scheduling_pass() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.gate("y", QubitId(1)).unwrap();

        let mut props = PropertySet::new().with_platform(Arc::new(Platform::linear(2).unwrap()));
        SchedulingPass::new(SchedulerConfig::default())
            .run(&mut kernel, &mut props)
            .unwrap();
        assert_eq!(props.schedule.unwrap().makespan(), 1);
    }

    #[test]
    fn test_scheduling_pass_needs_platform() {
        let mut kernel = Kernel::new("k", 1, 0);
        let mut props = PropertySet::new();
        let err = SchedulingPass::new(SchedulerConfig::default())
            .run(&mut kernel, &mut props)
            .unwrap_err();
        assert!(matches!(err, CompileError::MissingPlatform));
    }
}
