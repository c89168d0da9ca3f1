//! Routing pass: maps a logical kernel onto the platform.

use std::sync::Arc;

use tempo_ir::{CircuitLevel, Kernel};

use crate::error::CompileResult;
use crate::mapper::{Mapper, MapperConfig, MapperKind};
use crate::pass::{Pass, PassKind};
use crate::property::{PropertySet, RoutingStats};

/// Replaces a logical kernel by its routed physical kernel.
///
/// Records the initial and final mappings and the routing counters.
pub struct RoutingPass {
    config: MapperConfig,
}

impl RoutingPass {
    /// Create a routing pass.
    pub fn new(config: MapperConfig) -> Self {
        Self { config }
    }
}

impl Pass for RoutingPass {
    fn name(&self) -> &str {
        "routing"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, kernel: &mut Kernel, properties: &mut PropertySet) -> CompileResult<()> {
        let platform = Arc::clone(properties.require_platform()?);
        let mapped = Mapper::new(platform, self.config).map(kernel)?;

        properties.initial_layout = Some(mapped.initial);
        properties.final_layout = Some(mapped.final_layout);
        properties.routing = Some(RoutingStats {
            swaps: mapped.swaps,
            moves: mapped.moves,
            elided: mapped.elided,
            makespan: mapped.makespan,
        });
        *kernel = mapped.kernel;
        Ok(())
    }

    fn should_run(&self, kernel: &Kernel, properties: &PropertySet) -> bool {
        self.config.kind != MapperKind::None
            && kernel.level() == CircuitLevel::Logical
            && properties.platform.is_some()
    }
}
