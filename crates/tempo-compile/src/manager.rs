//! Pass manager for orchestrating kernel compilation.

use std::sync::Arc;

use tempo_ir::Kernel;
use tracing::{debug, info, instrument};

use crate::config::CompilerConfig;
use crate::error::CompileResult;
use crate::mapper::MapperKind;
use crate::pass::Pass;
use crate::passes::{RoutingPass, ScheduleVerification, SchedulingPass};
use crate::platform::Platform;
use crate::property::PropertySet;

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run all passes on the given kernel.
    #[instrument(skip(self, kernel, properties), fields(kernel = kernel.name()))]
    pub fn run(&self, kernel: &mut Kernel, properties: &mut PropertySet) -> CompileResult<()> {
        debug!(
            "Running pass manager with {} passes on kernel with {} instructions",
            self.passes.len(),
            kernel.len()
        );

        for pass in &self.passes {
            if pass.should_run(kernel, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(kernel, properties)?;
                debug!("Pass {} completed, instructions: {}", pass.name(), kernel.len());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        Ok(())
    }

    /// Names of the passes, in order.
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating pass managers from a configuration.
pub struct PassManagerBuilder {
    config: CompilerConfig,
    properties: PropertySet,
}

impl PassManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: CompilerConfig::default(),
            properties: PropertySet::new(),
        }
    }

    /// Builder for `platform` with `config`.
    pub fn from_config(platform: Arc<Platform>, config: CompilerConfig) -> Self {
        Self::new().with_platform(platform).with_config(config)
    }

    /// Set the compiler configuration.
    #[must_use]
    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<Platform>) -> Self {
        self.properties.platform = Some(platform);
        self
    }

    /// Build the pass manager and return it with the properties.
    pub fn build(self) -> (PassManager, PropertySet) {
        let mut pm = PassManager::new();

        if self.config.mapper.kind != MapperKind::None {
            pm.add_pass(RoutingPass::new(self.config.mapper));
        }

        pm.add_pass(SchedulingPass::new(self.config.scheduler));

        if self.config.verify {
            pm.add_pass(ScheduleVerification::new(self.config.scheduler));
        }

        info!(passes = ?pm.pass_names(), "pass manager built");
        (pm, self.properties)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
