//! Pass trait and types for compilation passes.

use tempo_ir::Kernel;

use crate::error::CompileResult;
use crate::property::PropertySet;

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Analysis pass that reads but does not modify the kernel.
    Analysis,
    /// Transformation pass that modifies the kernel.
    Transformation,
}

/// A compilation pass that operates on one kernel.
///
/// Each pass performs one step of kernel compilation: routing, scheduling
/// or verification.
pub trait Pass: Send + Sync {
    /// Get the name of this pass.
    fn name(&self) -> &str;

    /// Get the kind of this pass.
    fn kind(&self) -> PassKind;

    /// Run the pass on the given kernel.
    ///
    /// Analysis passes leave the kernel alone and write their results to
    /// the `PropertySet`. Transformation passes replace the kernel.
    fn run(&self, kernel: &mut Kernel, properties: &mut PropertySet) -> CompileResult<()>;

    /// Check if this pass should run based on current state.
    fn should_run(&self, _kernel: &Kernel, _properties: &PropertySet) -> bool {
        true
    }
}
