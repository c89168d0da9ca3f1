//! `PropertySet` for pass communication.
//!
//! Passes share their results through the [`PropertySet`]: the routing pass
//! records the initial and final mappings, the scheduling pass records the
//! schedule, and the verification pass reads both. Arbitrary typed values
//! can be stored alongside.
//!
//! ```
//! use std::sync::Arc;
//! use tempo_compile::{Platform, PropertySet};
//!
//! let props = PropertySet::new().with_platform(Arc::new(Platform::linear(5).unwrap()));
//! assert_eq!(props.platform.as_ref().unwrap().num_qubits(), 5);
//! assert!(props.schedule.is_none());
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::mapper::Virt2Real;
use crate::platform::Platform;
use crate::scheduler::Schedule;

/// Counters reported by the routing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingStats {
    /// Swaps inserted.
    pub swaps: usize,
    /// Moves inserted.
    pub moves: usize,
    /// Swaps applied to the mapping only.
    pub elided: usize,
    /// Makespan of the mapped past.
    pub makespan: u64,
}

/// Shared state of one kernel's compilation.
#[derive(Debug, Default)]
pub struct PropertySet {
    /// Target platform. Required by every built-in pass.
    pub platform: Option<Arc<Platform>>,

    /// Mapping before routing.
    pub initial_layout: Option<Virt2Real>,

    /// Mapping after routing.
    pub final_layout: Option<Virt2Real>,

    /// Routing counters.
    pub routing: Option<RoutingStats>,

    /// Schedule of the kernel, set by the scheduling pass.
    pub schedule: Option<Schedule>,

    /// Custom properties storage (type-erased).
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PropertySet {
    /// Create a new empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Arc<Platform>) -> Self {
        self.platform = Some(platform);
        self
    }

    /// The target platform, or [`CompileError::MissingPlatform`].
    pub fn require_platform(&self) -> CompileResult<&Arc<Platform>> {
        self.platform.as_ref().ok_or(CompileError::MissingPlatform)
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}
