//! Built-in compilation passes.
//!
//! - [`RoutingPass`]: maps a logical kernel onto the platform topology
//! - [`SchedulingPass`]: assigns start cycles
//! - [`ScheduleVerification`]: re-checks dependencies, resources and
//!   connectivity of the result

mod routing;
mod scheduling;
mod verification;

pub use routing::RoutingPass;
pub use scheduling::SchedulingPass;
pub use verification::ScheduleVerification;
