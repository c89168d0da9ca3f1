//! Compiler configuration.
//!
//! Configuration is an explicit value handed to the [`Compiler`](crate::Compiler);
//! there is no process-wide option state. Every field has a default, so a
//! partial document is enough:
//!
//! ```
//! use tempo_compile::{CompilerConfig, Direction, MapperKind};
//!
//! let config = CompilerConfig::from_json_str(
//!     r#"{ "scheduler": { "direction": "alap" }, "mapper": { "kind": "base" } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.scheduler.direction, Direction::Alap);
//! assert_eq!(config.mapper.kind, MapperKind::Base);
//! assert_eq!(config.mapper.lookahead_window, 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::mapper::MapperConfig;
use crate::scheduler::SchedulerConfig;

/// Settings for one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Mapper settings.
    pub mapper: MapperConfig,
    /// Re-check every produced schedule.
    pub verify: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            mapper: MapperConfig::default(),
            verify: true,
        }
    }
}

impl CompilerConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> CompileResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no compilation can run with.
    pub fn validate(&self) -> CompileResult<()> {
        if self.mapper.path_limit == 0 {
            return Err(CompileError::Configuration(
                "mapper.path_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
