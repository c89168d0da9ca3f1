//! List scheduling of kernels onto cycles.
//!
//! The scheduler builds the [`DependencyGraph`] of a kernel, resolves the
//! resource needs of every instruction through a [`ResourceModel`] and
//! assigns start cycles in one of three directions:
//!
//! - [`Direction::Asap`]: every instruction as early as dependencies and
//!   resources allow.
//! - [`Direction::Alap`]: as late as possible, by scheduling the reversed
//!   graph and mirroring it around its makespan.
//! - [`Direction::Uniform`]: ASAP followed by a rebalancing pass that evens
//!   out bundle widths without extending the makespan.
//!
//! When the platform configures buffers, every direction is followed by
//! pushing bundles apart by the buffer between their resource classes.

mod buffer;
mod list;
mod uniform;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tempo_ir::{Instruction, Kernel};
use tracing::debug;

use crate::depgraph::DependencyGraph;
use crate::error::{CompileError, CompileResult};
use crate::platform::Platform;
use crate::resource::{ResourceModel, ResourceRequest};

/// Scheduling direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// As soon as possible.
    #[default]
    Asap,
    /// As late as possible.
    Alap,
    /// ASAP, then rebalanced towards uniform bundle widths.
    Uniform,
}

/// How ready instructions competing for the same cycle are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Program order.
    #[default]
    First,
    /// Longest remaining dependency chain first, then program order.
    CriticalPath,
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Scheduling direction.
    pub direction: Direction,
    /// Ready-set ordering.
    pub tie_break: TieBreak,
    /// Let commuting accesses reorder freely.
    pub commute: bool,
    /// Respect the platform's shared resources.
    pub resource_constrained: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            direction: Direction::Asap,
            tie_break: TieBreak::First,
            commute: true,
            resource_constrained: true,
        }
    }
}

/// Lifecycle of a [`ListScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Nothing scheduled yet.
    Unscheduled,
    /// A kernel is being scheduled.
    InProgress,
    /// The last kernel was scheduled.
    Scheduled,
    /// The last kernel failed.
    Failed,
}

/// An instruction with its assigned start cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInstruction {
    /// Position in the scheduled kernel.
    pub index: usize,
    /// The instruction.
    pub instruction: Instruction,
    /// Start cycle.
    pub cycle: u64,
    /// Duration in cycles.
    pub duration: u64,
}

impl ScheduledInstruction {
    /// First cycle after the instruction.
    pub fn end(&self) -> u64 {
        self.cycle + self.duration
    }
}

/// Bundle-width statistics of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleStats {
    /// Number of scheduled instructions.
    pub instructions: usize,
    /// Total cycles.
    pub makespan: u64,
    /// Number of non-empty bundles.
    pub bundles: usize,
    /// Widest bundle.
    pub max_width: usize,
    /// Mean width of the non-empty bundles.
    pub avg_width: f64,
    /// Bundle width to number of bundles of that width.
    pub histogram: BTreeMap<usize, usize>,
}

/// A scheduled kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    kernel: String,
    /// Sorted by `(cycle, index)`.
    entries: Vec<ScheduledInstruction>,
    /// Start cycle by kernel position.
    starts: Vec<u64>,
    makespan: u64,
}

impl Schedule {
    fn new(kernel: &Kernel, start: &[u64], durations: &[u64]) -> Self {
        let mut entries: Vec<ScheduledInstruction> = kernel
            .instructions()
            .iter()
            .enumerate()
            .map(|(index, instruction)| ScheduledInstruction {
                index,
                instruction: instruction.clone(),
                cycle: start[index],
                duration: durations[index],
            })
            .collect();
        entries.sort_by_key(|e| (e.cycle, e.index));
        let makespan = entries.iter().map(ScheduledInstruction::end).max().unwrap_or(0);
        Self {
            kernel: kernel.name().to_string(),
            entries,
            starts: start.to_vec(),
            makespan,
        }
    }

    /// Name of the scheduled kernel.
    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    /// Total cycles: the latest end of any instruction.
    pub fn makespan(&self) -> u64 {
        self.makespan
    }

    /// Number of scheduled instructions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was scheduled.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in `(cycle, index)` order.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduledInstruction> {
        self.entries.iter()
    }

    /// Entries in `(cycle, index)` order.
    pub fn entries(&self) -> &[ScheduledInstruction] {
        &self.entries
    }

    /// Start cycle of the instruction at `index` in the kernel.
    pub fn start_of(&self, index: usize) -> Option<u64> {
        self.starts.get(index).copied()
    }

    /// Start cycles indexed by kernel position.
    pub fn start_cycles(&self) -> Vec<u64> {
        self.starts.clone()
    }

    /// Non-empty bundles: instructions sharing a start cycle.
    pub fn bundles(&self) -> Vec<(u64, Vec<&ScheduledInstruction>)> {
        let mut bundles: Vec<(u64, Vec<&ScheduledInstruction>)> = vec![];
        for entry in &self.entries {
            match bundles.last_mut() {
                Some((cycle, members)) if *cycle == entry.cycle => members.push(entry),
                _ => bundles.push((entry.cycle, vec![entry])),
            }
        }
        bundles
    }

    /// Bundle-width statistics.
    pub fn stats(&self) -> ScheduleStats {
        let mut histogram = BTreeMap::new();
        let bundles = self.bundles();
        for (_, members) in &bundles {
            *histogram.entry(members.len()).or_insert(0) += 1;
        }
        let max_width = histogram.keys().next_back().copied().unwrap_or(0);
        let avg_width = if bundles.is_empty() {
            0.0
        } else {
            self.entries.len() as f64 / bundles.len() as f64
        };
        ScheduleStats {
            instructions: self.entries.len(),
            makespan: self.makespan,
            bundles: bundles.len(),
            max_width,
            avg_width,
            histogram,
        }
    }
}

/// Assigns start cycles to the instructions of a kernel.
///
/// Scheduling is deterministic: the same kernel, platform and configuration
/// always give the same schedule.
pub struct ListScheduler {
    platform: Arc<Platform>,
    config: SchedulerConfig,
    state: ScheduleState,
}

impl ListScheduler {
    /// Create a scheduler for `platform`.
    pub fn new(platform: Arc<Platform>, config: SchedulerConfig) -> Self {
        Self {
            platform,
            config,
            state: ScheduleState::Unscheduled,
        }
    }

    /// The scheduler settings.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// State after the last call to [`schedule`](Self::schedule).
    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Schedule `kernel`.
    pub fn schedule(&mut self, kernel: &Kernel) -> CompileResult<Schedule> {
        self.schedule_with_model(kernel).map(|(schedule, _)| schedule)
    }

    /// Schedule `kernel` and return the resource model holding its
    /// occupancy, for callers that re-check the result.
    pub fn schedule_with_model(&mut self, kernel: &Kernel) -> CompileResult<(Schedule, ResourceModel)> {
        self.state = ScheduleState::InProgress;
        let result = self.run(kernel);
        self.state = if result.is_ok() {
            ScheduleState::Scheduled
        } else {
            ScheduleState::Failed
        };
        result
    }

    fn run(&self, kernel: &Kernel) -> CompileResult<(Schedule, ResourceModel)> {
        let graph = DependencyGraph::build(kernel, &self.platform, self.config.commute)?;
        let mut model = self.resource_model();
        let requests = resolve_requests(kernel, &graph, &model)?;

        let mut start = match self.config.direction {
            Direction::Asap => list::schedule_asap(&graph, &requests, &mut model, self.config.tie_break)?,
            Direction::Alap => list::schedule_alap(&graph, &requests, &mut model, self.config.tie_break)?,
            Direction::Uniform => {
                let mut start = list::schedule_asap(&graph, &requests, &mut model, self.config.tie_break)?;
                uniform::rebalance(&graph, &requests, &mut model, &mut start)?;
                start
            }
        };

        if self.platform.has_buffers() {
            let classes = kernel
                .instructions()
                .iter()
                .map(|instruction| self.platform.instruction_class(instruction))
                .collect::<CompileResult<Vec<_>>>()?;
            let delay = buffer::insert_buffers(&self.platform, &classes, &mut start);
            model = model.delayed(&delay);
        }

        let schedule = Schedule::new(kernel, &start, graph.durations());
        debug!(
            kernel = kernel.name(),
            direction = ?self.config.direction,
            instructions = schedule.len(),
            makespan = schedule.makespan(),
            "kernel scheduled"
        );
        Ok((schedule, model))
    }

    /// A fresh resource model as configured.
    pub fn resource_model(&self) -> ResourceModel {
        if self.config.resource_constrained {
            ResourceModel::new(Arc::clone(&self.platform))
        } else {
            ResourceModel::unconstrained()
        }
    }
}

fn resolve_requests(
    kernel: &Kernel,
    graph: &DependencyGraph,
    model: &ResourceModel,
) -> CompileResult<Vec<ResourceRequest>> {
    kernel
        .instructions()
        .iter()
        .enumerate()
        .map(|(index, instruction)| {
            model
                .request(instruction, graph.duration(index))
                .map_err(|err| match err {
                    CompileError::InvalidQubit { qubit, .. } => CompileError::UnresolvedOperand {
                        index,
                        operand: format!("q{qubit}"),
                    },
                    other => other,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{PlatformConfig, ResourceClass, ResourceUnit};
    use tempo_ir::{CregId, QubitId};

    fn scheduler(config: SchedulerConfig) -> ListScheduler {
        ListScheduler::new(Arc::new(Platform::linear(5).unwrap()), config)
    }

    #[test]
    fn test_empty_kernel() {
        let mut s = scheduler(SchedulerConfig::default());
        let schedule = s.schedule(&Kernel::new("empty", 2, 0)).unwrap();
        assert!(schedule.is_empty());
        assert_eq!(schedule.makespan(), 0);
        assert_eq!(s.state(), ScheduleState::Scheduled);
        assert_eq!(schedule.stats().bundles, 0);
    }

    #[test]
    fn test_disjoint_gates_share_cycle() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.gate("y", QubitId(1)).unwrap();

        let mut s = scheduler(SchedulerConfig::default());
        let schedule = s.schedule(&kernel).unwrap();
        assert_eq!(schedule.start_of(0), Some(0));
        assert_eq!(schedule.start_of(1), Some(0));
        assert_eq!(schedule.makespan(), 1);
        assert_eq!(schedule.bundles().len(), 1);
    }

    #[test]
    fn test_measure_blocks_qubit() {
        let mut kernel = Kernel::new("k", 1, 1);
        kernel.measure(QubitId(0), CregId(0)).unwrap();
        kernel.gate("x", QubitId(0)).unwrap();

        let mut s = scheduler(SchedulerConfig::default());
        let schedule = s.schedule(&kernel).unwrap();
        assert_eq!(schedule.start_of(1), Some(15));
        assert_eq!(schedule.makespan(), 16);
    }

    #[test]
    fn test_unknown_instruction_fails() {
        let mut kernel = Kernel::new("k", 1, 0);
        kernel.gate("frobnicate", QubitId(0)).unwrap();

        let mut s = scheduler(SchedulerConfig::default());
        let err = s.schedule(&kernel).unwrap_err();
        assert!(matches!(err, CompileError::UnknownInstruction { .. }));
        assert_eq!(s.state(), ScheduleState::Failed);
    }

    #[test]
    fn test_start_of_by_kernel_position() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(1)).unwrap();
        kernel.gate("x", QubitId(1)).unwrap();
        kernel.gate("x", QubitId(0)).unwrap();

        let schedule = scheduler(SchedulerConfig::default()).schedule(&kernel).unwrap();
        // Entry order is (cycle, index), so position 2 sits before position 1.
        let order: Vec<usize> = schedule.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert_eq!(schedule.start_of(1), Some(1));
        assert_eq!(schedule.start_of(2), Some(0));
        assert_eq!(schedule.start_of(3), None);
        assert_eq!(schedule.start_cycles(), vec![0, 1, 0]);

        let json = serde_json::to_string(&schedule).unwrap();
        let back: Schedule = serde_json::from_str(&json).unwrap();
        assert_eq!(back.start_of(1), Some(1));
    }

    #[test]
    fn test_stats_histogram() {
        let mut kernel = Kernel::new("k", 3, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.gate("x", QubitId(1)).unwrap();
        kernel.gate("x", QubitId(2)).unwrap();
        kernel.gate("y", QubitId(0)).unwrap();

        let mut s = scheduler(SchedulerConfig::default());
        let stats = s.schedule(&kernel).unwrap().stats();
        assert_eq!(stats.instructions, 4);
        assert_eq!(stats.bundles, 2);
        assert_eq!(stats.max_width, 3);
        assert_eq!(stats.histogram.get(&3), Some(&1));
        assert_eq!(stats.histogram.get(&1), Some(&1));
        assert!((stats.avg_width - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_alap_same_makespan() {
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.cnot(QubitId(0), QubitId(1)).unwrap();
        kernel.gate("h", QubitId(1)).unwrap();
        kernel.gate("y", QubitId(0)).unwrap();

        let asap = scheduler(SchedulerConfig::default()).schedule(&kernel).unwrap();
        let alap = scheduler(SchedulerConfig {
            direction: Direction::Alap,
            ..SchedulerConfig::default()
        })
        .schedule(&kernel)
        .unwrap();
        assert_eq!(asap.makespan(), alap.makespan());
    }

    #[test]
    fn test_buffers_delay_every_direction() {
        let cfg = PlatformConfig::linear(2).with_buffer(ResourceClass::Drive, ResourceClass::Flux, 40);
        let platform = Arc::new(Platform::new(cfg).unwrap());
        let mut kernel = Kernel::new("k", 2, 0);
        kernel.gate("x", QubitId(0)).unwrap();
        kernel.cnot(QubitId(0), QubitId(1)).unwrap();

        for direction in [Direction::Asap, Direction::Alap, Direction::Uniform] {
            let config = SchedulerConfig {
                direction,
                ..SchedulerConfig::default()
            };
            let (schedule, model) = ListScheduler::new(Arc::clone(&platform), config)
                .schedule_with_model(&kernel)
                .unwrap();
            assert_eq!(schedule.start_cycles(), vec![0, 3], "{direction:?}");
            assert_eq!(schedule.makespan(), 5);
            assert_eq!(model.occupant(ResourceUnit::Qubit(1), 3), Some(1));
        }
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: SchedulerConfig = serde_json::from_str(r#"{"direction": "uniform"}"#).unwrap();
        assert_eq!(config.direction, Direction::Uniform);
        assert!(config.commute);
        assert!(config.resource_constrained);
        assert_eq!(config.tie_break, TieBreak::First);
    }
}
