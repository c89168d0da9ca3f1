//! Resource occupancy.
//!
//! Each [`ResourceKind`] has its own occupancy table. A unit of capacity `k`
//! is split into `k` slots and every slot holds at most one instruction per
//! cycle, unless the platform lets instructions share the unit (see
//! [`Sharing`]). An instruction holds its units over the half-open interval
//! `[start, start + duration)`, so measurements and other multi-cycle
//! instructions block their units for their full duration.

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tempo_ir::Instruction;

use crate::error::{CompileError, CompileResult};
use crate::platform::{Platform, ResourceKind, ResourceUnit, Sharing};

/// One requested unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct UnitUse {
    unit: ResourceUnit,
    capacity: u32,
    sharing: Sharing,
}

/// What one instruction needs: its units (with their capacities and
/// sharing) and for how long.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    units: Vec<UnitUse>,
    duration: u64,
}

impl ResourceRequest {
    /// A request for nothing; always feasible.
    pub fn empty(duration: u64) -> Self {
        Self {
            units: vec![],
            duration,
        }
    }

    /// Requested units.
    pub fn units(&self) -> impl Iterator<Item = ResourceUnit> + '_ {
        self.units.iter().map(|u| u.unit)
    }

    /// Occupancy length in cycles.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    fn occupies_nothing(&self) -> bool {
        self.units.is_empty() || self.duration == 0
    }
}

/// One held interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Interval {
    end: u64,
    op: usize,
    sharing: Sharing,
}

/// A single resource: one slot of one unit.
type SlotKey = (ResourceUnit, u32);

/// Occupancy of every slot of one resource kind.
#[derive(Debug, Clone, Default)]
struct OccupancyTable {
    /// Slot to intervals keyed by `(start, op)`. Intervals of one slot only
    /// overlap when they share it.
    slots: FxHashMap<SlotKey, BTreeMap<(u64, usize), Interval>>,
    /// Longest interval ever inserted; bounds how far back an overlap can
    /// start.
    longest: u64,
}

impl OccupancyTable {
    /// Intervals of `slot` overlapping `[start, end)`, with their starts.
    fn overlapping(&self, slot: &SlotKey, start: u64, end: u64) -> impl Iterator<Item = (u64, Interval)> + '_ {
        let from = (start.saturating_sub(self.longest), 0);
        self.slots
            .get(slot)
            .into_iter()
            .flat_map(move |intervals| intervals.range(from..(end, 0)))
            .filter(move |(_, interval)| interval.end > start)
            .map(|(&(begin, _), &interval)| (begin, interval))
    }

    fn insert(&mut self, slot: SlotKey, start: u64, interval: Interval) {
        self.longest = self.longest.max(interval.end - start);
        self.slots
            .entry(slot)
            .or_default()
            .insert((start, interval.op), interval);
    }

    fn remove(&mut self, slot: &SlotKey, start: u64, op: usize) {
        if let Some(intervals) = self.slots.get_mut(slot) {
            intervals.remove(&(start, op));
            if intervals.is_empty() {
                self.slots.remove(slot);
            }
        }
    }
}

/// A committed occupancy, as reported by [`ResourceModel::occupancy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    /// Holding instruction.
    pub op: usize,
    /// Occupied unit.
    pub unit: ResourceUnit,
    /// Slot within the unit.
    pub slot: u32,
    /// First occupied cycle.
    pub start: u64,
    /// First cycle after the occupancy.
    pub end: u64,
}

/// Tracks which resources are occupied in which cycles.
#[derive(Debug, Clone)]
pub struct ResourceModel {
    /// `None` models no shared resources at all.
    platform: Option<Arc<Platform>>,
    /// Time runs backwards: units shared by start cycle are shared by end
    /// cycle instead.
    backwards: bool,
    tables: BTreeMap<ResourceKind, OccupancyTable>,
    /// What each committed op holds: `(slot, start)`.
    held: FxHashMap<usize, Vec<(SlotKey, u64)>>,
}

impl ResourceModel {
    /// A model of the platform's shared resources.
    pub fn new(platform: Arc<Platform>) -> Self {
        Self {
            platform: Some(platform),
            backwards: false,
            tables: BTreeMap::new(),
            held: FxHashMap::default(),
        }
    }

    /// A model without resources: every request is feasible.
    pub fn unconstrained() -> Self {
        Self {
            platform: None,
            backwards: false,
            tables: BTreeMap::new(),
            held: FxHashMap::default(),
        }
    }

    /// A model of the same resources with nothing committed, for scheduling
    /// a reversed dependency graph. [`mirrored`](Self::mirrored) turns its
    /// occupancy back into forward time.
    pub fn empty_reversed(&self) -> Self {
        Self {
            platform: self.platform.clone(),
            backwards: !self.backwards,
            tables: BTreeMap::new(),
            held: FxHashMap::default(),
        }
    }

    /// Whether this model tracks any resources.
    pub fn is_constrained(&self) -> bool {
        self.platform.is_some()
    }

    /// Resolve what `instruction` needs when it runs for `duration` cycles.
    pub fn request(&self, instruction: &Instruction, duration: u64) -> CompileResult<ResourceRequest> {
        let Some(platform) = &self.platform else {
            return Ok(ResourceRequest::empty(duration));
        };
        let Some(info) = platform.instruction_info(instruction)? else {
            return Ok(ResourceRequest::empty(duration));
        };
        let mut units: Vec<UnitUse> = platform
            .units_for_instruction(instruction)?
            .into_iter()
            .map(|unit| UnitUse {
                unit,
                capacity: platform.unit_capacity(unit),
                sharing: platform.unit_sharing(unit, info),
            })
            .collect();
        units.sort_unstable();
        units.dedup();
        Ok(ResourceRequest { units, duration })
    }

    /// Whether a new `[start, end)` use of `unit` may overlap the held
    /// interval beginning at `begin`.
    fn compatible(&self, sharing: Sharing, begin: u64, held: &Interval, start: u64, end: u64) -> bool {
        match (sharing, held.sharing) {
            (Sharing::Tagged(a), Sharing::Tagged(b)) => a == b,
            (Sharing::SameStart, Sharing::SameStart) if self.backwards => held.end == end,
            (Sharing::SameStart, Sharing::SameStart) => begin == start,
            _ => false,
        }
    }

    /// The earliest start after `start` at which the held interval could
    /// stop blocking a `[start, end)` use.
    fn unblocked_at(&self, sharing: Sharing, begin: u64, held: &Interval, start: u64, end: u64) -> u64 {
        if sharing == Sharing::SameStart && held.sharing == Sharing::SameStart {
            if self.backwards && held.end > end {
                return held.end - (end - start);
            }
            if !self.backwards && begin > start {
                return begin;
            }
        }
        held.end
    }

    /// The lowest slot of `unit` usable over `[start, end)`, or a lower
    /// bound on the next start at which one could be.
    fn free_slot(&self, unit: &UnitUse, start: u64, end: u64) -> Result<u32, u64> {
        let table = self.tables.get(&unit.unit.kind());
        let mut frees_at = u64::MAX;
        for slot in 0..unit.capacity {
            let blocked = table.and_then(|t| {
                t.overlapping(&(unit.unit, slot), start, end)
                    .filter(|(begin, held)| !self.compatible(unit.sharing, *begin, held, start, end))
                    .map(|(begin, held)| self.unblocked_at(unit.sharing, begin, &held, start, end))
                    .max()
            });
            match blocked {
                None => return Ok(slot),
                Some(cycle) => frees_at = frees_at.min(cycle),
            }
        }
        Err(frees_at)
    }

    /// Check whether every unit of `request` is free over
    /// `[start, start + duration)`. Never mutates.
    pub fn is_feasible(&self, request: &ResourceRequest, start: u64) -> bool {
        if request.occupies_nothing() {
            return true;
        }
        let end = start + request.duration;
        request
            .units
            .iter()
            .all(|unit| self.free_slot(unit, start, end).is_ok())
    }

    /// The smallest cycle `>= from` at which `request` is feasible.
    ///
    /// Rather than stepping one cycle at a time, the search jumps to the
    /// next cycle at which every blocking occupancy could have cleared; the
    /// result is the same.
    pub fn earliest_feasible(&self, request: &ResourceRequest, from: u64) -> u64 {
        if request.occupies_nothing() {
            return from;
        }
        let mut start = from;
        loop {
            let end = start + request.duration;
            let next = request
                .units
                .iter()
                .filter_map(|unit| self.free_slot(unit, start, end).err())
                .max();
            match next {
                None => return start,
                Some(cycle) => start = cycle,
            }
        }
    }

    /// Occupy every unit of `request` for instruction `op` starting at
    /// `start`.
    ///
    /// Fails with [`CompileError::ResourceConflict`] when the request is not
    /// feasible or `op` already holds resources; nothing is occupied then.
    pub fn commit(&mut self, op: usize, request: &ResourceRequest, start: u64) -> CompileResult<()> {
        if self.held.contains_key(&op) {
            return Err(CompileError::ResourceConflict {
                op,
                cycle: start,
                unit: "resources already held".to_string(),
            });
        }
        let mut taken = Vec::with_capacity(request.units.len());
        if !request.occupies_nothing() {
            let end = start + request.duration;
            for unit in &request.units {
                match self.free_slot(unit, start, end) {
                    Ok(slot) => taken.push(((unit.unit, slot), unit.sharing)),
                    Err(_) => {
                        let cycle = self.first_conflict(unit, start, end).unwrap_or(start);
                        return Err(CompileError::ResourceConflict {
                            op,
                            cycle,
                            unit: unit.unit.to_string(),
                        });
                    }
                }
            }
            for &(key, sharing) in &taken {
                self.tables
                    .entry(key.0.kind())
                    .or_default()
                    .insert(key, start, Interval { end, op, sharing });
            }
        }
        let held = taken.into_iter().map(|(key, _)| (key, start)).collect();
        self.held.insert(op, held);
        Ok(())
    }

    fn first_conflict(&self, unit: &UnitUse, start: u64, end: u64) -> Option<u64> {
        let table = self.tables.get(&unit.unit.kind())?;
        table
            .overlapping(&(unit.unit, 0), start, end)
            .find(|(begin, held)| !self.compatible(unit.sharing, *begin, held, start, end))
            .map(|(begin, _)| begin.max(start))
    }

    /// Free everything `op` holds. Releasing an op that holds nothing is a
    /// no-op.
    pub fn release(&mut self, op: usize) {
        let Some(taken) = self.held.remove(&op) else {
            return;
        };
        for (key, start) in taken {
            if let Some(table) = self.tables.get_mut(&key.0.kind()) {
                table.remove(&key, start, op);
            }
        }
    }

    /// Whether `op` currently holds resources (possibly none).
    pub fn is_committed(&self, op: usize) -> bool {
        self.held.contains_key(&op)
    }

    /// The lowest op occupying `unit` (any slot) at `cycle`.
    pub fn occupant(&self, unit: ResourceUnit, cycle: u64) -> Option<usize> {
        let table = self.tables.get(&unit.kind())?;
        table
            .slots
            .keys()
            .filter(|(u, _)| *u == unit)
            .flat_map(|key| table.overlapping(key, cycle, cycle + 1))
            .map(|(_, interval)| interval.op)
            .min()
    }

    /// Every committed occupancy, ordered by kind, unit, slot, start and op.
    pub fn occupancy(&self) -> Vec<Occupancy> {
        let mut out: Vec<Occupancy> = self
            .tables
            .values()
            .flat_map(|table| {
                table.slots.iter().flat_map(|(&(unit, slot), intervals)| {
                    intervals.iter().map(move |(&(start, op), interval)| Occupancy {
                        op,
                        unit,
                        slot,
                        start,
                        end: interval.end,
                    })
                })
            })
            .collect();
        out.sort_unstable_by_key(|o| (o.unit.kind(), o.unit, o.slot, o.start, o.op));
        out
    }

    /// This occupancy reflected around `makespan`: `[start, end)` becomes
    /// `[makespan - end, makespan - start)`. Every op keeps its slots.
    pub fn mirrored(&self, makespan: u64) -> Self {
        self.remap(!self.backwards, |_, start, end| {
            (makespan.saturating_sub(end), makespan.saturating_sub(start))
        })
    }

    /// This occupancy with every op moved `delay[op]` cycles later. Every op
    /// keeps its slots.
    pub fn delayed(&self, delay: &[u64]) -> Self {
        self.remap(self.backwards, |op, start, end| {
            let by = delay.get(op).copied().unwrap_or(0);
            (start + by, end + by)
        })
    }

    fn remap(&self, backwards: bool, f: impl Fn(usize, u64, u64) -> (u64, u64)) -> Self {
        let mut out = Self {
            platform: self.platform.clone(),
            backwards,
            tables: BTreeMap::new(),
            held: self.held.keys().map(|&op| (op, vec![])).collect(),
        };
        for (&kind, table) in &self.tables {
            let target = out.tables.entry(kind).or_default();
            for (&slot, intervals) in &table.slots {
                for (&(start, op), interval) in intervals {
                    let (start, end) = f(op, start, interval.end);
                    target.insert(slot, start, Interval { end, ..*interval });
                    out.held.entry(op).or_default().push((slot, start));
                }
            }
        }
        out
    }
}
