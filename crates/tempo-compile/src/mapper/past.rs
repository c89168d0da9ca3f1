//! The mapped past: instructions already emitted by the router, scheduled
//! incrementally.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tempo_ir::{Instruction, InstructionKind};

use crate::error::CompileResult;
use crate::platform::Platform;
use crate::resource::ResourceModel;

/// Emitted physical instructions with provisional start cycles.
///
/// Each instruction starts once its qubits and registers are free and its
/// resources are available, in emission order. The resulting cycles are only
/// used to steer routing; the final schedule is computed afterwards.
#[derive(Debug, Clone)]
pub struct Past {
    platform: Arc<Platform>,
    qubit_free: Vec<u64>,
    creg_free: Vec<u64>,
    model: ResourceModel,
    output: Vec<Instruction>,
    cycles: Vec<u64>,
}

impl Past {
    /// An empty past on `platform`, modelling shared resources when
    /// `resource_constrained` is set.
    pub fn new(platform: Arc<Platform>, num_cregs: u32, resource_constrained: bool) -> Self {
        let model = if resource_constrained {
            ResourceModel::new(Arc::clone(&platform))
        } else {
            ResourceModel::unconstrained()
        };
        Self {
            qubit_free: vec![0; platform.num_qubits() as usize],
            creg_free: vec![0; num_cregs as usize],
            platform,
            model,
            output: vec![],
            cycles: vec![],
        }
    }

    /// Append `instruction` (physical operands) and return its start cycle.
    pub fn add(&mut self, instruction: Instruction) -> CompileResult<u64> {
        let duration = self.platform.instruction_duration(&instruction)?;

        if let InstructionKind::Wait { qubits, .. } = &instruction.kind {
            let start = if qubits.is_empty() {
                self.max_free_cycle()
            } else {
                qubits
                    .iter()
                    .map(|q| self.qubit_free.get(q.index()).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0)
            };
            let end = start + duration;
            if qubits.is_empty() {
                self.qubit_free.iter_mut().for_each(|f| *f = end);
                self.creg_free.iter_mut().for_each(|f| *f = end);
            } else {
                for q in qubits {
                    if let Some(f) = self.qubit_free.get_mut(q.index()) {
                        *f = end;
                    }
                }
            }
            return Ok(self.push(instruction, start));
        }

        let cregs: Vec<usize> = instruction
            .written_cregs()
            .iter()
            .chain(instruction.condition_cregs().iter())
            .map(|c| c.index())
            .collect();
        let ready = instruction
            .qubits()
            .iter()
            .map(|q| self.qubit_free.get(q.index()).copied().unwrap_or(0))
            .chain(cregs.iter().map(|&c| self.creg_free.get(c).copied().unwrap_or(0)))
            .max()
            .unwrap_or(0);

        let request = self.model.request(&instruction, duration)?;
        let start = self.model.earliest_feasible(&request, ready);
        self.model.commit(self.output.len(), &request, start)?;

        let end = start + duration;
        for q in instruction.qubits() {
            if let Some(f) = self.qubit_free.get_mut(q.index()) {
                *f = end;
            }
        }
        for c in instruction.written_cregs() {
            if let Some(f) = self.creg_free.get_mut(c.index()) {
                *f = end;
            }
        }
        Ok(self.push(instruction, start))
    }

    fn push(&mut self, instruction: Instruction, start: u64) -> u64 {
        self.output.push(instruction);
        self.cycles.push(start);
        start
    }

    /// The cycle at which everything emitted so far has completed.
    pub fn max_free_cycle(&self) -> u64 {
        self.qubit_free
            .iter()
            .chain(self.creg_free.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Cycle at which physical qubit `qubit` is free.
    pub fn free_cycle(&self, qubit: u32) -> u64 {
        self.qubit_free.get(qubit as usize).copied().unwrap_or(0)
    }

    /// Emitted instructions in emission order.
    pub fn output(&self) -> &[Instruction] {
        &self.output
    }

    /// Provisional start cycles, parallel to [`output`](Self::output).
    pub fn cycles(&self) -> &[u64] {
        &self.cycles
    }

    /// Emitted instructions, consuming the past.
    pub fn into_output(self) -> Vec<Instruction> {
        self.output
    }

    /// Start a tentative extension. Everything added through the returned
    /// guard is undone when it drops.
    pub fn trial(&mut self) -> Trial<'_> {
        Trial {
            len: self.output.len(),
            qubit_free: self.qubit_free.clone(),
            creg_free: self.creg_free.clone(),
            past: self,
        }
    }
}

/// A tentative extension of a [`Past`], rolled back on drop.
pub struct Trial<'a> {
    past: &'a mut Past,
    len: usize,
    qubit_free: Vec<u64>,
    creg_free: Vec<u64>,
}

impl Deref for Trial<'_> {
    type Target = Past;

    fn deref(&self) -> &Past {
        self.past
    }
}

impl DerefMut for Trial<'_> {
    fn deref_mut(&mut self) -> &mut Past {
        self.past
    }
}

impl Drop for Trial<'_> {
    fn drop(&mut self) {
        for op in self.len..self.past.output.len() {
            self.past.model.release(op);
        }
        self.past.output.truncate(self.len);
        self.past.cycles.truncate(self.len);
        std::mem::swap(&mut self.past.qubit_free, &mut self.qubit_free);
        std::mem::swap(&mut self.past.creg_free, &mut self.creg_free);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_ir::{CregId, QubitId};

    fn past() -> Past {
        Past::new(Arc::new(Platform::linear(3).unwrap()), 1, true)
    }

    #[test]
    fn test_add_chains_on_qubit() {
        let mut past = past();
        assert_eq!(past.add(Instruction::single("x", QubitId(0))).unwrap(), 0);
        assert_eq!(past.add(Instruction::two("cz", QubitId(0), QubitId(1))).unwrap(), 1);
        assert_eq!(past.add(Instruction::single("x", QubitId(2))).unwrap(), 0);
        assert_eq!(past.max_free_cycle(), 3);
    }

    #[test]
    fn test_measure_then_conditional() {
        let mut past = past();
        past.add(Instruction::measure(QubitId(0), CregId(0))).unwrap();
        let start = past
            .add(Instruction::single("x", QubitId(1)).with_condition(tempo_ir::ClassicalCondition::Unary(CregId(0))))
            .unwrap();
        assert_eq!(start, 15);
    }

    #[test]
    fn test_barrier_syncs_qubits() {
        let mut past = past();
        past.add(Instruction::single("x", QubitId(0))).unwrap();
        past.add(Instruction::single("x", QubitId(0))).unwrap();
        past.add(Instruction::barrier([])).unwrap();
        assert_eq!(past.add(Instruction::single("x", QubitId(2))).unwrap(), 2);
    }

    #[test]
    fn test_trial_rolls_back() {
        let mut past = past();
        past.add(Instruction::single("x", QubitId(0))).unwrap();
        {
            let mut trial = past.trial();
            trial.add(Instruction::two("swap", QubitId(0), QubitId(1))).unwrap();
            assert_eq!(trial.max_free_cycle(), 7);
        }
        assert_eq!(past.output().len(), 1);
        assert_eq!(past.max_free_cycle(), 1);
        // The released resources are free again.
        assert_eq!(past.add(Instruction::single("x", QubitId(1))).unwrap(), 0);
    }
}
