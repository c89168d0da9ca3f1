//! Virtual-to-physical qubit mapping and initial placement.

use serde::{Deserialize, Serialize};
use tempo_ir::{Kernel, QubitId};

use crate::platform::Platform;

/// What is known about the state of a physical qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealState {
    /// Known to be in |0>: nothing has touched it since initialization.
    Fresh,
    /// Holds a state that must be preserved.
    Live,
}

/// The live mapping of logical (virtual) qubits onto physical (real) qubits.
///
/// Every logical qubit has exactly one physical qubit and no physical qubit
/// hosts more than one logical qubit. Physical qubits may be unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Virt2Real {
    v2r: Vec<u32>,
    r2v: Vec<Option<u32>>,
    states: Vec<RealState>,
}

impl Virt2Real {
    /// Logical qubit `i` on physical qubit `i`.
    ///
    /// Physical qubits without a logical qubit start [`RealState::Fresh`];
    /// hosting ones start `Fresh` only when `assume_zero_init` is set.
    pub fn identity(num_virtual: u32, num_real: u32, assume_zero_init: bool) -> Self {
        Self::from_assignment((0..num_virtual).collect(), num_real, assume_zero_init)
    }

    /// Logical qubit `i` on physical qubit `assignment[i]`.
    ///
    /// The caller guarantees the assignment is injective and in range.
    fn from_assignment(assignment: Vec<u32>, num_real: u32, assume_zero_init: bool) -> Self {
        let mut r2v = vec![None; num_real as usize];
        let mut states = vec![RealState::Fresh; num_real as usize];
        for (v, &r) in assignment.iter().enumerate() {
            r2v[r as usize] = Some(v as u32);
            if !assume_zero_init {
                states[r as usize] = RealState::Live;
            }
        }
        Self {
            v2r: assignment,
            r2v,
            states,
        }
    }

    /// Number of logical qubits.
    pub fn num_virtual(&self) -> u32 {
        self.v2r.len() as u32
    }

    /// Number of physical qubits.
    pub fn num_real(&self) -> u32 {
        self.r2v.len() as u32
    }

    /// Physical qubit hosting `virt`.
    pub fn real(&self, virt: QubitId) -> Option<u32> {
        self.v2r.get(virt.index()).copied()
    }

    /// Logical qubit on `real`, if any.
    pub fn virt(&self, real: u32) -> Option<QubitId> {
        self.r2v.get(real as usize).copied().flatten().map(QubitId)
    }

    /// State of `real`.
    pub fn state(&self, real: u32) -> RealState {
        self.states.get(real as usize).copied().unwrap_or(RealState::Fresh)
    }

    /// Record the state of `real`.
    pub fn set_state(&mut self, real: u32, state: RealState) {
        if let Some(s) = self.states.get_mut(real as usize) {
            *s = state;
        }
    }

    /// Exchange whatever `r0` and `r1` host, states included.
    pub fn swap(&mut self, r0: u32, r1: u32) {
        let (i0, i1) = (r0 as usize, r1 as usize);
        self.r2v.swap(i0, i1);
        self.states.swap(i0, i1);
        if let Some(v) = self.r2v[i0] {
            self.v2r[v as usize] = r0;
        }
        if let Some(v) = self.r2v[i1] {
            self.v2r[v as usize] = r1;
        }
    }

    /// `(logical, physical)` pairs in logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.v2r.iter().enumerate().map(|(v, &r)| (QubitId(v as u32), r))
    }

    /// Whether both directions agree and no physical qubit is used twice.
    pub fn is_bijective(&self) -> bool {
        let mut seen = vec![false; self.r2v.len()];
        for (v, &r) in self.v2r.iter().enumerate() {
            let Some(slot) = seen.get_mut(r as usize) else {
                return false;
            };
            if *slot || self.r2v[r as usize] != Some(v as u32) {
                return false;
            }
            *slot = true;
        }
        self.r2v.iter().filter(|v| v.is_some()).count() == self.v2r.len()
    }
}

/// Place logical qubits so that frequently interacting pairs land close.
///
/// Logical qubits are placed in order of decreasing two-qubit interaction
/// count. Each goes to the free physical qubit minimizing the sum of
/// `interactions * distance` to its already placed partners; ties go to the
/// physical qubit with more neighbors, then the lower index.
pub fn interaction_placement(kernel: &Kernel, platform: &Platform, assume_zero_init: bool) -> Virt2Real {
    let nv = kernel.num_qubits() as usize;
    let nr = platform.num_qubits();
    let topology = platform.topology();

    let mut interactions = vec![vec![0_u64; nv]; nv];
    for instruction in kernel.instructions().iter().filter(|i| i.is_two_qubit()) {
        let [a, b] = [instruction.qubits()[0].index(), instruction.qubits()[1].index()];
        if a < nv && b < nv && a != b {
            interactions[a][b] += 1;
            interactions[b][a] += 1;
        }
    }

    let mut order: Vec<usize> = (0..nv).collect();
    order.sort_by_key(|&v| (std::cmp::Reverse(interactions[v].iter().sum::<u64>()), v));

    let mut assignment: Vec<Option<u32>> = vec![None; nv];
    let mut used = vec![false; nr as usize];
    for v in order {
        let best = (0..nr)
            .filter(|&r| !used[r as usize])
            .min_by_key(|&r| {
                let cost = assignment
                    .iter()
                    .enumerate()
                    .filter_map(|(u, placed)| placed.map(|p| (u, p)))
                    .map(|(u, p)| {
                        let d = topology.distance(r, p).map_or(u64::from(u32::MAX), u64::from);
                        interactions[v][u].saturating_mul(d)
                    })
                    .fold(0_u64, u64::saturating_add);
                (cost, std::cmp::Reverse(topology.neighbors(r).len()), r)
            });
        if let Some(r) = best {
            used[r as usize] = true;
            assignment[v] = Some(r);
        }
    }

    // Every logical qubit found a slot when nv <= nr.
    let assignment = assignment
        .into_iter()
        .enumerate()
        .map(|(v, r)| r.unwrap_or(v as u32))
        .collect();
    Virt2Real::from_assignment(assignment, nr, assume_zero_init)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let layout = Virt2Real::identity(3, 5, false);
        assert_eq!(layout.real(QubitId(2)), Some(2));
        assert_eq!(layout.virt(4), None);
        assert_eq!(layout.state(0), RealState::Live);
        assert_eq!(layout.state(4), RealState::Fresh);
        assert!(layout.is_bijective());
    }

    #[test]
    fn test_assume_zero_init() {
        let layout = Virt2Real::identity(2, 2, true);
        assert_eq!(layout.state(0), RealState::Fresh);
        assert_eq!(layout.state(1), RealState::Fresh);
    }

    #[test]
    fn test_swap() {
        let mut layout = Virt2Real::identity(2, 3, false);
        layout.swap(1, 2);
        assert_eq!(layout.real(QubitId(1)), Some(2));
        assert_eq!(layout.virt(1), None);
        assert_eq!(layout.virt(2), Some(QubitId(1)));
        assert_eq!(layout.state(1), RealState::Fresh);
        assert_eq!(layout.state(2), RealState::Live);
        assert!(layout.is_bijective());

        layout.swap(0, 2);
        assert_eq!(layout.real(QubitId(0)), Some(2));
        assert_eq!(layout.real(QubitId(1)), Some(0));
        assert!(layout.is_bijective());
    }

    #[test]
    fn test_interaction_placement_pulls_partners_together() {
        // q0 and q1 interact heavily; they must end up adjacent.
        let mut kernel = Kernel::new("k", 3, 0);
        for _ in 0..3 {
            kernel.cnot(QubitId(0), QubitId(1)).unwrap();
        }
        kernel.cnot(QubitId(1), QubitId(2)).unwrap();

        let platform = Platform::linear(5).unwrap();
        let layout = interaction_placement(&kernel, &platform, false);
        assert!(layout.is_bijective());

        let p0 = layout.real(QubitId(0)).unwrap();
        let p1 = layout.real(QubitId(1)).unwrap();
        let p2 = layout.real(QubitId(2)).unwrap();
        assert!(platform.is_adjacent(p0, p1));
        assert!(platform.is_adjacent(p1, p2));
    }

    #[test]
    fn test_interaction_placement_is_deterministic() {
        let mut kernel = Kernel::new("k", 4, 0);
        kernel.cz(QubitId(0), QubitId(3)).unwrap();
        kernel.cz(QubitId(2), QubitId(1)).unwrap();

        let platform = Platform::grid(2, 2).unwrap();
        let a = interaction_placement(&kernel, &platform, false);
        let b = interaction_placement(&kernel, &platform, false);
        assert_eq!(a, b);
    }
}
