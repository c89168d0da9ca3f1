//! Qubit and classical register identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a qubit within a kernel.
///
/// Whether the index names a logical or a physical qubit depends on the
/// [`CircuitLevel`](crate::CircuitLevel) of the kernel holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QubitId(pub u32);

impl QubitId {
    /// The index as a `usize`, for table lookups.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for QubitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl From<u32> for QubitId {
    fn from(id: u32) -> Self {
        QubitId(id)
    }
}

/// Index of a classical register within a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CregId(pub u32);

impl CregId {
    /// The index as a `usize`, for table lookups.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CregId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

impl From<u32> for CregId {
    fn from(id: u32) -> Self {
        CregId(id)
    }
}
