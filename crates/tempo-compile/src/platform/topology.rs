//! Physical qubit connectivity.

use std::collections::VecDeque;

/// Marker for unreachable pairs in the distance matrix.
const UNREACHABLE: u32 = u32::MAX;

/// Undirected connectivity graph over physical qubits.
///
/// On construction, a distance matrix is precomputed using BFS from each
/// node. This gives O(1) `distance()` lookups and lets routing enumerate
/// shortest paths without any further search.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Number of physical qubits.
    num_qubits: u32,
    /// Connected pairs, `(low, high)`, in insertion order.
    edges: Vec<(u32, u32)>,
    /// Sorted neighbor lists.
    adjacency: Vec<Vec<u32>>,
    /// `dist[from][to]`, or `UNREACHABLE`.
    dist: Vec<Vec<u32>>,
    /// Largest finite distance.
    diameter: u32,
}

impl Topology {
    /// Build the topology from an edge list.
    ///
    /// Duplicate edges (including reversed pairs) are ignored. Edges must
    /// only name qubits below `num_qubits`; the platform validates this
    /// before construction.
    pub fn new(num_qubits: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let n = num_qubits as usize;
        let mut topology = Self {
            num_qubits,
            edges: vec![],
            adjacency: vec![vec![]; n],
            dist: vec![],
            diameter: 0,
        };
        for (a, b) in edges {
            let pair = (a.min(b), a.max(b));
            if topology.edges.contains(&pair) {
                continue;
            }
            topology.edges.push(pair);
            topology.adjacency[a as usize].push(b);
            topology.adjacency[b as usize].push(a);
        }
        for neighbors in &mut topology.adjacency {
            neighbors.sort_unstable();
        }
        topology.precompute_distances();
        topology
    }

    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist = vec![vec![UNREACHABLE; n]; n];

        for src in 0..n {
            self.dist[src][src] = 0;
            let mut queue = VecDeque::new();
            queue.push_back(src);

            while let Some(current) = queue.pop_front() {
                for &neighbor in &self.adjacency[current] {
                    let nb = neighbor as usize;
                    if self.dist[src][nb] == UNREACHABLE {
                        self.dist[src][nb] = self.dist[src][current] + 1;
                        queue.push_back(nb);
                    }
                }
            }
        }

        self.diameter = self
            .dist
            .iter()
            .flatten()
            .copied()
            .filter(|&d| d != UNREACHABLE)
            .max()
            .unwrap_or(0);
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Connected pairs in insertion order.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Sorted neighbors of a qubit. The caller checks the range.
    #[inline]
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        &self.adjacency[qubit as usize]
    }

    /// Check if two qubits are directly connected.
    #[inline]
    pub fn is_adjacent(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(q1 as usize)
            .is_some_and(|neighbors| neighbors.binary_search(&q2).is_ok())
    }

    /// Shortest-path hop count, `None` when disconnected or out of range.
    #[inline]
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        let d = *self.dist.get(from as usize)?.get(to as usize)?;
        (d != UNREACHABLE).then_some(d)
    }

    /// Largest distance between two connected qubits.
    pub fn diameter(&self) -> u32 {
        self.diameter
    }

    /// Whether every qubit can reach every other qubit.
    pub fn is_connected(&self) -> bool {
        self.dist.iter().flatten().all(|&d| d != UNREACHABLE)
    }

    /// Enumerate shortest paths from `from` to `to`, endpoints included.
    ///
    /// Paths are produced depth first, always taking the lowest-numbered
    /// next hop first, and enumeration stops after `limit` paths. The
    /// order is therefore fully deterministic.
    pub fn shortest_paths(&self, from: u32, to: u32, limit: usize) -> Vec<Vec<u32>> {
        let mut paths = vec![];
        if self.distance(from, to).is_none() || limit == 0 {
            return paths;
        }
        let mut path = vec![from];
        self.extend_paths(&mut path, to, limit, &mut paths);
        paths
    }

    fn extend_paths(&self, path: &mut Vec<u32>, to: u32, limit: usize, out: &mut Vec<Vec<u32>>) {
        let Some(&current) = path.last() else {
            return;
        };
        if current == to {
            out.push(path.clone());
            return;
        }
        let remaining = self.dist[current as usize][to as usize];
        for &next in &self.adjacency[current as usize] {
            if out.len() >= limit {
                return;
            }
            if self.dist[next as usize][to as usize] + 1 == remaining {
                path.push(next);
                self.extend_paths(path, to, limit, out);
                path.pop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(n: u32) -> Topology {
        Topology::new(n, (0..n.saturating_sub(1)).map(|i| (i, i + 1)))
    }

    #[test]
    fn test_linear_distances() {
        let topo = linear(5);
        assert!(topo.is_adjacent(0, 1));
        assert!(topo.is_adjacent(1, 0));
        assert!(!topo.is_adjacent(0, 2));
        assert_eq!(topo.distance(0, 4), Some(4));
        assert_eq!(topo.diameter(), 4);
        assert!(topo.is_connected());
    }

    #[test]
    fn test_duplicate_edges_ignored() {
        let topo = Topology::new(3, [(0, 1), (1, 0), (1, 2)]);
        assert_eq!(topo.edges(), &[(0, 1), (1, 2)]);
        assert_eq!(topo.neighbors(1), &[0, 2]);
    }

    #[test]
    fn test_disconnected() {
        let topo = Topology::new(4, [(0, 1), (2, 3)]);
        assert_eq!(topo.distance(0, 3), None);
        assert_eq!(topo.distance(0, 9), None);
        assert!(!topo.is_connected());
        assert_eq!(topo.diameter(), 1);
        assert!(topo.shortest_paths(0, 3, 8).is_empty());
    }

    #[test]
    fn test_shortest_paths_on_square() {
        // 0 - 1
        // |   |
        // 2 - 3
        let topo = Topology::new(4, [(0, 1), (0, 2), (1, 3), (2, 3)]);
        let paths = topo.shortest_paths(0, 3, 8);
        assert_eq!(paths, vec![vec![0, 1, 3], vec![0, 2, 3]]);

        let capped = topo.shortest_paths(0, 3, 1);
        assert_eq!(capped, vec![vec![0, 1, 3]]);
    }

    #[test]
    fn test_trivial_path() {
        let topo = linear(3);
        assert_eq!(topo.shortest_paths(1, 1, 4), vec![vec![1]]);
    }
}
