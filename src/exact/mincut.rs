//! Integer-capacity minimum-cut engine.
//!
//! The cut-separation callbacks need the global minimum cut separating
//! the depot from some customer subset. Capacities are integers (the
//! callers scale and round fractional arc values), so a BFS max-flow
//! (Edmonds-Karp) per candidate sink is exact; the best sink-side set
//! over all sinks is the global minimum cut with the depot pinned to
//! the source side.

use std::collections::VecDeque;

/// Dense directed flow network with integer capacities.
#[derive(Debug, Clone)]
pub struct FlowNetwork {
    n: usize,
    capacity: Vec<u64>,
}

impl FlowNetwork {
    pub fn new(n: usize) -> Self {
        FlowNetwork {
            n,
            capacity: vec![0; n * n],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.n
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.n + j
    }

    /// Set the capacity of the directed arc (i, j).
    pub fn set_arc(&mut self, i: usize, j: usize, capacity: u64) {
        let idx = self.idx(i, j);
        self.capacity[idx] = capacity;
    }

    /// Set the capacity of the undirected edge {i, j} (both arcs).
    pub fn set_edge(&mut self, i: usize, j: usize, capacity: u64) {
        self.set_arc(i, j, capacity);
        self.set_arc(j, i, capacity);
    }

    #[inline]
    pub fn arc(&self, i: usize, j: usize) -> u64 {
        self.capacity[i * self.n + j]
    }

    /// Maximum s-t flow; returns the flow value and the sink side of
    /// the corresponding minimum cut (the nodes unreachable from `s`
    /// in the final residual network).
    pub fn max_flow(&self, s: usize, t: usize) -> (u64, Vec<usize>) {
        let n = self.n;
        let mut residual = self.capacity.clone();
        let mut flow = 0u64;

        loop {
            // BFS for a shortest augmenting path
            let mut parent = vec![usize::MAX; n];
            parent[s] = s;
            let mut queue = VecDeque::new();
            queue.push_back(s);

            while let Some(u) = queue.pop_front() {
                if u == t {
                    break;
                }
                for v in 0..n {
                    if parent[v] == usize::MAX && residual[u * n + v] > 0 {
                        parent[v] = u;
                        queue.push_back(v);
                    }
                }
            }

            if parent[t] == usize::MAX {
                break;
            }

            // Bottleneck along the path
            let mut bottleneck = u64::MAX;
            let mut v = t;
            while v != s {
                let u = parent[v];
                bottleneck = bottleneck.min(residual[u * n + v]);
                v = u;
            }

            // Augment
            let mut v = t;
            while v != s {
                let u = parent[v];
                residual[u * n + v] -= bottleneck;
                residual[v * n + u] += bottleneck;
                v = u;
            }
            flow += bottleneck;
        }

        // Residual reachability from s gives the source side of the cut
        let mut reachable = vec![false; n];
        reachable[s] = true;
        let mut queue = VecDeque::from([s]);
        while let Some(u) = queue.pop_front() {
            for v in 0..n {
                if !reachable[v] && residual[u * n + v] > 0 {
                    reachable[v] = true;
                    queue.push_back(v);
                }
            }
        }

        let sink_side = (0..n).filter(|&v| !reachable[v]).collect();
        (flow, sink_side)
    }

    /// Global minimum cut with `source` constrained to the source
    /// side: the minimum over all sinks of the s-t minimum cut.
    ///
    /// Returns `None` when the network has fewer than two nodes.
    pub fn min_cut_from(&self, source: usize) -> Option<(u64, Vec<usize>)> {
        let mut best: Option<(u64, Vec<usize>)> = None;

        for t in 0..self.n {
            if t == source {
                continue;
            }
            let (value, sink_side) = self.max_flow(source, t);
            if best.as_ref().map_or(true, |(b, _)| value < *b) {
                best = Some((value, sink_side));
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_flow_on_diamond() {
        // s=0 -> {1,2} -> t=3
        let mut net = FlowNetwork::new(4);
        net.set_arc(0, 1, 3);
        net.set_arc(0, 2, 2);
        net.set_arc(1, 3, 2);
        net.set_arc(2, 3, 3);

        let (flow, sink_side) = net.max_flow(0, 3);
        assert_eq!(flow, 4);
        assert!(sink_side.contains(&3));
        assert!(!sink_side.contains(&0));
    }

    #[test]
    fn test_min_cut_isolates_weak_component() {
        // Two triangles joined by a single light edge: the global cut
        // separating node 0 is the bridge.
        let mut net = FlowNetwork::new(6);
        for &(i, j) in &[(0, 1), (1, 2), (0, 2)] {
            net.set_edge(i, j, 10);
        }
        for &(i, j) in &[(3, 4), (4, 5), (3, 5)] {
            net.set_edge(i, j, 10);
        }
        net.set_edge(2, 3, 1);

        let (value, sink_side) = net.min_cut_from(0).unwrap();
        assert_eq!(value, 1);
        let mut sink_side = sink_side;
        sink_side.sort_unstable();
        assert_eq!(sink_side, vec![3, 4, 5]);
    }

    #[test]
    fn test_disconnected_node_has_zero_cut() {
        let mut net = FlowNetwork::new(3);
        net.set_edge(0, 1, 5);

        let (value, sink_side) = net.min_cut_from(0).unwrap();
        assert_eq!(value, 0);
        assert_eq!(sink_side, vec![2]);
    }

    #[test]
    fn test_single_node_has_no_cut() {
        let net = FlowNetwork::new(1);
        assert!(net.min_cut_from(0).is_none());
    }
}
