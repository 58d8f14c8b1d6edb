//! Cluster-first/route-second CVRP solver.
//!
//! Pipes a route affectation through a TSP primitive: each cluster is
//! routed on its induced subgraph (depot plus cluster nodes) and the
//! per-cluster routes are concatenated in cluster order.

use std::time::Instant;

use crate::heuristics::binpacking::Affectation;
use crate::heuristics::tsp::TspSolver;
use crate::instance::CvrpInstance;
use crate::solution::Solution;
use crate::CvrpSolver;

/// Two-step solver composing an affectation with a TSP primitive.
pub struct TwoStepSolver<A: Affectation, T: TspSolver> {
    affectation: A,
    tsp: T,
    name: String,
}

impl<A: Affectation, T: TspSolver> TwoStepSolver<A, T> {
    pub fn new(affectation: A, tsp: T) -> Self {
        let name = format!("{}+{}", affectation.name(), tsp.name());
        TwoStepSolver {
            affectation,
            tsp,
            name,
        }
    }

    /// Cost matrix of the subgraph induced by the depot and a cluster.
    ///
    /// Local index 0 is the depot; local index `l` (l ≥ 1) is
    /// `cluster[l - 1]`.
    fn induced_costs(instance: &CvrpInstance, cluster: &[usize]) -> Vec<Vec<f64>> {
        let mut locals = Vec::with_capacity(cluster.len() + 1);
        locals.push(instance.depot());
        locals.extend_from_slice(cluster);

        let m = locals.len();
        let mut costs = vec![vec![0.0; m]; m];
        for a in 0..m {
            for b in 0..m {
                if a != b {
                    costs[a][b] = instance.cost(locals[a], locals[b]);
                }
            }
        }
        costs
    }
}

impl<A: Affectation, T: TspSolver> CvrpSolver for TwoStepSolver<A, T> {
    fn solve(&self, instance: &CvrpInstance) -> Solution {
        let start = Instant::now();
        let affectation = self.affectation.solve(instance);

        if !affectation.solvable {
            log::warn!(
                "{}: affectation could not place every node within the fleet",
                self.name
            );
        }

        let mut routes = Vec::with_capacity(affectation.clusters.len());
        for cluster in &affectation.clusters {
            if cluster.is_empty() {
                continue;
            }

            let costs = Self::induced_costs(instance, cluster);
            let tour = self.tsp.solve(&costs);

            // Strip the depot and map local indices back to node ids
            let route: Vec<usize> = tour
                .into_iter()
                .filter(|&local| local != 0)
                .map(|local| cluster[local - 1])
                .collect();
            routes.push(route);
        }

        let mut solution = Solution::from_routes(instance, routes, &self.name);
        solution.computation_time = start.elapsed().as_secs_f64();
        solution
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::binpacking::{BinPackingAffectation, FirstFitDecreasing};
    use crate::heuristics::sweep::SweepAffectation;
    use crate::heuristics::tsp::TwoOptTsp;
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    fn instance(nodes: Vec<Node>, vehicles: usize, capacity: u32) -> CvrpInstance {
        let metric = *metric_registry().get("EUC_2D").unwrap();
        CvrpInstance::new("two-step-test", nodes, Fleet::new(vehicles, capacity), metric)
    }

    #[test]
    fn test_tiny_triangle_matches_optimum() {
        // Three customers around the depot, all in one cluster; the
        // optimal tour costs 2 + 2 * sqrt(2).
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 10),
            Node::new(2, 0.0, 1.0, 10),
            Node::new(3, -1.0, 0.0, 10),
        ];
        let instance = instance(nodes, 1, 100);

        let solver = TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new());
        let solution = solver.solve(&instance);

        assert!(solution.feasible);
        assert!(solution.is_complete(&instance));
        assert!((solution.cost - (2.0 + 2.0 * 2.0_f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_colinear_split_into_two_routes() {
        // Two colinear pairs with demands forcing a split; the optimal
        // cost is 2 * (2 + 2) = 8.
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 6),
            Node::new(2, 2.0, 0.0, 6),
            Node::new(3, 0.0, 1.0, 6),
            Node::new(4, 0.0, 2.0, 6),
        ];
        let instance = instance(nodes, 2, 12);

        let solver = TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new());
        let solution = solver.solve(&instance);

        assert!(solution.feasible);
        assert!(solution.is_complete(&instance));
        assert!((solution.cost - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_coverage_with_binpacking_affectation() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 3.0, 1.0, 4),
            Node::new(2, -2.0, 2.0, 7),
            Node::new(3, 1.0, -3.0, 5),
            Node::new(4, -1.0, -2.0, 2),
            Node::new(5, 2.0, 2.0, 6),
        ];
        let instance = instance(nodes, 3, 10);

        let affectation = BinPackingAffectation::new(FirstFitDecreasing::new());
        let solver = TwoStepSolver::new(affectation, TwoOptTsp::new());
        let solution = solver.solve(&instance);

        assert!(solution.is_complete(&instance));
    }
}
