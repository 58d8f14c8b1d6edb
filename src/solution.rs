//! Solution representation and cost evaluation for the CVRP.
//!
//! A solution is an ordered list of routes; each route is an ordered
//! list of customer ids with the depot left implicit (every route
//! starts and ends at node 0). The penalised evaluator charges
//! capacity excess instead of rejecting it, so the random search can
//! walk through infeasible neighbours; the strict predicate is used
//! for reporting.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::instance::CvrpInstance;

/// Route data: customer ids per route, depot excluded.
pub type Routes = Vec<Vec<usize>>;

/// Penalty applied per unit of capacity excess by the search evaluator.
///
/// Large enough that any capacity-violating neighbour is dominated by
/// every feasible neighbour within reach of the search.
pub const CAPACITY_PENALTY: f64 = 1000.0;

/// Sum of demands served by a route.
pub fn route_demand(instance: &CvrpInstance, route: &[usize]) -> u32 {
    route.iter().map(|&v| instance.demand(v)).sum()
}

/// Total traversed cost without any penalty term.
///
/// An empty route contributes zero; a single-node route contributes
/// twice the depot edge. Total on any node ordering, including
/// repeated nodes.
pub fn raw_cost(instance: &CvrpInstance, routes: &[Vec<usize>]) -> f64 {
    let depot = instance.depot();
    let mut total = 0.0;

    for route in routes {
        let first = match route.first() {
            Some(&v) => v,
            None => continue,
        };
        total += instance.cost(depot, first);
        for pair in route.windows(2) {
            total += instance.cost(pair[0], pair[1]);
        }
        total += instance.cost(*route.last().unwrap(), depot);
    }

    total
}

/// Penalised cost: traversed cost plus `CAPACITY_PENALTY` per unit of
/// demand exceeding the vehicle capacity on each route.
pub fn penalized_cost(instance: &CvrpInstance, routes: &[Vec<usize>]) -> f64 {
    let capacity = instance.capacity();
    let mut total = raw_cost(instance, routes);

    for route in routes {
        let demand = route_demand(instance, route);
        if demand > capacity {
            total += (demand - capacity) as f64 * CAPACITY_PENALTY;
        }
    }

    total
}

/// Strict feasibility: every route respects the capacity and the
/// number of non-empty routes does not exceed the fleet size.
pub fn is_feasible(instance: &CvrpInstance, routes: &[Vec<usize>]) -> bool {
    let used = routes.iter().filter(|r| !r.is_empty()).count();
    if used > instance.vehicles() {
        return false;
    }

    routes
        .iter()
        .all(|route| route_demand(instance, route) <= instance.capacity())
}

/// Represents a solution to a CVRP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Routes as sequences of customer ids (depot excluded)
    pub routes: Routes,
    /// Penalised cost of the solution
    pub cost: f64,
    /// Whether the solution satisfies capacity and fleet constraints
    pub feasible: bool,
    /// Algorithm that generated this solution
    pub algorithm: String,
    /// Computation time in seconds
    pub computation_time: f64,
}

impl Solution {
    /// Create a new empty solution
    pub fn new() -> Self {
        Solution {
            routes: Vec::new(),
            cost: f64::INFINITY,
            feasible: false,
            algorithm: String::new(),
            computation_time: 0.0,
        }
    }

    /// Create a solution from route data, evaluating cost and feasibility
    pub fn from_routes(instance: &CvrpInstance, routes: Routes, algorithm: &str) -> Self {
        let cost = penalized_cost(instance, &routes);
        let feasible = is_feasible(instance, &routes);

        Solution {
            routes,
            cost,
            feasible,
            algorithm: algorithm.to_string(),
            computation_time: 0.0,
        }
    }

    /// Re-evaluate cost and feasibility after the routes changed
    pub fn validate(&mut self, instance: &CvrpInstance) {
        self.cost = penalized_cost(instance, &self.routes);
        self.feasible = is_feasible(instance, &self.routes);
    }

    /// Check that every customer appears in exactly one route exactly once
    pub fn is_complete(&self, instance: &CvrpInstance) -> bool {
        let mut seen = vec![0usize; instance.dimension];
        for route in &self.routes {
            for &v in route {
                if v == instance.depot() || v >= instance.dimension {
                    return false;
                }
                seen[v] += 1;
            }
        }
        instance.customers().all(|v| seen[v] == 1)
    }

    /// Number of non-empty routes
    pub fn num_routes(&self) -> usize {
        self.routes.iter().filter(|r| !r.is_empty()).count()
    }

    /// Parse a solution from a `.sol` file.
    ///
    /// One `Route #<k>: <id...>` line per route with 1-based ids;
    /// trailing `Cost` and `Time` lines are accepted and ignored.
    pub fn from_file<P: AsRef<Path>>(instance: &CvrpInstance, path: P) -> Result<Self, String> {
        let file = File::open(&path).map_err(|e| format!("Cannot open file: {}", e))?;
        let reader = BufReader::new(file);

        let mut routes: Routes = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(|e| format!("Read error: {}", e))?;
            let line = line.trim();

            if line.is_empty() || line.starts_with("Cost") || line.starts_with("Time") {
                continue;
            }

            if line.starts_with("Route #") {
                let ids = line
                    .split_once(':')
                    .map(|(_, rest)| rest)
                    .ok_or_else(|| format!("Malformed route line: {}", line))?;

                let mut route = Vec::new();
                for token in ids.split_whitespace() {
                    let id: usize = token
                        .parse()
                        .map_err(|_| format!("Invalid node id: {}", token))?;
                    if id == 0 || id > instance.num_customers() {
                        return Err(format!("Node id out of range: {}", id));
                    }
                    route.push(id);
                }
                routes.push(route);
            }
        }

        Ok(Solution::from_routes(instance, routes, "loaded"))
    }

    /// Write the solution as a `.sol` file (1-based ids).
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let mut file = File::create(&path).map_err(|e| format!("Cannot create file: {}", e))?;

        let mut out = String::new();
        for (idx, route) in self.routes.iter().filter(|r| !r.is_empty()).enumerate() {
            out.push_str(&format!("Route #{}:", idx + 1));
            for &v in route {
                out.push_str(&format!(" {}", v));
            }
            out.push('\n');
        }
        out.push_str(&format!("Cost {}\n", self.cost));

        file.write_all(out.as_bytes())
            .map_err(|e| format!("Write failure: {}", e))
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution ({})", self.algorithm)?;
        writeln!(f, "  Cost: {:.2}", self.cost)?;
        writeln!(f, "  Feasible: {}", self.feasible)?;
        writeln!(f, "  Time: {:.4}s", self.computation_time)?;
        for (idx, route) in self.routes.iter().filter(|r| !r.is_empty()).enumerate() {
            writeln!(f, "  Route #{}: {:?}", idx + 1, route)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    fn cross_instance() -> CvrpInstance {
        // Depot at origin, four unit-ish customers
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 6),
            Node::new(2, 2.0, 0.0, 6),
            Node::new(3, 0.0, 1.0, 6),
            Node::new(4, 0.0, 2.0, 6),
        ];
        let metric = *metric_registry().get("EUC_2D").unwrap();
        CvrpInstance::new("cross", nodes, Fleet::new(2, 10), metric)
    }

    #[test]
    fn test_empty_and_singleton_routes() {
        let instance = cross_instance();

        assert_eq!(raw_cost(&instance, &[vec![]]), 0.0);
        assert!((raw_cost(&instance, &[vec![2]]) - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_feasible_cost_has_no_penalty() {
        let instance = cross_instance();
        let routes = vec![vec![1], vec![3]];

        assert!(is_feasible(&instance, &routes));
        assert_eq!(
            raw_cost(&instance, &routes),
            penalized_cost(&instance, &routes)
        );
    }

    #[test]
    fn test_penalty_dominates_at_capacity() {
        let instance = cross_instance();
        // Route 1+2 carries 12 > 10: every insertion into it must cost
        // more than any detour can save.
        let overweight = vec![vec![1, 2], vec![3], vec![4]];
        let spread = vec![vec![1], vec![2], vec![3], vec![4]];

        assert!(
            penalized_cost(&instance, &overweight)
                > penalized_cost(&instance, &spread)
        );
    }

    #[test]
    fn test_too_many_routes_is_infeasible() {
        let instance = cross_instance();
        let routes = vec![vec![1], vec![2], vec![3]];

        assert!(!is_feasible(&instance, &routes));
        // Empty routes do not count against the fleet
        let with_empties = vec![vec![1], vec![], vec![2], vec![]];
        assert!(is_feasible(&instance, &with_empties));
    }

    #[test]
    fn test_evaluator_total_on_repeated_nodes() {
        let instance = cross_instance();
        let weird = vec![vec![1, 1, 2, 1]];
        assert!(penalized_cost(&instance, &weird).is_finite());
    }

    #[test]
    fn test_sol_file_io() {
        let instance = cross_instance();
        let solution =
            Solution::from_routes(&instance, vec![vec![1, 2], vec![3, 4]], "test");

        let path = std::env::temp_dir().join("cvrp_solver_sol_io_test.sol");
        solution.write_to_file(&path).unwrap();
        let loaded = Solution::from_file(&instance, &path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.routes, solution.routes);
        assert!((loaded.cost - solution.cost).abs() < 1e-10);
    }
}
