//! Stochastic descent metaheuristic and neighbourhood operators.
//!
//! A first-improvement random walk: at each step a neighbourhood is
//! drawn uniformly from a runtime list, a random neighbour is
//! generated, and it replaces the incumbent only when its penalised
//! cost is strictly lower. The penalised evaluator lets the walk pass
//! through capacity-violating neighbours while still being pulled
//! toward feasibility.

use std::time::Instant;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::instance::CvrpInstance;
use crate::solution::{penalized_cost, Routes, Solution};
use crate::CvrpSolver;

/// A neighbourhood operator over route data.
///
/// Operators never mutate their input; they return a freshly owned
/// modified copy.
pub trait Neighbourhood {
    fn random_neighbour(&self, routes: &[Vec<usize>], rng: &mut ChaCha8Rng) -> Routes;
    fn name(&self) -> &str;
}

/// One-point exchange: remove one node from a random route and
/// reinsert it at a random position of a random route.
#[derive(Debug, Clone, Default)]
pub struct OnePointExchange;

impl OnePointExchange {
    pub fn new() -> Self {
        OnePointExchange
    }
}

impl Neighbourhood for OnePointExchange {
    fn random_neighbour(&self, routes: &[Vec<usize>], rng: &mut ChaCha8Rng) -> Routes {
        let mut neighbour = routes.to_vec();

        let non_empty: Vec<usize> = (0..neighbour.len())
            .filter(|&r| !neighbour[r].is_empty())
            .collect();
        if non_empty.is_empty() {
            return neighbour;
        }

        let source = non_empty[rng.gen_range(0..non_empty.len())];
        let position = rng.gen_range(0..neighbour[source].len());
        let node = neighbour[source].remove(position);

        let destination = rng.gen_range(0..neighbour.len());
        let slot = rng.gen_range(0..=neighbour[destination].len());
        neighbour[destination].insert(slot, node);

        neighbour
    }

    fn name(&self) -> &str {
        "OnePointExchange"
    }
}

/// Stochastic first-improvement descent around a base constructor.
pub struct StochasticDescent<S: CvrpSolver> {
    base: S,
    steps: usize,
    neighbourhoods: Vec<Box<dyn Neighbourhood>>,
    /// Fixed seed for reproducible runs; entropy-seeded when `None`.
    pub seed: Option<u64>,
    name: String,
}

impl<S: CvrpSolver> StochasticDescent<S> {
    /// Descent over the one-point-exchange neighbourhood.
    pub fn new(base: S, steps: usize) -> Self {
        Self::with_neighbourhoods(base, steps, vec![Box::new(OnePointExchange::new())])
    }

    /// Descent over a caller-provided list of neighbourhoods.
    pub fn with_neighbourhoods(
        base: S,
        steps: usize,
        neighbourhoods: Vec<Box<dyn Neighbourhood>>,
    ) -> Self {
        assert!(
            !neighbourhoods.is_empty(),
            "stochastic descent needs at least one neighbourhood"
        );
        let name = format!("Descent({})", base.name());
        StochasticDescent {
            base,
            steps,
            neighbourhoods,
            seed: None,
            name,
        }
    }
}

impl<S: CvrpSolver> CvrpSolver for StochasticDescent<S> {
    fn solve(&self, instance: &CvrpInstance) -> Solution {
        let start = Instant::now();
        let mut rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let initial = self.base.solve(instance);
        let mut best = initial.routes;
        let mut best_cost = penalized_cost(instance, &best);

        for _ in 0..self.steps {
            let k = rng.gen_range(0..self.neighbourhoods.len());
            let candidate = self.neighbourhoods[k].random_neighbour(&best, &mut rng);
            let cost = penalized_cost(instance, &candidate);
            if cost < best_cost {
                best = candidate;
                best_cost = cost;
            }
        }

        log::debug!(
            "{}: {:.2} -> {:.2} after {} steps",
            self.name,
            initial.cost,
            best_cost,
            self.steps
        );

        let mut solution = Solution::from_routes(instance, best, &self.name);
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
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    fn ring_instance(customers: usize) -> CvrpInstance {
        let mut nodes = vec![Node::new(0, 0.0, 0.0, 0)];
        for i in 0..customers {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / customers as f64;
            nodes.push(Node::new(i + 1, angle.cos(), angle.sin(), 1));
        }
        let metric = *metric_registry().get("EUC_2D").unwrap();
        CvrpInstance::new(
            "ring",
            nodes,
            Fleet::new(customers, customers as u32),
            metric,
        )
    }

    /// Base constructor producing the deliberately bad one-customer-
    /// per-route affectation.
    struct OnePerRoute;

    impl CvrpSolver for OnePerRoute {
        fn solve(&self, instance: &CvrpInstance) -> Solution {
            let routes: Routes = instance.customers().map(|v| vec![v]).collect();
            Solution::from_routes(instance, routes, self.name())
        }

        fn name(&self) -> &str {
            "OnePerRoute"
        }
    }

    #[test]
    fn test_one_point_exchange_preserves_nodes() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let routes: Routes = vec![vec![1, 2], vec![3], vec![]];

        for _ in 0..100 {
            let neighbour = OnePointExchange::new().random_neighbour(&routes, &mut rng);
            let mut nodes: Vec<usize> = neighbour.concat();
            nodes.sort_unstable();
            assert_eq!(nodes, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_empty_solution_returned_unchanged() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let routes: Routes = vec![vec![], vec![]];
        let neighbour = OnePointExchange::new().random_neighbour(&routes, &mut rng);
        assert_eq!(neighbour, routes);
    }

    #[test]
    fn test_descent_improves_bad_start() {
        let instance = ring_instance(8);

        let mut descent = StochasticDescent::new(OnePerRoute, 10_000);
        descent.seed = Some(42);

        let initial = OnePerRoute.solve(&instance);
        let improved = descent.solve(&instance);

        assert!(improved.cost < initial.cost);
        assert!(improved.feasible);
        assert!(improved.is_complete(&instance));
    }

    #[test]
    fn test_descent_never_worsens() {
        let instance = ring_instance(5);

        for seed in 0..5 {
            let mut descent = StochasticDescent::new(OnePerRoute, 100);
            descent.seed = Some(seed);

            let initial = OnePerRoute.solve(&instance);
            let result = descent.solve(&instance);
            assert!(result.cost <= initial.cost);
        }
    }

    #[test]
    #[should_panic(expected = "at least one neighbourhood")]
    fn test_empty_neighbourhood_list_is_rejected() {
        let _ = StochasticDescent::with_neighbourhoods(OnePerRoute, 10, Vec::new());
    }
}
