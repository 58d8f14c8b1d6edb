//! CVRP Solver Library
//!
//! A solver for the Capacitated Vehicle Routing Problem (CVRP) and its
//! technician variant (TVRP).
//!
//! # Features
//!
//! - Cluster-first/route-second construction (sweep or bin-packing
//!   affectation followed by a metric-TSP routine per cluster)
//! - Stochastic first-improvement descent over pluggable neighbourhoods
//! - Exact MTZ and two-index MIP formulations with min-cut connectivity
//!   user cuts and rounded-capacity lazy cuts (Gurobi, behind the
//!   `gurobi` feature)
//! - Instance/solution file I/O and gnuplot export
//! - Benchmarking tools
//!
//! # Example
//!
//! ```no_run
//! use cvrp_solver::instance::CvrpInstance;
//! use cvrp_solver::heuristics::sweep::SweepAffectation;
//! use cvrp_solver::heuristics::tsp::TwoOptTsp;
//! use cvrp_solver::heuristics::two_step::TwoStepSolver;
//! use cvrp_solver::heuristics::descent::StochasticDescent;
//! use cvrp_solver::CvrpSolver;
//!
//! // Load instance
//! let instance = CvrpInstance::from_file("A-n33-k5.vrp").unwrap();
//!
//! // Cluster-first/route-second construction
//! let two_step = TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new());
//!
//! // Improve with 10 000 descent steps
//! let descent = StochasticDescent::new(two_step, 10_000);
//! let solution = descent.solve(&instance);
//!
//! println!("Solution cost: {:.2}", solution.cost);
//! ```

pub mod benchmark;
pub mod exact;
pub mod heuristics;
pub mod instance;
pub mod solution;
pub mod tvrp;
pub mod visualization;

pub use instance::CvrpInstance;
pub use solution::Solution;

/// Common capability of every CVRP solver in this crate.
///
/// Constructive, exact and metaheuristic methods all expose the same
/// entry point; compositional solvers (two-step, stochastic descent)
/// take their inner solver by value and forward to it.
pub trait CvrpSolver {
    fn solve(&self, instance: &CvrpInstance) -> Solution;
    fn name(&self) -> &str;
}
