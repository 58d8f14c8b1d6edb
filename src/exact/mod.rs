//! Exact solvers module.
//!
//! The MIP formulations are driven through the `grb` crate and only
//! compiled with the `gurobi` feature; the cut-separation and min-cut
//! machinery they rely on is solver-independent and always available.

pub mod mincut;
pub mod separation;

#[cfg(feature = "gurobi")]
mod mtz;
#[cfg(feature = "gurobi")]
pub use mtz::MtzSolver;

#[cfg(feature = "gurobi")]
mod two_index;
#[cfg(feature = "gurobi")]
pub use two_index::TwoIndexSolver;

#[cfg(feature = "gurobi")]
mod technician;
#[cfg(feature = "gurobi")]
pub use technician::AggTvrpSolver;

use crate::solution::{Routes, Solution};

/// Which connectivity-cut variant the user-cut callback separates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutStrategy {
    /// Undirected min cut over `max(x_ij, x_ji)` capacities
    Symmetric,
    /// Directed min cut over the raw arc values
    Asymmetric,
}

/// MIP solver configuration
#[derive(Debug, Clone)]
pub struct MipConfig {
    /// Time limit in seconds
    pub time_limit: f64,
    /// MIP gap tolerance
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    /// Enable verbose solver output
    pub verbose: bool,
    /// Warm start routes from a heuristic solution
    pub warm_start: Option<Routes>,
    /// Connectivity-cut variant separated at fractional nodes
    pub cut_strategy: CutStrategy,
}

impl Default for MipConfig {
    fn default() -> Self {
        MipConfig {
            time_limit: 3600.0,
            mip_gap: 1e-6,
            threads: 0,
            verbose: false,
            warm_start: None,
            cut_strategy: CutStrategy::Symmetric,
        }
    }
}

/// Result of exact solving
#[derive(Debug, Clone)]
pub struct ExactResult {
    /// Best solution found (empty when the solver failed)
    pub solution: Solution,
    /// Lower bound from the solver
    pub lower_bound: f64,
    /// Upper bound (best integer solution)
    pub upper_bound: f64,
    /// Optimality gap
    pub gap: f64,
    /// Whether optimality was proven
    pub optimal: bool,
    /// Solver status
    pub status: String,
    /// Number of branch-and-bound nodes explored
    pub nodes_explored: i64,
}

// Without the `gurobi` feature the exact solvers become stubs that
// fail with a diagnostic, so the rest of the crate keeps compiling.
#[cfg(not(feature = "gurobi"))]
mod stubs {
    use super::{ExactResult, MipConfig};
    use crate::instance::CvrpInstance;
    use crate::solution::Solution;
    use crate::tvrp::TvrpInstance;
    use crate::CvrpSolver;

    macro_rules! stub_solver {
        ($name:ident, $label:expr) => {
            /// Stub compiled without the `gurobi` feature.
            pub struct $name {
                pub config: MipConfig,
            }

            impl $name {
                pub fn new(config: MipConfig) -> Self {
                    $name { config }
                }

                pub fn optimise(&self, _instance: &CvrpInstance) -> Result<ExactResult, String> {
                    Err(format!(
                        "{} requires the `gurobi` feature to be enabled",
                        $label
                    ))
                }
            }

            impl CvrpSolver for $name {
                fn solve(&self, instance: &CvrpInstance) -> Solution {
                    match self.optimise(instance) {
                        Ok(result) => result.solution,
                        Err(e) => {
                            log::error!("{}", e);
                            eprintln!("{}", e);
                            Solution::from_routes(instance, Vec::new(), $label)
                        }
                    }
                }

                fn name(&self) -> &str {
                    $label
                }
            }
        };
    }

    stub_solver!(MtzSolver, "MTZ");
    stub_solver!(TwoIndexSolver, "TwoIndex");

    /// Stub of the aggregated TVRP solver.
    pub struct AggTvrpSolver {
        pub config: MipConfig,
    }

    impl AggTvrpSolver {
        pub fn new(config: MipConfig) -> Self {
            AggTvrpSolver { config }
        }

        pub fn solve(&self, instance: &TvrpInstance) -> Solution {
            let message = "AggTvrp requires the `gurobi` feature to be enabled";
            log::error!("{}", message);
            eprintln!("{}", message);
            Solution::from_routes(instance.cvrp(), Vec::new(), "AggTvrp")
        }
    }
}

#[cfg(not(feature = "gurobi"))]
pub use stubs::{AggTvrpSolver, MtzSolver, TwoIndexSolver};
