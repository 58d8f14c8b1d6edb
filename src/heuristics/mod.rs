//! Heuristics module for the CVRP.
//!
//! Exports the affectation methods (bin packing, sweep), the TSP
//! primitives, the cluster-first/route-second composition and the
//! stochastic descent metaheuristic.

pub mod binpacking;
pub mod descent;
pub mod sweep;
pub mod tsp;
pub mod two_step;

pub use binpacking::*;
pub use descent::*;
pub use sweep::*;
pub use tsp::*;
pub use two_step::*;
