//! Angular sweep affectation for the CVRP.
//!
//! Customers are ordered by their polar angle around the depot,
//! measured from the direction of a reference customer, and greedily
//! grouped into capacity-respecting clusters. A repair pass tries to
//! fold surplus clusters back into the fleet when the scan opens more
//! clusters than vehicles.

use ordered_float::OrderedFloat;

use crate::heuristics::binpacking::{Affectation, RouteAffectation};
use crate::instance::{CvrpInstance, Point};

/// Sweep affectation solver.
#[derive(Debug, Clone, Default)]
pub struct SweepAffectation;

impl SweepAffectation {
    pub fn new() -> Self {
        SweepAffectation
    }
}

/// Angle of `target` around `origin`, measured counter-clockwise from
/// the direction of `reference` and normalised into [0, 2π).
///
/// `atan2` over the cross and dot products stays accurate for nearly
/// parallel and nearly opposite directions.
fn polar_angle(origin: Point, reference: Point, target: Point) -> f64 {
    let ax = reference.x - origin.x;
    let ay = reference.y - origin.y;
    let bx = target.x - origin.x;
    let by = target.y - origin.y;

    let cross = ax * by - ay * bx;
    let dot = ax * bx + ay * by;

    let angle = cross.atan2(dot);
    if angle < 0.0 {
        angle + 2.0 * std::f64::consts::PI
    } else {
        angle
    }
}

impl Affectation for SweepAffectation {
    fn solve(&self, instance: &CvrpInstance) -> RouteAffectation {
        let vehicles = instance.vehicles();
        let capacity = instance.capacity();

        if instance.dimension <= 1 {
            return RouteAffectation {
                clusters: Vec::new(),
                solvable: true,
            };
        }

        let depot = instance.point(instance.depot());
        // The first customer fixes the zero direction of the sweep.
        let reference = instance.point(1);

        let mut ordered: Vec<(usize, f64)> = instance
            .customers()
            .map(|v| (v, polar_angle(depot, reference, instance.point(v))))
            .collect();
        ordered.sort_by_key(|&(_, angle)| OrderedFloat(angle));

        // Greedy angular scan
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut loads: Vec<u32> = Vec::new();

        for (v, _) in ordered {
            let demand = instance.demand(v);
            match loads.last_mut() {
                Some(load) if *load + demand <= capacity => {
                    clusters.last_mut().unwrap().push(v);
                    *load += demand;
                }
                _ => {
                    clusters.push(vec![v]);
                    loads.push(demand);
                }
            }
        }

        // Repair pass: move nodes out of surplus clusters into any
        // earlier cluster with residual capacity.
        if clusters.len() > vehicles {
            for surplus in vehicles..clusters.len() {
                let nodes = std::mem::take(&mut clusters[surplus]);
                for v in nodes {
                    let demand = instance.demand(v);
                    let target = (0..vehicles).find(|&j| loads[j] + demand <= capacity);
                    match target {
                        Some(j) => {
                            clusters[j].push(v);
                            loads[j] += demand;
                        }
                        None => {
                            clusters[surplus].push(v);
                            loads[surplus] += demand;
                        }
                    }
                }
            }
            clusters.retain(|c| !c.is_empty());
        }

        let solvable = clusters.len() <= vehicles;
        if !solvable {
            log::warn!(
                "Sweep affectation needs {} clusters for {} vehicles",
                clusters.len(),
                vehicles
            );
        }

        RouteAffectation { clusters, solvable }
    }

    fn name(&self) -> &str {
        "Sweep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    fn instance(nodes: Vec<Node>, vehicles: usize, capacity: u32) -> CvrpInstance {
        let metric = *metric_registry().get("EUC_2D").unwrap();
        CvrpInstance::new("sweep-test", nodes, Fleet::new(vehicles, capacity), metric)
    }

    #[test]
    fn test_polar_angle_quadrants() {
        let origin = Point::new(0.0, 0.0);
        let reference = Point::new(1.0, 0.0);

        let up = polar_angle(origin, reference, Point::new(0.0, 1.0));
        let left = polar_angle(origin, reference, Point::new(-1.0, 0.0));
        let down = polar_angle(origin, reference, Point::new(0.0, -1.0));

        assert!((up - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((left - std::f64::consts::PI).abs() < 1e-12);
        assert!((down - 3.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_every_customer_in_exactly_one_cluster() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 10),
            Node::new(2, 0.0, 1.0, 10),
            Node::new(3, -1.0, 0.0, 10),
            Node::new(4, 0.0, -1.0, 10),
            Node::new(5, 1.0, 1.0, 10),
        ];
        let instance = instance(nodes, 3, 20);
        let affectation = SweepAffectation::new().solve(&instance);

        let mut seen = vec![0usize; instance.dimension];
        for cluster in &affectation.clusters {
            for &v in cluster {
                seen[v] += 1;
            }
        }
        assert!(instance.customers().all(|v| seen[v] == 1));
    }

    #[test]
    fn test_clusters_respect_capacity() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 6),
            Node::new(2, 2.0, 0.0, 6),
            Node::new(3, 0.0, 1.0, 6),
            Node::new(4, 0.0, 2.0, 6),
        ];
        let instance = instance(nodes, 2, 12);
        let affectation = SweepAffectation::new().solve(&instance);

        assert!(affectation.solvable);
        for cluster in &affectation.clusters {
            let load: u32 = cluster.iter().map(|&v| instance.demand(v)).sum();
            assert!(load <= instance.capacity());
        }
    }

    #[test]
    fn test_single_cluster_when_capacity_allows() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 10),
            Node::new(2, 0.0, 1.0, 10),
            Node::new(3, -1.0, 0.0, 10),
        ];
        let instance = instance(nodes, 1, 100);
        let affectation = SweepAffectation::new().solve(&instance);

        assert!(affectation.solvable);
        assert_eq!(affectation.clusters.len(), 1);
        assert_eq!(affectation.clusters[0].len(), 3);
    }

    #[test]
    fn test_unsolvable_when_demand_exceeds_fleet() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 6),
            Node::new(2, 0.0, 1.0, 6),
            Node::new(3, -1.0, 0.0, 6),
        ];
        let instance = instance(nodes, 1, 10);
        let affectation = SweepAffectation::new().solve(&instance);

        assert!(!affectation.solvable);
    }

    #[test]
    fn test_repair_pass_folds_surplus_clusters() {
        // Angular order fills clusters unevenly; the repair pass must
        // move the overflow node into the earlier half-full cluster.
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 6),
            Node::new(2, 1.0, 0.1, 8),
            Node::new(3, 1.0, 0.2, 3),
        ];
        let instance = instance(nodes, 2, 10);
        let affectation = SweepAffectation::new().solve(&instance);

        // The scan opens [1], [2], [3]; the repair pass folds node 3
        // back into the first cluster.
        assert!(affectation.solvable);
        assert_eq!(affectation.clusters.len(), 2);
        assert!(affectation.clusters[0].contains(&3));
    }
}
