//! Bin-packing affectation for the CVRP.
//!
//! Two bin-packing strategies share one interface: first-fit-decreasing
//! and a MIP formulation (behind the `gurobi` feature). The affectation
//! adapter packs the customer demands into `K` bins of capacity `Q` and
//! maps the bins back to node clusters.

use crate::instance::CvrpInstance;

/// Per-bin capacities of a bin-packing problem.
#[derive(Debug, Clone)]
pub struct BinPackingParams {
    pub capacities: Vec<u32>,
}

impl BinPackingParams {
    pub fn new(capacities: Vec<u32>) -> Self {
        BinPackingParams { capacities }
    }

    /// `bins` identical bins of the given capacity.
    pub fn uniform(bins: usize, capacity: u32) -> Self {
        BinPackingParams {
            capacities: vec![capacity; bins],
        }
    }

    pub fn num_bins(&self) -> usize {
        self.capacities.len()
    }
}

/// Result of a bin-packing run: per-bin item indices, and whether every
/// item was placed.
#[derive(Debug, Clone)]
pub struct BinPackingResult {
    pub bins: Vec<Vec<usize>>,
    pub solvable: bool,
}

/// Common interface of the bin-packing strategies.
pub trait BinPacking {
    fn solve(&self, params: &BinPackingParams, items: &[u32]) -> BinPackingResult;
    fn name(&self) -> &str;
}

/// First-Fit-Decreasing bin packing.
///
/// Items are placed largest-first into the lowest-index bin with enough
/// remaining capacity; `solvable` is false as soon as an item fits
/// nowhere.
#[derive(Debug, Clone, Default)]
pub struct FirstFitDecreasing;

impl FirstFitDecreasing {
    pub fn new() -> Self {
        FirstFitDecreasing
    }
}

impl BinPacking for FirstFitDecreasing {
    fn solve(&self, params: &BinPackingParams, items: &[u32]) -> BinPackingResult {
        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); params.num_bins()];
        let mut free: Vec<u32> = params.capacities.clone();

        // Sort item indices by descending size, keeping the original
        // indices so bins refer to the caller's items.
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&a, &b| items[b].cmp(&items[a]));

        let mut solvable = true;
        for &item in &order {
            let fit = free.iter().position(|&space| space >= items[item]);
            match fit {
                Some(bin) => {
                    bins[bin].push(item);
                    free[bin] -= items[item];
                }
                None => {
                    solvable = false;
                    break;
                }
            }
        }

        BinPackingResult { bins, solvable }
    }

    fn name(&self) -> &str {
        "FFD"
    }
}

/// Exact bin packing through a MIP model.
///
/// Maximises the number of placements subject to each item being placed
/// exactly once and each bin staying within capacity; an infeasible
/// model reports `solvable = false`.
#[cfg(feature = "gurobi")]
#[derive(Debug, Clone, Default)]
pub struct MipBinPacking;

#[cfg(feature = "gurobi")]
impl MipBinPacking {
    pub fn new() -> Self {
        MipBinPacking
    }

    fn optimise(
        &self,
        params: &BinPackingParams,
        items: &[u32],
    ) -> grb::Result<Option<Vec<Vec<usize>>>> {
        use grb::prelude::*;

        let num_bins = params.num_bins();
        let env = Env::new("")?;
        let mut model = Model::with_env("binpacking", env)?;
        model.set_param(param::OutputFlag, 0)?;

        let mut vars: Vec<Vec<Var>> = Vec::with_capacity(items.len());
        for i in 0..items.len() {
            let mut row = Vec::with_capacity(num_bins);
            for j in 0..num_bins {
                row.push(add_binvar!(model, name: &format!("x_{}_{}", i, j), obj: 1.0)?);
            }
            vars.push(row);
        }
        model.set_attr(attr::ModelSense, ModelSense::Maximize)?;

        for (j, &capacity) in params.capacities.iter().enumerate() {
            let load = items
                .iter()
                .enumerate()
                .map(|(i, &size)| size as f64 * vars[i][j])
                .grb_sum();
            let capacity = capacity as f64;
            model.add_constr(&format!("cap_{}", j), c!(load <= capacity))?;
        }

        for (i, row) in vars.iter().enumerate() {
            let placed = row.iter().copied().grb_sum();
            model.add_constr(&format!("once_{}", i), c!(placed == 1.0))?;
        }

        model.optimize()?;

        if model.status()? != Status::Optimal {
            return Ok(None);
        }

        let mut bins: Vec<Vec<usize>> = vec![Vec::new(); num_bins];
        for (i, row) in vars.iter().enumerate() {
            for (j, var) in row.iter().enumerate() {
                if model.get_obj_attr(attr::X, var)? > 0.5 {
                    bins[j].push(i);
                }
            }
        }

        Ok(Some(bins))
    }
}

#[cfg(feature = "gurobi")]
impl BinPacking for MipBinPacking {
    fn solve(&self, params: &BinPackingParams, items: &[u32]) -> BinPackingResult {
        match self.optimise(params, items) {
            Ok(Some(bins)) => BinPackingResult {
                bins,
                solvable: true,
            },
            Ok(None) => BinPackingResult {
                bins: Vec::new(),
                solvable: false,
            },
            Err(e) => {
                log::error!("Bin-packing MIP failed: {}", e);
                BinPackingResult {
                    bins: Vec::new(),
                    solvable: false,
                }
            }
        }
    }

    fn name(&self) -> &str {
        "MIP-BinPacking"
    }
}

/// Clusters of customer ids produced by an affectation method.
#[derive(Debug, Clone)]
pub struct RouteAffectation {
    pub clusters: Vec<Vec<usize>>,
    pub solvable: bool,
}

/// Cluster-building step of the two-step solver.
pub trait Affectation {
    fn solve(&self, instance: &CvrpInstance) -> RouteAffectation;
    fn name(&self) -> &str;
}

impl Affectation for Box<dyn Affectation> {
    fn solve(&self, instance: &CvrpInstance) -> RouteAffectation {
        (**self).solve(instance)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Adapter turning any bin-packing strategy into a route affectation:
/// `K` bins of capacity `Q`, customer demands as items.
#[derive(Debug, Clone)]
pub struct BinPackingAffectation<B: BinPacking> {
    packer: B,
    name: String,
}

impl<B: BinPacking> BinPackingAffectation<B> {
    pub fn new(packer: B) -> Self {
        let name = format!("BinPacking({})", packer.name());
        BinPackingAffectation { packer, name }
    }
}

impl<B: BinPacking> Affectation for BinPackingAffectation<B> {
    fn solve(&self, instance: &CvrpInstance) -> RouteAffectation {
        let params = BinPackingParams::uniform(instance.vehicles(), instance.capacity());
        let items: Vec<u32> = instance.customers().map(|v| instance.demand(v)).collect();

        let packed = self.packer.solve(&params, &items);

        // Item index i corresponds to customer node i + 1
        let clusters = packed
            .bins
            .iter()
            .map(|bin| bin.iter().map(|&item| item + 1).collect())
            .collect();

        RouteAffectation {
            clusters,
            solvable: packed.solvable,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    #[test]
    fn test_ffd_packs_small_example() {
        let params = BinPackingParams::uniform(2, 7);
        let result = FirstFitDecreasing::new().solve(&params, &[3, 2, 3, 2, 2, 2]);

        assert!(result.solvable);
        let mut placed: Vec<usize> = result.bins.concat();
        placed.sort_unstable();
        assert_eq!(placed, vec![0, 1, 2, 3, 4, 5]);

        for (bin, &cap) in result.bins.iter().zip(&params.capacities) {
            let load: u32 = bin.iter().map(|&i| [3u32, 2, 3, 2, 2, 2][i]).sum();
            assert!(load <= cap);
        }
    }

    #[test]
    fn test_ffd_reports_unsolvable() {
        let params = BinPackingParams::uniform(1, 5);
        let result = FirstFitDecreasing::new().solve(&params, &[6, 6, 6]);
        assert!(!result.solvable);
    }

    #[test]
    fn test_affectation_maps_items_to_nodes() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 4),
            Node::new(2, 2.0, 0.0, 4),
            Node::new(3, 3.0, 0.0, 4),
        ];
        let metric = *metric_registry().get("EUC_2D").unwrap();
        let instance = CvrpInstance::new("ffd-map", nodes, Fleet::new(2, 8), metric);

        let affectation = BinPackingAffectation::new(FirstFitDecreasing::new()).solve(&instance);

        assert!(affectation.solvable);
        let mut nodes: Vec<usize> = affectation.clusters.concat();
        nodes.sort_unstable();
        assert_eq!(nodes, vec![1, 2, 3]);
    }
}
