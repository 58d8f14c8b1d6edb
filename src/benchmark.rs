//! Benchmarking and experimentation module.
//!
//! Runs the heuristic pipelines over instance sets, collects per-run
//! records, aggregates statistics and exports CSV files.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution, Max, Min};

use crate::heuristics::binpacking::{BinPackingAffectation, FirstFitDecreasing};
use crate::heuristics::descent::StochasticDescent;
use crate::heuristics::sweep::SweepAffectation;
use crate::heuristics::tsp::{NearestNeighbourTsp, TwoOptTsp};
use crate::heuristics::two_step::TwoStepSolver;
use crate::instance::CvrpInstance;
use crate::CvrpSolver;

/// Result of running a single algorithm on an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmResult {
    /// Algorithm name
    pub algorithm: String,
    /// Instance name
    pub instance: String,
    /// Instance dimension
    pub dimension: usize,
    /// Fleet size
    pub vehicles: usize,
    /// Vehicle capacity
    pub capacity: u32,
    /// Penalised solution cost
    pub cost: f64,
    /// Whether the solution is feasible
    pub feasible: bool,
    /// Computation time in seconds
    pub time: f64,
}

/// Aggregated statistics for an algorithm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgorithmStatistics {
    pub algorithm: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    pub avg_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub std_cost: f64,
    pub avg_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Number of seeded runs of the stochastic methods
    pub num_runs: usize,
    /// Descent steps per stochastic run
    pub descent_steps: usize,
    /// Run instances in parallel
    pub parallel: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            num_runs: 5,
            descent_steps: 10_000,
            parallel: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<AlgorithmResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[AlgorithmResult] {
        &self.results
    }

    /// Run the full pipeline set on one instance.
    pub fn run_instance(&mut self, instance: &CvrpInstance) {
        let records = run_pipelines(instance, &self.config);
        self.results.extend(records);
    }

    /// Run the full pipeline set over every instance of a directory.
    pub fn run_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<(), String> {
        let instances = load_instances_from_dir(dir)?;
        if instances.is_empty() {
            return Err("No instances found".to_string());
        }

        let bar = ProgressBar::new(instances.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        if self.config.parallel {
            let config = self.config.clone();
            let records: Vec<Vec<AlgorithmResult>> = instances
                .par_iter()
                .map(|instance| {
                    let records = run_pipelines(instance, &config);
                    bar.inc(1);
                    records
                })
                .collect();
            self.results.extend(records.into_iter().flatten());
        } else {
            for instance in &instances {
                bar.set_message(instance.name.clone());
                self.run_instance(instance);
                bar.inc(1);
            }
        }

        bar.finish_and_clear();
        Ok(())
    }

    /// Aggregate per-algorithm statistics over the recorded runs.
    pub fn statistics(&self) -> Vec<AlgorithmStatistics> {
        let mut algorithms: Vec<String> = self
            .results
            .iter()
            .map(|r| r.algorithm.clone())
            .collect();
        algorithms.sort();
        algorithms.dedup();

        algorithms
            .into_iter()
            .map(|algorithm| {
                let runs: Vec<&AlgorithmResult> = self
                    .results
                    .iter()
                    .filter(|r| r.algorithm == algorithm)
                    .collect();

                let costs = Data::new(runs.iter().map(|r| r.cost).collect::<Vec<f64>>());
                let times: f64 = runs.iter().map(|r| r.time).sum();

                AlgorithmStatistics {
                    algorithm,
                    num_runs: runs.len(),
                    num_feasible: runs.iter().filter(|r| r.feasible).count(),
                    avg_cost: costs.mean().unwrap_or(0.0),
                    best_cost: costs.min(),
                    worst_cost: costs.max(),
                    std_cost: costs.std_dev().unwrap_or(0.0),
                    avg_time: times / runs.len() as f64,
                }
            })
            .collect()
    }

    /// Export all per-run records as CSV.
    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let mut writer =
            csv::Writer::from_path(&path).map_err(|e| format!("Cannot create CSV: {}", e))?;
        for record in &self.results {
            writer
                .serialize(record)
                .map_err(|e| format!("CSV write failure: {}", e))?;
        }
        writer
            .flush()
            .map_err(|e| format!("CSV write failure: {}", e))
    }

    /// Human-readable summary table.
    pub fn generate_report(&self) -> String {
        let mut report = format!(
            "Benchmark report ({})\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        report.push_str(&format!(
            "{:<20} {:>6} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "Algorithm", "Runs", "Feasible", "Best", "Average", "Worst", "Avg Time"
        ));
        report.push_str(&"-".repeat(80));
        report.push('\n');

        for stats in self.statistics() {
            report.push_str(&format!(
                "{:<20} {:>6} {:>10} {:>10.2} {:>10.2} {:>10.2} {:>10.4}\n",
                stats.algorithm,
                stats.num_runs,
                stats.num_feasible,
                stats.best_cost,
                stats.avg_cost,
                stats.worst_cost,
                stats.avg_time
            ));
        }

        report
    }
}

/// Run every benchmarked pipeline on one instance.
fn run_pipelines(instance: &CvrpInstance, config: &BenchmarkConfig) -> Vec<AlgorithmResult> {
    let mut records = Vec::new();

    let solvers: Vec<Box<dyn CvrpSolver>> = vec![
        Box::new(TwoStepSolver::new(
            SweepAffectation::new(),
            NearestNeighbourTsp::new(),
        )),
        Box::new(TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new())),
        Box::new(TwoStepSolver::new(
            BinPackingAffectation::new(FirstFitDecreasing::new()),
            TwoOptTsp::new(),
        )),
    ];

    for solver in &solvers {
        records.push(record_run(instance, solver.as_ref()));
    }

    for seed in 0..config.num_runs as u64 {
        let base = TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new());
        let mut descent = StochasticDescent::new(base, config.descent_steps);
        descent.seed = Some(seed);
        records.push(record_run(instance, &descent));
    }

    records
}

fn record_run(instance: &CvrpInstance, solver: &dyn CvrpSolver) -> AlgorithmResult {
    let start = Instant::now();
    let solution = solver.solve(instance);
    let time = start.elapsed().as_secs_f64();

    AlgorithmResult {
        algorithm: solver.name().to_string(),
        instance: instance.name.clone(),
        dimension: instance.dimension,
        vehicles: instance.vehicles(),
        capacity: instance.capacity(),
        cost: solution.cost,
        feasible: solution.feasible,
        time,
    }
}

/// Load every `.vrp` instance of a directory.
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<CvrpInstance>, String> {
    let entries =
        std::fs::read_dir(&dir).map_err(|e| format!("Cannot read directory: {}", e))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "vrp"))
        .collect();
    paths.sort();

    let mut instances = Vec::new();
    for path in paths {
        match CvrpInstance::from_file(&path) {
            Ok(instance) => instances.push(instance),
            Err(e) => log::warn!("Skipping {:?}: {}", path, e),
        }
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{metric_registry, Fleet, Node};

    fn toy_instance() -> CvrpInstance {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 5),
            Node::new(2, 0.0, 1.0, 5),
            Node::new(3, -1.0, 0.0, 5),
        ];
        let metric = *metric_registry().get("EUC_2D").unwrap();
        CvrpInstance::new("bench-toy", nodes, Fleet::new(2, 10), metric)
    }

    #[test]
    fn test_run_instance_records_every_pipeline() {
        let config = BenchmarkConfig {
            num_runs: 2,
            descent_steps: 100,
            parallel: false,
        };
        let mut benchmark = Benchmark::new(config);
        benchmark.run_instance(&toy_instance());

        // 3 deterministic pipelines + 2 descent runs
        assert_eq!(benchmark.results().len(), 5);
    }

    #[test]
    fn test_statistics_group_by_algorithm() {
        let config = BenchmarkConfig {
            num_runs: 3,
            descent_steps: 50,
            parallel: false,
        };
        let mut benchmark = Benchmark::new(config);
        benchmark.run_instance(&toy_instance());

        let stats = benchmark.statistics();
        let descent = stats
            .iter()
            .find(|s| s.algorithm.starts_with("Descent"))
            .expect("descent stats expected");

        assert_eq!(descent.num_runs, 3);
        assert!(descent.best_cost <= descent.avg_cost);
        assert!(descent.avg_cost <= descent.worst_cost);
    }
}
