//! CVRP Solver - Command Line Interface
//!
//! Loads an instance, runs a configurable pipeline (affectation ->
//! TSP -> optional descent -> optional exact formulation) and writes
//! the solution file and its plot.

use clap::{Parser, Subcommand, ValueEnum};
use cvrp_solver::benchmark::{Benchmark, BenchmarkConfig};
use cvrp_solver::exact::{AggTvrpSolver, CutStrategy, MipConfig, MtzSolver, TwoIndexSolver};
use cvrp_solver::heuristics::binpacking::{Affectation, BinPackingAffectation, FirstFitDecreasing};
use cvrp_solver::heuristics::descent::StochasticDescent;
use cvrp_solver::heuristics::sweep::SweepAffectation;
use cvrp_solver::heuristics::tsp::{CheapestInsertionTsp, NearestNeighbourTsp, TspSolver, TwoOptTsp};
use cvrp_solver::heuristics::two_step::TwoStepSolver;
use cvrp_solver::instance::CvrpInstance;
use cvrp_solver::solution::Solution;
use cvrp_solver::tvrp::TvrpInstance;
use cvrp_solver::visualization::SolutionPlotter;
use cvrp_solver::CvrpSolver;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "cvrp-solver")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "A solver for the Capacitated Vehicle Routing Problem")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a single instance
    Solve {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Clustering method of the constructive phase
        #[arg(short, long, value_enum, default_value = "sweep")]
        affectation: AffectationChoice,

        /// TSP primitive routing each cluster
        #[arg(short, long, value_enum, default_value = "two-opt")]
        tsp: TspChoice,

        /// Stochastic descent steps (0 disables the descent)
        #[arg(short, long, default_value = "0")]
        descent_steps: usize,

        /// Exact formulation run after the heuristics
        #[arg(short, long, value_enum, default_value = "none")]
        exact: ExactChoice,

        /// Connectivity-cut variant of the MTZ callback
        #[arg(long, value_enum, default_value = "symmetric")]
        cuts: CutChoice,

        /// Time limit for the exact solver in seconds
        #[arg(long, default_value = "3600")]
        time_limit: f64,

        /// Random seed for the descent
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output solution file (defaults to <instance>.sol)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also dump the solution as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Generate a plot of the solution
        #[arg(long)]
        plot: bool,

        /// Plot file extension / gnuplot terminal
        #[arg(long, default_value = "png")]
        plot_ext: String,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Analyze an instance
    Analyze {
        /// Path to the instance file
        #[arg(short, long)]
        instance: PathBuf,
    },

    /// Run benchmarks on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        /// Output CSV file
        #[arg(short, long, default_value = "results.csv")]
        output: PathBuf,

        /// Number of seeded descent runs
        #[arg(short, long, default_value = "5")]
        runs: usize,

        /// Descent steps per run
        #[arg(long, default_value = "10000")]
        descent_steps: usize,

        /// Process instances sequentially
        #[arg(long)]
        sequential: bool,
    },

    /// Solve a technician instance with the aggregated exact model
    Tvrp {
        /// Path to the .tvrp instance file
        #[arg(short, long)]
        instance: PathBuf,

        /// Output solution file (defaults to <instance>.sol)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Time limit in seconds
        #[arg(long, default_value = "3600")]
        time_limit: f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum AffectationChoice {
    /// Angular sweep around the depot
    Sweep,
    /// First-fit-decreasing bin packing
    Ffd,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum TspChoice {
    /// Nearest neighbour construction
    Nn,
    /// Cheapest insertion construction
    Insertion,
    /// 2-opt improvement over nearest neighbour
    TwoOpt,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ExactChoice {
    /// Heuristics only
    None,
    /// MTZ formulation with connectivity cuts
    Mtz,
    /// Symmetric two-index formulation with rounded-capacity cuts
    TwoIndex,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum CutChoice {
    /// Undirected min-cut separation
    Symmetric,
    /// Directed min-cut separation
    Asymmetric,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            instance,
            affectation,
            tsp,
            descent_steps,
            exact,
            cuts,
            time_limit,
            seed,
            output,
            json,
            plot,
            plot_ext,
            verbose,
        } => solve_instance(SolveArgs {
            path: instance,
            affectation,
            tsp,
            descent_steps,
            exact,
            cuts,
            time_limit,
            seed,
            output,
            json,
            plot,
            plot_ext,
            verbose,
        }),

        Commands::Analyze { instance } => analyze_instance(&instance),

        Commands::Benchmark {
            dir,
            output,
            runs,
            descent_steps,
            sequential,
        } => run_benchmark(&dir, &output, runs, descent_steps, !sequential),

        Commands::Tvrp {
            instance,
            output,
            time_limit,
        } => solve_tvrp(&instance, output, time_limit),
    }
}

struct SolveArgs {
    path: PathBuf,
    affectation: AffectationChoice,
    tsp: TspChoice,
    descent_steps: usize,
    exact: ExactChoice,
    cuts: CutChoice,
    time_limit: f64,
    seed: Option<u64>,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    plot: bool,
    plot_ext: String,
    verbose: bool,
}

fn load_or_exit(path: &Path) -> CvrpInstance {
    match CvrpInstance::from_file(path) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_instance(args: SolveArgs) {
    println!("Loading instance from {:?}...", args.path);
    let instance = load_or_exit(&args.path);

    if args.verbose {
        println!("{}", instance.statistics());
    }

    let start = Instant::now();
    let heuristic = run_heuristics(&instance, &args);

    let solution = match args.exact {
        ExactChoice::None => heuristic,
        ExactChoice::Mtz => {
            let config = MipConfig {
                time_limit: args.time_limit,
                verbose: args.verbose,
                warm_start: Some(heuristic.routes.clone()),
                cut_strategy: match args.cuts {
                    CutChoice::Symmetric => CutStrategy::Symmetric,
                    CutChoice::Asymmetric => CutStrategy::Asymmetric,
                },
                ..Default::default()
            };
            MtzSolver::new(config).solve(&instance)
        }
        ExactChoice::TwoIndex => {
            let config = MipConfig {
                time_limit: args.time_limit,
                verbose: args.verbose,
                ..Default::default()
            };
            TwoIndexSolver::new(config).solve(&instance)
        }
    };

    let elapsed = start.elapsed();

    println!("\n========== Results ==========");
    println!("Algorithm: {}", solution.algorithm);
    println!("Cost: {:.2}", solution.cost);
    println!("Feasible: {}", solution.feasible);
    println!("Routes: {}", solution.num_routes());
    println!("Time: {:.4}s", elapsed.as_secs_f64());

    if args.verbose {
        print!("{}", solution);
    }

    let sol_path = args
        .output
        .unwrap_or_else(|| args.path.with_extension("sol"));
    match solution.write_to_file(&sol_path) {
        Ok(()) => println!("Solution saved to {:?}", sol_path),
        Err(e) => {
            eprintln!("Failed to write solution: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(json_path) = args.json {
        let data = serde_json::to_string_pretty(&solution).expect("serializable solution");
        if let Err(e) = std::fs::write(&json_path, data) {
            eprintln!("Failed to write JSON: {}", e);
        } else {
            println!("JSON saved to {:?}", json_path);
        }
    }

    if args.plot {
        let plot_path = args.path.with_extension(&args.plot_ext);
        match SolutionPlotter::new().export_plot(&instance, &solution, &plot_path) {
            Ok(()) => println!("Plot written to {:?}", plot_path),
            Err(e) => eprintln!("Plot export failed: {}", e),
        }
    }
}

fn run_heuristics(instance: &CvrpInstance, args: &SolveArgs) -> Solution {
    let affectation: Box<dyn Affectation> = match args.affectation {
        AffectationChoice::Sweep => Box::new(SweepAffectation::new()),
        AffectationChoice::Ffd => Box::new(BinPackingAffectation::new(FirstFitDecreasing::new())),
    };
    let tsp: Box<dyn TspSolver> = match args.tsp {
        TspChoice::Nn => Box::new(NearestNeighbourTsp::new()),
        TspChoice::Insertion => Box::new(CheapestInsertionTsp::new()),
        TspChoice::TwoOpt => Box::new(TwoOptTsp::new()),
    };

    let two_step = TwoStepSolver::new(affectation, tsp);

    if args.descent_steps > 0 {
        let mut descent = StochasticDescent::new(two_step, args.descent_steps);
        descent.seed = args.seed;
        descent.solve(instance)
    } else {
        two_step.solve(instance)
    }
}

fn analyze_instance(path: &Path) {
    let instance = load_or_exit(path);

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let lower_fleet =
        (instance.total_demand() + instance.capacity() - 1) / instance.capacity().max(1);
    println!("Fleet lower bound (demand / capacity): {}", lower_fleet);

    let sweep = TwoStepSolver::new(SweepAffectation::new(), TwoOptTsp::new());
    let quick = sweep.solve(&instance);
    println!(
        "\nQuick estimate ({}): {:.2} (feasible: {})",
        quick.algorithm, quick.cost, quick.feasible
    );
}

fn run_benchmark(dir: &Path, output: &Path, runs: usize, descent_steps: usize, parallel: bool) {
    let config = BenchmarkConfig {
        num_runs: runs,
        descent_steps,
        parallel,
    };
    let mut benchmark = Benchmark::new(config);

    println!("Running benchmarks on {:?}...", dir);
    if let Err(e) = benchmark.run_directory(dir) {
        eprintln!("Benchmark failed: {}", e);
        std::process::exit(1);
    }

    println!("{}", benchmark.generate_report());

    match benchmark.export_csv(output) {
        Ok(()) => println!("Results exported to {:?}", output),
        Err(e) => {
            eprintln!("Failed to export results: {}", e);
            std::process::exit(1);
        }
    }
}

fn solve_tvrp(path: &Path, output: Option<PathBuf>, time_limit: f64) {
    println!("Loading TVRP instance from {:?}...", path);
    let instance = match TvrpInstance::from_file(path) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Error loading instance: {}", e);
            std::process::exit(1);
        }
    };

    let config = MipConfig {
        time_limit,
        ..Default::default()
    };
    let solution = AggTvrpSolver::new(config).solve(&instance);

    println!("\n========== Results ==========");
    println!("Cost: {:.2}", solution.cost);
    println!("Feasible: {}", solution.feasible);
    println!("Routes: {}", solution.num_routes());

    let sol_path = output.unwrap_or_else(|| path.with_extension("sol"));
    match solution.write_to_file(&sol_path) {
        Ok(()) => println!("Solution saved to {:?}", sol_path),
        Err(e) => {
            eprintln!("Failed to write solution: {}", e);
            std::process::exit(1);
        }
    }
}
