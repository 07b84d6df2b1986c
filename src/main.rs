//! QBF Tabu Search - Command Line Interface
//!
//! Solves QBF and MAX-SC-QBF instances with tabu search and runs the
//! reference experiments.

use clap::{Parser, Subcommand, ValueEnum};
use qbf_tabu::benchmark::{
    load_instances_from_dir, standard_configurations, Benchmark, BenchmarkConfig,
};
use qbf_tabu::evaluator::{maximizing_evaluator, Evaluator};
use qbf_tabu::heuristics::construction::{ConstructionHeuristic, SemiGreedyConstruction};
use qbf_tabu::instance::{InstanceKind, QbfInstance};
use qbf_tabu::search::{LogObserver, StrategyConfig, TabuConfig, TabuSearch};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "qbf-tabu")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Tabu Search for QBF and MAX-SC-QBF")]
struct Cli {
    /// Debug-level logging (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one instance
    Solve {
        #[arg(short, long)]
        instance: PathBuf,

        /// Instance layout
        #[arg(short, long, value_enum, default_value = "set-cover")]
        kind: Kind,

        /// Neighborhood strategy
        #[arg(long, value_enum, default_value = "first-improving")]
        strategy: Strategy,

        /// Tabu tenure (the tabu list holds twice as many slots)
        #[arg(short, long, default_value = "20")]
        tenure: usize,

        /// Iteration budget
        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,

        /// Random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Probabilistic tabu: acceptance decay
        #[arg(long, default_value = "2.0")]
        alpha: f64,

        /// Intensification: size of the elite set
        #[arg(long, default_value = "5")]
        elite_size: usize,

        /// Intensification: window length in iterations
        #[arg(long, default_value = "50")]
        window: usize,

        /// Wall-clock limit in seconds
        #[arg(long, value_parser = parse_time_limit)]
        time_limit: Option<f64>,

        /// Fail on unreadable instances instead of falling back to a trivial one
        #[arg(long)]
        strict: bool,

        /// Write the result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the reference configurations on a directory of instances
    Benchmark {
        /// Directory containing instance files
        #[arg(short, long)]
        dir: PathBuf,

        #[arg(short, long, value_enum, default_value = "set-cover")]
        kind: Kind,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Seeds per configuration
        #[arg(short, long, default_value = "1")]
        runs: usize,

        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,

        /// Time limit per run in seconds
        #[arg(short, long, value_parser = parse_time_limit)]
        time_limit: Option<f64>,

        /// Maximum instance size
        #[arg(long)]
        max_size: Option<usize>,
    },

    /// Analyze an instance
    Analyze {
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short, long, value_enum, default_value = "set-cover")]
        kind: Kind,
    },

    /// Compare the reference configurations on an instance
    Compare {
        #[arg(short, long)]
        instance: PathBuf,

        #[arg(short, long, value_enum, default_value = "set-cover")]
        kind: Kind,

        /// Number of seeds
        #[arg(short, long, default_value = "5")]
        runs: usize,

        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,

        /// Time limit per run in seconds
        #[arg(short, long, value_parser = parse_time_limit)]
        time_limit: Option<f64>,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Kind {
    /// Plain QBF
    Qbf,
    /// MAX-SC-QBF (covering sets before the matrix)
    SetCover,
}

impl From<Kind> for InstanceKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Qbf => InstanceKind::Qbf,
            Kind::SetCover => InstanceKind::SetCover,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Strategy {
    /// Commit the best admissible move of the whole neighborhood
    BestImproving,
    /// Commit the first admissible improving move
    FirstImproving,
    /// First-improving with probabilistic tabu acceptance
    Probabilistic,
    /// First-improving with elite intensification
    Intensification,
}

/// Accept only finite, non-negative second counts
fn parse_time_limit(s: &str) -> Result<f64, String> {
    let seconds: f64 = s
        .parse()
        .map_err(|e| format!("invalid time limit {:?}: {}", s, e))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("time limit must be a non-negative number of seconds, got {}", s));
    }
    Ok(seconds)
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let outcome = match cli.command {
        Commands::Solve {
            instance,
            kind,
            strategy,
            tenure,
            iterations,
            seed,
            alpha,
            elite_size,
            window,
            time_limit,
            strict,
            output,
        } => {
            let strategy = match strategy {
                Strategy::BestImproving => StrategyConfig::BestImproving,
                Strategy::FirstImproving => StrategyConfig::FirstImproving,
                Strategy::Probabilistic => StrategyConfig::Probabilistic { alpha },
                Strategy::Intensification => StrategyConfig::Intensification { elite_size, window },
            };
            let config = TabuConfig::new(tenure, iterations, seed, strategy);
            solve_instance(&instance, kind.into(), config, time_limit, strict, output)
        }

        Commands::Benchmark {
            dir,
            kind,
            output,
            runs,
            iterations,
            time_limit,
            max_size,
        } => run_benchmark(&dir, kind.into(), &output, runs, iterations, time_limit, max_size),

        Commands::Analyze { instance, kind } => analyze_instance(&instance, kind.into()),

        Commands::Compare {
            instance,
            kind,
            runs,
            iterations,
            time_limit,
            output,
        } => compare_configurations(&instance, kind.into(), runs, iterations, time_limit, output),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_instance(path: &Path, kind: InstanceKind, strict: bool) -> Result<QbfInstance, String> {
    if strict {
        QbfInstance::from_file(path, kind)
    } else {
        Ok(QbfInstance::load_or_trivial(path, kind))
    }
}

fn solve_instance(
    path: &Path,
    kind: InstanceKind,
    config: TabuConfig,
    time_limit: Option<f64>,
    strict: bool,
    output: Option<PathBuf>,
) -> Result<(), String> {
    println!("Loading instance from {:?}...", path);
    let instance = load_instance(path, kind, strict)?;

    println!(
        "Solving {} (n={}) with {}, tenure {}, {} iterations, seed {}...",
        instance.name,
        instance.dimension,
        config.strategy,
        config.tenure,
        config.iterations,
        config.seed
    );

    let mut search = TabuSearch::new(maximizing_evaluator(&instance), config)
        .with_observer(Box::new(LogObserver));
    if let Some(limit) = time_limit {
        let limit = Duration::try_from_secs_f64(limit)
            .map_err(|e| format!("Invalid time limit {}: {}", limit, e))?;
        search = search.with_deadline(Instant::now() + limit);
    }
    let result = search.solve();
    let feasible = search.evaluator_mut().is_feasible(&result.best);

    println!("\n========== Results ==========");
    println!("{}", result);
    println!("Feasible: {}", feasible);
    println!("Solution: {:?}", result.selected());
    for (i, phase) in result.phases.iter().enumerate() {
        println!(
            "  Phase {}: iteration {}, duration {}, elite {:?}",
            i + 1,
            phase.start_iteration,
            phase.duration.map_or("-".to_string(), |d| d.to_string()),
            phase.elite
        );
    }

    if let Some(out_path) = output {
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("Cannot serialize result: {}", e))?;
        std::fs::write(&out_path, json)
            .map_err(|e| format!("Cannot write {:?}: {}", out_path, e))?;
        println!("\nResult saved to {:?}", out_path);
    }
    Ok(())
}

fn run_benchmark(
    dir: &Path,
    kind: InstanceKind,
    output: &Path,
    runs: usize,
    iterations: usize,
    time_limit: Option<f64>,
    max_size: Option<usize>,
) -> Result<(), String> {
    println!("Loading instances from {:?}...", dir);
    let mut instances = load_instances_from_dir(dir, kind);
    if let Some(max) = max_size {
        instances.retain(|i| i.dimension <= max);
    }
    println!("Found {} instances", instances.len());
    if instances.is_empty() {
        return Err("No instances found".to_string());
    }

    std::fs::create_dir_all(output)
        .map_err(|e| format!("Cannot create output directory {:?}: {}", output, e))?;

    let mut benchmark = Benchmark::new(BenchmarkConfig {
        seeds: (0..runs as u64).collect(),
        time_limit,
        show_progress: true,
    });
    benchmark.run_on_instances(&instances, &standard_configurations(iterations));

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)
        .map_err(|e| format!("Cannot write {:?}: {}", report_path, e))?;
    println!("Report saved to {:?}", report_path);
    Ok(())
}

fn analyze_instance(path: &Path, kind: InstanceKind) -> Result<(), String> {
    let instance = QbfInstance::from_file(path, kind)?;

    println!("========== Instance Analysis ==========\n");
    println!("{}", instance.statistics());

    let mut evaluator = maximizing_evaluator(&instance);
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let initial = SemiGreedyConstruction::new().construct(&mut evaluator, &mut rng);

    let short_run = TabuSearch::new(
        maximizing_evaluator(&instance),
        TabuConfig::default().with_iterations(100),
    )
    .solve();

    println!("Quick Solution Estimates:");
    println!(
        "  Semi-greedy construction: {:.2} ({} selected)",
        evaluator.objective_value(initial.cost),
        initial.len()
    );
    println!(
        "  First-improving, 100 iterations: {:.2} ({} selected)",
        short_run.objective,
        short_run.best.len()
    );
    Ok(())
}

fn compare_configurations(
    path: &Path,
    kind: InstanceKind,
    runs: usize,
    iterations: usize,
    time_limit: Option<f64>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let instance = QbfInstance::from_file(path, kind)?;
    println!(
        "Comparing configurations on {} (n={}) over {} seeds...\n",
        instance.name, instance.dimension, runs
    );

    let mut benchmark = Benchmark::new(BenchmarkConfig {
        seeds: (0..runs as u64).collect(),
        time_limit,
        show_progress: true,
    });
    let experiments = standard_configurations(iterations);
    benchmark.run_on_instances(std::slice::from_ref(&instance), &experiments);

    println!("\n========== Summary ==========");
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Configuration", "Best", "Mean", "Std", "Worst", "Avg Time"
    );
    println!("{}", "-".repeat(72));
    for stat in benchmark.compute_statistics() {
        println!(
            "{:<16} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.4}",
            stat.config_name,
            stat.best_objective,
            stat.mean_objective,
            stat.std_objective,
            stat.worst_objective,
            stat.mean_time
        );
    }

    if let Some(out_path) = output {
        benchmark.export_to_csv(&out_path)?;
        println!("\nResults exported to {:?}", out_path);
    }
    Ok(())
}
