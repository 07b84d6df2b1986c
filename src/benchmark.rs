//! Experiment batching for the tabu search.
//!
//! Runs a list of named configurations over instances and seeds, collects one
//! record per run and aggregates them per (instance, configuration).

use crate::evaluator::{maximizing_evaluator, Evaluator};
use crate::instance::{InstanceKind, QbfInstance};
use crate::search::{NoopObserver, SearchResult, StrategyConfig, TabuConfig, TabuSearch};

use indicatif::{ProgressBar, ProgressStyle};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

/// A named search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub description: String,
    pub config: TabuConfig,
}

impl ExperimentConfig {
    pub fn new(name: &str, description: &str, config: TabuConfig) -> Self {
        ExperimentConfig {
            name: name.to_string(),
            description: description.to_string(),
            config,
        }
    }
}

/// The five reference configurations
pub fn standard_configurations(iterations: usize) -> Vec<ExperimentConfig> {
    let base = TabuConfig::default().with_iterations(iterations);
    vec![
        ExperimentConfig::new(
            "PADRAO",
            "First-improving, T=20",
            base.clone().with_strategy(StrategyConfig::FirstImproving),
        ),
        ExperimentConfig::new(
            "PADRAO_BEST",
            "Best-improving, T=20",
            base.clone().with_strategy(StrategyConfig::BestImproving),
        ),
        ExperimentConfig::new(
            "PADRAO_TENURE",
            "First-improving, T=50",
            base.clone()
                .with_tenure(50)
                .with_strategy(StrategyConfig::FirstImproving),
        ),
        ExperimentConfig::new(
            "PADRAO_METHOD1",
            "First-improving, T=20, probabilistic tabu (alpha=2.0)",
            base.clone().with_strategy(StrategyConfig::probabilistic()),
        ),
        ExperimentConfig::new(
            "PADRAO_METHOD2",
            "First-improving, T=20, elite intensification (elite=5, window=50)",
            base.with_strategy(StrategyConfig::intensification()),
        ),
    ]
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Timeout,
}

/// Result of one configuration on one instance with one seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub status: RunStatus,
    pub config_name: String,
    pub method: String,
    pub tenure: usize,
    pub instance: String,
    pub dimension: usize,
    pub seed: u64,
    pub objective_value: f64,
    pub initial_objective: f64,
    pub selected_count: usize,
    pub feasible: bool,
    pub iterations_completed: usize,
    pub best_iteration: Option<usize>,
    pub execution_time: f64,
    /// Selected indices, space separated
    pub solution: String,
    pub timestamp: String,
}

impl RunRecord {
    fn from_result(
        experiment: &ExperimentConfig,
        instance: &QbfInstance,
        result: &SearchResult,
        initial_objective: f64,
        feasible: bool,
    ) -> Self {
        RunRecord {
            status: if result.cancelled {
                RunStatus::Timeout
            } else {
                RunStatus::Completed
            },
            config_name: experiment.name.clone(),
            method: experiment.config.strategy.name().to_string(),
            tenure: experiment.config.tenure,
            instance: instance.name.clone(),
            dimension: instance.dimension,
            seed: result.seed,
            objective_value: result.objective,
            initial_objective,
            selected_count: result.best.len(),
            feasible,
            iterations_completed: result.iterations,
            best_iteration: result.best_iteration,
            execution_time: result.elapsed_secs,
            solution: result
                .selected()
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Aggregated statistics for one configuration on one instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStatistics {
    pub config_name: String,
    pub instance: String,
    pub num_runs: usize,
    pub num_feasible: usize,
    pub num_timeouts: usize,
    pub mean_objective: f64,
    pub std_objective: f64,
    pub best_objective: f64,
    pub worst_objective: f64,
    pub mean_time: f64,
    pub total_time: f64,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Seeds run for every (instance, configuration) pair
    pub seeds: Vec<u64>,
    /// Wall-clock limit per run in seconds
    pub time_limit: Option<f64>,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            seeds: vec![0],
            time_limit: None,
            show_progress: true,
        }
    }
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunRecord>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark {
            config,
            results: Vec::new(),
        }
    }

    fn progress_bar(&self, total: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total as u64);
        match ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        ) {
            Ok(style) => bar.set_style(style.progress_chars("=>-")),
            Err(e) => log::warn!("Progress bar template rejected: {}", e),
        }
        bar
    }

    /// Run one experiment with one seed
    pub fn run_single(
        &mut self,
        instance: &QbfInstance,
        experiment: &ExperimentConfig,
        seed: u64,
    ) -> &RunRecord {
        let config = experiment.config.clone().with_seed(seed);
        let mut search = TabuSearch::new(maximizing_evaluator(instance), config)
            .with_observer(Box::new(NoopObserver));
        if let Some(limit) = self.config.time_limit {
            match Duration::try_from_secs_f64(limit) {
                Ok(limit) => search = search.with_deadline(Instant::now() + limit),
                Err(e) => log::warn!("Ignoring time limit {}: {}", limit, e),
            }
        }

        let result = search.solve();
        let initial_objective = search.evaluator().objective_value(result.initial_cost);
        let feasible = search.evaluator_mut().is_feasible(&result.best);
        if !feasible {
            log::error!(
                "{} on {} (seed {}) returned an infeasible solution",
                experiment.name,
                instance.name,
                seed
            );
        }

        let record = RunRecord::from_result(experiment, instance, &result, initial_objective, feasible);
        log::info!(
            "{} | {} | seed {}: objective {:.3} in {:.2}s",
            record.instance,
            record.config_name,
            seed,
            record.objective_value,
            record.execution_time
        );
        self.results.push(record);
        &self.results[self.results.len() - 1]
    }

    /// Run every experiment with every configured seed on the instances
    pub fn run_on_instances(&mut self, instances: &[QbfInstance], experiments: &[ExperimentConfig]) {
        let total = instances.len() * experiments.len() * self.config.seeds.len();
        let bar = self.progress_bar(total);
        let seeds = self.config.seeds.clone();

        for instance in instances {
            for experiment in experiments {
                for &seed in &seeds {
                    bar.set_message(format!("{} / {}", instance.name, experiment.name));
                    self.run_single(instance, experiment, seed);
                    bar.inc(1);
                }
            }
        }
        bar.finish_with_message("done");
    }

    /// Compute statistics per (instance, configuration)
    pub fn compute_statistics(&self) -> Vec<StrategyStatistics> {
        let mut groups: BTreeMap<(String, String), Vec<&RunRecord>> = BTreeMap::new();
        for record in &self.results {
            groups
                .entry((record.instance.clone(), record.config_name.clone()))
                .or_default()
                .push(record);
        }

        let mut statistics = Vec::new();
        for ((instance, config_name), records) in groups {
            let objectives: Vec<f64> = records.iter().map(|r| r.objective_value).collect();
            let times: Vec<f64> = records.iter().map(|r| r.execution_time).collect();

            let std_objective = if objectives.len() < 2 {
                0.0
            } else {
                objectives.iter().std_dev()
            };
            let best_objective = objectives
                .iter()
                .copied()
                .map(OrderedFloat)
                .fold(OrderedFloat(f64::NEG_INFINITY), std::cmp::max)
                .0;
            let worst_objective = objectives
                .iter()
                .copied()
                .map(OrderedFloat)
                .fold(OrderedFloat(f64::INFINITY), std::cmp::min)
                .0;

            statistics.push(StrategyStatistics {
                config_name,
                instance,
                num_runs: records.len(),
                num_feasible: records.iter().filter(|r| r.feasible).count(),
                num_timeouts: records
                    .iter()
                    .filter(|r| r.status == RunStatus::Timeout)
                    .count(),
                mean_objective: objectives.iter().mean(),
                std_objective,
                best_objective,
                worst_objective,
                mean_time: times.iter().mean(),
                total_time: times.iter().sum(),
            });
        }

        statistics
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let file = File::create(path.as_ref())
            .map_err(|e| format!("Cannot create {:?}: {}", path.as_ref(), e))?;
        let mut writer = csv::Writer::from_writer(file);
        for record in &self.results {
            writer
                .serialize(record)
                .map_err(|e| format!("Failed to write record: {}", e))?;
        }
        writer.flush().map_err(|e| format!("Failed to flush CSV: {}", e))?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let file = File::create(path.as_ref())
            .map_err(|e| format!("Cannot create {:?}: {}", path.as_ref(), e))?;
        let mut writer = csv::Writer::from_writer(file);
        for stat in self.compute_statistics() {
            writer
                .serialize(stat)
                .map_err(|e| format!("Failed to write statistics: {}", e))?;
        }
        writer.flush().map_err(|e| format!("Failed to flush CSV: {}", e))?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("      QBF Tabu Search Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!(
            "Generated: {}\n\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ));

        let stats = self.compute_statistics();

        report.push_str("Configuration Performance Summary:\n");
        report.push_str("-".repeat(96).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:<18} {:>6} {:>12} {:>10} {:>12} {:>10}\n",
            "Instance", "Configuration", "Runs", "Mean Obj", "Std", "Best Obj", "Mean Time"
        ));
        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        for stat in &stats {
            report.push_str(&format!(
                "{:<20} {:<18} {:>6} {:>12.3} {:>10.3} {:>12.3} {:>10.3}\n",
                stat.instance,
                stat.config_name,
                stat.num_runs,
                stat.mean_objective,
                stat.std_objective,
                stat.best_objective,
                stat.mean_time
            ));
        }

        report.push_str("-".repeat(96).as_str());
        report.push('\n');

        report.push_str("\nBest Solutions per Instance:\n");
        let mut instance_best: BTreeMap<&str, &RunRecord> = BTreeMap::new();
        for record in self.results.iter().filter(|r| r.feasible) {
            let entry = instance_best.entry(record.instance.as_str()).or_insert(record);
            if record.objective_value > entry.objective_value {
                *entry = record;
            }
        }
        for (instance, record) in &instance_best {
            report.push_str(&format!(
                "  {}: {:.3} ({}, seed {})\n",
                instance, record.objective_value, record.config_name, record.seed
            ));
        }

        report
    }

    pub fn results(&self) -> &[RunRecord] {
        &self.results
    }
}

/// Load every parsable instance file from a directory, sorted by dimension
pub fn load_instances_from_dir<P: AsRef<Path>>(dir: P, kind: InstanceKind) -> Vec<QbfInstance> {
    let mut instances = Vec::new();

    match std::fs::read_dir(dir.as_ref()) {
        Ok(entries) => {
            let mut paths: Vec<_> = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file())
                .filter(|path| {
                    !path
                        .file_name()
                        .map(|n| n.to_string_lossy().starts_with('.'))
                        .unwrap_or(true)
                })
                .collect();
            paths.sort();

            for path in paths {
                match QbfInstance::from_file(&path, kind) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => log::warn!("Skipping {:?}: {}", path, e),
                }
            }
        }
        Err(e) => log::error!("Cannot read directory {:?}: {}", dir.as_ref(), e),
    }

    instances.sort_by_key(|i| i.dimension);
    instances
}
