//! Tabu search driver.
//!
//! [`TabuSearch`] runs the semi-greedy construction, initializes the tabu
//! memory and then applies the configured move-selection strategy for a fixed
//! number of iterations, keeping the best solution seen.

use crate::evaluator::Evaluator;
use crate::heuristics::construction::{ConstructionHeuristic, SemiGreedyConstruction};
use crate::heuristics::moves::Move;
use crate::heuristics::strategy::{IntensificationPhase, MoveSelector};
use crate::solution::Solution;
use crate::tabu::TabuList;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Neighborhood strategy and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum StrategyConfig {
    BestImproving,
    FirstImproving,
    Probabilistic {
        alpha: f64,
    },
    Intensification {
        elite_size: usize,
        window: usize,
    },
}

impl StrategyConfig {
    pub const DEFAULT_ALPHA: f64 = 2.0;
    pub const DEFAULT_ELITE_SIZE: usize = 5;
    pub const DEFAULT_WINDOW: usize = 50;

    pub fn probabilistic() -> Self {
        StrategyConfig::Probabilistic {
            alpha: Self::DEFAULT_ALPHA,
        }
    }

    pub fn intensification() -> Self {
        StrategyConfig::Intensification {
            elite_size: Self::DEFAULT_ELITE_SIZE,
            window: Self::DEFAULT_WINDOW,
        }
    }

    /// Command-line name of the strategy
    pub fn name(&self) -> &'static str {
        match self {
            StrategyConfig::BestImproving => "best-improving",
            StrategyConfig::FirstImproving => "first-improving",
            StrategyConfig::Probabilistic { .. } => "probabilistic",
            StrategyConfig::Intensification { .. } => "intensification",
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::FirstImproving
    }
}

impl FromStr for StrategyConfig {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "best-improving" | "best" => Ok(StrategyConfig::BestImproving),
            "first-improving" | "first" => Ok(StrategyConfig::FirstImproving),
            "probabilistic" => Ok(Self::probabilistic()),
            "intensification" => Ok(Self::intensification()),
            other => Err(format!(
                "Unknown strategy '{}' (expected best-improving, first-improving, probabilistic or intensification)",
                other
            )),
        }
    }
}

impl std::fmt::Display for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyConfig::Probabilistic { alpha } => write!(f, "probabilistic(alpha={})", alpha),
            StrategyConfig::Intensification { elite_size, window } => {
                write!(f, "intensification(elite={}, window={})", elite_size, window)
            }
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Configuration for one tabu search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabuConfig {
    /// Half the tabu buffer length
    pub tenure: usize,
    /// Fixed iteration budget
    pub iterations: usize,
    pub seed: u64,
    pub strategy: StrategyConfig,
}

impl Default for TabuConfig {
    fn default() -> Self {
        TabuConfig {
            tenure: 20,
            iterations: 1000,
            seed: 0,
            strategy: StrategyConfig::default(),
        }
    }
}

impl TabuConfig {
    pub fn new(tenure: usize, iterations: usize, seed: u64, strategy: StrategyConfig) -> Self {
        TabuConfig {
            tenure,
            iterations,
            seed,
            strategy,
        }
    }

    pub fn with_tenure(mut self, tenure: usize) -> Self {
        self.tenure = tenure;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Lifecycle of a [`TabuSearch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchPhase {
    Idle,
    Constructing,
    Searching,
    Done,
}

/// Outcome of a search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Best solution found (minimization orientation)
    pub best: Solution,
    /// Best cost in the problem's own orientation
    pub objective: f64,
    pub evaluator: String,
    pub strategy: StrategyConfig,
    pub tenure: usize,
    pub seed: u64,
    pub domain_size: usize,
    /// Share of the domain held by the best solution
    pub occupancy: f64,
    /// Iterations actually run
    pub iterations: usize,
    /// Iteration of the last improvement; `None` if the constructed
    /// solution was never beaten
    pub best_iteration: Option<usize>,
    /// Cost right after construction
    pub initial_cost: f64,
    /// Whether a cancellation request or deadline cut the run short
    pub cancelled: bool,
    pub elapsed_secs: f64,
    /// Intensification windows, when the strategy keeps them
    pub phases: Vec<IntensificationPhase>,
}

impl SearchResult {
    /// Selected indices of the best solution, in insertion order
    pub fn selected(&self) -> Vec<usize> {
        self.best.elements()
    }

    pub fn cost(&self) -> f64 {
        self.best.cost
    }
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Evaluator: {}", self.evaluator)?;
        writeln!(f, "Strategy: {} (tenure {}, seed {})", self.strategy, self.tenure, self.seed)?;
        writeln!(f, "Objective: {:.4}", self.objective)?;
        writeln!(f, "Initial cost: {:.4}", self.initial_cost)?;
        writeln!(
            f,
            "Selected: {} of {} ({:.1}% occupancy)",
            self.best.len(),
            self.domain_size,
            self.occupancy * 100.0
        )?;
        match self.best_iteration {
            Some(it) => writeln!(f, "Last improvement: iteration {}", it)?,
            None => writeln!(f, "Last improvement: construction")?,
        }
        writeln!(
            f,
            "Iterations: {}{}",
            self.iterations,
            if self.cancelled { " (cancelled)" } else { "" }
        )?;
        if !self.phases.is_empty() {
            writeln!(f, "Intensification phases: {}", self.phases.len())?;
        }
        write!(f, "Time: {:.3}s", self.elapsed_secs)
    }
}

/// Progress hooks for a running search
pub trait SearchObserver {
    fn on_constructed(&mut self, _solution: &Solution) {}
    fn on_iteration(&mut self, _iteration: usize, _current: &Solution, _mv: Option<&Move>) {}
    fn on_new_best(&mut self, _iteration: usize, _best: &Solution) {}
    fn on_finished(&mut self, _result: &SearchResult) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SearchObserver for NoopObserver {}

/// Observer that reports through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn on_constructed(&mut self, solution: &Solution) {
        log::info!(
            "Initial solution: cost={:.4}, size={}",
            solution.cost,
            solution.len()
        );
    }

    fn on_iteration(&mut self, iteration: usize, current: &Solution, mv: Option<&Move>) {
        match mv {
            Some(mv) => log::debug!("(Iter. {}) {} -> cost {:.4}", iteration, mv, current.cost),
            None => log::debug!("(Iter. {}) no move", iteration),
        }
    }

    fn on_new_best(&mut self, iteration: usize, best: &Solution) {
        log::info!("(Iter. {}) New best: {}", iteration, best);
    }

    fn on_finished(&mut self, result: &SearchResult) {
        log::info!(
            "Finished after {} iterations: objective {:.4} in {:.3}s",
            result.iterations,
            result.objective,
            result.elapsed_secs
        );
    }
}

/// Single-threaded tabu search over one evaluator
pub struct TabuSearch<E: Evaluator> {
    evaluator: E,
    config: TabuConfig,
    selector: MoveSelector,
    construction: Box<dyn ConstructionHeuristic>,
    observer: Box<dyn SearchObserver>,
    rng: ChaCha8Rng,
    phase: SearchPhase,
    current: Solution,
    best: Solution,
    initial_cost: f64,
    tabu: TabuList,
    best_iteration: Option<usize>,
    iterations_run: usize,
    cancel: Option<Arc<AtomicBool>>,
    deadline: Option<Instant>,
}

impl<E: Evaluator> TabuSearch<E> {
    pub fn new(evaluator: E, config: TabuConfig) -> Self {
        TabuSearch {
            evaluator,
            selector: MoveSelector::from_config(&config.strategy),
            construction: Box::new(SemiGreedyConstruction::new()),
            observer: Box::new(LogObserver),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            phase: SearchPhase::Idle,
            current: Solution::new(),
            best: Solution::new(),
            initial_cost: f64::INFINITY,
            tabu: TabuList::new(config.tenure),
            best_iteration: None,
            iterations_run: 0,
            cancel: None,
            deadline: None,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_construction(mut self, construction: Box<dyn ConstructionHeuristic>) -> Self {
        self.construction = construction;
        self
    }

    /// Replace the strategy built from the configuration. `solve` keeps the
    /// injected selector and only clears its per-run state.
    pub fn with_selector(mut self, selector: MoveSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Stop between iterations once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Stop between iterations once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn config(&self) -> &TabuConfig {
        &self.config
    }

    pub fn current(&self) -> &Solution {
        &self.current
    }

    pub fn best(&self) -> &Solution {
        &self.best
    }

    pub fn tabu_list(&self) -> &TabuList {
        &self.tabu
    }

    pub fn selector(&self) -> &MoveSelector {
        &self.selector
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn evaluator_mut(&mut self) -> &mut E {
        &mut self.evaluator
    }

    pub fn into_evaluator(self) -> E {
        self.evaluator
    }

    /// Build the initial solution (Idle -> Constructing)
    pub fn construct(&mut self) -> &Solution {
        self.phase = SearchPhase::Constructing;
        self.current = self.construction.construct(&mut self.evaluator, &mut self.rng);
        self.initial_cost = self.current.cost;
        self.observer.on_constructed(&self.current);
        &self.current
    }

    /// Reset the tabu memory and take the current solution as the best
    /// (Constructing -> Searching). Constructs first if still idle.
    pub fn start_search(&mut self) {
        if self.phase == SearchPhase::Idle {
            self.construct();
        }
        self.tabu = TabuList::new(self.config.tenure);
        self.best = self.current.clone();
        self.best_iteration = None;
        self.iterations_run = 0;
        self.phase = SearchPhase::Searching;
    }

    /// Run one iteration and return the committed move, if any
    pub fn step(&mut self, iteration: usize) -> Option<Move> {
        if self.phase != SearchPhase::Searching {
            self.start_search();
        }

        self.selector.begin_iteration(iteration);
        let mv = self.selector.step(
            &mut self.evaluator,
            &mut self.current,
            self.best.cost,
            &mut self.tabu,
            &mut self.rng,
        );
        if mv.is_none() {
            log::warn!("(Iter. {}) no admissible move", iteration);
        }
        self.iterations_run += 1;

        if self.current.cost < self.best.cost {
            self.best = self.current.clone();
            self.best_iteration = Some(iteration);
            self.selector.on_new_best(&self.best, iteration);
            self.observer.on_new_best(iteration, &self.best);
        }
        self.observer.on_iteration(iteration, &self.current, mv.as_ref());
        mv
    }

    /// Whether a cancellation request or the deadline has been reached
    pub fn should_stop(&self) -> bool {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::Relaxed) {
                return true;
            }
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Run a full search from scratch with the configured budget
    pub fn solve(&mut self) -> SearchResult {
        let start = Instant::now();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.selector.reset();
        self.phase = SearchPhase::Idle;

        self.construct();
        self.start_search();

        let mut cancelled = false;
        for iteration in 0..self.config.iterations {
            if self.should_stop() {
                log::info!("Search interrupted before iteration {}", iteration);
                cancelled = true;
                break;
            }
            self.step(iteration);
        }

        self.selector.finish(self.iterations_run);
        self.phase = SearchPhase::Done;

        let result = self.result(cancelled, start.elapsed().as_secs_f64());
        self.observer.on_finished(&result);
        result
    }

    fn result(&self, cancelled: bool, elapsed_secs: f64) -> SearchResult {
        let domain_size = self.evaluator.domain_size();
        SearchResult {
            best: self.best.clone(),
            objective: self.evaluator.objective_value(self.best.cost),
            evaluator: self.evaluator.name().to_string(),
            strategy: self.config.strategy,
            tenure: self.config.tenure,
            seed: self.config.seed,
            domain_size,
            occupancy: if domain_size == 0 {
                0.0
            } else {
                self.best.len() as f64 / domain_size as f64
            },
            iterations: self.iterations_run,
            best_iteration: self.best_iteration,
            initial_cost: self.initial_cost,
            cancelled,
            elapsed_secs,
            phases: self.selector.phases().to_vec(),
        }
    }
}

/// Run a tabu search and return the best solution with its true objective
pub fn solve<E: Evaluator>(
    evaluator: E,
    tenure: usize,
    iterations: usize,
    seed: u64,
    strategy: StrategyConfig,
) -> SearchResult {
    let config = TabuConfig::new(tenure, iterations, seed, strategy);
    TabuSearch::new(evaluator, config)
        .with_observer(Box::new(NoopObserver))
        .solve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Inverse, Qbf};
    use crate::instance::QbfInstance;

    fn create_test_instance() -> QbfInstance {
        QbfInstance::from_upper_triangular(
            "test",
            &[
                vec![-2.0, 3.0, -1.0, 0.0, 4.0, -2.0],
                vec![1.0, 0.0, -3.0, 0.0, 2.0],
                vec![-4.0, 2.0, 1.0, 0.0],
                vec![3.0, -5.0, 1.0],
                vec![-1.0, 2.0],
                vec![2.0],
            ],
        )
    }

    fn brute_force_max(qbf: &mut Qbf) -> f64 {
        let n = qbf.domain_size();
        (0u32..(1 << n))
            .map(|mask| {
                let mut sol: Solution = (0..n).filter(|&i| mask & (1 << i) != 0).collect();
                qbf.evaluate(&mut sol)
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[test]
    fn test_strategy_names_parse() {
        assert_eq!("best-improving".parse::<StrategyConfig>(), Ok(StrategyConfig::BestImproving));
        assert_eq!(
            "probabilistic".parse::<StrategyConfig>(),
            Ok(StrategyConfig::Probabilistic { alpha: 2.0 })
        );
        assert_eq!(
            "intensification".parse::<StrategyConfig>(),
            Ok(StrategyConfig::Intensification { elite_size: 5, window: 50 })
        );
        assert!("greedy".parse::<StrategyConfig>().is_err());
    }

    #[test]
    fn test_strategy_config_json() {
        let json = serde_json::to_string(&StrategyConfig::Probabilistic { alpha: 1.5 }).unwrap();
        assert_eq!(json, r#"{"strategy":"probabilistic","alpha":1.5}"#);
        let back: StrategyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StrategyConfig::Probabilistic { alpha: 1.5 });
    }

    #[test]
    fn test_phases_progress() {
        let instance = create_test_instance();
        let mut search = TabuSearch::new(
            Inverse::new(Qbf::from_instance(&instance)),
            TabuConfig::default().with_iterations(5),
        )
        .with_observer(Box::new(NoopObserver));

        assert_eq!(search.phase(), SearchPhase::Idle);
        search.construct();
        assert_eq!(search.phase(), SearchPhase::Constructing);
        search.start_search();
        assert_eq!(search.phase(), SearchPhase::Searching);
        assert_eq!(search.best(), search.current());
        search.step(0);
        let result = search.solve();
        assert_eq!(search.phase(), SearchPhase::Done);
        assert_eq!(result.iterations, 5);
    }

    #[test]
    fn test_every_strategy_finds_optimum_on_small_instance() {
        let instance = create_test_instance();
        let optimum = brute_force_max(&mut Qbf::from_instance(&instance));

        for strategy in [
            StrategyConfig::BestImproving,
            StrategyConfig::FirstImproving,
            StrategyConfig::probabilistic(),
            StrategyConfig::intensification(),
        ] {
            let result = solve(Inverse::new(Qbf::from_instance(&instance)), 2, 200, 0, strategy);
            assert!(
                (result.objective - optimum).abs() < 1e-9,
                "{}: {} vs optimum {}",
                strategy,
                result.objective,
                optimum
            );
            assert_eq!(result.objective, -result.cost());
        }
    }

    #[test]
    fn test_best_never_worse_than_initial() {
        let instance = create_test_instance();
        let result = solve(
            Inverse::new(Qbf::from_instance(&instance)),
            3,
            50,
            11,
            StrategyConfig::FirstImproving,
        );
        assert!(result.cost() <= result.initial_cost);
        assert!(!result.cancelled);
        assert_eq!(result.iterations, 50);
        assert_eq!(result.selected(), result.best.elements());
    }

    #[test]
    fn test_cancel_flag_stops_search() {
        let instance = create_test_instance();
        let flag = Arc::new(AtomicBool::new(true));
        let result = TabuSearch::new(
            Inverse::new(Qbf::from_instance(&instance)),
            TabuConfig::default(),
        )
        .with_observer(Box::new(NoopObserver))
        .with_cancel_flag(flag)
        .solve();

        assert!(result.cancelled);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.best.cost, result.initial_cost);
    }

    #[test]
    fn test_past_deadline_stops_search() {
        let instance = create_test_instance();
        let result = TabuSearch::new(
            Inverse::new(Qbf::from_instance(&instance)),
            TabuConfig::default(),
        )
        .with_observer(Box::new(NoopObserver))
        .with_deadline(Instant::now())
        .solve();
        assert!(result.cancelled);
    }

    #[test]
    fn test_intensification_records_phases() {
        let instance = create_test_instance();
        let result = solve(
            Inverse::new(Qbf::from_instance(&instance)),
            2,
            100,
            3,
            StrategyConfig::Intensification { elite_size: 2, window: 5 },
        );
        if result.best_iteration.is_some() {
            assert!(!result.phases.is_empty());
            assert!(result.phases.iter().all(|p| p.duration.is_some()));
        }
    }

    #[test]
    fn test_injected_policies_survive_solve() {
        let instance = create_test_instance();
        // Zero rounds keeps the all-ones start, which is not a local optimum
        let mut search = TabuSearch::new(
            Inverse::new(Qbf::from_instance(&instance)),
            TabuConfig::default().with_iterations(30),
        )
        .with_observer(Box::new(NoopObserver))
        .with_construction(Box::new(SemiGreedyConstruction::with_params(1e-10, 0.1, 0)))
        .with_selector(MoveSelector::intensification(2, 5));

        let first = search.solve();
        assert!(search.selector().name().ends_with("Elite intensification"));
        assert_eq!(first.initial_cost, -3.0);
        assert!(first.best_iteration.is_some());
        assert!(!first.phases.is_empty());

        let second = search.solve();
        assert_eq!(second.phases, first.phases);
        assert_eq!(second.selected(), first.selected());
    }

    #[test]
    fn test_empty_domain_is_a_no_op() {
        let result = solve(Inverse::new(Qbf::new(Vec::new())), 2, 10, 0, StrategyConfig::BestImproving);
        assert_eq!(result.iterations, 10);
        assert!(result.selected().is_empty());
        assert_eq!(result.objective, 0.0);
    }
}
