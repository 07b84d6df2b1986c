//! Move-selection strategies for the tabu search.
//!
//! A strategy is assembled from three independent policies:
//! - [`ScanMode`]: commit the best admissible move, or the first improving one
//! - [`Acceptance`]: when a move touching tabu elements may still be taken
//! - [`CandidateOrder`]: which candidates are scanned, and in what order
//!
//! [`MoveSelector`] combines them. The classic variants are available as
//! constructors: best-improving, first-improving, probabilistic and
//! elite-intensification.

use crate::evaluator::Evaluator;
use crate::heuristics::moves::Move;
use crate::search::StrategyConfig;
use crate::solution::Solution;
use crate::tabu::TabuList;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Probability of restricting insertions to elite candidates during an
/// intensification window
const ELITE_ONLY_PROBABILITY: f64 = 0.7;

/// Decides whether a move is admissible given the tabu memory
pub trait Acceptance {
    /// `aspiration` is true when taking the move would beat the best cost
    fn admissible(
        &mut self,
        mv: &Move,
        tabu: &TabuList,
        aspiration: bool,
        rng: &mut ChaCha8Rng,
    ) -> bool;

    fn name(&self) -> &str;
}

/// Classic rule: non-tabu, or tabu but satisfying the aspiration criterion
#[derive(Debug, Clone, Copy, Default)]
pub struct AspirationAcceptance;

impl Acceptance for AspirationAcceptance {
    fn admissible(
        &mut self,
        mv: &Move,
        tabu: &TabuList,
        aspiration: bool,
        _rng: &mut ChaCha8Rng,
    ) -> bool {
        aspiration || mv.elements().all(|e| !tabu.is_tabu(e))
    }

    fn name(&self) -> &str {
        "Aspiration"
    }
}

/// Aspiration, or a random draw against the tabu acceptance probability of
/// each touched element
#[derive(Debug, Clone, Copy)]
pub struct ProbabilisticAcceptance {
    pub alpha: f64,
}

impl ProbabilisticAcceptance {
    pub fn new(alpha: f64) -> Self {
        ProbabilisticAcceptance { alpha }
    }
}

impl Default for ProbabilisticAcceptance {
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl Acceptance for ProbabilisticAcceptance {
    fn admissible(
        &mut self,
        mv: &Move,
        tabu: &TabuList,
        aspiration: bool,
        rng: &mut ChaCha8Rng,
    ) -> bool {
        if aspiration {
            return true;
        }
        // Both sides of an exchange must pass; every tabu side draws
        let mut ok = true;
        for e in mv.elements() {
            if tabu.is_tabu(e) {
                let p = tabu.acceptance_probability(e, self.alpha);
                ok &= rng.gen::<f64>() < p;
            }
        }
        ok
    }

    fn name(&self) -> &str {
        "Probabilistic"
    }
}

/// Filters and orders the candidates a scan walks through
pub trait CandidateOrder {
    /// Called once per iteration before any scan
    fn begin_iteration(&mut self, _iteration: usize) {}

    fn insertion_order(&mut self, candidates: Vec<usize>, _rng: &mut ChaCha8Rng) -> Vec<usize> {
        candidates
    }

    fn removal_order(&mut self, selected: Vec<usize>) -> Vec<usize> {
        selected
    }

    /// Called by the driver whenever the best solution improves
    fn on_new_best(&mut self, _best: &Solution, _iteration: usize) {}

    /// Called once when the search ends
    fn finish(&mut self, _iteration: usize) {}

    /// Forget everything learned during a previous run
    fn reset(&mut self) {}

    /// Recorded intensification phases, if the order keeps any
    fn phases(&self) -> &[IntensificationPhase] {
        &[]
    }

    fn name(&self) -> &str;
}

/// Scan insertion candidates and selected elements in their natural order
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl CandidateOrder for NaturalOrder {
    fn name(&self) -> &str {
        "Natural"
    }
}

/// One window of elite intensification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensificationPhase {
    /// Iteration whose improvement opened the window
    pub start_iteration: usize,
    /// Best cost that opened the window
    pub trigger_cost: f64,
    /// Elite set at the time the window opened
    pub elite: Vec<usize>,
    /// Iterations the window stayed open; `None` while still open
    pub duration: Option<usize>,
}

/// Elite-guided intensification.
///
/// Counts how often each element appears in successive best solutions; the
/// `elite_size` most frequent form the elite set. A new best opens a window
/// during which insertions favor elite candidates and removals prefer
/// non-elite elements.
#[derive(Debug, Clone)]
pub struct EliteIntensification {
    pub elite_size: usize,
    pub window: usize,
    frequencies: HashMap<usize, usize>,
    elite: BTreeSet<usize>,
    open_for: Option<usize>,
    phases: Vec<IntensificationPhase>,
}

impl EliteIntensification {
    pub fn new(elite_size: usize, window: usize) -> Self {
        EliteIntensification {
            elite_size,
            window,
            frequencies: HashMap::new(),
            elite: BTreeSet::new(),
            open_for: None,
            phases: Vec::new(),
        }
    }

    pub fn elite(&self) -> &BTreeSet<usize> {
        &self.elite
    }

    pub fn frequency(&self, element: usize) -> usize {
        self.frequencies.get(&element).copied().unwrap_or(0)
    }

    pub fn is_intensifying(&self) -> bool {
        self.open_for.is_some()
    }

    fn close_window(&mut self, elapsed: usize) {
        self.open_for = None;
        if let Some(phase) = self.phases.last_mut() {
            phase.duration = Some(elapsed);
            log::debug!(
                "Intensification closed after {} iterations (opened at {})",
                elapsed,
                phase.start_iteration
            );
        }
    }

    fn rebuild_elite(&mut self) {
        let mut ranked: Vec<(usize, usize)> =
            self.frequencies.iter().map(|(&e, &c)| (e, c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        self.elite = ranked
            .into_iter()
            .take(self.elite_size)
            .map(|(e, _)| e)
            .collect();
    }
}

impl Default for EliteIntensification {
    fn default() -> Self {
        Self::new(5, 50)
    }
}

impl CandidateOrder for EliteIntensification {
    fn begin_iteration(&mut self, _iteration: usize) {
        if let Some(elapsed) = self.open_for {
            let elapsed = elapsed + 1;
            if elapsed >= self.window {
                self.close_window(elapsed);
            } else {
                self.open_for = Some(elapsed);
            }
        }
    }

    fn insertion_order(&mut self, candidates: Vec<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if !self.is_intensifying() || self.elite.is_empty() {
            return candidates;
        }

        let (elite, others): (Vec<usize>, Vec<usize>) =
            candidates.into_iter().partition(|e| self.elite.contains(e));

        if !elite.is_empty() && rng.gen::<f64>() < ELITE_ONLY_PROBABILITY {
            return elite;
        }

        let mut sampled: Vec<usize> = others
            .choose_multiple(rng, self.elite.len())
            .copied()
            .collect();
        let mut mixed = elite;
        mixed.append(&mut sampled);
        mixed
    }

    fn removal_order(&mut self, selected: Vec<usize>) -> Vec<usize> {
        if !self.is_intensifying() || self.elite.is_empty() {
            return selected;
        }
        let (elite, mut others): (Vec<usize>, Vec<usize>) =
            selected.into_iter().partition(|e| self.elite.contains(e));
        others.extend(elite);
        others
    }

    fn on_new_best(&mut self, best: &Solution, iteration: usize) {
        for e in best.iter() {
            *self.frequencies.entry(e).or_insert(0) += 1;
        }
        self.rebuild_elite();

        if self.open_for.is_none() {
            self.open_for = Some(0);
            self.phases.push(IntensificationPhase {
                start_iteration: iteration,
                trigger_cost: best.cost,
                elite: self.elite.iter().copied().collect(),
                duration: None,
            });
            log::debug!(
                "Intensification opened at iteration {} with elite {:?}",
                iteration,
                self.elite
            );
        }
    }

    fn finish(&mut self, _iteration: usize) {
        if let Some(elapsed) = self.open_for {
            self.close_window(elapsed);
        }
    }

    fn reset(&mut self) {
        self.frequencies.clear();
        self.elite.clear();
        self.open_for = None;
        self.phases.clear();
    }

    fn phases(&self) -> &[IntensificationPhase] {
        &self.phases
    }

    fn name(&self) -> &str {
        "Elite intensification"
    }
}

/// Whether a scan commits the globally best move or the first improving one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanMode {
    BestImproving,
    FirstImproving,
}

/// One pluggable neighborhood-exploration policy
pub struct MoveSelector {
    pub scan: ScanMode,
    acceptance: Box<dyn Acceptance>,
    order: Box<dyn CandidateOrder>,
}

impl MoveSelector {
    pub fn new(
        scan: ScanMode,
        acceptance: Box<dyn Acceptance>,
        order: Box<dyn CandidateOrder>,
    ) -> Self {
        MoveSelector {
            scan,
            acceptance,
            order,
        }
    }

    pub fn best_improving() -> Self {
        Self::new(
            ScanMode::BestImproving,
            Box::new(AspirationAcceptance),
            Box::new(NaturalOrder),
        )
    }

    pub fn first_improving() -> Self {
        Self::new(
            ScanMode::FirstImproving,
            Box::new(AspirationAcceptance),
            Box::new(NaturalOrder),
        )
    }

    pub fn probabilistic(alpha: f64) -> Self {
        Self::new(
            ScanMode::FirstImproving,
            Box::new(ProbabilisticAcceptance::new(alpha)),
            Box::new(NaturalOrder),
        )
    }

    pub fn intensification(elite_size: usize, window: usize) -> Self {
        Self::new(
            ScanMode::FirstImproving,
            Box::new(AspirationAcceptance),
            Box::new(EliteIntensification::new(elite_size, window)),
        )
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        match *config {
            StrategyConfig::BestImproving => Self::best_improving(),
            StrategyConfig::FirstImproving => Self::first_improving(),
            StrategyConfig::Probabilistic { alpha } => Self::probabilistic(alpha),
            StrategyConfig::Intensification { elite_size, window } => {
                Self::intensification(elite_size, window)
            }
        }
    }

    pub fn name(&self) -> String {
        let scan = match self.scan {
            ScanMode::BestImproving => "best-improving",
            ScanMode::FirstImproving => "first-improving",
        };
        format!("{} / {} / {}", scan, self.acceptance.name(), self.order.name())
    }

    pub fn begin_iteration(&mut self, iteration: usize) {
        self.order.begin_iteration(iteration);
    }

    pub fn on_new_best(&mut self, best: &Solution, iteration: usize) {
        self.order.on_new_best(best, iteration);
    }

    pub fn finish(&mut self, iteration: usize) {
        self.order.finish(iteration);
    }

    /// Clear per-run state so the same policies can drive a fresh search
    pub fn reset(&mut self) {
        self.order.reset();
    }

    pub fn phases(&self) -> &[IntensificationPhase] {
        self.order.phases()
    }

    /// Choose the next move without applying it.
    ///
    /// Insertions are scanned first, then removals, then exchanges. Ties
    /// keep the first move encountered. In first-improving mode the first
    /// admissible move with a negative delta wins; otherwise the best
    /// admissible move seen during the same pass is returned. `None` only
    /// when no admissible move exists.
    pub fn select(
        &mut self,
        evaluator: &mut dyn Evaluator,
        current: &Solution,
        best_cost: f64,
        tabu: &TabuList,
        rng: &mut ChaCha8Rng,
    ) -> Option<(Move, f64)> {
        let insertions = {
            let candidates = evaluator.insertable_candidates(current);
            self.order.insertion_order(candidates, rng)
        };
        let removals = self.order.removal_order(current.elements());

        let insertion_costs: Vec<f64> = insertions
            .iter()
            .map(|&e| evaluator.insertion_cost(e, current))
            .collect();
        let removal_costs: Vec<f64> = removals
            .iter()
            .map(|&e| evaluator.removal_cost(e, current))
            .collect();

        let mut chosen: Option<(Move, f64)> = None;

        for (&e, &delta) in insertions.iter().zip(&insertion_costs) {
            if self.consider(Move::Insert(e), delta, current.cost, best_cost, tabu, rng, &mut chosen) {
                return chosen;
            }
        }

        for (&e, &delta) in removals.iter().zip(&removal_costs) {
            if self.consider(Move::Remove(e), delta, current.cost, best_cost, tabu, rng, &mut chosen) {
                return chosen;
            }
        }

        for (&incoming, &ins) in insertions.iter().zip(&insertion_costs) {
            for (&outgoing, &rem) in removals.iter().zip(&removal_costs) {
                let delta = ins + rem + evaluator.exchange_correction(incoming, outgoing);
                let mv = Move::Exchange { incoming, outgoing };
                if self.consider(mv, delta, current.cost, best_cost, tabu, rng, &mut chosen) {
                    return chosen;
                }
            }
        }

        chosen
    }

    /// Track `mv` as a candidate; returns true when the scan should stop
    #[allow(clippy::too_many_arguments)]
    fn consider(
        &mut self,
        mv: Move,
        delta: f64,
        current_cost: f64,
        best_cost: f64,
        tabu: &TabuList,
        rng: &mut ChaCha8Rng,
        chosen: &mut Option<(Move, f64)>,
    ) -> bool {
        let improving = self.scan == ScanMode::FirstImproving && delta < 0.0;
        let better = chosen.map_or(true, |(_, d)| delta < d);
        if !improving && !better {
            return false;
        }

        let aspiration = current_cost + delta < best_cost;
        if !self.acceptance.admissible(&mv, tabu, aspiration, rng) {
            return false;
        }

        *chosen = Some((mv, delta));
        improving
    }

    /// Select a move and commit it: tabu memory, solution, then a full
    /// re-evaluation. Returns `None` (and changes nothing) when no move is
    /// admissible.
    pub fn step(
        &mut self,
        evaluator: &mut dyn Evaluator,
        current: &mut Solution,
        best_cost: f64,
        tabu: &mut TabuList,
        rng: &mut ChaCha8Rng,
    ) -> Option<Move> {
        let (mv, _) = self.select(evaluator, current, best_cost, tabu, rng)?;
        tabu.record(&mv);
        mv.apply(current);
        evaluator.evaluate(current);
        Some(mv)
    }
}

impl std::fmt::Debug for MoveSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoveSelector")
            .field("scan", &self.scan)
            .field("acceptance", &self.acceptance.name())
            .field("order", &self.order.name())
            .finish()
    }
}
