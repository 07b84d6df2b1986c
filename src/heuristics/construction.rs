use crate::evaluator::Evaluator;
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

pub trait ConstructionHeuristic {
    fn construct(&self, evaluator: &mut dyn Evaluator, rng: &mut ChaCha8Rng) -> Solution;
    fn name(&self) -> &str;
}

/// Semi-greedy randomized construction
///
/// Each round prices every insertable candidate, keeps only those tied at
/// the minimum delta (the restricted candidate list) and adds one of them at
/// random. Stops once the cost stalls or degrades, or after a safety cap of
/// rounds.
pub struct SemiGreedyConstruction {
    /// Changes smaller than this count as a stall
    pub tolerance: f64,
    /// Relative degradation that aborts the construction
    pub max_degradation: f64,
    /// Round cap as a multiple of the domain size
    pub round_factor: usize,
}

impl SemiGreedyConstruction {
    pub fn new() -> Self {
        SemiGreedyConstruction {
            tolerance: 1e-10,
            max_degradation: 0.1,
            round_factor: 2,
        }
    }

    pub fn with_params(tolerance: f64, max_degradation: f64, round_factor: usize) -> Self {
        SemiGreedyConstruction {
            tolerance,
            max_degradation,
            round_factor,
        }
    }
}

impl Default for SemiGreedyConstruction {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for SemiGreedyConstruction {
    fn construct(&self, evaluator: &mut dyn Evaluator, rng: &mut ChaCha8Rng) -> Solution {
        let mut solution = Solution::new();
        evaluator.evaluate(&mut solution);

        let max_rounds = self.round_factor * evaluator.domain_size();
        let mut rounds = 0;

        while rounds < max_rounds {
            rounds += 1;

            let candidates = evaluator.insertable_candidates(&solution);
            if candidates.is_empty() {
                break;
            }

            let deltas: Vec<f64> = candidates
                .iter()
                .map(|&c| evaluator.insertion_cost(c, &solution))
                .collect();
            let min_delta = deltas.iter().cloned().fold(f64::INFINITY, f64::min);

            let rcl: Vec<usize> = candidates
                .iter()
                .zip(&deltas)
                .filter(|(_, &d)| d == min_delta)
                .map(|(&c, _)| c)
                .collect();

            let chosen = match rcl.choose(rng) {
                Some(&c) => c,
                None => break,
            };

            let previous = solution.cost;
            solution.add(chosen);
            let cost = evaluator.evaluate(&mut solution);

            if (cost - previous).abs() < self.tolerance {
                break;
            }
            if cost > previous + previous.abs() * self.max_degradation {
                break;
            }
        }

        log::debug!(
            "Semi-greedy construction: {} elements after {} rounds, cost {:.4}",
            solution.len(),
            rounds,
            solution.cost
        );
        solution
    }

    fn name(&self) -> &str {
        "Semi-Greedy"
    }
}
