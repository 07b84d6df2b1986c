//! Neighborhood moves over a [`Solution`].

use crate::evaluator::Evaluator;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};

/// A single neighborhood move.
///
/// "Insert" adds an index to the solution (forces its variable to zero);
/// "Remove" takes it out again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Insert(usize),
    Remove(usize),
    Exchange { incoming: usize, outgoing: usize },
}

impl Move {
    /// Incremental cost of this move relative to `solution`
    pub fn delta(&self, evaluator: &mut dyn Evaluator, solution: &Solution) -> f64 {
        match *self {
            Move::Insert(e) => evaluator.insertion_cost(e, solution),
            Move::Remove(e) => evaluator.removal_cost(e, solution),
            Move::Exchange { incoming, outgoing } => {
                evaluator.exchange_cost(incoming, outgoing, solution)
            }
        }
    }

    /// Apply to the solution; the cached cost is left for the caller to refresh
    pub fn apply(&self, solution: &mut Solution) {
        match *self {
            Move::Insert(e) => {
                solution.add(e);
            }
            Move::Remove(e) => {
                solution.remove(e);
            }
            Move::Exchange { incoming, outgoing } => {
                solution.remove(outgoing);
                solution.add(incoming);
            }
        }
    }

    /// `(removed slot, inserted slot)` pushed to the tabu list
    pub fn tabu_entries(&self) -> (Option<usize>, Option<usize>) {
        match *self {
            Move::Insert(e) => (None, Some(e)),
            Move::Remove(e) => (Some(e), None),
            Move::Exchange { incoming, outgoing } => (Some(outgoing), Some(incoming)),
        }
    }

    /// Elements touched by the move
    pub fn elements(&self) -> impl Iterator<Item = usize> {
        let (removed, inserted) = self.tabu_entries();
        removed.into_iter().chain(inserted)
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Move::Insert(e) => write!(f, "insert {}", e),
            Move::Remove(e) => write!(f, "remove {}", e),
            Move::Exchange { incoming, outgoing } => {
                write!(f, "exchange {} <-> {}", incoming, outgoing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Qbf;

    #[test]
    fn test_apply_and_delta() {
        let mut qbf = Qbf::new(vec![
            vec![1.0, 2.0, 3.0],
            vec![0.0, 4.0, 5.0],
            vec![0.0, 0.0, 6.0],
        ]);
        let mut sol = Solution::from_elements([1]);
        let before = qbf.evaluate(&mut sol);

        let mv = Move::Exchange { incoming: 0, outgoing: 1 };
        let delta = mv.delta(&mut qbf, &sol);
        mv.apply(&mut sol);
        let after = qbf.evaluate(&mut sol);

        assert_eq!(sol.elements(), vec![0]);
        assert!((after - before - delta).abs() < 1e-12);
    }

    #[test]
    fn test_tabu_entries() {
        assert_eq!(Move::Insert(3).tabu_entries(), (None, Some(3)));
        assert_eq!(Move::Remove(3).tabu_entries(), (Some(3), None));
        let ex = Move::Exchange { incoming: 1, outgoing: 2 };
        assert_eq!(ex.tabu_entries(), (Some(2), Some(1)));
        assert_eq!(ex.elements().collect::<Vec<_>>(), vec![2, 1]);
    }
}
