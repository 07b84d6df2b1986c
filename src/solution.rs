//! Solution representation for the QBF Tabu Search.
//!
//! A solution is an ordered set of domain indices. Membership of index `i`
//! means decision variable `x_i` is forced to zero, so the empty solution
//! stands for the all-ones vector (every set active in MAX-SC-QBF).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered, duplicate-free set of selected indices plus the cached cost.
///
/// Insertion order is preserved. Removal leaves a hole in the backing
/// vector that is compacted once holes outnumber live entries, which keeps
/// `add`, `remove` and `contains` amortized O(1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SolutionRecord", into = "SolutionRecord")]
pub struct Solution {
    slots: Vec<Option<usize>>,
    positions: HashMap<usize, usize>,
    /// Cost as computed by the last evaluator call on this solution
    pub cost: f64,
}

impl Solution {
    /// Create a new empty solution with an unknown (infinite) cost
    pub fn new() -> Self {
        Solution {
            slots: Vec::new(),
            positions: HashMap::new(),
            cost: f64::INFINITY,
        }
    }

    /// Create a solution from a sequence of indices; duplicates are dropped
    pub fn from_elements<I: IntoIterator<Item = usize>>(elements: I) -> Self {
        let mut solution = Solution::new();
        for element in elements {
            solution.add(element);
        }
        solution
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, element: usize) -> bool {
        self.positions.contains_key(&element)
    }

    /// Append an element. Returns `false` if it was already present.
    pub fn add(&mut self, element: usize) -> bool {
        if self.positions.contains_key(&element) {
            return false;
        }
        self.positions.insert(element, self.slots.len());
        self.slots.push(Some(element));
        true
    }

    /// Remove an element. Returns `false` if it was not present.
    pub fn remove(&mut self, element: usize) -> bool {
        match self.positions.remove(&element) {
            Some(slot) => {
                self.slots[slot] = None;
                if self.slots.len() > 2 * self.positions.len() + 8 {
                    self.compact();
                }
                true
            }
            None => false,
        }
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        for (slot, element) in self.slots.iter().enumerate() {
            if let Some(element) = element {
                self.positions.insert(*element, slot);
            }
        }
    }

    /// Iterate over the selected indices in insertion order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().flatten().copied()
    }

    /// Selected indices in insertion order
    pub fn elements(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Solution {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.iter().eq(other.iter())
    }
}

impl FromIterator<usize> for Solution {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Solution::from_elements(iter)
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Solution: cost=[{}], size=[{}], elements={:?}",
            self.cost,
            self.len(),
            self.elements()
        )
    }
}

/// Flat serialized form of a [`Solution`]
#[derive(Serialize, Deserialize)]
struct SolutionRecord {
    elements: Vec<usize>,
    cost: f64,
}

impl From<SolutionRecord> for Solution {
    fn from(record: SolutionRecord) -> Self {
        let mut solution = Solution::from_elements(record.elements);
        solution.cost = record.cost;
        solution
    }
}

impl From<Solution> for SolutionRecord {
    fn from(solution: Solution) -> Self {
        SolutionRecord {
            elements: solution.elements(),
            cost: solution.cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_creation() {
        let sol = Solution::new();
        assert!(sol.is_empty());
        assert_eq!(sol.len(), 0);
        assert_eq!(sol.cost, f64::INFINITY);
    }

    #[test]
    fn test_add_remove_elements() {
        let mut sol = Solution::new();
        assert!(sol.add(1));
        assert!(sol.add(3));
        assert!(sol.add(5));
        assert!(!sol.add(3));

        assert_eq!(sol.len(), 3);
        assert!(sol.contains(1));
        assert!(sol.contains(5));
        assert!(!sol.contains(2));

        assert!(sol.remove(3));
        assert_eq!(sol.len(), 2);
        assert!(!sol.contains(3));
        assert!(!sol.remove(10));
        assert_eq!(sol.elements(), vec![1, 5]);
    }

    #[test]
    fn test_order_survives_compaction() {
        let mut sol = Solution::from_elements(0..40);
        for e in (0..40).filter(|e| e % 3 != 0) {
            assert!(sol.remove(e));
        }
        sol.add(100);
        let expected: Vec<usize> = (0..40).filter(|e| e % 3 == 0).chain([100]).collect();
        assert_eq!(sol.elements(), expected);
        for &e in &expected {
            assert!(sol.contains(e));
        }
        assert!(sol.remove(3));
        assert!(!sol.contains(3));
        assert_eq!(sol.len(), expected.len() - 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut sol1 = Solution::from_elements([1, 2, 3]);
        sol1.cost = 10.5;
        let sol2 = sol1.clone();
        sol1.remove(3);

        assert_eq!(sol1.len(), 2);
        assert_eq!(sol2.len(), 3);
        assert_eq!(sol2.cost, 10.5);
        assert_ne!(sol1, sol2);
    }

    #[test]
    fn test_json_keeps_order_and_cost() {
        let mut sol = Solution::from_elements([7, 2, 9]);
        sol.cost = -4.25;
        let json = serde_json::to_string(&sol).unwrap();
        let back: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sol);
        assert!(back.contains(9));
    }
}
