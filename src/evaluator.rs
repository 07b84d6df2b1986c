//! Objective evaluators for QBF and MAX-SC-QBF.
//!
//! The search always minimizes. Maximization problems are wrapped in
//! [`Inverse`], which negates every cost the inner evaluator reports.

use crate::instance::{InstanceKind, QbfInstance};
use crate::solution::Solution;

/// Full and incremental cost computation over a binary decision vector.
///
/// Incremental costs take the solution they are relative to and refresh the
/// decision vector from it first, so callers never have to keep the two in
/// sync by hand.
pub trait Evaluator {
    /// Number of decision variables
    fn domain_size(&self) -> usize;

    /// Full cost of `solution`; also stored into `solution.cost`
    fn evaluate(&mut self, solution: &mut Solution) -> f64;

    /// Cost change of adding `element` to the solution (variable 1 -> 0)
    fn insertion_cost(&mut self, element: usize, solution: &Solution) -> f64;

    /// Cost change of removing `element` from the solution (variable 0 -> 1)
    fn removal_cost(&mut self, element: usize, solution: &Solution) -> f64;

    /// Cost change of adding `incoming` and removing `outgoing` together
    fn exchange_cost(&mut self, incoming: usize, outgoing: usize, solution: &Solution) -> f64;

    /// Pairwise term such that, for `incoming` outside and `outgoing` inside
    /// the solution, `exchange_cost == insertion_cost + removal_cost + correction`.
    ///
    /// Lets a neighborhood scan price every exchange in O(1) from cached
    /// single-element deltas.
    fn exchange_correction(&self, incoming: usize, outgoing: usize) -> f64;

    /// Elements that may currently be added to the solution
    fn insertable_candidates(&mut self, solution: &Solution) -> Vec<usize> {
        (0..self.domain_size())
            .filter(|&e| !solution.contains(e))
            .collect()
    }

    /// Whether `solution` satisfies the problem's side constraints
    fn is_feasible(&mut self, _solution: &Solution) -> bool {
        true
    }

    /// Map a cost back to the problem's own objective orientation
    fn objective_value(&self, cost: f64) -> f64 {
        cost
    }

    fn name(&self) -> &str;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn domain_size(&self) -> usize {
        (**self).domain_size()
    }

    fn evaluate(&mut self, solution: &mut Solution) -> f64 {
        (**self).evaluate(solution)
    }

    fn insertion_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        (**self).insertion_cost(element, solution)
    }

    fn removal_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        (**self).removal_cost(element, solution)
    }

    fn exchange_cost(&mut self, incoming: usize, outgoing: usize, solution: &Solution) -> f64 {
        (**self).exchange_cost(incoming, outgoing, solution)
    }

    fn exchange_correction(&self, incoming: usize, outgoing: usize) -> f64 {
        (**self).exchange_correction(incoming, outgoing)
    }

    fn insertable_candidates(&mut self, solution: &Solution) -> Vec<usize> {
        (**self).insertable_candidates(solution)
    }

    fn is_feasible(&mut self, solution: &Solution) -> bool {
        (**self).is_feasible(solution)
    }

    fn objective_value(&self, cost: f64) -> f64 {
        (**self).objective_value(cost)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Quadratic binary function `f(x) = x^T A x`
#[derive(Debug, Clone)]
pub struct Qbf {
    matrix: Vec<Vec<f64>>,
    variables: Vec<bool>,
}

impl Qbf {
    /// Build from a square coefficient matrix.
    ///
    /// # Panics
    /// If the matrix is not square.
    pub fn new(matrix: Vec<Vec<f64>>) -> Self {
        let n = matrix.len();
        assert!(
            matrix.iter().all(|row| row.len() == n),
            "coefficient matrix must be square"
        );
        Qbf {
            matrix,
            variables: vec![true; n],
        }
    }

    pub fn from_instance(instance: &QbfInstance) -> Self {
        Self::new(instance.matrix.clone())
    }

    pub fn matrix(&self) -> &[Vec<f64>] {
        &self.matrix
    }

    /// Current value of every decision variable
    pub fn variables(&self) -> &[bool] {
        &self.variables
    }

    /// Load the decision vector encoded by `solution` (member means zero).
    ///
    /// # Panics
    /// If the solution holds an index outside the domain.
    pub fn set_variables(&mut self, solution: &Solution) {
        self.variables.iter_mut().for_each(|x| *x = true);
        for element in solution.iter() {
            self.check_index(element);
            self.variables[element] = false;
        }
    }

    /// Objective change from flipping variable `i`, given the current vector.
    ///
    /// # Panics
    /// If `i` is outside the domain.
    pub fn contribution(&self, i: usize) -> f64 {
        self.check_index(i);
        let row = &self.matrix[i];
        let mut sum = row[i];
        for (j, &active) in self.variables.iter().enumerate() {
            if active && j != i {
                sum += row[j] + self.matrix[j][i];
            }
        }
        sum
    }

    /// `x^T A x` for the currently loaded vector
    fn evaluate_variables(&self) -> f64 {
        let mut total = 0.0;
        for (i, row) in self.matrix.iter().enumerate() {
            if !self.variables[i] {
                continue;
            }
            total += row
                .iter()
                .zip(&self.variables)
                .filter(|(_, &active)| active)
                .map(|(a, _)| *a)
                .sum::<f64>();
        }
        total
    }

    fn insertion_delta(&self, element: usize) -> f64 {
        if !self.variables[element] {
            return 0.0;
        }
        -self.contribution(element)
    }

    fn removal_delta(&self, element: usize) -> f64 {
        if self.variables[element] {
            return 0.0;
        }
        self.contribution(element)
    }

    #[inline]
    fn check_index(&self, i: usize) {
        assert!(
            i < self.matrix.len(),
            "index {} outside domain of size {}",
            i,
            self.matrix.len()
        );
    }
}

impl Evaluator for Qbf {
    fn domain_size(&self) -> usize {
        self.matrix.len()
    }

    fn evaluate(&mut self, solution: &mut Solution) -> f64 {
        self.set_variables(solution);
        let cost = self.evaluate_variables();
        solution.cost = cost;
        cost
    }

    fn insertion_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        self.check_index(element);
        self.set_variables(solution);
        self.insertion_delta(element)
    }

    fn removal_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        self.check_index(element);
        self.set_variables(solution);
        self.removal_delta(element)
    }

    fn exchange_cost(&mut self, incoming: usize, outgoing: usize, solution: &Solution) -> f64 {
        self.check_index(incoming);
        self.check_index(outgoing);
        self.set_variables(solution);

        if incoming == outgoing {
            return 0.0;
        }
        if !self.variables[incoming] {
            return self.removal_delta(outgoing);
        }
        if self.variables[outgoing] {
            return self.insertion_delta(incoming);
        }

        self.contribution(outgoing) - self.contribution(incoming)
            + self.exchange_correction(incoming, outgoing)
    }

    fn exchange_correction(&self, incoming: usize, outgoing: usize) -> f64 {
        -(self.matrix[incoming][outgoing] + self.matrix[outgoing][incoming])
    }

    fn name(&self) -> &str {
        "QBF"
    }
}

/// QBF restricted by a set-cover constraint.
///
/// Variable `i` activates covering set `i`. The ground set is the union of
/// all sets' members, and every ground element must stay covered by at least
/// one active set.
#[derive(Debug, Clone)]
pub struct SetCoverQbf {
    qbf: Qbf,
    sets: Vec<Vec<usize>>,
    ground: Vec<usize>,
    coverage: Vec<usize>,
}

impl SetCoverQbf {
    /// # Panics
    /// If the number of sets differs from the matrix dimension.
    pub fn new(qbf: Qbf, sets: Vec<Vec<usize>>) -> Self {
        assert_eq!(
            sets.len(),
            qbf.domain_size(),
            "one covering set per variable is required"
        );
        let width = sets
            .iter()
            .flatten()
            .map(|&m| m + 1)
            .max()
            .unwrap_or(0);
        let mut ground: Vec<usize> = sets.iter().flatten().copied().collect();
        ground.sort_unstable();
        ground.dedup();

        SetCoverQbf {
            qbf,
            sets,
            ground,
            coverage: vec![0; width],
        }
    }

    pub fn from_instance(instance: &QbfInstance) -> Self {
        Self::new(Qbf::from_instance(instance), instance.sets.clone())
    }

    pub fn qbf(&self) -> &Qbf {
        &self.qbf
    }

    pub fn sets(&self) -> &[Vec<usize>] {
        &self.sets
    }

    /// Elements that must stay covered
    pub fn ground_set(&self) -> &[usize] {
        &self.ground
    }

    /// Recount, for each ground element, how many active sets cover it
    fn count_coverage(&mut self, solution: &Solution) {
        self.coverage.iter_mut().for_each(|c| *c = 0);
        for (i, set) in self.sets.iter().enumerate() {
            if solution.contains(i) {
                continue;
            }
            for &member in set {
                self.coverage[member] += 1;
            }
        }
    }
}

impl Evaluator for SetCoverQbf {
    fn domain_size(&self) -> usize {
        self.qbf.domain_size()
    }

    fn evaluate(&mut self, solution: &mut Solution) -> f64 {
        self.qbf.evaluate(solution)
    }

    fn insertion_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        self.qbf.insertion_cost(element, solution)
    }

    fn removal_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        self.qbf.removal_cost(element, solution)
    }

    fn exchange_cost(&mut self, incoming: usize, outgoing: usize, solution: &Solution) -> f64 {
        self.qbf.exchange_cost(incoming, outgoing, solution)
    }

    fn exchange_correction(&self, incoming: usize, outgoing: usize) -> f64 {
        self.qbf.exchange_correction(incoming, outgoing)
    }

    /// Active sets whose deactivation leaves every member covered elsewhere
    fn insertable_candidates(&mut self, solution: &Solution) -> Vec<usize> {
        self.count_coverage(solution);
        let coverage = &self.coverage;
        (0..self.sets.len())
            .filter(|&i| !solution.contains(i))
            .filter(|&i| self.sets[i].iter().all(|&m| coverage[m] >= 2))
            .collect()
    }

    fn is_feasible(&mut self, solution: &Solution) -> bool {
        self.count_coverage(solution);
        self.ground.iter().all(|&m| self.coverage[m] > 0)
    }

    fn name(&self) -> &str {
        "MAX-SC-QBF"
    }
}

/// Negates every cost of the wrapped evaluator, turning maximization into
/// minimization.
#[derive(Debug, Clone)]
pub struct Inverse<E> {
    inner: E,
    name: String,
}

impl<E: Evaluator> Inverse<E> {
    pub fn new(inner: E) -> Self {
        let name = format!("{} (max)", inner.name());
        Inverse { inner, name }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Evaluator> Evaluator for Inverse<E> {
    fn domain_size(&self) -> usize {
        self.inner.domain_size()
    }

    fn evaluate(&mut self, solution: &mut Solution) -> f64 {
        let cost = -self.inner.evaluate(solution);
        solution.cost = cost;
        cost
    }

    fn insertion_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        -self.inner.insertion_cost(element, solution)
    }

    fn removal_cost(&mut self, element: usize, solution: &Solution) -> f64 {
        -self.inner.removal_cost(element, solution)
    }

    fn exchange_cost(&mut self, incoming: usize, outgoing: usize, solution: &Solution) -> f64 {
        -self.inner.exchange_cost(incoming, outgoing, solution)
    }

    fn exchange_correction(&self, incoming: usize, outgoing: usize) -> f64 {
        -self.inner.exchange_correction(incoming, outgoing)
    }

    fn insertable_candidates(&mut self, solution: &Solution) -> Vec<usize> {
        self.inner.insertable_candidates(solution)
    }

    fn is_feasible(&mut self, solution: &Solution) -> bool {
        self.inner.is_feasible(solution)
    }

    fn objective_value(&self, cost: f64) -> f64 {
        self.inner.objective_value(-cost)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build the maximizing evaluator matching the instance kind
pub fn maximizing_evaluator(instance: &QbfInstance) -> Box<dyn Evaluator> {
    match instance.kind {
        InstanceKind::Qbf => Box::new(Inverse::new(Qbf::from_instance(instance))),
        InstanceKind::SetCover => Box::new(Inverse::new(SetCoverQbf::from_instance(instance))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn create_test_qbf() -> Qbf {
        let instance = QbfInstance::from_upper_triangular(
            "test",
            &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0], vec![6.0]],
        );
        Qbf::from_instance(&instance)
    }

    #[test]
    fn test_concrete_scenario() {
        let mut qbf = create_test_qbf();

        let mut all_ones = Solution::new();
        assert_eq!(qbf.evaluate(&mut all_ones), 21.0);
        assert_eq!(all_ones.cost, 21.0);

        qbf.set_variables(&Solution::new());
        assert_eq!(qbf.contribution(0), 6.0);

        let mut first_off = Solution::from_elements([0]);
        assert_eq!(qbf.evaluate(&mut first_off), 15.0);
        assert_eq!(qbf.insertion_cost(0, &Solution::new()), -6.0);
    }

    #[test]
    fn test_degenerate_exchanges() {
        let mut qbf = create_test_qbf();
        let only_one = Solution::from_elements([1]);
        let one_and_two = Solution::from_elements([1, 2]);

        assert_eq!(qbf.exchange_cost(2, 2, &only_one), 0.0);

        // incoming already zero: pure removal of outgoing
        let removal = qbf.removal_cost(1, &one_and_two);
        assert_eq!(removal, 6.0);
        assert_eq!(qbf.exchange_cost(2, 1, &one_and_two), removal);

        // outgoing already one: pure insertion of incoming
        let insertion = qbf.insertion_cost(0, &only_one);
        assert_eq!(insertion, -4.0);
        assert_eq!(qbf.exchange_cost(0, 2, &only_one), insertion);
    }

    #[test]
    fn test_removal_is_inverse_of_insertion() {
        let mut qbf = create_test_qbf();
        let empty = Solution::new();
        let with_two = Solution::from_elements([2]);
        let ins = qbf.insertion_cost(2, &empty);
        let rem = qbf.removal_cost(2, &with_two);
        assert_eq!(ins, -rem);
        assert_eq!(qbf.insertion_cost(2, &with_two), 0.0);
        assert_eq!(qbf.removal_cost(2, &empty), 0.0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index_panics() {
        let mut qbf = create_test_qbf();
        qbf.insertion_cost(3, &Solution::new());
    }

    #[test]
    fn test_inverse_negates() {
        let mut inv = Inverse::new(create_test_qbf());
        let mut sol = Solution::from_elements([0]);
        assert_eq!(inv.evaluate(&mut sol), -15.0);
        assert_eq!(sol.cost, -15.0);
        assert_eq!(inv.objective_value(sol.cost), 15.0);
        assert_eq!(inv.insertion_cost(1, &sol), -inv.inner().clone().insertion_cost(1, &sol));

        let mut base = inv.into_inner();
        assert_eq!(base.evaluate(&mut sol), 15.0);
    }

    fn create_test_set_cover() -> SetCoverQbf {
        // element 0 only in set 0; element 1 in sets 0 and 1; element 2 in sets 1 and 2
        let sets = vec![vec![0, 1], vec![1, 2], vec![2]];
        SetCoverQbf::new(create_test_qbf(), sets)
    }

    #[test]
    fn test_set_cover_candidates() {
        let mut sc = create_test_set_cover();
        let empty = Solution::new();
        assert_eq!(sc.ground_set(), &[0, 1, 2]);
        assert_eq!(sc.insertable_candidates(&empty), vec![1, 2]);

        let without_two = Solution::from_elements([2]);
        assert_eq!(sc.insertable_candidates(&without_two), Vec::<usize>::new());
        assert!(sc.is_feasible(&without_two));

        let without_one = Solution::from_elements([1]);
        assert_eq!(sc.insertable_candidates(&without_one), Vec::<usize>::new());
        assert!(!sc.is_feasible(&Solution::from_elements([1, 2])));
        assert!(!sc.is_feasible(&Solution::from_elements([0])));
    }

    fn qbf_and_subset() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<bool>)> {
        (1usize..8).prop_flat_map(|n| {
            (
                proptest::collection::vec(
                    proptest::collection::vec(-10i32..10, n),
                    n,
                ),
                proptest::collection::vec(any::<bool>(), n),
            )
                .prop_map(|(rows, mask)| {
                    let matrix = rows
                        .iter()
                        .enumerate()
                        .map(|(i, row)| {
                            row.iter()
                                .enumerate()
                                .map(|(j, &v)| if j >= i { v as f64 } else { 0.0 })
                                .collect()
                        })
                        .collect();
                    (matrix, mask)
                })
        })
    }

    fn members(mask: &[bool]) -> Vec<usize> {
        mask.iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(i, _)| i)
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn insertion_matches_full_evaluation((matrix, mask) in qbf_and_subset()) {
            let mut qbf = Qbf::new(matrix);
            let mut sol = Solution::from_elements(members(&mask));
            let base = qbf.evaluate(&mut sol);

            for e in (0..mask.len()).filter(|&e| !mask[e]) {
                let delta = qbf.insertion_cost(e, &sol);
                let mut next = sol.clone();
                next.add(e);
                let full = qbf.evaluate(&mut next);
                prop_assert!((full - base - delta).abs() < 1e-9);
            }
            for e in members(&mask) {
                let delta = qbf.removal_cost(e, &sol);
                let mut next = sol.clone();
                next.remove(e);
                let full = qbf.evaluate(&mut next);
                prop_assert!((full - base - delta).abs() < 1e-9);
            }
        }

        #[test]
        fn exchange_follows_composition_law((matrix, mask) in qbf_and_subset()) {
            let mut qbf = Qbf::new(matrix);
            let sol = Solution::from_elements(members(&mask));

            for a in (0..mask.len()).filter(|&e| !mask[e]) {
                for b in members(&mask) {
                    let exchange = qbf.exchange_cost(a, b, &sol);
                    let mut with_a = sol.clone();
                    with_a.add(a);
                    let composed = qbf.insertion_cost(a, &sol) + qbf.removal_cost(b, &with_a);
                    prop_assert!((exchange - composed).abs() < 1e-9);

                    let cached = qbf.insertion_cost(a, &sol)
                        + qbf.removal_cost(b, &sol)
                        + qbf.exchange_correction(a, b);
                    prop_assert!((exchange - cached).abs() < 1e-9);
                }
            }
        }

        #[test]
        fn inverse_negates_every_cost((matrix, mask) in qbf_and_subset()) {
            let mut base = Qbf::new(matrix.clone());
            let mut inverse = Inverse::new(Qbf::new(matrix));
            let mut s1 = Solution::from_elements(members(&mask));
            let mut s2 = s1.clone();

            prop_assert_eq!(inverse.evaluate(&mut s2), -base.evaluate(&mut s1));
            for e in 0..mask.len() {
                prop_assert_eq!(inverse.insertion_cost(e, &s1), -base.insertion_cost(e, &s1));
                prop_assert_eq!(inverse.removal_cost(e, &s1), -base.removal_cost(e, &s1));
            }
        }
    }
}
