use qbf_tabu::evaluator::{Evaluator, Inverse, Qbf, SetCoverQbf};
use qbf_tabu::heuristics::moves::Move;
use qbf_tabu::instance::{InstanceKind, QbfInstance};
use qbf_tabu::search::{solve, NoopObserver, StrategyConfig, TabuConfig, TabuSearch};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const STRATEGIES: [StrategyConfig; 4] = [
    StrategyConfig::BestImproving,
    StrategyConfig::FirstImproving,
    StrategyConfig::Probabilistic { alpha: 2.0 },
    StrategyConfig::Intensification {
        elite_size: 5,
        window: 50,
    },
];

/// Random upper-triangular instance with integer coefficients
fn random_instance(n: usize, seed: u64) -> QbfInstance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| (i..n).map(|_| rng.gen_range(-10..=10) as f64).collect())
        .collect();
    QbfInstance::from_upper_triangular(&format!("random-{}", seed), &rows)
}

/// Random set-cover instance where every element lies in two or three sets
fn random_set_cover_instance(n: usize, seed: u64) -> QbfInstance {
    let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
    let mut sets = vec![Vec::new(); n];
    for element in 0..n {
        let copies = rng.gen_range(2..=3);
        for set in (0..n).choose_multiple(&mut rng, copies) {
            sets[set].push(element);
        }
    }
    random_instance(n, seed).with_sets(sets)
}

fn set_cover_search(instance: &QbfInstance, config: TabuConfig) -> TabuSearch<Inverse<SetCoverQbf>> {
    TabuSearch::new(Inverse::new(SetCoverQbf::from_instance(instance)), config)
        .with_observer(Box::new(NoopObserver))
}

#[test]
fn identical_seeds_give_identical_runs() {
    let instance = random_set_cover_instance(25, 3);
    for strategy in STRATEGIES {
        let run = |seed| {
            solve(
                Inverse::new(SetCoverQbf::from_instance(&instance)),
                5,
                150,
                seed,
                strategy,
            )
        };
        let a = run(17);
        let b = run(17);
        assert_eq!(a.selected(), b.selected(), "{}", strategy);
        assert_eq!(a.cost().to_bits(), b.cost().to_bits(), "{}", strategy);
        assert_eq!(a.best_iteration, b.best_iteration, "{}", strategy);
    }
}

#[test]
fn set_cover_stays_feasible_every_iteration() {
    for seed in 0..4 {
        let instance = random_set_cover_instance(20, seed);
        for strategy in STRATEGIES {
            let config = TabuConfig::new(4, 50, seed, strategy);
            let mut search = set_cover_search(&instance, config);
            search.start_search();
            let initial = search.current().clone();
            assert!(search.evaluator_mut().is_feasible(&initial));

            for iteration in 0..50 {
                search.step(iteration);
                let current = search.current().clone();
                assert!(
                    search.evaluator_mut().is_feasible(&current),
                    "{} seed {} iteration {}: coverage broken by {:?}",
                    strategy,
                    seed,
                    iteration,
                    current.elements()
                );
            }
        }
    }
}

#[test]
fn tabu_buffer_length_is_constant() {
    let instance = random_instance(15, 8);
    for strategy in STRATEGIES {
        let tenure = 6;
        let mut search = TabuSearch::new(
            Inverse::new(Qbf::from_instance(&instance)),
            TabuConfig::new(tenure, 60, 1, strategy),
        )
        .with_observer(Box::new(NoopObserver));
        search.start_search();

        for iteration in 0..60 {
            let before: Vec<Option<usize>> = search.tabu_list().entries().collect();
            let mv = search.step(iteration);
            let after: Vec<Option<usize>> = search.tabu_list().entries().collect();

            assert_eq!(after.len(), 2 * tenure);
            match mv {
                Some(mv) => {
                    // two slots shifted in, the rest moved down by two
                    assert_eq!(&after[..2 * tenure - 2], &before[2..]);
                    let (removed, inserted) = mv.tabu_entries();
                    assert_eq!(after[2 * tenure - 2], removed);
                    assert_eq!(after[2 * tenure - 1], inserted);
                }
                None => assert_eq!(after, before),
            }
        }
    }
}

#[test]
fn accepted_tabu_moves_beat_the_best_cost() {
    for seed in 0..3 {
        let instance = random_instance(18, 40 + seed);
        for strategy in [StrategyConfig::BestImproving, StrategyConfig::FirstImproving] {
            let mut search = TabuSearch::new(
                Inverse::new(Qbf::from_instance(&instance)),
                TabuConfig::new(3, 80, seed, strategy),
            )
            .with_observer(Box::new(NoopObserver));
            search.start_search();

            for iteration in 0..80 {
                let tabu = search.tabu_list().clone();
                let best_before = search.best().cost;
                let Some(mv) = search.step(iteration) else {
                    continue;
                };
                let touched_tabu = mv.elements().any(|e| tabu.is_tabu(e));
                if touched_tabu {
                    assert!(
                        search.current().cost < best_before,
                        "{}: tabu move {} accepted at cost {} with best {}",
                        strategy,
                        mv,
                        search.current().cost,
                        best_before
                    );
                }
            }
        }
    }
}

#[test]
fn cached_cost_matches_full_evaluation() {
    let instance = random_set_cover_instance(16, 21);
    for strategy in STRATEGIES {
        let mut search = set_cover_search(&instance, TabuConfig::new(3, 40, 2, strategy));
        search.start_search();
        for iteration in 0..40 {
            search.step(iteration);
            let mut current = search.current().clone();
            let cached = current.cost;
            let full = search.evaluator_mut().evaluate(&mut current);
            assert!((cached - full).abs() < 1e-9);
            assert!(search.best().cost <= cached);
        }
    }
}

#[test]
fn incremental_costs_match_on_random_instances() {
    for seed in 0..20 {
        let instance = random_instance(12, 100 + seed);
        let mut qbf = Qbf::from_instance(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut solution: qbf_tabu::Solution = (0..12).filter(|_| rng.gen_bool(0.4)).collect();
        let base = qbf.evaluate(&mut solution);

        for e in (0..12).filter(|&e| !solution.contains(e)) {
            let delta = qbf.insertion_cost(e, &solution);
            let mut next = solution.clone();
            Move::Insert(e).apply(&mut next);
            assert!((qbf.evaluate(&mut next) - base - delta).abs() < 1e-9);
        }
    }
}

#[test]
fn unreadable_instance_still_solves() {
    let instance = QbfInstance::load_or_trivial("/no/such/instance.txt", InstanceKind::SetCover);
    let result = solve(
        Inverse::new(SetCoverQbf::from_instance(&instance)),
        20,
        10,
        0,
        StrategyConfig::FirstImproving,
    );
    assert_eq!(result.domain_size, 1);
    assert!(result.selected().is_empty());
    assert_eq!(result.objective, 0.0);
}
