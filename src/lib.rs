//! QBF Tabu Search Library
//!
//! Tabu search for maximizing quadratic binary functions `f(x) = x^T A x`
//! (QBF) and for the set-cover constrained variant MAX-SC-QBF.
//!
//! # Features
//!
//! - Incremental insertion, removal and exchange costs
//! - Semi-greedy randomized construction
//! - Best-improving, first-improving, probabilistic and elite-intensification
//!   neighborhood strategies built from composable policies
//! - Deterministic runs from an explicit seed, with cooperative cancellation
//! - Experiment batching with CSV export
//!
//! # Example
//!
//! ```no_run
//! use qbf_tabu::evaluator::{Inverse, SetCoverQbf};
//! use qbf_tabu::instance::{InstanceKind, QbfInstance};
//! use qbf_tabu::search::{solve, StrategyConfig};
//!
//! // Load instance (falls back to a trivial instance if unreadable)
//! let instance = QbfInstance::load_or_trivial("instance-01.txt", InstanceKind::SetCover);
//!
//! // The search minimizes, so wrap the maximization problem
//! let evaluator = Inverse::new(SetCoverQbf::from_instance(&instance));
//!
//! let result = solve(evaluator, 20, 1000, 0, StrategyConfig::FirstImproving);
//! println!("Objective: {:.2}, selected: {:?}", result.objective, result.selected());
//! ```

pub mod benchmark;
pub mod evaluator;
pub mod heuristics;
pub mod instance;
pub mod search;
pub mod solution;
pub mod tabu;

pub use evaluator::{Evaluator, Inverse, Qbf, SetCoverQbf};
pub use instance::QbfInstance;
pub use search::{solve, SearchResult, StrategyConfig, TabuConfig, TabuSearch};
pub use solution::Solution;
