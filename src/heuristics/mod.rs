//! Heuristics module for the QBF tabu search.
//!
//! This module exports the construction heuristic, the neighborhood moves and
//! the move-selection strategies.

pub mod construction;
pub mod moves;
pub mod strategy;

pub use construction::*;
pub use moves::*;
pub use strategy::*;
