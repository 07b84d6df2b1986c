//! Short-term memory of recently touched elements.

use crate::heuristics::moves::Move;
use std::collections::{HashMap, VecDeque};

/// Fixed-length sliding window of recently touched elements.
///
/// The buffer holds `2 * tenure` slots, initially all `None` (the sentinel
/// for "no element"). Every accepted move pushes exactly two slots, so an
/// element stays tabu for `tenure` iterations.
#[derive(Debug, Clone)]
pub struct TabuList {
    buffer: VecDeque<Option<usize>>,
    counts: HashMap<usize, usize>,
}

impl TabuList {
    pub fn new(tenure: usize) -> Self {
        TabuList {
            buffer: std::iter::repeat(None).take(2 * tenure).collect(),
            counts: HashMap::new(),
        }
    }

    /// Buffer length; constant for the life of the list
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn tenure(&self) -> usize {
        self.buffer.len() / 2
    }

    pub fn is_tabu(&self, element: usize) -> bool {
        self.counts.get(&element).map_or(false, |&c| c > 0)
    }

    /// Evict the oldest slot and append `entry`. No-op for a zero tenure.
    pub fn push(&mut self, entry: Option<usize>) {
        if self.buffer.is_empty() {
            return;
        }
        if let Some(Some(evicted)) = self.buffer.pop_front() {
            if let Some(count) = self.counts.get_mut(&evicted) {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&evicted);
                }
            }
        }
        if let Some(element) = entry {
            *self.counts.entry(element).or_insert(0) += 1;
        }
        self.buffer.push_back(entry);
    }

    /// Push the removal slot then the insertion slot of an accepted move
    pub fn record(&mut self, mv: &Move) {
        let (removed, inserted) = mv.tabu_entries();
        self.push(removed);
        self.push(inserted);
    }

    /// Positions occupied by `element`, 0 being the most recent slot
    pub fn positions(&self, element: usize) -> Vec<usize> {
        if !self.is_tabu(element) {
            return Vec::new();
        }
        self.buffer
            .iter()
            .rev()
            .enumerate()
            .filter(|(_, slot)| **slot == Some(element))
            .map(|(pos, _)| pos)
            .collect()
    }

    /// Most recent position of `element`, if it is tabu
    pub fn recency(&self, element: usize) -> Option<usize> {
        if !self.is_tabu(element) {
            return None;
        }
        self.buffer
            .iter()
            .rev()
            .position(|slot| *slot == Some(element))
    }

    /// Chance that a tabu element is let through anyway.
    ///
    /// `exp(-alpha * recency / (len - 1))` with recency 0 for the most recent
    /// slot. Non-tabu elements return 1.
    pub fn acceptance_probability(&self, element: usize, alpha: f64) -> f64 {
        match self.recency(element) {
            None => 1.0,
            Some(_) if self.buffer.len() < 2 => 0.0,
            Some(pos) => (-alpha * pos as f64 / (self.buffer.len() - 1) as f64).exp(),
        }
    }

    /// Buffer contents, oldest first
    pub fn entries(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.buffer.iter().copied()
    }
}
