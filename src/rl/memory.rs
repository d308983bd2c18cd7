//! Bounded replay memory of transitions

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::features::FeatureVector;

/// One `(state, action, reward, next_state, done)` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: FeatureVector,
    pub action: usize,
    pub reward: f32,
    pub next_state: FeatureVector,
    pub done: bool,
}

/// FIFO buffer of transitions with a fixed capacity
///
/// Once full, every insert evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct ReplayMemory {
    transitions: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            transitions: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }

    pub fn add(&mut self, transition: Transition) {
        self.transitions.push_back(transition);
        while self.transitions.len() > self.capacity {
            self.transitions.pop_front();
        }
    }

    /// Draw `n` transitions uniformly with replacement.
    ///
    /// Returns an empty batch when the memory is empty. Callers decide whether
    /// the memory holds enough samples to be worth fitting on.
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Transition> {
        if self.transitions.is_empty() {
            return Vec::new();
        }
        (0..n)
            .map(|_| self.transitions[rng.gen_range(0..self.transitions.len())].clone())
            .collect()
    }

    /// Change the capacity, dropping the oldest entries if the memory is over it
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.transitions.len() > self.capacity {
            self.transitions.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }
}
