use std::collections::VecDeque;
use std::sync::Arc;

use itertools::Itertools;
use rand::seq::index;
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::prelude::Action;

/// One experienced step: `state` --`action`--> `next_state`.
///
/// States are shared behind an [Arc], so a transition is cheap to clone and may travel between worker threads.
#[derive(Debug)]
pub struct Transition<S, A> {
    pub state: Arc<S>,
    pub action: A,
    pub reward: f32,
    pub next_state: Arc<S>,
    /// the episode ended with this step; no future value may be bootstrapped from `next_state`
    pub done: bool,
}

impl<S, A: Copy> Clone for Transition<S, A> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            action: self.action,
            reward: self.reward,
            next_state: Arc::clone(&self.next_state),
            done: self.done,
        }
    }
}

/// Bounded FIFO experience memory.
/// Appending to a full memory evicts the oldest element.
#[derive(Debug)]
pub struct ReplayMemory<T> {
    capacity: usize,
    buffer: VecDeque<T>,
}

impl<T> ReplayMemory<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.buffer.len() }

    pub fn is_empty(&self) -> bool { self.buffer.is_empty() }

    pub fn append(
        &mut self,
        element: T,
    ) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(element);
    }

    pub fn extend<I: IntoIterator<Item = T>>(
        &mut self,
        elements: I,
    ) {
        for e in elements {
            self.append(e);
        }
    }

    /// Draws `k` elements uniformly without replacement.
    /// Returns all elements (in insertion order), when there are not more than `k` of them.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        k: usize,
        rng: &mut R,
    ) -> Vec<&T> {
        if self.buffer.len() > k {
            index::sample(rng, self.buffer.len(), k)
                .into_iter()
                .map(|i| &self.buffer[i])
                .collect()
        } else {
            self.buffer.iter().collect()
        }
    }

    /// Moves all elements out, oldest first
    pub fn drain(&mut self) -> Vec<T> { self.buffer.drain(..).collect() }

    pub fn clear(&mut self) { self.buffer.clear() }

    pub fn iter(&self) -> impl Iterator<Item = &T> { self.buffer.iter() }
}

impl<S, A: Action> ReplayMemory<Transition<S, A>> {
    /// e.g. `Idle 62.5%, Jump 37.5%`
    pub fn action_distribution_line(&self) -> String { action_distribution_line(self.buffer.iter().map(|t| t.action)) }
}

/// Share of each action, ordered by numeric value. e.g. `Idle 62.5%, Jump 37.5%`
pub fn action_distribution_line<A: Action>(actions: impl IntoIterator<Item = A>) -> String {
    let mut action_counts = FxHashMap::<A, usize>::default();
    let mut total_actions = 0;
    for action in actions {
        action_counts.entry(action).and_modify(|e| *e += 1).or_insert(1);
        total_actions += 1;
    }

    action_counts
        .iter()
        .sorted_by_key(|(action, _)| action.numeric())
        .map(|(&action, &count)| {
            let ratio = 100.0 * count as f32 / total_actions as f32;
            format!("{} {:.1}%", action, ratio)
        })
        .join(", ")
}
