use std::collections::{BTreeMap, HashMap, HashSet};

use crate::parser::StateId;

/// The loss an objective assigned to each state, and the states it touched per step.
///
/// This is the hand off to a backward pass, which walks the active steps from the
/// last one down and propagates each state's loss through its layer.
#[derive(Debug, Clone, Default)]
pub struct Attribution {
    losses: HashMap<StateId, f64>,
    active: BTreeMap<usize, HashSet<StateId>>,
}

impl Attribution {
    /// Creates a new, empty `Attribution`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `loss` to the accumulated loss of `state`.
    pub fn add(&mut self, state: StateId, loss: f64) {
        *self.losses.entry(state).or_default() += loss;
    }

    /// Marks `state`, created at `step`, as a starting point of the backward pass.
    pub fn register(&mut self, step: usize, state: StateId) {
        self.active.entry(step).or_default().insert(state);
    }

    /// The accumulated loss of `state`, `0` if it never received any.
    pub fn loss(&self, state: StateId) -> f64 {
        self.losses.get(&state).copied().unwrap_or_default()
    }

    pub fn losses(&self) -> impl Iterator<Item = (StateId, f64)> + '_ {
        self.losses.iter().map(|(&state, &loss)| (state, loss))
    }

    /// The states registered at `step`.
    pub fn active(&self, step: usize) -> Option<&HashSet<StateId>> {
        self.active.get(&step)
    }

    /// Iterates the registered states grouped by step, in ascending step order.
    pub fn active_steps(&self) -> impl DoubleEndedIterator<Item = (usize, &HashSet<StateId>)> {
        self.active.iter().map(|(&step, states)| (step, states))
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty() && self.active.is_empty()
    }

    pub fn clear(&mut self) {
        self.losses.clear();
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Operation, Span, State, StateArena};
    use crate::symbol::Symbol;

    fn ids(n: usize) -> Vec<StateId> {
        let mut arena = StateArena::new();
        (0..n)
            .map(|step| {
                arena.allocate(State {
                    step,
                    next: 0,
                    unary: 0,
                    operation: Operation::Axiom,
                    label: Symbol::Epsilon,
                    head: None,
                    span: Span::default(),
                    stack: None,
                    derivation: None,
                    reduced: None,
                    layer: Default::default(),
                    score: 0.0,
                })
            })
            .collect()
    }

    #[test]
    fn losses_accumulate_per_state() {
        let ids = ids(2);
        let mut attribution = Attribution::new();
        attribution.add(ids[0], 0.25);
        attribution.add(ids[0], 0.5);
        attribution.add(ids[1], -1.0);

        assert_eq!(attribution.loss(ids[0]), 0.75);
        assert_eq!(attribution.loss(ids[1]), -1.0);
        assert_eq!(attribution.losses().count(), 2);
    }

    #[test]
    fn registered_states_are_grouped_by_step() {
        let ids = ids(3);
        let mut attribution = Attribution::new();
        attribution.register(2, ids[2]);
        attribution.register(0, ids[0]);
        attribution.register(2, ids[2]);

        let steps: Vec<_> = attribution.active_steps().map(|(s, set)| (s, set.len())).collect();
        assert_eq!(steps, [(0, 1), (2, 1)]);
        assert!(attribution.active(1).is_none());
    }

    #[test]
    fn clear_forgets_everything() {
        let ids = ids(1);
        let mut attribution = Attribution::new();
        attribution.add(ids[0], 1.0);
        attribution.register(0, ids[0]);

        attribution.clear();
        assert!(attribution.is_empty());
        assert_eq!(attribution.loss(ids[0]), 0.0);
    }
}
