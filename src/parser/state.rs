use std::ops::Index;

use ndarray::Array1;

use crate::symbol::{Symbol, Word};

/// The transition that created a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Axiom,
    Shift,
    Reduce,
    /// A unary, with the amount of consecutive unaries ending in it.
    Unary(u32),
    Idle,
    Final,
}

impl Operation {
    /// Returns the consecutive unary count, `0` for any non unary operation.
    pub fn closure(self) -> u32 {
        match self {
            Operation::Unary(closure) => closure,
            _ => 0,
        }
    }

    /// Whether the parse this operation belongs to is already complete.
    pub fn is_finished(self) -> bool {
        matches!(self, Operation::Final | Operation::Idle)
    }
}

/// A half open `[first, last)` range over the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub first: usize,
    pub last: usize,
}

impl Span {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }
}

/// A handle to a state inside a `StateArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl StateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One parser configuration.
///
/// States are never modified once allocated. `stack`, `derivation` and `reduced`
/// always point to states created at a strictly earlier step, so all states of
/// a parse form a backward pointing DAG that many search paths share.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub step: usize,
    pub next: usize,
    pub unary: usize,

    pub operation: Operation,
    pub label: Symbol,
    pub head: Option<Word>,
    pub span: Span,

    pub stack: Option<StateId>,
    pub derivation: Option<StateId>,
    pub reduced: Option<StateId>,

    pub layer: Array1<f32>,
    pub score: f64,
}

/// Append-only storage for the states of one training instance.
///
/// Both the free and the oracle search of an instance allocate from the same
/// arena, so a `StateId` identifies a state across both agendas. Memory is
/// reclaimed in bulk with `reset`.
#[derive(Debug, Default)]
pub struct StateArena {
    states: Vec<State>,
}

impl StateArena {
    /// Creates a new, empty `StateArena`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `state` into the arena.
    ///
    /// # Returns
    /// The id of the newly allocated state.
    ///
    /// # Panics
    /// If any back-pointer of `state` refers to a state that isn't strictly older.
    pub fn allocate(&mut self, state: State) -> StateId {
        for back in [state.stack, state.derivation, state.reduced]
            .into_iter()
            .flatten()
        {
            let step = self.states[back.index()].step;
            assert!(
                step < state.step,
                "state at step {} points to a state at step {step}",
                state.step
            );
        }

        let id = StateId(self.states.len() as u32);
        self.states.push(state);
        id
    }

    /// Drops every state, invalidating all the ids handed out so far.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// Iterates the derivation of `id`: the state itself and every state before it.
    pub fn derivation(&self, id: StateId) -> impl Iterator<Item = (StateId, &State)> + '_ {
        std::iter::successors(Some(id), |&id| self[id].derivation).map(|id| (id, &self[id]))
    }
}

impl Index<StateId> for StateArena {
    type Output = State;

    fn index(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }
}
