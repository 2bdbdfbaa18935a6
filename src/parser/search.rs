use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::{
    Parser,
    state::{Operation, StateArena, StateId},
};
use crate::{
    ParseErr, Result,
    params::ParameterStore,
    symbol::{Grammar, Symbol, Word},
};

/// A labelled transition, as produced by the search or read from a gold derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Shift(Symbol),
    Reduce(Symbol),
    Unary(Symbol),
    Idle,
    Final,
}

impl Parser {
    /// Whether `action` may follow `state` in the current parse.
    ///
    /// Besides each action's own precondition, the successor must still fit in the agenda.
    pub fn is_legal(&self, arena: &StateArena, state: StateId, action: Action) -> bool {
        let state = &arena[state];

        if state.step + 1 >= self.agenda.len() {
            return false;
        }

        let finished = state.operation.is_finished();
        let words = self.input.len();

        match action {
            Action::Shift(_) => !finished && state.next < words,
            Action::Reduce(_) => !finished && state.stack.is_some_and(|s| arena[s].stack.is_some()),
            Action::Unary(_) => {
                matches!(
                    state.operation,
                    Operation::Shift | Operation::Reduce | Operation::Unary(_)
                ) && state.unary < self.config.unary_limit(words)
                    && state.operation.closure() < self.config.max_closure
            }
            Action::Final => {
                !finished
                    && state.next == words
                    && state.stack.is_some_and(|s| arena[s].stack.is_none())
            }
            Action::Idle => finished,
        }
    }

    /// Applies `action` to `state` without checking its precondition.
    ///
    /// # Returns
    /// The id of the successor state.
    pub fn apply(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
        action: Action,
    ) -> StateId {
        match action {
            Action::Shift(label) => {
                let head = self.input[arena[state].next];
                self.shift(arena, theta, state, head, label)
            }
            Action::Reduce(label) => self.reduce(arena, theta, state, label),
            Action::Unary(label) => self.unary(arena, theta, state, label),
            Action::Idle => self.idle(arena, theta, state),
            Action::Final => self.finish(arena, theta, state),
        }
    }

    /// Runs the free beam search over `input`, filling the whole agenda.
    ///
    /// Every state of a step is expanded with every legal action, trying each of
    /// `grammar`'s labels for the labelled ones, and the best `beam` successors by
    /// cumulative score survive into the next step.
    ///
    /// # Arguments
    /// * `arena` - Where the new states are allocated.
    /// * `theta` - The parameters that score every action.
    /// * `grammar` - The labels to try for each labelled action.
    /// * `input` - The sentence to parse.
    pub fn search(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        grammar: &Grammar,
        input: &[Word],
    ) -> Result<()> {
        self.axiom(arena, theta, input)?;
        let beam = self.config.beam.get();

        for step in 0..self.agenda.len().saturating_sub(1) {
            let frontier = self.agenda.beam(step).to_vec();

            for state in frontier {
                for action in actions(grammar) {
                    if self.is_legal(arena, state, action) {
                        self.apply(arena, theta, state, action);
                    }
                }
            }

            if let Some(successors) = self.agenda.beam_mut(step + 1) {
                let expanded = successors.len();
                successors.sort_by(|a, b| arena[*b].score.total_cmp(&arena[*a].score));
                successors.truncate(beam);
                trace!(step = step + 1, expanded = expanded, kept = successors.len(); "pruned beam");
            }
        }

        debug!(
            words = input.len(), steps = self.agenda.len(), states = arena.len();
            "finished candidate search"
        );
        Ok(())
    }

    /// Runs the search constrained to the gold `actions`, one state per step.
    ///
    /// Once the gold derivation is finished it's padded with IDLE up to the end of
    /// the agenda, so it lines up with the free search of the same input.
    ///
    /// # Errors
    /// `InvalidAction` if an action's precondition doesn't hold when it's applied.
    pub fn oracle(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        input: &[Word],
        actions: &[Action],
    ) -> Result<()> {
        let mut state = self.axiom(arena, theta, input)?;

        for &action in actions {
            if !self.is_legal(arena, state, action) {
                return Err(ParseErr::InvalidAction {
                    step: arena[state].step,
                    action,
                });
            }

            state = self.apply(arena, theta, state, action);
        }

        while self.is_legal(arena, state, Action::Idle) {
            state = self.idle(arena, theta, state);
        }

        debug!(
            words = input.len(), actions = actions.len(), steps = arena[state].step;
            "finished oracle search"
        );
        Ok(())
    }
}

fn actions(grammar: &Grammar) -> impl Iterator<Item = Action> + '_ {
    let shift = grammar.shift.iter().map(|&l| Action::Shift(l));
    let reduce = grammar.reduce.iter().map(|&l| Action::Reduce(l));
    let unary = grammar.unary.iter().map(|&l| Action::Unary(l));

    shift
        .chain(reduce)
        .chain(unary)
        .chain([Action::Final, Action::Idle])
}
