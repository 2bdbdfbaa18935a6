use std::collections::HashMap;

use crate::{
    parser::{Operation, Span, StateArena, StateId},
    symbol::Symbol,
};

/// Scores the tree of a candidate derivation against a reference tree.
pub trait BracketScorer {
    /// What is kept of an oracle derivation to score candidates against it.
    type Reference;

    /// Extracts the reference of the derivation ending in `oracle`.
    fn reference(&self, arena: &StateArena, oracle: StateId) -> Self::Reference;

    /// Scores the derivation ending in `candidate`, higher is better.
    fn score(&self, reference: &Self::Reference, arena: &StateArena, candidate: StateId) -> f64;
}

/// The labelled constituents of a derivation, as a multiset of `(label, span)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Brackets {
    counts: HashMap<(Symbol, Span), usize>,
    total: usize,
}

impl Brackets {
    /// Reads the constituents built by the REDUCE and UNARY actions leading to `state`.
    ///
    /// Preterminals (SHIFT) aren't brackets.
    pub fn collect(arena: &StateArena, state: StateId) -> Self {
        let mut brackets = Self::default();

        for (_, state) in arena.derivation(state) {
            if matches!(state.operation, Operation::Reduce | Operation::Unary(_)) {
                *brackets.counts.entry((state.label, state.span)).or_default() += 1;
                brackets.total += 1;
            }
        }

        brackets
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// The size of the multiset intersection with `other`.
    pub fn matched(&self, other: &Self) -> usize {
        self.counts
            .iter()
            .map(|(bracket, &count)| count.min(other.counts.get(bracket).copied().unwrap_or(0)))
            .sum()
    }
}

/// Labelled bracket F1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evalb;

impl BracketScorer for Evalb {
    type Reference = Brackets;

    fn reference(&self, arena: &StateArena, oracle: StateId) -> Brackets {
        Brackets::collect(arena, oracle)
    }

    fn score(&self, reference: &Brackets, arena: &StateArena, candidate: StateId) -> f64 {
        let test = Brackets::collect(arena, candidate);
        let total = reference.len() + test.len();

        // Two trees without brackets are identical.
        if total == 0 {
            return 1.0;
        }

        2.0 * reference.matched(&test) as f64 / total as f64
    }
}
