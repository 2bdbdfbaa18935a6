use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::parser::ActFn;

const DEFAULT_BEAM: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// Search settings shared by the free and the oracle search of a training instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// How many states survive at every step of the free search.
    pub beam: NonZeroUsize,
    /// Unary budget per input word.
    pub max_unary: usize,
    /// Longest chain of consecutive unaries.
    pub max_closure: u32,
    pub activation: ActFn,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            beam: DEFAULT_BEAM,
            max_unary: 1,
            max_closure: 3,
            activation: ActFn::default(),
        }
    }
}

impl ParserConfig {
    /// The amount of transitions after the axiom a parse of `words` words may take.
    ///
    /// `words` shifts, `words - 1` reduces, the final action and the unary budget.
    pub fn steps(&self, words: usize) -> usize {
        words * (2 + self.max_unary)
    }

    /// The most unaries a parse of `words` words may contain.
    pub fn unary_limit(&self, words: usize) -> usize {
        words * self.max_unary
    }
}

/// Settings of the margin objectives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarginConfig {
    /// Compare every candidate against every oracle instead of only the best of each.
    pub all_pairs: bool,
    /// Multiplies candidate scores before normalizing them.
    pub scale: f64,
    /// Report agendas with no common non-empty step as `ParseErr::NoCommonStep`
    /// instead of a zero loss.
    pub strict: bool,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            all_pairs: false,
            scale: 1.0,
            strict: false,
        }
    }
}
