use log::debug;

use crate::{
    Result,
    config::ParserConfig,
    objective::{Attribution, Objective},
    params::ParameterStore,
    parser::{Action, Parser, StateArena},
    symbol::{Grammar, Word},
};

/// Runs one training instance at a time: both searches, then the objective.
///
/// Owns the scratch memory of an instance, which is reclaimed in bulk when the
/// next one starts. Every worker owns its own `Learner`, the parameters are only
/// read.
pub struct Learner<O: Objective> {
    objective: O,
    arena: StateArena,
    candidates: Parser,
    oracles: Parser,
    attribution: Attribution,
}

impl<O: Objective> Learner<O> {
    /// Creates a new `Learner`.
    ///
    /// # Arguments
    /// * `config` - The settings of both searches.
    /// * `objective` - Compares the free search against the oracle search.
    ///
    /// # Returns
    /// A new `Learner` instance.
    pub fn new(config: ParserConfig, objective: O) -> Self {
        Self {
            objective,
            arena: StateArena::new(),
            candidates: Parser::new(config),
            oracles: Parser::new(config),
            attribution: Attribution::new(),
        }
    }

    /// Parses `input` freely and along `gold`, and evaluates the objective on both agendas.
    ///
    /// The states and attribution of the previous instance are dropped first.
    ///
    /// # Arguments
    /// * `theta` - The parameters scoring every action.
    /// * `grammar` - The labels the free search may try.
    /// * `input` - The sentence.
    /// * `gold` - The correct derivation of `input`.
    ///
    /// # Returns
    /// The objective value of this instance.
    pub fn learn(
        &mut self,
        theta: &ParameterStore,
        grammar: &Grammar,
        input: &[Word],
        gold: &[Action],
    ) -> Result<f64> {
        self.arena.reset();
        self.attribution.clear();

        self.candidates
            .search(&mut self.arena, theta, grammar, input)?;
        self.oracles.oracle(&mut self.arena, theta, input, gold)?;

        let loss = self.objective.margin(
            &self.arena,
            self.candidates.agenda(),
            self.oracles.agenda(),
            &mut self.attribution,
        )?;

        debug!(words = input.len(), states = self.arena.len(), loss = loss; "learned instance");
        Ok(loss)
    }

    pub fn arena(&self) -> &StateArena {
        &self.arena
    }

    /// The losses assigned by the last `learn` call.
    pub fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    /// The free search of the last `learn` call.
    pub fn candidates(&self) -> &Parser {
        &self.candidates
    }

    /// The oracle search of the last `learn` call.
    pub fn oracles(&self) -> &Parser {
        &self.oracles
    }
}
