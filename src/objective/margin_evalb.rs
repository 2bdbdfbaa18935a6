use std::marker::PhantomData;

use log::debug;

use super::{
    Attribution, BracketScorer, Evalb, Log, Objective, Semiring, check_lengths, normalize,
};
use crate::{
    Result,
    config::MarginConfig,
    parser::{Agenda, StateArena},
};

/// Expected bracket quality of the final candidate beam.
///
/// Each finished candidate is worth its best bracket score against any finished
/// oracle. Candidates are weighted by the normalized probability of their scaled
/// score and the objective is the negated expected worth.
#[derive(Debug, Clone)]
pub struct MarginEvalb<B = Evalb, S = Log> {
    config: MarginConfig,
    scorer: B,
    semiring: PhantomData<S>,
}

impl<B: BracketScorer, S: Semiring> MarginEvalb<B, S> {
    /// Creates a new `MarginEvalb`.
    ///
    /// # Arguments
    /// * `config` - The objective settings, only `scale` applies.
    /// * `scorer` - Rates a candidate tree against an oracle tree.
    ///
    /// # Returns
    /// A new `MarginEvalb` instance.
    pub fn new(config: MarginConfig, scorer: B) -> Self {
        Self {
            config,
            scorer,
            semiring: PhantomData,
        }
    }
}

impl<B: BracketScorer, S: Semiring> Objective for MarginEvalb<B, S> {
    fn margin(
        &mut self,
        arena: &StateArena,
        candidates: &Agenda,
        oracles: &Agenda,
        attribution: &mut Attribution,
    ) -> Result<f64> {
        check_lengths(candidates, oracles)?;

        let (candidates, oracles) = (candidates.last(), oracles.last());

        let references: Vec<_> = oracles
            .iter()
            .map(|&o| self.scorer.reference(arena, o))
            .collect();

        let qualities: Vec<f64> = candidates
            .iter()
            .map(|&c| {
                references
                    .iter()
                    .map(|r| self.scorer.score(r, arena, c))
                    .fold(0.0, f64::max)
            })
            .collect();

        let margins: Vec<f64> = candidates
            .iter()
            .map(|&c| arena[c].score * self.config.scale)
            .collect();
        let probs = normalize::<S>(&margins);

        let expectation: f64 = qualities.iter().zip(&probs).map(|(q, p)| q * p).sum();

        for ((&candidate, &quality), &prob) in candidates.iter().zip(&qualities).zip(&probs) {
            let loss = -(quality - expectation) * prob;

            if loss == 0.0 {
                continue;
            }

            attribution.add(candidate, loss);
            attribution.register(arena[candidate].step, candidate);
        }

        debug!(
            candidates = candidates.len(), oracles = oracles.len(), expectation = expectation;
            "computed expected evalb"
        );
        Ok(-expectation)
    }
}
