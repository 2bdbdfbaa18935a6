use std::marker::PhantomData;

use log::debug;

use super::{
    Attribution, Log, Objective, Semiring, check_lengths, max_violation, no_common_step,
    normalize, step_back,
};
use crate::{
    Result,
    config::MarginConfig,
    parser::{Agenda, StateArena, StateId},
};

/// Hinge loss at the point of maximum violation between the two searches.
///
/// Compares either the best candidate with the best oracle, or every candidate
/// with every oracle weighted by their normalized probabilities, as chosen by
/// `MarginConfig::all_pairs`. Probabilities are computed in `S`.
#[derive(Debug, Clone)]
pub struct MarginMax<S = Log> {
    config: MarginConfig,
    semiring: PhantomData<S>,
}

impl<S: Semiring> MarginMax<S> {
    /// Creates a new `MarginMax`.
    ///
    /// # Arguments
    /// * `config` - The objective settings.
    ///
    /// # Returns
    /// A new `MarginMax` instance.
    pub fn new(config: MarginConfig) -> Self {
        Self {
            config,
            semiring: PhantomData,
        }
    }

    fn single_best(
        &self,
        arena: &StateArena,
        candidates: &[StateId],
        oracles: &[StateId],
        attribution: &mut Attribution,
    ) -> f64 {
        let best = |beam: &[StateId]| {
            beam.iter()
                .copied()
                .max_by(|&a, &b| arena[a].score.total_cmp(&arena[b].score))
        };

        let (Some(candidate), Some(oracle)) = (best(candidates), best(oracles)) else {
            return 0.0;
        };

        let Some(violation) = max_violation(arena, candidate, oracle) else {
            return 0.0;
        };

        attribution.add(violation.candidate, 1.0);
        attribution.add(violation.oracle, -1.0);

        attribution.register(arena[violation.candidate].step, violation.candidate);
        attribution.register(arena[violation.oracle].step, violation.oracle);

        violation.error
    }

    fn all_pairs(
        &self,
        arena: &StateArena,
        candidates: &[StateId],
        oracles: &[StateId],
        attribution: &mut Attribution,
    ) -> f64 {
        let oracle_scores: Vec<f64> = oracles.iter().map(|&o| arena[o].score).collect();
        let score_min = oracle_scores.iter().copied().fold(f64::INFINITY, f64::min);

        // Candidates not above every oracle can't violate the margin.
        let candidates: Vec<StateId> = candidates
            .iter()
            .copied()
            .filter(|&c| arena[c].score > score_min)
            .collect();
        let candidate_scores: Vec<f64> = candidates.iter().map(|&c| arena[c].score).collect();

        let candidate_probs = normalize::<S>(&candidate_scores);
        let oracle_probs = normalize::<S>(&oracle_scores);

        let mut loss = 0.0;
        let mut found = false;

        for (&candidate, &prob_candidate) in candidates.iter().zip(&candidate_probs) {
            for (&oracle, &prob_oracle) in oracles.iter().zip(&oracle_probs) {
                let Some(violation) = max_violation(arena, candidate, oracle) else {
                    continue;
                };

                let weight = prob_candidate * prob_oracle;
                attribution.add(violation.candidate, weight);
                attribution.add(violation.oracle, -weight);

                loss += violation.error * weight;
                found = true;
            }
        }

        if !found {
            return 0.0;
        }

        for &state in candidates.iter().chain(oracles) {
            attribution.register(arena[state].step, state);
        }

        loss
    }
}

impl<S: Semiring> Objective for MarginMax<S> {
    fn margin(
        &mut self,
        arena: &StateArena,
        candidates: &Agenda,
        oracles: &Agenda,
        attribution: &mut Attribution,
    ) -> Result<f64> {
        check_lengths(candidates, oracles)?;

        let Some(step) = step_back(candidates, oracles) else {
            return no_common_step(self.config.strict, candidates.len());
        };

        let (kbest_candidates, kbest_oracles) = (candidates.beam(step), oracles.beam(step));

        let loss = if self.config.all_pairs {
            self.all_pairs(arena, kbest_candidates, kbest_oracles, attribution)
        } else {
            self.single_best(arena, kbest_candidates, kbest_oracles, attribution)
        };

        debug!(
            step = step, all_pairs = self.config.all_pairs, loss = loss;
            "computed max margin"
        );
        Ok(loss)
    }
}
