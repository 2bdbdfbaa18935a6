mod attribution;
mod evalb;
mod margin_evalb;
mod margin_max;
mod semiring;

pub use attribution::Attribution;
pub use evalb::{BracketScorer, Brackets, Evalb};
pub use margin_evalb::MarginEvalb;
pub use margin_max::MarginMax;
pub use semiring::{Linear, Log, Semiring, normalize};

use log::warn;

use crate::{
    ParseErr, Result,
    parser::{Agenda, StateArena, StateId},
};

/// Turns a free and an oracle constrained search of the same input into per state losses.
pub trait Objective {
    /// Compares the two agendas, writing the losses it assigns into `attribution`.
    ///
    /// # Arguments
    /// * `arena` - The states both agendas point into.
    /// * `candidates` - The agenda of the free search.
    /// * `oracles` - The agenda of the oracle constrained search.
    /// * `attribution` - Where the per state losses and active states are accumulated.
    ///
    /// # Returns
    /// The objective value of this instance.
    ///
    /// # Errors
    /// `AgendaMismatch` if the agendas don't have the same amount of steps.
    fn margin(
        &mut self,
        arena: &StateArena,
        candidates: &Agenda,
        oracles: &Agenda,
        attribution: &mut Attribution,
    ) -> Result<f64>;
}

fn check_lengths(candidates: &Agenda, oracles: &Agenda) -> Result<()> {
    if candidates.len() != oracles.len() {
        return Err(ParseErr::AgendaMismatch {
            candidates: candidates.len(),
            oracles: oracles.len(),
        });
    }

    Ok(())
}

/// Finds the last step past the axiom where both agendas hold a state.
fn step_back(candidates: &Agenda, oracles: &Agenda) -> Option<usize> {
    (1..candidates.len())
        .rev()
        .find(|&step| !candidates.beam(step).is_empty() && !oracles.beam(step).is_empty())
}

/// The zero loss outcome of an instance whose searches never met.
fn no_common_step(strict: bool, steps: usize) -> Result<f64> {
    if strict {
        return Err(ParseErr::NoCommonStep);
    }

    warn!(steps = steps; "candidate and oracle agendas share no step, skipping instance");
    Ok(0.0)
}

/// The point where a candidate derivation most violates the margin against an oracle one.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Violation {
    candidate: StateId,
    oracle: StateId,
    error: f64,
}

/// Walks both derivations back in lockstep looking for the largest hinge error.
///
/// The side with the later step moves back first, so states are only compared at
/// equal steps. Only points where the candidate outscores the oracle qualify.
fn max_violation(arena: &StateArena, candidate: StateId, oracle: StateId) -> Option<Violation> {
    let mut candidate = Some(candidate);
    let mut oracle = Some(oracle);
    let mut best: Option<Violation> = None;

    while let (Some(c), Some(o)) = (candidate, oracle) {
        let (cs, os) = (&arena[c], &arena[o]);

        if cs.step > os.step {
            candidate = cs.derivation;
        } else if os.step > cs.step {
            oracle = os.derivation;
        } else {
            let error = (1.0 - (os.score - cs.score)).max(0.0);
            let suffered = cs.score > os.score;

            if suffered && error > best.map_or(0.0, |v| v.error) {
                best = Some(Violation {
                    candidate: c,
                    oracle: o,
                    error,
                });
            }

            candidate = cs.derivation;
            oracle = os.derivation;
        }
    }

    best
}
