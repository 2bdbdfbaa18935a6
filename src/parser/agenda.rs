use super::state::StateId;

/// The frontier of one search: the beam of surviving states at every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agenda {
    beams: Vec<Vec<StateId>>,
}

impl Agenda {
    /// Creates a new, empty `Agenda`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties every beam and resizes the agenda to `steps` beams.
    pub fn reset(&mut self, steps: usize) {
        self.beams.iter_mut().for_each(Vec::clear);
        self.beams.resize_with(steps, Vec::new);
    }

    /// The amount of steps, including trailing empty beams.
    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Appends `state` to the beam of `step`, growing the agenda if needed.
    pub fn push(&mut self, step: usize, state: StateId) {
        if step >= self.beams.len() {
            self.beams.resize_with(step + 1, Vec::new);
        }

        self.beams[step].push(state);
    }

    /// Returns the beam of `step`, empty if the agenda is shorter.
    pub fn beam(&self, step: usize) -> &[StateId] {
        self.beams.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns the beam of the last step.
    pub fn last(&self) -> &[StateId] {
        self.beams.last().map(Vec::as_slice).unwrap_or_default()
    }

    pub(crate) fn beam_mut(&mut self, step: usize) -> Option<&mut Vec<StateId>> {
        self.beams.get_mut(step)
    }

    /// Iterates every beam in step order.
    pub fn iter(&self) -> impl Iterator<Item = &[StateId]> {
        self.beams.iter().map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::state::{Operation, Span, State, StateArena};
    use crate::symbol::Symbol;
    use ndarray::Array1;

    fn ids(n: usize) -> Vec<StateId> {
        let mut arena = StateArena::new();
        (0..n)
            .map(|_| {
                arena.allocate(State {
                    step: 0,
                    next: 0,
                    unary: 0,
                    operation: Operation::Axiom,
                    label: Symbol::Epsilon,
                    head: None,
                    span: Span::default(),
                    stack: None,
                    derivation: None,
                    reduced: None,
                    layer: Array1::zeros(1),
                    score: 0.0,
                })
            })
            .collect()
    }

    #[test]
    fn push_grows_the_agenda() {
        let ids = ids(2);
        let mut agenda = Agenda::new();

        agenda.push(2, ids[0]);
        agenda.push(2, ids[1]);

        assert_eq!(agenda.len(), 3);
        assert!(agenda.beam(0).is_empty());
        assert_eq!(agenda.beam(2), ids.as_slice());
        assert_eq!(agenda.last(), ids.as_slice());
        assert!(agenda.beam(10).is_empty());
    }

    #[test]
    fn reset_keeps_the_requested_length_only() {
        let ids = ids(1);
        let mut agenda = Agenda::new();
        agenda.push(4, ids[0]);

        agenda.reset(2);
        assert_eq!(agenda.len(), 2);
        assert!(agenda.iter().all(|beam| beam.is_empty()));
    }
}
