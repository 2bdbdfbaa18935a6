use ndarray::{Array1, Array2, s};

use super::{
    ActFn, Agenda,
    state::{Operation, Span, State, StateArena, StateId},
};
use crate::{
    ParseErr, Result,
    config::ParserConfig,
    params::ParameterStore,
    symbol::{Symbol, Word},
};

/// The transition engine of one search.
///
/// Every operation reads an existing state and the parameters, builds exactly one
/// successor and appends it to the agenda at the successor's step. Existing states
/// are never modified. The arena is passed in so that the free and the oracle
/// search of an instance share it.
#[derive(Debug, Clone)]
pub struct Parser {
    pub(super) config: ParserConfig,
    pub(super) agenda: Agenda,
    pub(super) input: Vec<Word>,
    queue: Array2<f32>,
}

impl Parser {
    /// Creates a new `Parser`.
    ///
    /// # Arguments
    /// * `config` - The search settings.
    ///
    /// # Returns
    /// A new `Parser` instance.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            agenda: Agenda::new(),
            input: Vec::new(),
            queue: Array2::zeros((0, 0)),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn agenda(&self) -> &Agenda {
        &self.agenda
    }

    pub fn input(&self) -> &[Word] {
        &self.input
    }

    /// The input representations, column `i` summarizes the words from `i` onwards.
    pub fn queue(&self) -> &Array2<f32> {
        &self.queue
    }

    /// Starts a new parse of `input`.
    ///
    /// Sizes the agenda for `input`, precomputes the queue representations with a
    /// backward recurrence over the words and pushes the single step 0 state.
    ///
    /// # Returns
    /// The axiom state, or `EmptyInput` if there are no words to parse.
    pub fn axiom(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        input: &[Word],
    ) -> Result<StateId> {
        if input.is_empty() {
            return Err(ParseErr::EmptyInput);
        }

        let act_fn = self.config.activation;
        let hidden = theta.hidden();
        let words = input.len();

        self.input = input.to_vec();
        self.agenda.reset(self.config.steps(words) + 1);

        self.queue = Array2::zeros((hidden, words + 1));
        self.queue
            .column_mut(words)
            .assign(&activate(act_fn, theta.b_queue_end.column(0).to_owned()));

        for i in (0..words).rev() {
            let terminal = theta.terminal.column(theta.terminal_column(input[i]));

            let mut z = theta.b_queue.column(0).to_owned();
            z += &theta.w_queue.slice(s![.., ..hidden]).dot(&self.queue.column(i + 1));
            z += &theta.w_queue.slice(s![.., hidden..]).dot(&terminal);

            let z = activate(act_fn, z);
            self.queue.column_mut(i).assign(&z);
        }

        let state = State {
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
            layer: activate(act_fn, theta.b_axiom.column(0).to_owned()),
            score: 0.0,
        };

        Ok(self.push(arena, state))
    }

    /// Consumes the next word as a new stack item labelled `label`.
    pub fn shift(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
        head: Word,
        label: Symbol,
    ) -> StateId {
        let (hidden, embedding) = (theta.hidden(), theta.embedding());
        let prev = &arena[state];
        let next = prev.next + 1;

        let offset = theta.offset_category(label);
        let w = theta.w_shift.slice(s![offset..offset + hidden, ..]);
        let terminal = theta.terminal.column(theta.terminal_column(head));

        let mut z = theta.b_shift.slice(s![offset..offset + hidden, 0]).to_owned();
        z += &w.slice(s![.., ..hidden]).dot(&prev.layer);
        z += &w.slice(s![.., hidden..hidden + embedding]).dot(&terminal);
        z += &w.slice(s![.., hidden + embedding..]).dot(&self.queue.column(next));
        let layer = activate(self.config.activation, z);

        let new = State {
            step: prev.step + 1,
            next,
            unary: prev.unary,
            operation: Operation::Shift,
            label,
            head: Some(head),
            span: Span::new(prev.next, next),
            stack: Some(state),
            derivation: Some(state),
            reduced: None,
            score: prev.score + classify(theta, label, &layer),
            layer,
        };

        self.push(arena, new)
    }

    /// Pops the two topmost stack items and pushes their combination labelled `label`.
    ///
    /// # Panics
    /// If `state` doesn't have two items on its stack.
    pub fn reduce(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
        label: Symbol,
    ) -> StateId {
        let hidden = theta.hidden();
        let prev = &arena[state];

        let Some((reduced_id, stack)) = prev
            .stack
            .and_then(|reduced| Some((reduced, arena[reduced].stack?)))
        else {
            panic!("REDUCE at step {} needs two stack items", prev.step);
        };
        let reduced = &arena[reduced_id];

        let offset = theta.offset_category(label);
        let w = theta.w_reduce.slice(s![offset..offset + hidden, ..]);

        let mut z = theta.b_reduce.slice(s![offset..offset + hidden, 0]).to_owned();
        z += &w.slice(s![.., ..hidden]).dot(&prev.layer);
        z += &w.slice(s![.., hidden..hidden * 2]).dot(&reduced.layer);
        z += &w.slice(s![.., hidden * 2..]).dot(&self.queue.column(prev.next));
        let layer = activate(self.config.activation, z);

        let new = State {
            step: prev.step + 1,
            next: prev.next,
            unary: prev.unary,
            operation: Operation::Reduce,
            label,
            head: None,
            span: Span::new(reduced.span.first, prev.span.last),
            stack: Some(stack),
            derivation: Some(state),
            reduced: Some(reduced_id),
            score: prev.score + classify(theta, label, &layer),
            layer,
        };

        self.push(arena, new)
    }

    /// Relabels the topmost stack item, extending its chain of unaries.
    pub fn unary(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
        label: Symbol,
    ) -> StateId {
        let hidden = theta.hidden();
        let prev = &arena[state];

        let offset = theta.offset_category(label);
        let w = theta.w_unary.slice(s![offset..offset + hidden, ..]);

        let mut z = theta.b_unary.slice(s![offset..offset + hidden, 0]).to_owned();
        z += &w.slice(s![.., ..hidden]).dot(&prev.layer);
        z += &w.slice(s![.., hidden..]).dot(&self.queue.column(prev.next));
        let layer = activate(self.config.activation, z);

        let new = State {
            step: prev.step + 1,
            next: prev.next,
            unary: prev.unary + 1,
            operation: Operation::Unary(prev.operation.closure() + 1),
            label,
            head: None,
            span: prev.span,
            stack: prev.stack,
            derivation: Some(state),
            reduced: None,
            score: prev.score + classify(theta, label, &layer),
            layer,
        };

        self.push(arena, new)
    }

    /// Closes a complete parse.
    pub fn finish(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
    ) -> StateId {
        self.close(arena, theta, state, Operation::Final, Symbol::Final)
    }

    /// Marks time after a parse is complete, keeping its steps aligned with longer parses.
    pub fn idle(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
    ) -> StateId {
        self.close(arena, theta, state, Operation::Idle, Symbol::Idle)
    }

    fn close(
        &mut self,
        arena: &mut StateArena,
        theta: &ParameterStore,
        state: StateId,
        operation: Operation,
        label: Symbol,
    ) -> StateId {
        let prev = &arena[state];

        let (w, b) = match operation {
            Operation::Final => (&theta.w_final, &theta.b_final),
            _ => (&theta.w_idle, &theta.b_idle),
        };

        let mut z = b.column(0).to_owned();
        z += &w.dot(&prev.layer);
        let layer = activate(self.config.activation, z);

        let new = State {
            step: prev.step + 1,
            next: prev.next,
            unary: prev.unary,
            operation,
            label,
            head: None,
            span: prev.span,
            stack: prev.stack,
            derivation: Some(state),
            reduced: None,
            score: prev.score + classify(theta, label, &layer),
            layer,
        };

        self.push(arena, new)
    }

    fn push(&mut self, arena: &mut StateArena, state: State) -> StateId {
        let step = state.step;
        let id = arena.allocate(state);
        self.agenda.push(step, id);
        id
    }
}

fn activate(act_fn: ActFn, mut z: Array1<f32>) -> Array1<f32> {
    z.mapv_inplace(|x| act_fn.f(x));
    z
}

/// Scores `layer` with the classification row of `label`.
fn classify(theta: &ParameterStore, label: Symbol, layer: &Array1<f32>) -> f64 {
    let row = theta.w_class.row(theta.offset_classification(label));
    row.dot(layer) as f64
}
