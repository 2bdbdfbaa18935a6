mod activation;
mod agenda;
mod search;
mod state;
mod transition;

pub use activation::ActFn;
pub use agenda::Agenda;
pub use search::Action;
pub use state::{Operation, Span, State, StateArena, StateId};
pub use transition::Parser;
