use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::parser::Action;

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, ParseErr>;

/// The crate's error type.
#[derive(Debug)]
pub enum ParseErr {
    /// The candidate and oracle searches produced agendas of different length.
    AgendaMismatch { candidates: usize, oracles: usize },
    /// No step holds both a candidate and an oracle state (strict mode only).
    NoCommonStep,
    /// Two parameter blocks that should share a shape don't.
    ShapeMismatch {
        block: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    },
    /// The serialized parameter stream is truncated or unreadable.
    Deserialize(io::Error),
    /// Tried to parse a sentence with no words.
    EmptyInput,
    /// An oracle action whose precondition doesn't hold on the current state.
    InvalidAction { step: usize, action: Action },
}

impl Display for ParseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErr::AgendaMismatch { candidates, oracles } => write!(
                f,
                "invalid candidate and oracle pair, agendas have {candidates} and {oracles} steps"
            ),
            ParseErr::NoCommonStep => {
                f.write_str("candidate and oracle agendas share no non-empty step")
            }
            ParseErr::ShapeMismatch {
                block,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {block}: got {}x{}, expected {}x{}",
                got.0, got.1, expected.0, expected.1
            ),
            ParseErr::Deserialize(e) => write!(f, "failed to read parameters: {e}"),
            ParseErr::EmptyInput => f.write_str("the input sentence is empty"),
            ParseErr::InvalidAction { step, action } => {
                write!(f, "oracle action {action:?} is not applicable at step {step}")
            }
        }
    }
}

impl Error for ParseErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ParseErr::Deserialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ParseErr {
    fn from(e: io::Error) -> Self {
        ParseErr::Deserialize(e)
    }
}
