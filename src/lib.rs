pub mod config;
pub mod error;
pub mod learner;
pub mod objective;
pub mod params;
pub mod parser;
pub mod symbol;

pub use error::{ParseErr, Result};
