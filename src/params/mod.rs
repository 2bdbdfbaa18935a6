mod codec;
mod store;

pub use store::{BLOCK_NAMES, NUM_BLOCKS, ParameterStore, Sign};
