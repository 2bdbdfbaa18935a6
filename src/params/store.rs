use std::ops::{AddAssign, SubAssign};

use ndarray::Array2;
use rayon::prelude::*;

use crate::{
    ParseErr, Result,
    symbol::{Signature, Symbol, Word},
};

/// The amount of blocks held by a `ParameterStore`.
pub const NUM_BLOCKS: usize = 16;

/// Block names in wire order.
///
/// This ordering is the serialization contract, every block visit goes through it.
pub const BLOCK_NAMES: [&str; NUM_BLOCKS] = [
    "terminal",
    "Wc",
    "Wshift",
    "Bshift",
    "Wreduce",
    "Breduce",
    "Wunary",
    "Bunary",
    "Wfinal",
    "Bfinal",
    "Widle",
    "Bidle",
    "Baxiom",
    "Wqueue",
    "Bqueue",
    "Bqueue_end",
];

/// The direction of an elementwise combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// Every trainable weight of the action scoring network, plus the amount of
/// accumulation events it has seen.
///
/// The same type stores both the model parameters and gradient deltas, which are
/// merged back with `combine`. Per-label blocks stack one `hidden` rows tall
/// sub-block per grammar label, see `offset_category`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterStore {
    hidden: usize,
    embedding: usize,
    pub count: u64,
    signature: Signature,

    pub terminal: Array2<f32>,
    pub w_class: Array2<f32>,

    pub w_shift: Array2<f32>,
    pub b_shift: Array2<f32>,

    pub w_reduce: Array2<f32>,
    pub b_reduce: Array2<f32>,

    pub w_unary: Array2<f32>,
    pub b_unary: Array2<f32>,

    pub w_final: Array2<f32>,
    pub b_final: Array2<f32>,

    pub w_idle: Array2<f32>,
    pub b_idle: Array2<f32>,

    pub b_axiom: Array2<f32>,

    pub w_queue: Array2<f32>,
    pub b_queue: Array2<f32>,
    pub b_queue_end: Array2<f32>,
}

impl ParameterStore {
    /// Creates a new, dimensionless `ParameterStore`. Call `initialize` to size it.
    ///
    /// # Arguments
    /// * `signature` - The label and terminal inventories.
    ///
    /// # Returns
    /// A new `ParameterStore` instance.
    pub fn new(signature: Signature) -> Self {
        Self::with_dims(signature, 0, 0)
    }

    /// Creates a new zeroed `ParameterStore` of the given dimensions.
    ///
    /// # Arguments
    /// * `signature` - The label and terminal inventories.
    /// * `hidden` - The size of the hidden layer.
    /// * `embedding` - The size of the terminal embeddings.
    ///
    /// # Returns
    /// A new `ParameterStore` instance.
    pub fn with_dims(signature: Signature, hidden: usize, embedding: usize) -> Self {
        let [
            terminal,
            w_class,
            w_shift,
            b_shift,
            w_reduce,
            b_reduce,
            w_unary,
            b_unary,
            w_final,
            b_final,
            w_idle,
            b_idle,
            b_axiom,
            w_queue,
            b_queue,
            b_queue_end,
        ] = block_shapes(signature, hidden, embedding).map(|shape| Array2::<f32>::zeros(shape));

        Self {
            hidden,
            embedding,
            count: 0,
            signature,
            terminal,
            w_class,
            w_shift,
            b_shift,
            w_reduce,
            b_reduce,
            w_unary,
            b_unary,
            w_final,
            b_final,
            w_idle,
            b_idle,
            b_axiom,
            w_queue,
            b_queue,
            b_queue_end,
        }
    }

    /// Zeroes out every block, sizes it for the given dimensions and resets the count.
    ///
    /// # Arguments
    /// * `hidden` - The size of the hidden layer.
    /// * `embedding` - The size of the terminal embeddings.
    pub fn initialize(&mut self, hidden: usize, embedding: usize) {
        *self = Self::with_dims(self.signature, hidden, embedding);
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn embedding(&self) -> usize {
        self.embedding
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Returns the first row of `label`'s sub-block inside the per-label blocks.
    ///
    /// # Panics
    /// If `label` is a reserved symbol or lies outside the store's signature.
    pub fn offset_category(&self, label: Symbol) -> usize {
        match label.category() {
            Some(category) if category < self.signature.labels => category * self.hidden,
            _ => panic!(
                "{label:?} has no category in a store of {} labels",
                self.signature.labels
            ),
        }
    }

    /// Returns the classification row that scores `label`.
    ///
    /// # Panics
    /// If `label` is `Epsilon` or lies outside the store's signature.
    pub fn offset_classification(&self, label: Symbol) -> usize {
        match label.classification() {
            Some(row) if row < self.w_class.nrows() => row,
            _ => panic!(
                "{label:?} has no classification row in a store of {} labels",
                self.signature.labels
            ),
        }
    }

    /// Returns the embedding table column of `word`, unknown ids map to `Word::UNK`.
    pub fn terminal_column(&self, word: Word) -> usize {
        let column = word.0 as usize;

        if column < self.terminal.ncols() {
            column
        } else {
            Word::UNK.0 as usize
        }
    }

    /// Returns every block paired with its name, in wire order.
    pub fn blocks(&self) -> [(&'static str, &Array2<f32>); NUM_BLOCKS] {
        let blocks = [
            &self.terminal,
            &self.w_class,
            &self.w_shift,
            &self.b_shift,
            &self.w_reduce,
            &self.b_reduce,
            &self.w_unary,
            &self.b_unary,
            &self.w_final,
            &self.b_final,
            &self.w_idle,
            &self.b_idle,
            &self.b_axiom,
            &self.w_queue,
            &self.b_queue,
            &self.b_queue_end,
        ];

        let mut names = BLOCK_NAMES.into_iter();
        blocks.map(|block| (names.next().unwrap_or_default(), block))
    }

    /// Returns every block mutably paired with its name, in wire order.
    pub fn blocks_mut(&mut self) -> [(&'static str, &mut Array2<f32>); NUM_BLOCKS] {
        let blocks = [
            &mut self.terminal,
            &mut self.w_class,
            &mut self.w_shift,
            &mut self.b_shift,
            &mut self.w_reduce,
            &mut self.b_reduce,
            &mut self.w_unary,
            &mut self.b_unary,
            &mut self.w_final,
            &mut self.b_final,
            &mut self.w_idle,
            &mut self.b_idle,
            &mut self.b_axiom,
            &mut self.w_queue,
            &mut self.b_queue,
            &mut self.b_queue_end,
        ];

        let mut names = BLOCK_NAMES.into_iter();
        blocks.map(|block| (names.next().unwrap_or_default(), block))
    }

    /// Adds or subtracts every block of `other` onto this store.
    ///
    /// Shapes are checked for every block before anything is written, so a failed
    /// combination leaves the receiver untouched.
    ///
    /// # Arguments
    /// * `other` - A store with the exact same shapes.
    /// * `sign` - Whether to add or subtract.
    ///
    /// # Returns
    /// A `ShapeMismatch` error naming the first block whose shapes differ.
    pub fn combine(&mut self, other: &Self, sign: Sign) -> Result<()> {
        let dims = (self.hidden, self.embedding);
        let other_dims = (other.hidden, other.embedding);

        if dims != other_dims {
            return Err(ParseErr::ShapeMismatch {
                block: "dimensions",
                got: other_dims,
                expected: dims,
            });
        }

        for ((name, a), (_, b)) in self.blocks().into_iter().zip(other.blocks()) {
            if a.dim() != b.dim() {
                return Err(ParseErr::ShapeMismatch {
                    block: name,
                    got: b.dim(),
                    expected: a.dim(),
                });
            }
        }

        self.blocks_mut()
            .into_par_iter()
            .zip(other.blocks())
            .for_each(|((_, a), (_, b))| match sign {
                Sign::Plus => *a += b,
                Sign::Minus => *a -= b,
            });

        self.count = match sign {
            Sign::Plus => self.count + other.count,
            Sign::Minus => self.count.saturating_sub(other.count),
        };

        Ok(())
    }
}

impl AddAssign<&ParameterStore> for ParameterStore {
    /// # Panics
    /// If the stores' shapes differ.
    fn add_assign(&mut self, rhs: &ParameterStore) {
        if let Err(e) = self.combine(rhs, Sign::Plus) {
            panic!("{e}");
        }
    }
}

impl SubAssign<&ParameterStore> for ParameterStore {
    /// # Panics
    /// If the stores' shapes differ.
    fn sub_assign(&mut self, rhs: &ParameterStore) {
        if let Err(e) = self.combine(rhs, Sign::Minus) {
            panic!("{e}");
        }
    }
}

/// Computes the shape of every block, in wire order.
pub(crate) fn block_shapes(
    signature: Signature,
    hidden: usize,
    embedding: usize,
) -> [(usize, usize); NUM_BLOCKS] {
    let categories = signature.labels * hidden;

    [
        (embedding, signature.terminals),
        (signature.classifications(), hidden),
        (categories, hidden + embedding + hidden),
        (categories, 1),
        (categories, hidden * 3),
        (categories, 1),
        (categories, hidden * 2),
        (categories, 1),
        (hidden, hidden),
        (hidden, 1),
        (hidden, hidden),
        (hidden, 1),
        (hidden, 1),
        (hidden, hidden + embedding),
        (hidden, 1),
        (hidden, 1),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGNATURE: Signature = Signature {
        labels: 3,
        terminals: 5,
    };

    fn filled(value: f32) -> ParameterStore {
        let mut store = ParameterStore::with_dims(SIGNATURE, 4, 2);
        store.count = 1;
        for (_, block) in store.blocks_mut() {
            block.fill(value);
        }
        store
    }

    #[test]
    fn initialize_sizes_every_block() {
        let mut store = ParameterStore::new(SIGNATURE);
        store.initialize(4, 2);

        assert_eq!(store.terminal.dim(), (2, 5));
        assert_eq!(store.w_class.dim(), (5, 4));
        assert_eq!(store.w_shift.dim(), (12, 10));
        assert_eq!(store.b_shift.dim(), (12, 1));
        assert_eq!(store.w_reduce.dim(), (12, 12));
        assert_eq!(store.w_unary.dim(), (12, 8));
        assert_eq!(store.w_final.dim(), (4, 4));
        assert_eq!(store.b_axiom.dim(), (4, 1));
        assert_eq!(store.w_queue.dim(), (4, 6));

        for (name, block) in store.blocks() {
            assert!(block.iter().all(|&x| x == 0.0), "{name} is not zeroed");
        }
    }

    #[test]
    fn initialize_is_idempotent_and_resets_the_count() {
        let mut store = filled(3.0);
        store.count = 42;

        store.initialize(4, 2);
        let once = store.clone();
        store.initialize(4, 2);

        assert_eq!(store, once);
        assert_eq!(store.count, 0);
    }

    #[test]
    fn offsets_follow_the_label_index() {
        let store = ParameterStore::with_dims(SIGNATURE, 4, 2);

        assert_eq!(store.offset_category(Symbol::Label(0)), 0);
        assert_eq!(store.offset_category(Symbol::Label(2)), 8);
        assert_eq!(store.offset_classification(Symbol::Final), 0);
        assert_eq!(store.offset_classification(Symbol::Label(2)), 4);
    }

    #[test]
    #[should_panic]
    fn reserved_symbols_have_no_category() {
        let store = ParameterStore::with_dims(SIGNATURE, 4, 2);
        store.offset_category(Symbol::Idle);
    }

    #[test]
    #[should_panic]
    fn labels_beyond_the_signature_are_fatal() {
        let store = ParameterStore::with_dims(SIGNATURE, 4, 2);
        store.offset_classification(Symbol::Label(3));
    }

    #[test]
    fn unknown_words_fall_back_to_unk() {
        let store = ParameterStore::with_dims(SIGNATURE, 4, 2);

        assert_eq!(store.terminal_column(Word(4)), 4);
        assert_eq!(store.terminal_column(Word(5)), 0);
    }

    #[test]
    fn combine_adds_and_subtracts_every_block() {
        let mut a = filled(1.0);
        let b = filled(0.5);

        a += &b;
        assert!(a.w_reduce.iter().all(|&x| x == 1.5));
        assert_eq!(a.count, 2);

        a -= &b;
        assert_eq!(a, filled(1.0));
    }

    #[test]
    fn combine_pairs_blocks_by_position() {
        let mut a = filled(0.0);
        let mut b = filled(0.0);
        for (i, (_, block)) in b.blocks_mut().into_iter().enumerate() {
            block.fill(i as f32);
        }

        a.combine(&b, Sign::Plus).unwrap();
        a.combine(&b, Sign::Plus).unwrap();
        a.combine(&b, Sign::Minus).unwrap();

        for (i, (name, block)) in a.blocks().into_iter().enumerate() {
            assert!(block.iter().all(|&x| x == i as f32), "{name} got another block");
        }
        assert_eq!(a.count, 2);
    }

    #[test]
    fn combine_rejects_mismatched_shapes_without_writing() {
        let mut a = filled(1.0);
        let b = ParameterStore::with_dims(Signature::new(4, 5), 4, 2);

        let err = a.combine(&b, Sign::Plus).unwrap_err();
        assert!(matches!(err, ParseErr::ShapeMismatch { block: "Wc", .. }));
        assert_eq!(a, filled(1.0));
    }

    #[test]
    fn combine_rejects_mismatched_dimensions() {
        let mut a = filled(1.0);
        let b = ParameterStore::with_dims(SIGNATURE, 3, 2);

        let err = a.combine(&b, Sign::Minus).unwrap_err();
        assert!(matches!(
            err,
            ParseErr::ShapeMismatch {
                block: "dimensions",
                ..
            }
        ));
    }

    #[test]
    #[should_panic]
    fn add_assign_fails_fast_on_mismatch() {
        let mut a = filled(1.0);
        a += &ParameterStore::with_dims(SIGNATURE, 3, 3);
    }
}
