use serde::{Deserialize, Serialize};

/// A syntactic label as seen by the scoring network.
///
/// Grammar labels are enumerated upstream and identified by a dense index, the
/// remaining variants are the reserved symbols of the transition system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Symbol {
    Epsilon,
    Final,
    Idle,
    Label(u32),
}

impl Symbol {
    /// Returns the row of the classification matrix that scores this symbol.
    ///
    /// # Returns
    /// `None` for `Epsilon`, which is never scored.
    pub fn classification(self) -> Option<usize> {
        match self {
            Symbol::Epsilon => None,
            Symbol::Final => Some(0),
            Symbol::Idle => Some(1),
            Symbol::Label(i) => Some(2 + i as usize),
        }
    }

    /// Returns the index of this symbol's category sub-block.
    ///
    /// # Returns
    /// `None` for every reserved symbol, only grammar labels own a category.
    pub fn category(self) -> Option<usize> {
        match self {
            Symbol::Label(i) => Some(i as usize),
            _ => None,
        }
    }
}

/// A terminal (lexical item) identifier, the column of the embedding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Word(pub u32);

impl Word {
    /// The reserved unknown word, every out of vocabulary id maps to it.
    pub const UNK: Word = Word(0);
}

/// The sizes of the label and terminal inventories a parameter store is built for.
///
/// Together with the `(hidden, embedding)` dimensions they fix every block shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub labels: usize,
    pub terminals: usize,
}

impl Signature {
    /// Creates a new `Signature`.
    ///
    /// # Arguments
    /// * `labels` - The amount of grammar labels.
    /// * `terminals` - The size of the terminal vocabulary, including `Word::UNK`.
    ///
    /// # Returns
    /// A new `Signature` instance.
    pub fn new(labels: usize, terminals: usize) -> Self {
        Self { labels, terminals }
    }

    /// The amount of rows of the classification matrix.
    pub fn classifications(&self) -> usize {
        self.labels + 2
    }
}

/// The labels the free search tries for each labelled action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub shift: Vec<Symbol>,
    pub reduce: Vec<Symbol>,
    pub unary: Vec<Symbol>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_symbols_lead_the_classification_rows() {
        assert_eq!(Symbol::Final.classification(), Some(0));
        assert_eq!(Symbol::Idle.classification(), Some(1));
        assert_eq!(Symbol::Label(0).classification(), Some(2));
        assert_eq!(Symbol::Label(7).classification(), Some(9));
        assert_eq!(Symbol::Epsilon.classification(), None);
    }

    #[test]
    fn only_grammar_labels_have_a_category() {
        assert_eq!(Symbol::Label(3).category(), Some(3));
        assert_eq!(Symbol::Final.category(), None);
        assert_eq!(Symbol::Idle.category(), None);
        assert_eq!(Symbol::Epsilon.category(), None);
    }

    #[test]
    fn signature_reserves_two_classification_rows() {
        assert_eq!(Signature::new(5, 10).classifications(), 7);
    }
}
