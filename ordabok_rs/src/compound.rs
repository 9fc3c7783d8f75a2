//! The compound recogniser: splits a word the database does not list into a
//! known prefix and a known suffix, so that `síamskattarkjólanna` resolves
//! through `kjólanna` with the prefix carried along.
//!
//! Two word graphs drive the split. The prefix graph lists every string
//! usable as a compound modifier, including strings that are themselves a
//! concatenation of modifiers, so a single split position covers multi-part
//! compounds. The suffix graph lists every word usable as a compound head.
//! Splits are tried longest-suffix-first and the first suffix accepted by
//! both the suffix graph and the caller's form lookup wins, which yields
//! the analysis with the fewest components.

use crate::dawg::Dawg;

pub(crate) struct Compounder {
    prefixes: Dawg,
    suffixes: Dawg,
}

impl Compounder {
    pub fn new(prefixes: Dawg, suffixes: Dawg) -> Compounder {
        Compounder { prefixes, suffixes }
    }

    /// Finds the split position for `word` (source-encoding bytes):
    /// `word[..i]` is a valid compound prefix and `word[i..]` a valid head
    /// that `is_known` confirms has entries of its own. [None] when no
    /// split works.
    pub fn split(&self, word: &[u8], is_known: impl Fn(&[u8]) -> bool) -> Option<usize> {
        // Candidates come back in ascending split position, which is
        // exactly descending suffix length.
        for i in self.prefixes.split_candidates(word) {
            let suffix = &word[i..];
            if self.suffixes.contains(suffix) && is_known(suffix) {
                return Some(i);
            }
        }
        None
    }
}
