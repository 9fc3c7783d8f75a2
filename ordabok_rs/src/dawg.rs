//! Reader for the two compound-analysis word graphs: a prefix graph and a
//! suffix graph, each memory-mapped from its own file.
//!
//! A graph file is a 16-byte header (`"DAWG"`, format version, node count,
//! root index) followed by one 32-bit word per node. A node is one edge of
//! a sibling list: the low eight bits hold the letter, bit 31 marks the end
//! of a word, bit 30 the end of the sibling list, and the bits in between
//! hold the index of the first child edge (zero when the edge has no
//! children; node zero is a reserved filler). Sibling lists are contiguous
//! runs of nodes.

use std::path::Path;

use memmap2::MmapOptions;

use crate::error::{Error, Result};
use crate::image::ByteImage;

/// Leading magic of a word-graph file.
pub const DAWG_MAGIC: &[u8; 4] = b"DAWG";

/// Format version this crate reads.
pub const DAWG_VERSION: u32 = 1;

const HEADER_LEN: u32 = 16;

const END_OF_WORD: u32 = 0x8000_0000;
const END_OF_LIST: u32 = 0x4000_0000;
const CHILD_SHIFT: u32 = 8;
const CHILD_MASK: u32 = 0x003F_FFFF;
const LETTER_MASK: u32 = 0xFF;

/// A read-only directed acyclic word graph.
///
/// Supports membership tests and, for the compound analyser, enumeration of
/// the word boundaries inside a longer string (every prefix length that
/// forms a complete word). Words are byte strings in the image's source
/// encoding; the graph carries raw bytes, so no alphabet table is involved.
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// use ordabok_rs::Dawg;
///
/// let graph = Dawg::open(Path::new("prefixes.dawg")).unwrap();
/// if graph.contains("hunda".as_bytes()) {
///     // usable as a compound modifier
/// }
/// ```
pub struct Dawg {
    image: ByteImage,
    node_count: u32,
    root: u32,
}

impl std::fmt::Debug for Dawg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dawg")
            .field("node_count", &self.node_count)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Dawg {
    /// Memory-maps and validates the graph at `path`.
    pub fn open(path: &Path) -> Result<Dawg> {
        let file = std::fs::File::open(path).map_err(|source| Error::DawgOpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let map = unsafe { MmapOptions::new().map_copy_read_only(&file) }.map_err(|source| {
            Error::DawgOpenFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Dawg::validate(ByteImage::from_mmap(map))
    }

    /// Wraps an owned buffer holding a graph file's bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Dawg> {
        Dawg::validate(ByteImage::from_bytes(bytes))
    }

    fn validate(image: ByteImage) -> Result<Dawg> {
        if (image.len() as u64) < u64::from(HEADER_LEN) {
            return Err(Error::DawgTooSmall);
        }
        if image.bytes(0, 4) != Some(&DAWG_MAGIC[..]) || image.u32le(4) != Some(DAWG_VERSION) {
            return Err(Error::DawgBadSignature);
        }
        let node_count = image.u32le(8).ok_or(Error::DawgTooSmall)?;
        let root = image.u32le(12).ok_or(Error::DawgTooSmall)?;
        if u64::from(HEADER_LEN) + u64::from(node_count) * 4 > image.len() as u64 {
            return Err(Error::DawgTooSmall);
        }
        if root >= node_count {
            return Err(Error::DawgBadSignature);
        }
        Ok(Dawg {
            image,
            node_count,
            root,
        })
    }

    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    #[inline(always)]
    fn node(&self, index: u32) -> Option<u32> {
        if index >= self.node_count {
            return None;
        }
        self.image.u32le(HEADER_LEN + index * 4)
    }

    /// Scans the sibling list starting at `index` for `letter`.
    fn find_sibling(&self, mut index: u32, letter: u8) -> Option<u32> {
        loop {
            let node = self.node(index)?;
            if (node & LETTER_MASK) as u8 == letter {
                return Some(node);
            }
            if node & END_OF_LIST != 0 {
                return None;
            }
            index += 1;
        }
    }

    /// True if `word` is a complete word of the graph.
    pub fn contains(&self, word: &[u8]) -> bool {
        let mut boundaries = self.word_boundaries(word);
        boundaries.pop() == Some(word.len())
    }

    /// Every prefix length `i` such that `word[..i]` is a complete word, in
    /// ascending order. The walk stops at the first letter that has no edge.
    pub fn word_boundaries(&self, word: &[u8]) -> Vec<usize> {
        let mut out = Vec::new();
        if word.is_empty() {
            return out;
        }
        let mut list = self.root;
        for (i, &letter) in word.iter().enumerate() {
            let Some(node) = self.find_sibling(list, letter) else {
                break;
            };
            if node & END_OF_WORD != 0 {
                out.push(i + 1);
            }
            let child = (node >> CHILD_SHIFT) & CHILD_MASK;
            if child == 0 || i + 1 == word.len() {
                break;
            }
            list = child;
        }
        out
    }

    /// Split positions usable by the compound analyser: word boundaries
    /// that leave a suffix of at least two bytes. A single trailing letter
    /// is never a compound head, even when it is a word of its own.
    pub fn split_candidates(&self, word: &[u8]) -> Vec<usize> {
        let mut boundaries = self.word_boundaries(word);
        boundaries.retain(|&i| i + 1 < word.len());
        boundaries
    }
}
