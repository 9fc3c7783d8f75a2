//! The form index: a binary-searchable radix trie over every surface form
//! in the database, stored directly in the image.
//!
//! A node starts with a 32-bit header. Bit 31 marks a single-character node
//! whose letter is inlined in the header as a 7-bit alphabet index (stored
//! plus one, so zero never occurs); bit 30 marks a childless node. The low
//! 23 bits hold the value associated with ending a word at this node, or
//! [NO_VALUE] for interior nodes. Single-character nodes with children are
//! followed by a child count and that many child offsets; multi-character
//! nodes additionally end with a zero-terminated fragment holding the run
//! of bytes the node matches. A childless single-character node is just its
//! header.
//!
//! Values are byte offsets into the mappings section. Sibling nodes are
//! ordered by the numeric value of their first source-encoding byte, which
//! is what the child binary search compares; in a radix trie the first
//! bytes of siblings are distinct, so any remaining fragment mismatch is a
//! definitive miss rather than a reason to keep probing.

use crate::image::ByteImage;
use crate::tables::Alphabet;

const NODE_SINGLE: u32 = 0x8000_0000;
const NODE_CHILDLESS: u32 = 0x4000_0000;
const LETTER_SHIFT: u32 = 23;
const LETTER_MASK: u32 = 0x7F;
const VALUE_MASK: u32 = 0x007F_FFFF;

/// Value field of a node that does not end a word.
pub(crate) const NO_VALUE: u32 = 0x007F_FFFF;

/// Looks up `word` (source-encoding bytes) starting from the root node at
/// `root`. Returns the mappings-section offset stored at the terminal node,
/// or [None] for unknown words, words ending inside a fragment, and any
/// structurally damaged node on the path.
pub(crate) fn search(image: &ByteImage, alpha: &Alphabet, root: u32, word: &[u8]) -> Option<u32> {
    let mut node = root;
    let mut pos = 0usize;
    loop {
        if pos == word.len() {
            let value = image.u32le(node)? & VALUE_MASK;
            return (value != NO_VALUE).then_some(value);
        }
        let (first_child, count) = children(image, node)?;
        let target = word[pos];

        // Binary search the children on their first byte.
        let mut lo = 0u32;
        let mut hi = count;
        let mut found = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let child = image.u32le(first_child.checked_add(mid.checked_mul(4)?)?)?;
            let first = first_byte(image, alpha, child)?;
            if first == target {
                found = Some(child);
                break;
            } else if first < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let child = found?;
        let run = match_run(image, alpha, child, &word[pos..])?;
        if run == 0 {
            // An empty fragment only occurs in damaged data; following it
            // would stop the walk from making progress.
            return None;
        }
        pos += run;
        node = child;
    }
}

/// Offset of the first child pointer and the child count of `node`.
/// Childless single-character nodes carry neither.
fn children(image: &ByteImage, node: u32) -> Option<(u32, u32)> {
    let header = image.u32le(node)?;
    if header & (NODE_SINGLE | NODE_CHILDLESS) == NODE_SINGLE | NODE_CHILDLESS {
        return Some((0, 0));
    }
    let count = image.u32le(node + 4)?;
    Some((node + 8, count))
}

/// The first byte matched by `node`: the inlined letter of a
/// single-character node, or the first fragment byte of a multi-character
/// node.
fn first_byte(image: &ByteImage, alpha: &Alphabet, node: u32) -> Option<u8> {
    let header = image.u32le(node)?;
    if header & NODE_SINGLE != 0 {
        let index = ((header >> LETTER_SHIFT) & LETTER_MASK) as u8;
        alpha.byte(index.checked_sub(1)?)
    } else {
        image.u8(fragment_offset(image, node)?)
    }
}

/// Offset of a multi-character node's fragment, past the child pointers.
/// Checked arithmetic: a damaged child count must read as out-of-range,
/// not wrap around.
fn fragment_offset(image: &ByteImage, node: u32) -> Option<u32> {
    let count = image.u32le(node + 4)?;
    node.checked_add(8)?.checked_add(count.checked_mul(4)?)
}

/// Number of bytes of `rest` consumed by matching `node`, or [None] if the
/// node does not match there (including the case of `rest` ending inside
/// the node's fragment).
fn match_run(image: &ByteImage, alpha: &Alphabet, node: u32, rest: &[u8]) -> Option<usize> {
    let header = image.u32le(node)?;
    if header & NODE_SINGLE != 0 {
        let index = ((header >> LETTER_SHIFT) & LETTER_MASK) as u8;
        let letter = alpha.byte(index.checked_sub(1)?)?;
        (rest.first() == Some(&letter)).then_some(1)
    } else {
        let fragment = image.cstr(fragment_offset(image, node)?)?;
        (rest.len() >= fragment.len() && &rest[..fragment.len()] == fragment)
            .then_some(fragment.len())
    }
}
