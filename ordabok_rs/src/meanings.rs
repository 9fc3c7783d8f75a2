//! The packed-meaning walker: expands the per-form record sequence in the
//! mappings section into `(lemma_id, meaning_index, ksnid_index)` triples.
//!
//! A record is one or two 32-bit words. Bit 31 of a word is the sequence
//! terminator and is set on the final word of the final record. Bit 30
//! marks the *compact* single-word shape, which reuses the lemma id of the
//! preceding record and packs an 11-bit meaning index above a 19-bit ksnid
//! index. With bit 30 clear, bit 29 marks the *full* single-word shape
//! (20-bit lemma id, 8-bit meaning index, and bit 28 choosing between the
//! two most common ksnid records); with both clear the record is a *double*:
//! the first word carries the lemma id and the second word the same
//! meaning/ksnid split as the compact shape.
//!
//! A compact record at the start of a sequence has nothing to inherit a
//! lemma id from; that only happens in damaged data, and the whole sequence
//! is dropped rather than guessed at.

use tracing::warn;

use crate::image::ByteImage;

const LAST: u32 = 0x8000_0000;
const COMPACT: u32 = 0x4000_0000;
const FULL: u32 = 0x2000_0000;
const KSNID_ALT: u32 = 0x1000_0000;

const LEMMA_MASK: u32 = 0x000F_FFFF;
const MEANING_MASK: u32 = 0x7FF;
const MEANING_SHIFT: u32 = 19;
const FULL_MEANING_MASK: u32 = 0xFF;
const FULL_MEANING_SHIFT: u32 = 20;
const KSNID_MASK: u32 = 0x0007_FFFF;

/// Ceiling on records decoded from one sequence. Real sequences hold a
/// handful of records; a run this long means the terminator bit was lost.
const MAX_SEQUENCE: usize = 1024;

/// One decoded packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PackedMeaning {
    pub lemma_id: u32,
    pub meaning_index: u32,
    pub ksnid_index: u32,
}

/// Decodes the record sequence starting `offset` bytes into the mappings
/// section at `base`. Returns the records in image order, or an empty list
/// when the sequence is damaged (compact-first, missing terminator, or a
/// read past the end of the image).
pub(crate) fn walk(image: &ByteImage, base: u32, offset: u32) -> Vec<PackedMeaning> {
    let mut cursor = match base.checked_add(offset) {
        Some(c) => c,
        None => return Vec::new(),
    };
    let mut out = Vec::new();
    let mut prev_lemma: Option<u32> = None;

    loop {
        let Some(w0) = image.u32le(cursor) else {
            return Vec::new();
        };
        cursor += 4;
        let mut last = w0 & LAST != 0;

        let record = if w0 & COMPACT != 0 {
            let Some(lemma_id) = prev_lemma else {
                warn!(offset, "compact record at start of mapping sequence");
                return Vec::new();
            };
            PackedMeaning {
                lemma_id,
                meaning_index: (w0 >> MEANING_SHIFT) & MEANING_MASK,
                ksnid_index: w0 & KSNID_MASK,
            }
        } else if w0 & FULL != 0 {
            let lemma_id = w0 & LEMMA_MASK;
            prev_lemma = Some(lemma_id);
            PackedMeaning {
                lemma_id,
                meaning_index: (w0 >> FULL_MEANING_SHIFT) & FULL_MEANING_MASK,
                ksnid_index: u32::from(w0 & KSNID_ALT != 0),
            }
        } else {
            let lemma_id = w0 & LEMMA_MASK;
            prev_lemma = Some(lemma_id);
            let Some(w1) = image.u32le(cursor) else {
                return Vec::new();
            };
            cursor += 4;
            // The terminator of a double record sits on its second word.
            last = w1 & LAST != 0;
            PackedMeaning {
                lemma_id,
                meaning_index: (w1 >> MEANING_SHIFT) & MEANING_MASK,
                ksnid_index: w1 & KSNID_MASK,
            }
        };

        out.push(record);
        if last {
            return out;
        }
        if out.len() >= MAX_SEQUENCE {
            warn!(offset, "mapping sequence without terminator");
            return Vec::new();
        }
    }
}
