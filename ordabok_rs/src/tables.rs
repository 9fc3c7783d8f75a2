//! Accessors for the fixed-layout sections of the image: the compressed
//! alphabet, the lemma array, the meanings table, the subcategory names and
//! the ksnid annotation records.
//!
//! Each table is a thin view keeping only its base offset; all actual bytes
//! stay in the mapped image and are read through the bounds-checked
//! [ByteImage] accessors. A read that would leave the image returns [None]
//! and the caller treats the record as absent.

use crate::image::ByteImage;
use crate::util::latin1;

/// Stride of one record in the lemma array.
const LEMMA_RECORD_LEN: u32 = 16;

/// Width of one padded meanings record: `"<class> <tag>"` padded with
/// spaces.
const MEANING_RECORD_LEN: usize = 24;

/// The compressed alphabet: at most 127 distinct source-encoding bytes, so
/// that a letter index fits the 7-bit field of a trie node header.
///
/// The forward table comes straight from the image; the reverse table is
/// built once at load time and maps a source byte back to its index for
/// encoding query words during graph walks.
pub(crate) struct Alphabet {
    forward: Vec<u8>,
    // byte -> index + 1; 0 marks a byte that is not in the alphabet.
    reverse: [u8; 256],
}

impl Alphabet {
    pub fn read(image: &ByteImage, base: u32) -> Option<Alphabet> {
        let len = image.u32le(base)?;
        if len > 127 {
            return None;
        }
        let forward = image.bytes(base.checked_add(4)?, len as usize)?.to_vec();
        let mut reverse = [0u8; 256];
        for (i, &b) in forward.iter().enumerate() {
            reverse[b as usize] = i as u8 + 1;
        }
        Some(Alphabet { forward, reverse })
    }

    /// Source byte for letter index `i`.
    #[inline(always)]
    pub fn byte(&self, i: u8) -> Option<u8> {
        self.forward.get(i as usize).copied()
    }

    /// Letter index of source byte `b`, if the byte occurs in the alphabet.
    #[inline(always)]
    pub fn index(&self, b: u8) -> Option<u8> {
        match self.reverse[b as usize] {
            0 => None,
            i => Some(i - 1),
        }
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }
}

/// One decoded lemma record.
pub(crate) struct LemmaRecord<'a> {
    /// Lemma string in the source encoding.
    pub lemma: &'a [u8],
    /// Subcategory index, the low five bits of the binding word.
    pub subcat: u8,
    /// Offset of the paradigm template, `0` when the lemma has none.
    pub template: u32,
}

/// The fixed-stride lemma array. Records are
/// `{string_offset: u32, binding: u32, reserved: u64}`; the low half of the
/// reserved word addresses the lemma's paradigm template. The array has no
/// length prefix; its record count falls out of the offset of the templates
/// section that immediately follows it.
pub(crate) struct LemmaTable {
    base: u32,
    count: u32,
}

impl LemmaTable {
    pub fn new(base: u32, end: u32) -> LemmaTable {
        LemmaTable {
            base,
            count: (end - base) / LEMMA_RECORD_LEN,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn record<'a>(&self, image: &'a ByteImage, id: u32) -> Option<LemmaRecord<'a>> {
        if id >= self.count {
            return None;
        }
        let off = self.base + id * LEMMA_RECORD_LEN;
        let string_off = image.u32le(off)?;
        let binding = image.u32le(off + 4)?;
        let template = image.u32le(off + 8)?;
        let lemma = image.lpstr(string_off)?;
        Some(LemmaRecord {
            lemma,
            subcat: (binding & 0x1F) as u8,
            template,
        })
    }

    /// The surface forms listed by a lemma's paradigm template, in paradigm
    /// order. `template` is the offset from a [LemmaRecord]; `0` (no
    /// template) and any out-of-range read yield an empty list.
    pub fn template_forms<'a>(&self, image: &'a ByteImage, template: u32) -> Vec<&'a [u8]> {
        if template == 0 {
            return Vec::new();
        }
        let Some(count) = image.u32le(template) else {
            return Vec::new();
        };
        let mut forms = Vec::new();
        let mut cursor = template + 4;
        for _ in 0..count {
            let entry = image.u32le(cursor).and_then(|off| image.lpstr(off));
            let Some(form) = entry else {
                return Vec::new();
            };
            forms.push(form);
            cursor += 4;
        }
        forms
    }
}

/// The meanings table: a `u32` offset per meaning index, each pointing at a
/// space-padded ASCII record holding the word class and the grammatical tag
/// separated by the first space.
pub(crate) struct MeaningTable {
    base: u32,
}

impl MeaningTable {
    pub fn new(base: u32) -> MeaningTable {
        MeaningTable { base }
    }

    pub fn meaning(&self, image: &ByteImage, index: u32) -> Option<(String, String)> {
        let off = image.u32le(self.base.checked_add(index.checked_mul(4)?)?)?;
        let record = image.bytes(off, MEANING_RECORD_LEN)?;
        let record = latin1::decode(trim_padding(record));
        match record.split_once(' ') {
            Some((class, tag)) => Some((class.to_owned(), tag.to_owned())),
            None => Some((record, String::new())),
        }
    }
}

fn trim_padding(record: &[u8]) -> &[u8] {
    let end = record
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |p| p + 1);
    &record[..end]
}

/// The subcategory (domain) names: `{count: u32, offsets: [u32; count]}`,
/// each offset pointing at a length-prefixed name. Indexed by the 5-bit
/// subcategory field of a lemma binding.
pub(crate) struct SubcatTable {
    base: u32,
}

impl SubcatTable {
    pub fn new(base: u32) -> SubcatTable {
        SubcatTable { base }
    }

    pub fn name(&self, image: &ByteImage, index: u8) -> Option<String> {
        let count = image.u32le(self.base)?;
        if u32::from(index) >= count {
            return None;
        }
        let off = image.u32le(self.base + 4 + u32::from(index) * 4)?;
        Some(latin1::decode(image.lpstr(off)?))
    }
}

/// The ksnid annotation records: a `u32` offset per index, each pointing at
/// a length-prefixed ASCII string of nine `;`-separated fields. Index `0`
/// stands for the default annotation and is never read from the image.
pub(crate) struct KsnidTable {
    base: u32,
}

impl KsnidTable {
    pub fn new(base: u32) -> KsnidTable {
        KsnidTable { base }
    }

    pub fn record(&self, image: &ByteImage, index: u32) -> Option<String> {
        let off = image.u32le(self.base.checked_add(index.checked_mul(4)?)?)?;
        Some(latin1::decode(image.lpstr(off)?))
    }
}
