#[cfg(feature = "serde")]
use serde::Serialize;

/// A basic inflection record: one surface form of one lemma with one
/// grammatical tag.
///
/// This is the six-field view most callers want. All strings are owned
/// copies decoded from the image, so results stay valid independently of
/// the engine that produced them.
///
/// # Fields
///
/// * `lemma` - the canonical dictionary form (headword).
/// * `lemma_id` - the database identifier of the lemma. `0` never occurs in
///   the database itself and marks entries synthesised by the compound
///   analyser.
/// * `word_class` - word class code, e.g. `kk`, `kvk`, `hk`, `so`, `lo`.
/// * `domain` - the semantic subcategory carried by the lemma (`alm` for
///   general vocabulary, place-name and person-name classes, and so on).
/// * `surface` - the inflected form this record answers for. Equal to the
///   (normalised) search key, except that compound results carry the
///   prefix and a joining hyphen.
/// * `tag` - the grammatical tag string, e.g. `ÞGFETgr`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BinEntry {
    pub lemma: String,
    pub lemma_id: u32,
    pub word_class: String,
    pub domain: String,
    pub surface: String,
    pub tag: String,
}

/// An augmented inflection record: the six basic fields plus the nine
/// annotation fields of the KRISTÍNarsnið format.
///
/// Lemmas and forms carry editorial annotations: correctness grades (0-5),
/// register labels, grammar notes, cross references, and whether the entry
/// belongs to the curated kernel (`publication == 'K'`) or the wider
/// collection (`'V'`). Entries without an annotation record use the
/// defaults: grade 1, kernel, everything else empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct KsnidEntry {
    pub lemma: String,
    pub lemma_id: u32,
    pub word_class: String,
    pub domain: String,
    pub surface: String,
    pub tag: String,
    pub correctness: i32,
    pub register: String,
    pub grammar_note: String,
    pub cross_ref: String,
    pub publication: char,
    pub form_correctness: i32,
    pub form_register: String,
    pub form_binding: String,
    pub alt_lemma: String,
}

impl KsnidEntry {
    /// The six-field view of this record.
    pub fn basic(&self) -> BinEntry {
        BinEntry {
            lemma: self.lemma.clone(),
            lemma_id: self.lemma_id,
            word_class: self.word_class.clone(),
            domain: self.domain.clone(),
            surface: self.surface.clone(),
            tag: self.tag.clone(),
        }
    }
}

impl From<KsnidEntry> for BinEntry {
    fn from(entry: KsnidEntry) -> BinEntry {
        BinEntry {
            lemma: entry.lemma,
            lemma_id: entry.lemma_id,
            word_class: entry.word_class,
            domain: entry.domain,
            surface: entry.surface,
            tag: entry.tag,
        }
    }
}

/// The nine annotation fields on their own, as parsed from a ksnid record
/// or synthesised from the defaults.
#[derive(Debug, Clone)]
pub(crate) struct Ksnid {
    pub correctness: i32,
    pub register: String,
    pub grammar_note: String,
    pub cross_ref: String,
    pub publication: char,
    pub form_correctness: i32,
    pub form_register: String,
    pub form_binding: String,
    pub alt_lemma: String,
}

impl Default for Ksnid {
    fn default() -> Ksnid {
        Ksnid {
            correctness: 1,
            register: String::new(),
            grammar_note: String::new(),
            cross_ref: String::new(),
            publication: 'K',
            form_correctness: 1,
            form_register: String::new(),
            form_binding: String::new(),
            alt_lemma: String::new(),
        }
    }
}

impl Ksnid {
    /// Parses the nine `;`-separated fields of an annotation record.
    /// Anything that does not have exactly nine fields with well-formed
    /// grades is corrupt and yields [None]; the caller drops the affected
    /// entry and carries on.
    pub fn parse(record: &str) -> Option<Ksnid> {
        let mut fields = record.split(';');
        let correctness = parse_grade(fields.next()?)?;
        let register = fields.next()?.to_owned();
        let grammar_note = fields.next()?.to_owned();
        let cross_ref = fields.next()?.to_owned();
        let publication = match fields.next()? {
            "" => 'K',
            s => s.chars().next().unwrap_or('K'),
        };
        let form_correctness = parse_grade(fields.next()?)?;
        let form_register = fields.next()?.to_owned();
        let form_binding = fields.next()?.to_owned();
        let alt_lemma = fields.next()?.to_owned();
        if fields.next().is_some() {
            return None;
        }
        Some(Ksnid {
            correctness,
            register,
            grammar_note,
            cross_ref,
            publication,
            form_correctness,
            form_register,
            form_binding,
            alt_lemma,
        })
    }
}

fn parse_grade(field: &str) -> Option<i32> {
    if field.is_empty() {
        return Some(1);
    }
    field.parse().ok()
}
