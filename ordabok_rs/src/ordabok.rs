use std::path::PathBuf;

use bitflags::bitflags;
use foldhash::{HashSet, HashSetExt};
use tracing::debug;

use crate::compound::Compounder;
use crate::dawg::Dawg;
use crate::entry::{BinEntry, Ksnid, KsnidEntry};
use crate::error::{Error, Result};
use crate::image::{ByteImage, Header};
use crate::meanings::{self, PackedMeaning};
use crate::tables::{Alphabet, KsnidTable, LemmaTable, MeaningTable, SubcatTable};
use crate::trie;
use crate::util::cache::LookupCache;
use crate::util::latin1;
use crate::variants;

/// Capacity of the surface-form → trie-offset cache.
const FORM_CACHE_CAPACITY: usize = 1000;

/// Capacity of the word → compound-split cache.
const SPLIT_CACHE_CAPACITY: usize = 500;

bitflags! {
    /// Behaviour flags of the lookup front end.
    ///
    /// The defaults match ordinary text processing: spelling normalisation
    /// and the compound fallback are on. `ONLY_BIN` restricts results to
    /// what the database literally contains by clearing the three
    /// augmentation flags; `REPLACE_Z` is a spelling normalisation rather
    /// than an augmentation and is not affected by it.
    ///
    /// `ADD_NEGATION` and `ADD_LEGUR` are accepted and readable back from
    /// the engine but applied by higher layers that post-process results;
    /// the core engine carries them so one options value can configure a
    /// whole pipeline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LookupOptions: u8 {
        /// Let an embedding layer add negated adjective readings.
        const ADD_NEGATION = 1 << 0;
        /// Let an embedding layer add `-legur` adjective readings.
        const ADD_LEGUR = 1 << 1;
        /// Fall back to the compound analyser on unknown words.
        const ADD_COMPOUNDS = 1 << 2;
        /// Normalise the obsolete `z` spelling (`tzt` → `st`, `z` → `s`)
        /// before looking a word up.
        const REPLACE_Z = 1 << 3;
        /// Return database entries only: clears the augmentation flags.
        const ONLY_BIN = 1 << 4;
    }
}

impl Default for LookupOptions {
    fn default() -> LookupOptions {
        LookupOptions::ADD_NEGATION
            | LookupOptions::ADD_LEGUR
            | LookupOptions::ADD_COMPOUNDS
            | LookupOptions::REPLACE_Z
    }
}

/// Where to find the mapped files and how the front end should behave.
///
/// The engine consumes up to three files: the morphology image and the two
/// word graphs driving compound analysis. The graphs are optional; without
/// them (or if they fail to open) the compound fallback is silently
/// disabled and direct lookups work as usual.
///
/// # Example
///
/// ```no_run
/// use ordabok_rs::{LookupOptions, Ordabok, OrdabokConfig};
///
/// let config = OrdabokConfig::new("ord.bin")
///     .with_dawgs("prefixes.dawg", "suffixes.dawg")
///     .with_options(LookupOptions::default() - LookupOptions::REPLACE_Z);
/// let engine = Ordabok::open(config).unwrap();
/// assert_eq!(engine.options(), LookupOptions::default() - LookupOptions::REPLACE_Z);
/// ```
#[derive(Debug, Clone)]
pub struct OrdabokConfig {
    pub image_path: PathBuf,
    pub prefix_dawg_path: Option<PathBuf>,
    pub suffix_dawg_path: Option<PathBuf>,
    pub options: LookupOptions,
}

impl OrdabokConfig {
    pub fn new(image_path: impl Into<PathBuf>) -> OrdabokConfig {
        OrdabokConfig {
            image_path: image_path.into(),
            prefix_dawg_path: None,
            suffix_dawg_path: None,
            options: LookupOptions::default(),
        }
    }

    pub fn with_dawgs(
        mut self,
        prefix_path: impl Into<PathBuf>,
        suffix_path: impl Into<PathBuf>,
    ) -> OrdabokConfig {
        self.prefix_dawg_path = Some(prefix_path.into());
        self.suffix_dawg_path = Some(suffix_path.into());
        self
    }

    pub fn with_options(mut self, options: LookupOptions) -> OrdabokConfig {
        self.options = options;
        self
    }
}

/// The lookup engine: a read-only view of one morphology image and its two
/// optional compound word graphs.
///
/// All lookup methods take `&self` and the image is immutable after
/// construction, so a single engine can serve concurrent readers; the only
/// interior mutability is a pair of bounded LRU caches behind short
/// mutexes.
///
/// Queries and results are UTF-8 at this boundary. Internally the engine
/// walks byte strings in the image's single-byte encoding; a query
/// containing a code point the encoding cannot express simply has no match.
pub struct Ordabok {
    image: ByteImage,
    header: Header,
    alphabet: Alphabet,
    lemmas: LemmaTable,
    meanings: MeaningTable,
    subcats: SubcatTable,
    ksnid: KsnidTable,
    compounder: Option<Compounder>,
    options: LookupOptions,
    form_cache: LookupCache<String, Option<u32>>,
    split_cache: LookupCache<String, Option<usize>>,
}

impl std::fmt::Debug for Ordabok {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ordabok").finish_non_exhaustive()
    }
}

impl Ordabok {
    /// Opens and memory-maps the files named by `config`.
    ///
    /// Image problems (missing file, short file, wrong signature,
    /// inconsistent section offsets) are construction errors. Word-graph
    /// problems are not: the compound fallback is disabled and everything
    /// else proceeds.
    pub fn open(config: OrdabokConfig) -> Result<Ordabok> {
        let image = ByteImage::open(&config.image_path)?;
        let mut engine = Ordabok::build(image, config.options)?;
        if engine.options.contains(LookupOptions::ADD_COMPOUNDS) {
            engine.compounder = match (&config.prefix_dawg_path, &config.suffix_dawg_path) {
                (Some(prefix), Some(suffix)) => {
                    let graphs = Dawg::open(prefix)
                        .and_then(|pre| Dawg::open(suffix).map(|suf| Compounder::new(pre, suf)));
                    match graphs {
                        Ok(compounder) => Some(compounder),
                        Err(err) => {
                            debug!(%err, "compound analysis disabled");
                            None
                        }
                    }
                }
                _ => None,
            };
        }
        Ok(engine)
    }

    /// Builds an engine over an image already in memory, without compound
    /// analysis.
    pub fn from_bytes(image: Vec<u8>, options: LookupOptions) -> Result<Ordabok> {
        Ordabok::build(ByteImage::from_bytes(image), options)
    }

    /// Builds an engine over in-memory copies of all three files.
    pub fn from_bytes_with_dawgs(
        image: Vec<u8>,
        prefix_dawg: Vec<u8>,
        suffix_dawg: Vec<u8>,
        options: LookupOptions,
    ) -> Result<Ordabok> {
        let mut engine = Ordabok::build(ByteImage::from_bytes(image), options)?;
        if engine.options.contains(LookupOptions::ADD_COMPOUNDS) {
            let prefixes = Dawg::from_bytes(prefix_dawg)?;
            let suffixes = Dawg::from_bytes(suffix_dawg)?;
            engine.compounder = Some(Compounder::new(prefixes, suffixes));
        }
        Ok(engine)
    }

    fn build(image: ByteImage, options: LookupOptions) -> Result<Ordabok> {
        let header = Header::read(&image)?;
        let alphabet =
            Alphabet::read(&image, header.alphabet).ok_or(Error::ImageBadSections)?;
        let lemmas = LemmaTable::new(header.lemmas, header.templates);
        let meanings = MeaningTable::new(header.meanings);
        let subcats = SubcatTable::new(header.subcats);
        let ksnid = KsnidTable::new(header.ksnid);

        let options = if options.contains(LookupOptions::ONLY_BIN) {
            options
                - LookupOptions::ADD_NEGATION
                - LookupOptions::ADD_LEGUR
                - LookupOptions::ADD_COMPOUNDS
        } else {
            options
        };

        debug!(
            version = %header.version,
            lemmas = lemmas.count(),
            alphabet = alphabet.len(),
            "loaded morphology image"
        );

        Ok(Ordabok {
            image,
            header,
            alphabet,
            lemmas,
            meanings,
            subcats,
            ksnid,
            compounder: None,
            options,
            form_cache: LookupCache::new(FORM_CACHE_CAPACITY),
            split_cache: LookupCache::new(SPLIT_CACHE_CAPACITY),
        })
    }

    /// The options this engine runs with, after `ONLY_BIN` resolution.
    pub fn options(&self) -> LookupOptions {
        self.options
    }

    /// The format version tuple parsed from the image signature.
    pub fn format_version(&self) -> &str {
        &self.header.version
    }

    /// Number of records in the lemma table, including the reserved slot 0.
    pub fn lemma_count(&self) -> u32 {
        self.lemmas.count()
    }

    /// True if `word` is listed in the form index exactly as given. No
    /// normalisation and no compound fallback take place.
    pub fn contains(&self, word: &str) -> bool {
        !word.is_empty() && self.form_offset(word).is_some()
    }

    /// Looks up a surface form and returns basic entries.
    ///
    /// The returned search key is the word actually looked up after
    /// normalisation: `z` spelling replacement (with `REPLACE_Z`), then, if
    /// the word missed, starts upper-case and `at_sentence_start` is set,
    /// the word with its first code point lowered. Every returned entry
    /// answers for that key; compound results differ from it only by the
    /// joining hyphen. A word with no analysis returns an empty list, never
    /// an error.
    ///
    /// With `auto_uppercase`, a result set whose surfaces start upper-case
    /// uppercases the first code point of the search key as well.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ordabok_rs::{Ordabok, OrdabokConfig};
    /// # let engine = Ordabok::open(OrdabokConfig::new("ord.bin")).unwrap();
    /// let (key, entries) = engine.lookup("færi", false, false);
    /// assert_eq!(key, "færi");
    /// for e in &entries {
    ///     // ("fara", "so", "GM-VH-ÞT-1P-ET"), ("fær", "lo", "FVB-KK-NFET"), ...
    ///     println!("{} {} {}", e.lemma, e.word_class, e.tag);
    /// }
    /// ```
    pub fn lookup(
        &self,
        word: &str,
        at_sentence_start: bool,
        auto_uppercase: bool,
    ) -> (String, Vec<BinEntry>) {
        let (key, entries) = self.lookup_ksnid(word, at_sentence_start, auto_uppercase);
        (key, entries.into_iter().map(BinEntry::from).collect())
    }

    /// Looks up a surface form and returns augmented entries. Same
    /// pipeline as [lookup](Ordabok::lookup).
    pub fn lookup_ksnid(
        &self,
        word: &str,
        at_sentence_start: bool,
        auto_uppercase: bool,
    ) -> (String, Vec<KsnidEntry>) {
        let (mut key, entries) = self.lookup_raw(word, at_sentence_start);
        if auto_uppercase
            && entries
                .iter()
                .any(|e| e.surface.chars().next().is_some_and(char::is_uppercase))
        {
            key = uppercase_first(&key);
        }
        (key, entries)
    }

    /// All entries of the lemma with the given database identifier, keyed
    /// by its headword form. The identifier `0` belongs to synthetic
    /// compounds and never resolves.
    pub fn lookup_id(&self, lemma_id: u32) -> Vec<KsnidEntry> {
        if lemma_id == 0 {
            return Vec::new();
        }
        let Some(record) = self.lemmas.record(&self.image, lemma_id) else {
            return Vec::new();
        };
        let lemma = latin1::decode(record.lemma);
        let mut entries = self.entries_for_form(&lemma);
        entries.retain(|e| e.lemma_id == lemma_id);
        dedup_entries(&mut entries);
        entries
    }

    /// The set of word classes under which `word` is known.
    pub fn lookup_cats(&self, word: &str, at_sentence_start: bool) -> HashSet<String> {
        let (_, entries) = self.lookup_raw(word, at_sentence_start);
        entries.into_iter().map(|e| e.word_class).collect()
    }

    /// The set of `(lemma, word_class)` pairs under which `word` is known.
    pub fn lookup_lemmas_and_cats(
        &self,
        word: &str,
        at_sentence_start: bool,
    ) -> HashSet<(String, String)> {
        let (_, entries) = self.lookup_raw(word, at_sentence_start);
        entries.into_iter().map(|e| (e.lemma, e.word_class)).collect()
    }

    /// Entries whose surface form is the headword itself.
    pub fn lookup_lemmas(&self, lemma: &str) -> Vec<BinEntry> {
        let (key, mut entries) = self.lookup(lemma, false, false);
        entries.retain(|e| e.lemma == key);
        entries
    }

    /// Inflected variants of the word's lemma matching the requested
    /// grammatical features.
    ///
    /// `cat` restricts the word class of the seed candidates; the
    /// placeholder `"no"` accepts any noun gender (`kk`, `kvk`, `hk`).
    /// Every element of `to_inflection` must occur in the tag of a returned
    /// entry, except the special token `"nogr"`, which requires the tag
    /// not to contain `gr` (no attached article). `lemma` and `lemma_id`
    /// narrow the candidates further; `inflection_filter` is a final
    /// caller-supplied predicate on the tag.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use ordabok_rs::{Ordabok, OrdabokConfig};
    /// # let engine = Ordabok::open(OrdabokConfig::new("ord.bin")).unwrap();
    /// let dative = engine.lookup_variants("Laugavegur", "kk", &["ÞGF"], None, None, None);
    /// assert_eq!(dative[0].surface, "Laugavegi");
    /// ```
    pub fn lookup_variants(
        &self,
        word: &str,
        cat: &str,
        to_inflection: &[&str],
        lemma: Option<&str>,
        lemma_id: Option<u32>,
        inflection_filter: Option<&dyn Fn(&str) -> bool>,
    ) -> Vec<KsnidEntry> {
        variants::lookup_variants(
            self,
            word,
            cat,
            to_inflection,
            lemma,
            lemma_id,
            inflection_filter,
        )
    }

    /// Every inflected form of the word's lemma, unrestricted: the variant
    /// lookup with an empty requirement list.
    pub fn lookup_forms(&self, word: &str, cat: &str) -> Vec<KsnidEntry> {
        self.lookup_variants(word, cat, &[], None, None, None)
    }

    /// Nominative forms of the word's lemma.
    ///
    /// The four case helpers are shorthands for the corresponding
    /// [lookup_variants](Ordabok::lookup_variants) calls; like there, the
    /// case mark is matched as a tag substring, so singular and plural,
    /// definite and indefinite forms all qualify.
    pub fn lookup_nominative(&self, word: &str, cat: &str) -> Vec<KsnidEntry> {
        self.lookup_variants(word, cat, &["NF"], None, None, None)
    }

    /// Accusative forms of the word's lemma.
    pub fn lookup_accusative(&self, word: &str, cat: &str) -> Vec<KsnidEntry> {
        self.lookup_variants(word, cat, &["ÞF"], None, None, None)
    }

    /// Dative forms of the word's lemma.
    pub fn lookup_dative(&self, word: &str, cat: &str) -> Vec<KsnidEntry> {
        self.lookup_variants(word, cat, &["ÞGF"], None, None, None)
    }

    /// Genitive forms of the word's lemma.
    pub fn lookup_genitive(&self, word: &str, cat: &str) -> Vec<KsnidEntry> {
        self.lookup_variants(word, cat, &["EF"], None, None, None)
    }

    /// The shared lookup pipeline: normalise, probe the trie, retry at
    /// sentence start, fall back to compounds, dedup.
    fn lookup_raw(&self, word: &str, at_sentence_start: bool) -> (String, Vec<KsnidEntry>) {
        if word.is_empty() {
            return (String::new(), Vec::new());
        }
        let mut key = if self.options.contains(LookupOptions::REPLACE_Z) {
            replace_z(word)
        } else {
            word.to_owned()
        };

        let mut entries = self.entries_for_form(&key);

        if entries.is_empty()
            && at_sentence_start
            && key.chars().next().is_some_and(char::is_uppercase)
        {
            // At a sentence start the capital is presentation, not
            // identity: retry with the first code point lowered and keep
            // the lowered key for the rest of the pipeline.
            key = lowercase_first(&key);
            entries = self.entries_for_form(&key);
        }

        if entries.is_empty() && self.options.contains(LookupOptions::ADD_COMPOUNDS) {
            entries = self.compound_entries(&key);
        }

        dedup_entries(&mut entries);
        (key, entries)
    }

    /// Trie offset of a surface form, through the form cache.
    fn form_offset(&self, key: &str) -> Option<u32> {
        if let Some(cached) = self.form_cache.get(key) {
            return cached;
        }
        let offset = latin1::encode(key).and_then(|bytes| {
            // A byte outside the alphabet cannot occur in any indexed form.
            if bytes.iter().any(|&b| self.alphabet.index(b).is_none()) {
                return None;
            }
            trie::search(&self.image, &self.alphabet, self.header.forms, &bytes)
        });
        self.form_cache.put(key.to_owned(), offset);
        offset
    }

    /// Decodes every entry the form index lists for `surface`.
    pub(crate) fn entries_for_form(&self, surface: &str) -> Vec<KsnidEntry> {
        let Some(offset) = self.form_offset(surface) else {
            return Vec::new();
        };
        meanings::walk(&self.image, self.header.mappings, offset)
            .iter()
            .filter_map(|pm| self.decode(surface, pm))
            .collect()
    }

    /// Every surface form of a lemma's paradigm, decoded from its
    /// template.
    pub(crate) fn paradigm_forms(&self, lemma_id: u32) -> Vec<String> {
        let Some(record) = self.lemmas.record(&self.image, lemma_id) else {
            return Vec::new();
        };
        self.lemmas
            .template_forms(&self.image, record.template)
            .into_iter()
            .map(latin1::decode)
            .collect()
    }

    /// Expands one packed record into an augmented entry. Any table read
    /// that leaves the image drops the record.
    fn decode(&self, surface: &str, pm: &PackedMeaning) -> Option<KsnidEntry> {
        if pm.lemma_id == 0 {
            // Id 0 never occurs in the database; it can only come out of a
            // damaged sequence.
            return None;
        }
        let (word_class, tag) = self.meanings.meaning(&self.image, pm.meaning_index)?;
        let lemma_record = self.lemmas.record(&self.image, pm.lemma_id)?;
        let domain = self.subcats.name(&self.image, lemma_record.subcat)?;
        let lemma = latin1::decode(lemma_record.lemma);
        let ksnid = if pm.ksnid_index == 0 {
            Ksnid::default()
        } else {
            Ksnid::parse(&self.ksnid.record(&self.image, pm.ksnid_index)?)?
        };
        Some(KsnidEntry {
            lemma,
            lemma_id: pm.lemma_id,
            word_class,
            domain,
            surface: surface.to_owned(),
            tag,
            correctness: ksnid.correctness,
            register: ksnid.register,
            grammar_note: ksnid.grammar_note,
            cross_ref: ksnid.cross_ref,
            publication: ksnid.publication,
            form_correctness: ksnid.form_correctness,
            form_register: ksnid.form_register,
            form_binding: ksnid.form_binding,
            alt_lemma: ksnid.alt_lemma,
        })
    }

    /// The compound fallback: split the unknown word on the word graphs
    /// and template the entries of the suffix.
    fn compound_entries(&self, key: &str) -> Vec<KsnidEntry> {
        let Some(compounder) = &self.compounder else {
            return Vec::new();
        };
        let Some(bytes) = latin1::encode(key) else {
            return Vec::new();
        };

        let split = match self.split_cache.get(key) {
            Some(cached) => cached,
            None => {
                let split = compounder.split(&bytes, |suffix| {
                    trie::search(&self.image, &self.alphabet, self.header.forms, suffix).is_some()
                });
                self.split_cache.put(key.to_owned(), split);
                split
            }
        };
        let Some(split) = split else {
            return Vec::new();
        };

        let prefix = latin1::decode(&bytes[..split]);
        let suffix = latin1::decode(&bytes[split..]);
        let mut entries = self.entries_for_form(&suffix);
        for entry in &mut entries {
            entry.lemma = format!("{prefix}-{}", entry.lemma);
            entry.surface = format!("{prefix}-{suffix}");
            entry.lemma_id = 0;
        }
        entries
    }
}

/// Normalises the obsolete `z` spelling: `tzt` becomes `st`, every
/// remaining `z` becomes `s`, left to right, non-overlapping.
fn replace_z(word: &str) -> String {
    word.replace("tzt", "st").replace('z', "s")
}

fn lowercase_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn uppercase_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drops repeated `(surface, tag, lemma, word_class)` records, keeping the
/// first occurrence so results stay in image order.
fn dedup_entries(entries: &mut Vec<KsnidEntry>) {
    let mut seen: HashSet<(String, String, String, String)> = HashSet::new();
    entries.retain(|e| {
        seen.insert((
            e.surface.clone(),
            e.tag.clone(),
            e.lemma.clone(),
            e.word_class.clone(),
        ))
    });
}
