//! Test-support builders that synthesise miniature morphology images and
//! word graphs in the binary container format the engine reads. These stand
//! in for the offline packer so that lookups can be checked end to end
//! against known data.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::OnceLock;

use foldhash::{HashMap, HashMapExt};
use ordabok_rs::{DAWG_MAGIC, DAWG_VERSION, IMAGE_MARKER, IMAGE_VERSION, LookupOptions, Ordabok};

// Mapping word layout (the packer's side of the format).
pub const MAP_LAST: u32 = 0x8000_0000;
pub const MAP_COMPACT: u32 = 0x4000_0000;
pub const MAP_FULL: u32 = 0x2000_0000;
pub const MAP_KSNID_ALT: u32 = 0x1000_0000;
pub const MAP_MEANING_SHIFT: u32 = 19;
pub const MAP_FULL_MEANING_SHIFT: u32 = 20;

// Trie node layout.
const NODE_SINGLE: u32 = 0x8000_0000;
const NODE_CHILDLESS: u32 = 0x4000_0000;
const NO_VALUE: u32 = 0x007F_FFFF;

// Word-graph node layout.
const DAWG_EOW: u32 = 0x8000_0000;
const DAWG_EOL: u32 = 0x4000_0000;

/// The annotation string every entry without an explicit one carries.
pub const DEFAULT_KSNID: &str = "1;;;;K;1;;;";

/// One input record for the image builder.
#[derive(Clone)]
pub struct Entry {
    pub surface: &'static str,
    pub lemma: &'static str,
    pub lemma_id: u32,
    pub word_class: &'static str,
    pub domain: &'static str,
    pub tag: &'static str,
    pub ksnid: Option<&'static str>,
}

pub fn entry(
    surface: &'static str,
    lemma: &'static str,
    lemma_id: u32,
    word_class: &'static str,
    domain: &'static str,
    tag: &'static str,
) -> Entry {
    Entry {
        surface,
        lemma,
        lemma_id,
        word_class,
        domain,
        tag,
        ksnid: None,
    }
}

fn l1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| {
            let cp = ch as u32;
            assert!(cp < 256, "test word {text:?} is not single-byte encodable");
            cp as u8
        })
        .collect()
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_lpstr(out: &mut Vec<u8>, bytes: &[u8]) {
    assert!(bytes.len() < 256);
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
}

fn lpstr_len(bytes: &[u8]) -> u32 {
    1 + bytes.len() as u32
}

// In-memory radix trie used while packing the form index.
#[derive(Default)]
struct TNode {
    value: Option<u32>,
    children: BTreeMap<u8, (Vec<u8>, TNode)>,
}

fn t_insert(node: &mut TNode, word: &[u8], value: u32) {
    if word.is_empty() {
        node.value = Some(value);
        return;
    }
    let first = word[0];
    if let Some((frag, child)) = node.children.get_mut(&first) {
        let common = frag.iter().zip(word).take_while(|(a, b)| a == b).count();
        if common == frag.len() {
            t_insert(child, &word[common..], value);
        } else {
            let tail = frag.split_off(common);
            let old = std::mem::take(child);
            child.children.insert(tail[0], (tail, old));
            t_insert(child, &word[common..], value);
        }
    } else {
        let mut leaf = TNode::default();
        leaf.value = Some(value);
        node.children.insert(first, (word.to_vec(), leaf));
    }
}

fn t_node_size(frag: &[u8], node: &TNode) -> u32 {
    let n = node.children.len() as u32;
    if frag.len() == 1 {
        if n == 0 { 4 } else { 8 + 4 * n }
    } else {
        8 + 4 * n + frag.len() as u32 + 1
    }
}

fn t_subtree_size(frag: &[u8], node: &TNode) -> u32 {
    t_node_size(frag, node)
        + node
            .children
            .values()
            .map(|(f, c)| t_subtree_size(f, c))
            .sum::<u32>()
}

fn t_emit(
    frag: &[u8],
    node: &TNode,
    my_off: u32,
    alpha_index: &BTreeMap<u8, u8>,
    out: &mut Vec<u8>,
) {
    assert_eq!(out.len() as u32, my_off, "trie layout drifted");
    let count = node.children.len() as u32;
    let value = node.value.unwrap_or(NO_VALUE);
    assert!(value <= NO_VALUE);

    let mut header = value;
    if frag.len() == 1 {
        header |= NODE_SINGLE | (u32::from(alpha_index[&frag[0]] + 1) << 23);
    }
    if count == 0 {
        header |= NODE_CHILDLESS;
    }
    push_u32(out, header);
    if frag.len() == 1 && count == 0 {
        return;
    }

    push_u32(out, count);
    let mut child_off = my_off + t_node_size(frag, node);
    let mut offsets = Vec::with_capacity(node.children.len());
    for (child_frag, child) in node.children.values() {
        offsets.push(child_off);
        child_off += t_subtree_size(child_frag, child);
    }
    for off in &offsets {
        push_u32(out, *off);
    }
    if frag.len() != 1 {
        out.extend_from_slice(frag);
        out.push(0);
    }
    for ((child_frag, child), off) in node.children.values().zip(offsets) {
        t_emit(child_frag, child, off, alpha_index, out);
    }
}

struct LemmaInfo {
    lemma: String,
    subcat: u32,
    forms: Vec<String>,
}

/// Packs a list of entries (plus optional hand-written mapping sequences)
/// into an image the engine accepts.
#[derive(Default)]
pub struct ImageBuilder {
    entries: Vec<Entry>,
    raw_mappings: Vec<(String, Vec<u32>)>,
}

impl ImageBuilder {
    pub fn new() -> ImageBuilder {
        ImageBuilder::default()
    }

    pub fn entries(mut self, entries: &[Entry]) -> ImageBuilder {
        self.entries.extend_from_slice(entries);
        self
    }

    /// Maps `surface` to a hand-written mapping word sequence, for
    /// exercising damaged data.
    pub fn raw_mapping(mut self, surface: &str, words: Vec<u32>) -> ImageBuilder {
        self.raw_mappings.push((surface.to_owned(), words));
        self
    }

    pub fn build(self) -> Vec<u8> {
        assert!(!self.entries.is_empty());

        // Intern meanings, annotations, subcategories and lemmas in entry
        // order, exactly like the offline packer.
        let mut meaning_list: Vec<(String, String)> = Vec::new();
        let mut meaning_index: HashMap<(String, String), u32> = HashMap::new();
        let mut ksnid_list: Vec<String> = vec![DEFAULT_KSNID.to_owned()];
        let mut ksnid_index: HashMap<String, u32> = HashMap::new();
        ksnid_index.insert(DEFAULT_KSNID.to_owned(), 0);
        let mut subcat_list: Vec<String> = Vec::new();
        let mut subcat_index: HashMap<String, u32> = HashMap::new();
        let mut lemma_info: BTreeMap<u32, LemmaInfo> = BTreeMap::new();
        let mut groups: Vec<(String, Vec<(u32, u32, u32)>)> = Vec::new();

        for e in &self.entries {
            assert_ne!(e.lemma_id, 0, "lemma id 0 is reserved for compounds");
            assert!(e.lemma_id < 1 << 20);

            let m_key = (e.word_class.to_owned(), e.tag.to_owned());
            let m = *meaning_index.entry(m_key.clone()).or_insert_with(|| {
                meaning_list.push(m_key);
                meaning_list.len() as u32 - 1
            });
            assert!(m < 1 << 11);

            let k_str = e.ksnid.unwrap_or(DEFAULT_KSNID).to_owned();
            let k = *ksnid_index.entry(k_str.clone()).or_insert_with(|| {
                ksnid_list.push(k_str);
                ksnid_list.len() as u32 - 1
            });
            assert!(k < 1 << 19);

            let s = *subcat_index.entry(e.domain.to_owned()).or_insert_with(|| {
                subcat_list.push(e.domain.to_owned());
                subcat_list.len() as u32 - 1
            });
            assert!(s < 32);

            let info = lemma_info.entry(e.lemma_id).or_insert_with(|| LemmaInfo {
                lemma: e.lemma.to_owned(),
                subcat: s,
                forms: Vec::new(),
            });
            assert_eq!(info.lemma, e.lemma, "one lemma string per lemma id");
            if !info.forms.iter().any(|f| f == e.surface) {
                info.forms.push(e.surface.to_owned());
            }

            match groups.iter_mut().find(|(surface, _)| surface.as_str() == e.surface) {
                Some((_, list)) => list.push((e.lemma_id, m, k)),
                None => groups.push((e.surface.to_owned(), vec![(e.lemma_id, m, k)])),
            }
        }

        // Pack each per-form sequence, preferring the one-word shapes.
        let mut mapping_bytes: Vec<u8> = Vec::new();
        let mut trie_values: Vec<(Vec<u8>, u32)> = Vec::new();
        for (surface, records) in &groups {
            trie_values.push((l1(surface), mapping_bytes.len() as u32));
            let mut words: Vec<u32> = Vec::new();
            let mut prev: Option<u32> = None;
            for &(lemma_id, m, k) in records {
                if k <= 1 && m < 256 {
                    let alt = if k == 1 { MAP_KSNID_ALT } else { 0 };
                    words.push(MAP_FULL | alt | (m << MAP_FULL_MEANING_SHIFT) | lemma_id);
                } else if prev == Some(lemma_id) {
                    words.push(MAP_COMPACT | (m << MAP_MEANING_SHIFT) | k);
                } else {
                    words.push(lemma_id);
                    words.push((m << MAP_MEANING_SHIFT) | k);
                }
                prev = Some(lemma_id);
            }
            *words.last_mut().unwrap() |= MAP_LAST;
            for w in words {
                push_u32(&mut mapping_bytes, w);
            }
        }
        for (surface, words) in &self.raw_mappings {
            trie_values.push((l1(surface), mapping_bytes.len() as u32));
            for w in words {
                push_u32(&mut mapping_bytes, *w);
            }
        }

        // The compressed alphabet covers every byte of every indexed form.
        let mut alpha_index: BTreeMap<u8, u8> = BTreeMap::new();
        for (word, _) in &trie_values {
            for &b in word {
                alpha_index.entry(b).or_insert(0);
            }
        }
        assert!(alpha_index.len() <= 127);
        let alpha_bytes: Vec<u8> = alpha_index.keys().copied().collect();
        for (i, b) in alpha_bytes.iter().enumerate() {
            *alpha_index.get_mut(b).unwrap() = i as u8;
        }

        let mut root = TNode::default();
        for (word, value) in &trie_values {
            t_insert(&mut root, word, *value);
        }

        // Section layout: header, mappings, forms, lemmas, templates (with
        // the form and lemma string pools), meanings, alphabet, subcats,
        // ksnid.
        let header_len = 16 + 8 * 4;
        let mappings_off = header_len;
        let forms_off = mappings_off + mapping_bytes.len() as u32;
        let trie_size = t_subtree_size(b"", &root);
        let lemmas_off = forms_off + trie_size;
        let lemma_count = lemma_info.keys().next_back().unwrap() + 1;
        let templates_off = lemmas_off + lemma_count * 16;

        let mut cursor = templates_off;
        let mut template_offsets: BTreeMap<u32, u32> = BTreeMap::new();
        for (&id, info) in &lemma_info {
            template_offsets.insert(id, cursor);
            cursor += 4 + 4 * info.forms.len() as u32;
        }
        let mut form_offsets: HashMap<String, u32> = HashMap::new();
        for info in lemma_info.values() {
            for form in &info.forms {
                if !form_offsets.contains_key(form) {
                    form_offsets.insert(form.clone(), cursor);
                    cursor += lpstr_len(&l1(form));
                }
            }
        }
        let mut lemma_offsets: HashMap<String, u32> = HashMap::new();
        for info in lemma_info.values() {
            if !lemma_offsets.contains_key(&info.lemma) {
                lemma_offsets.insert(info.lemma.clone(), cursor);
                cursor += lpstr_len(&l1(&info.lemma));
            }
        }

        let meanings_off = cursor;
        let meaning_records_off = meanings_off + 4 * meaning_list.len() as u32;
        let alphabet_off = meaning_records_off + 24 * meaning_list.len() as u32;
        let subcats_off = alphabet_off + 4 + alpha_bytes.len() as u32;
        let mut subcat_name_offsets: Vec<u32> = Vec::new();
        cursor = subcats_off + 4 + 4 * subcat_list.len() as u32;
        for name in &subcat_list {
            subcat_name_offsets.push(cursor);
            cursor += lpstr_len(&l1(name));
        }
        let ksnid_off = cursor;
        let mut ksnid_record_offsets: Vec<u32> = Vec::new();
        cursor = ksnid_off + 4 * ksnid_list.len() as u32;
        for record in &ksnid_list {
            ksnid_record_offsets.push(cursor);
            cursor += lpstr_len(record.as_bytes());
        }

        // Emit.
        let mut out: Vec<u8> = Vec::with_capacity(cursor as usize);
        out.extend_from_slice(IMAGE_MARKER);
        out.extend_from_slice(IMAGE_VERSION);
        for off in [
            mappings_off,
            forms_off,
            lemmas_off,
            templates_off,
            meanings_off,
            alphabet_off,
            subcats_off,
            ksnid_off,
        ] {
            push_u32(&mut out, off);
        }

        out.extend_from_slice(&mapping_bytes);

        t_emit(b"", &root, forms_off, &alpha_index, &mut out);
        assert_eq!(out.len() as u32, lemmas_off);

        for id in 0..lemma_count {
            match lemma_info.get(&id) {
                Some(info) => {
                    push_u32(&mut out, lemma_offsets[&info.lemma]);
                    push_u32(&mut out, info.subcat);
                    push_u32(&mut out, template_offsets[&id]);
                    push_u32(&mut out, 0);
                }
                None => {
                    // Unoccupied slot of the sparse id space.
                    for _ in 0..4 {
                        push_u32(&mut out, 0);
                    }
                }
            }
        }
        assert_eq!(out.len() as u32, templates_off);

        for (&id, info) in &lemma_info {
            assert_eq!(out.len() as u32, template_offsets[&id]);
            push_u32(&mut out, info.forms.len() as u32);
            for form in &info.forms {
                push_u32(&mut out, form_offsets[form]);
            }
        }
        {
            let mut emitted: HashMap<&str, bool> = HashMap::new();
            for info in lemma_info.values() {
                for form in &info.forms {
                    if emitted.insert(form.as_str(), true).is_none() {
                        assert_eq!(out.len() as u32, form_offsets[form]);
                        push_lpstr(&mut out, &l1(form));
                    }
                }
            }
            let mut emitted: HashMap<&str, bool> = HashMap::new();
            for info in lemma_info.values() {
                if emitted.insert(info.lemma.as_str(), true).is_none() {
                    assert_eq!(out.len() as u32, lemma_offsets[&info.lemma]);
                    push_lpstr(&mut out, &l1(&info.lemma));
                }
            }
        }

        assert_eq!(out.len() as u32, meanings_off);
        for i in 0..meaning_list.len() as u32 {
            push_u32(&mut out, meaning_records_off + 24 * i);
        }
        for (class, tag) in &meaning_list {
            let mut record = l1(&format!("{class} {tag}"));
            assert!(record.len() <= 24, "meaning record too wide");
            record.resize(24, b' ');
            out.extend_from_slice(&record);
        }

        assert_eq!(out.len() as u32, alphabet_off);
        push_u32(&mut out, alpha_bytes.len() as u32);
        out.extend_from_slice(&alpha_bytes);

        assert_eq!(out.len() as u32, subcats_off);
        push_u32(&mut out, subcat_list.len() as u32);
        for off in &subcat_name_offsets {
            push_u32(&mut out, *off);
        }
        for (name, off) in subcat_list.iter().zip(&subcat_name_offsets) {
            assert_eq!(out.len() as u32, *off);
            push_lpstr(&mut out, &l1(name));
        }

        assert_eq!(out.len() as u32, ksnid_off);
        for off in &ksnid_record_offsets {
            push_u32(&mut out, *off);
        }
        for (record, off) in ksnid_list.iter().zip(&ksnid_record_offsets) {
            assert_eq!(out.len() as u32, *off);
            push_lpstr(&mut out, record.as_bytes());
        }
        assert_eq!(out.len() as u32, cursor);

        out
    }
}

// Plain byte-wise trie; suffix sharing is an optimisation of the offline
// builder the reader never depends on.
#[derive(Default)]
struct DNode {
    end_of_word: bool,
    children: BTreeMap<u8, DNode>,
}

fn d_emit(children: &BTreeMap<u8, DNode>, nodes: &mut Vec<u32>) -> u32 {
    let start = nodes.len() as u32;
    nodes.resize(nodes.len() + children.len(), 0);
    for (i, (&letter, child)) in children.iter().enumerate() {
        let child_start = if child.children.is_empty() {
            0
        } else {
            d_emit(&child.children, nodes)
        };
        let mut word = (child_start << 8) | u32::from(letter);
        if child.end_of_word {
            word |= DAWG_EOW;
        }
        if i == children.len() - 1 {
            word |= DAWG_EOL;
        }
        nodes[start as usize + i] = word;
    }
    start
}

/// Packs `words` into a word-graph file.
pub fn build_dawg(words: &[&str]) -> Vec<u8> {
    assert!(!words.is_empty());
    let mut root = DNode::default();
    for word in words {
        let mut node = &mut root;
        for b in l1(word) {
            node = node.children.entry(b).or_default();
        }
        node.end_of_word = true;
    }

    let mut nodes: Vec<u32> = vec![0]; // node 0 is the reserved filler
    let root_index = d_emit(&root.children, &mut nodes);

    let mut out = Vec::with_capacity(16 + nodes.len() * 4);
    out.extend_from_slice(DAWG_MAGIC);
    push_u32(&mut out, DAWG_VERSION);
    push_u32(&mut out, nodes.len() as u32);
    push_u32(&mut out, root_index);
    for node in nodes {
        push_u32(&mut out, node);
    }
    out
}

/// The curated scenario lexicon. Entry order is load-bearing: it fixes the
/// per-form record order, the paradigm order of each template, and which
/// annotation strings land on the two single-word shortcut slots.
pub fn fixture_entries() -> Vec<Entry> {
    vec![
        // Street name with a non-default annotation on the headword; the
        // annotation takes shortcut slot 1.
        Entry {
            ksnid: Some("1;;;;V;1;;;"),
            ..entry("Laugavegur", "Laugavegur", 307632, "kk", "göt", "NFET")
        },
        entry("Laugavegi", "Laugavegur", 307632, "kk", "göt", "ÞGFET"),
        // One surface, three lemmas, four readings; the second neuter
        // reading packs compact behind the first.
        entry("færi", "fara", 433568, "so", "alm", "GM-VH-ÞT-1P-ET"),
        entry("færi", "fær", 448392, "lo", "alm", "FVB-KK-NFET"),
        entry("færi", "færi", 1198, "hk", "alm", "NFET"),
        Entry {
            ksnid: Some("4;;;;K;4;;;"),
            ..entry("færi", "færi", 1198, "hk", "alm", "ÞGFET")
        },
        entry("þýsk", "þýskur", 50432, "lo", "alm", "FSB-KVK-NFET"),
        entry("þýsk", "þýskur", 50432, "lo", "alm", "FSB-HK-NFFT"),
        // Stapler paradigm for the variant scenarios.
        entry("heftari", "heftari", 7958, "kk", "alm", "NFET"),
        entry("heftara", "heftari", 7958, "kk", "alm", "ÞFET"),
        entry("heftaranum", "heftari", 7958, "kk", "alm", "ÞGFETgr"),
        entry("heftarar", "heftari", 7958, "kk", "alm", "NFFT"),
        // Annotated plural with the article; a fresh lemma after an
        // annotation index above the shortcuts packs as a double record.
        Entry {
            ksnid: Some("4;URE;;;V;4;;;"),
            ..entry("heftararnir", "heftari", 7958, "kk", "alm", "NFFTgr")
        },
        entry("kjóll", "kjóll", 4879, "kk", "alm", "NFET"),
        entry("kjólanna", "kjóll", 4879, "kk", "alm", "EFFTgr"),
        // A complete one-letter word, also present in the suffix graph.
        entry("á", "á", 150, "kvk", "alm", "NFET"),
        entry("laga", "lag", 9045, "hk", "alm", "EFFT"),
        entry("laga", "laga", 20847, "so", "alm", "GM-NH"),
        entry("laga", "lagi", 5218, "kk", "alm", "ÞFET"),
        // Duplicate record: the engine must collapse it.
        entry("gata", "gata", 2006, "kvk", "alm", "NFET"),
        entry("gata", "gata", 2006, "kvk", "alm", "NFET"),
    ]
}

pub fn fixture_image() -> Vec<u8> {
    ImageBuilder::new().entries(&fixture_entries()).build()
}

pub fn fixture_prefix_dawg() -> Vec<u8> {
    build_dawg(&["síams", "síamskattar", "hunda", "gatna"])
}

pub fn fixture_suffix_dawg() -> Vec<u8> {
    // "á" (the river) is a complete one-letter word; it exists so tests can
    // pin down that one-letter suffixes never count as compound heads.
    build_dawg(&["kjólanna", "kjóll", "heftari", "gata", "á"])
}

/// A fresh engine over the scenario lexicon with both word graphs.
pub fn fixture_engine(options: LookupOptions) -> Ordabok {
    Ordabok::from_bytes_with_dawgs(
        fixture_image(),
        fixture_prefix_dawg(),
        fixture_suffix_dawg(),
        options,
    )
    .unwrap()
}

/// A shared default-options engine for tests that only read.
pub fn shared_engine() -> &'static Ordabok {
    static ENGINE: OnceLock<Ordabok> = OnceLock::new();
    ENGINE.get_or_init(|| fixture_engine(LookupOptions::default()))
}

/// A small lexicon with dense lemma ids, for tests that rebuild or mutate
/// whole images.
pub fn small_entries() -> Vec<Entry> {
    vec![
        entry("armur", "armur", 1, "kk", "alm", "NFET"),
        entry("armi", "armur", 1, "kk", "alm", "ÞGFET"),
        entry("arma", "armur", 1, "kk", "alm", "ÞFFT"),
        entry("borð", "borð", 2, "hk", "alm", "NFET"),
        entry("borði", "borð", 2, "hk", "alm", "ÞGFET"),
        entry("fara", "fara", 3, "so", "alm", "GM-NH"),
    ]
}
