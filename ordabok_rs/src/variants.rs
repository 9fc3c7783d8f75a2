//! The variant engine: given a seed surface form, enumerate the other
//! inflected forms of the same lemma that match a set of requested
//! grammatical features.
//!
//! The seed resolves to candidate entries through the ordinary lookup
//! pipeline; each candidate's lemma contributes its paradigm forms, and
//! every form re-enters the lookup path so the returned entries carry their
//! own tags and annotations. Requirements are tag substrings, with the one
//! special token `nogr` demanding a tag without the attached article.

use foldhash::{HashSet, HashSetExt};

use crate::entry::KsnidEntry;
use crate::ordabok::Ordabok;

pub(crate) fn lookup_variants(
    engine: &Ordabok,
    word: &str,
    cat: &str,
    to_inflection: &[&str],
    lemma: Option<&str>,
    lemma_id: Option<u32>,
    inflection_filter: Option<&dyn Fn(&str) -> bool>,
) -> Vec<KsnidEntry> {
    let (_, candidates) = engine.lookup_ksnid(word, false, false);

    let mut out = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut expanded: HashSet<(u32, String)> = HashSet::new();

    for candidate in candidates {
        if !cat_matches(cat, &candidate.word_class) {
            continue;
        }
        if lemma.is_some_and(|l| l != candidate.lemma) {
            continue;
        }
        if lemma_id.is_some_and(|id| id != candidate.lemma_id) {
            continue;
        }
        // Several candidate entries of one word usually share a lemma;
        // expand each (lemma, class) paradigm once.
        if !expanded.insert((candidate.lemma_id, candidate.word_class.clone())) {
            continue;
        }

        for form in engine.paradigm_forms(candidate.lemma_id) {
            for entry in engine.entries_for_form(&form) {
                if entry.lemma_id != candidate.lemma_id
                    || entry.lemma != candidate.lemma
                    || entry.word_class != candidate.word_class
                {
                    continue;
                }
                if !requirements_match(to_inflection, &entry.tag) {
                    continue;
                }
                if inflection_filter.is_some_and(|filter| !filter(&entry.tag)) {
                    continue;
                }
                if seen.insert((entry.surface.clone(), entry.tag.clone())) {
                    out.push(entry);
                }
            }
        }
    }
    out
}

/// `cat` selects a word class; the placeholder `"no"` matches any of the
/// three noun genders.
fn cat_matches(cat: &str, word_class: &str) -> bool {
    if cat == "no" {
        matches!(word_class, "kk" | "kvk" | "hk")
    } else {
        cat == word_class
    }
}

fn requirements_match(to_inflection: &[&str], tag: &str) -> bool {
    to_inflection.iter().all(|requirement| {
        if *requirement == "nogr" {
            !tag.contains("gr")
        } else {
            tag.contains(requirement)
        }
    })
}
