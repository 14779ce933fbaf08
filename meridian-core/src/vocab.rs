//! Dynamic vocabulary: a concurrency-safe term dictionary plus a reference
//! tokenizer.
//!
//! The dictionary grows at runtime (`add_term`) and is shared across every
//! concurrent retrieval; `DashMap` gives lock-striped access without a
//! global mutex. Tokenization is deterministic for a fixed dictionary state.

use dashmap::DashMap;

use crate::traits::ITokenizer;

/// Concurrency-safe term dictionary.
#[derive(Default)]
pub struct TermDictionary {
    terms: DashMap<String, ()>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dict = Self::new();
        for term in terms {
            dict.add(term.as_ref());
        }
        dict
    }

    /// Insert a term. Single-character terms are rejected; they add noise,
    /// never signal.
    pub fn add(&self, term: &str) {
        let normalized = term.trim().to_lowercase();
        if normalized.chars().count() >= 2 {
            self.terms.insert(normalized, ());
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(&term.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Words carrying no retrieval signal in clinical query text.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "of", "on", "or", "that", "the", "this", "to", "was", "with", "year", "years", "old",
    "patient", "patients", "history", "presenting", "complaint",
];

/// Dictionary-aware tokenizer.
///
/// Greedy longest-phrase matching against the dictionary (up to four words),
/// then plain word splitting with stop-word filtering. Dictionary phrases
/// sort ahead of loose words, longer words ahead of shorter: the order the
/// downstream fuzzy matcher wants its LIKE conditions in.
pub struct SimpleTokenizer {
    dictionary: TermDictionary,
}

/// Longest dictionary phrase considered, in words.
const MAX_PHRASE_WORDS: usize = 4;

impl SimpleTokenizer {
    pub fn new(dictionary: TermDictionary) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &TermDictionary {
        &self.dictionary
    }

    fn words(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ITokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let words = Self::words(text);
        let mut phrases: Vec<String> = Vec::new();
        let mut loose: Vec<String> = Vec::new();

        let mut i = 0;
        while i < words.len() {
            let mut matched = 0;
            // Longest dictionary phrase starting at i wins.
            for len in (1..=MAX_PHRASE_WORDS.min(words.len() - i)).rev() {
                let phrase = words[i..i + len].join(" ");
                if self.dictionary.contains(&phrase) {
                    phrases.push(phrase);
                    matched = len;
                    break;
                }
            }
            if matched > 0 {
                i += matched;
            } else {
                let word = &words[i];
                if word.len() >= 2 && !STOP_WORDS.contains(&word.as_str()) {
                    loose.push(word.clone());
                }
                i += 1;
            }
        }

        loose.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut seen = std::collections::HashSet::new();
        phrases
            .into_iter()
            .chain(loose)
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    fn add_term(&self, term: &str) {
        self.dictionary.add(term);
    }

    fn contains_term(&self, term: &str) -> bool {
        self.dictionary.contains(term)
    }
}
