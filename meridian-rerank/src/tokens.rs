//! Token estimation for prompt budgeting and the cost decision.
//!
//! Wraps tiktoken's `cl100k_base` with content-hash caching. If the encoder
//! cannot be constructed, a script-aware heuristic stands in: CJK characters
//! dominate token cost, ASCII words sit near one token each.

use std::sync::Arc;

use moka::sync::Cache;
use tiktoken_rs::CoreBPE;
use tracing::warn;

pub struct TokenEstimator {
    bpe: Option<Arc<CoreBPE>>,
    cache: Cache<String, usize>,
}

impl TokenEstimator {
    pub fn new(cache_capacity: u64) -> Self {
        let bpe = match tiktoken_rs::cl100k_base() {
            Ok(bpe) => Some(Arc::new(bpe)),
            Err(e) => {
                warn!(error = %e, "cl100k_base unavailable, using heuristic estimation");
                None
            }
        };
        Self {
            bpe,
            cache: Cache::new(cache_capacity),
        }
    }

    /// Count tokens in the given text (uncached).
    pub fn count(&self, text: &str) -> usize {
        match &self.bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => heuristic_count(text),
        }
    }

    /// Count tokens with content-hash caching.
    pub fn count_cached(&self, text: &str) -> usize {
        let hash = blake3::hash(text.as_bytes()).to_hex().to_string();
        self.cache.get_with(hash, || self.count(text))
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Heuristic token estimate when no encoder is available.
fn heuristic_count(text: &str) -> usize {
    let mut cjk = 0usize;
    let mut punctuation = 0usize;
    let mut spaces = 0usize;
    let mut words = 0usize;
    let mut digits = 0usize;
    let mut in_word = false;
    let mut in_digits = false;

    for c in text.chars() {
        let is_cjk = ('\u{4e00}'..='\u{9fff}').contains(&c);
        if is_cjk {
            cjk += 1;
        }
        if c.is_whitespace() {
            spaces += 1;
        } else if !is_cjk && !c.is_alphanumeric() {
            punctuation += 1;
        }

        let alpha = c.is_ascii_alphabetic();
        if alpha && !in_word {
            words += 1;
        }
        in_word = alpha;

        let digit = c.is_ascii_digit();
        if digit && !in_digits {
            digits += 1;
        }
        in_digits = digit;
    }

    let estimate = cjk as f64 * 2.3
        + words as f64 * 1.3
        + digits as f64 * 0.8
        + punctuation as f64 * 0.5
        + spaces as f64 * 0.1;
    estimate as usize
}
