/// Domain-term-aware tokenizer / keyword extractor.
///
/// Deterministic given the same dictionary state. The dictionary grows at
/// runtime through [`ITokenizer::add_term`]; implementations must make that
/// safe under concurrent readers.
pub trait ITokenizer: Send + Sync {
    /// Tokenize text into an ordered keyword list.
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Add a term to the dictionary so later calls recognize it as a unit.
    fn add_term(&self, term: &str);

    /// Whether the dictionary already contains the term.
    fn contains_term(&self, term: &str) -> bool;
}
