//! Tokenizers for text fields.

/// Splits text field values into index terms.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, input: &str) -> Vec<String>;
}

/// Splits on single spaces and drops empty fragments.
///
/// Tags are joined with spaces when documents are built, and a tag may
/// contain characters a word tokenizer would split on (`pageId_12`,
/// `tx_news-3`), so nothing but the space is treated as a separator and no
/// case folding happens.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSpaceTokenizer;

impl Tokenizer for SingleSpaceTokenizer {
    fn tokenize(&self, input: &str) -> Vec<String> {
        input
            .split(' ')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string)
            .collect()
    }
}
