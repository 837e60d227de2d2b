//! Prefix detection: the word being typed before the cursor.

use std::collections::HashSet;

use php_insight_types::NAMESPACE_SEPARATOR;

/// Source of the characters that end a prefix.
pub trait BoundaryTokenRetriever {
    fn retrieve(&self) -> HashSet<char>;
}

/// Whitespace and PHP punctuation. `$` and `_` are word characters so that
/// variables and snake_case names are captured whole.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBoundaryTokens;

const DEFAULT_BOUNDARY_TOKENS: &[char] = &[
    ' ', '\t', '\r', '\n', '(', ')', '[', ']', '{', '}', '<', '>', ',', ';', ':', '.', '=', '+',
    '-', '*', '/', '%', '!', '?', '&', '|', '^', '~', '@', '#', '"', '\'', '`',
];

impl BoundaryTokenRetriever for DefaultBoundaryTokens {
    fn retrieve(&self) -> HashSet<char> {
        DEFAULT_BOUNDARY_TOKENS.iter().copied().collect()
    }
}

/// A fixed, configured set of boundary tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticBoundaryTokens(HashSet<char>);

impl StaticBoundaryTokens {
    pub fn new(tokens: impl IntoIterator<Item = char>) -> Self {
        Self(tokens.into_iter().collect())
    }
}

impl BoundaryTokenRetriever for StaticBoundaryTokens {
    fn retrieve(&self) -> HashSet<char> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct PrefixDeterminer {
    boundaries: HashSet<char>,
}

impl PrefixDeterminer {
    pub fn new<R: BoundaryTokenRetriever + ?Sized>(retriever: &R) -> Self {
        let mut boundaries = retriever.retrieve();
        // Qualified names are one word.
        boundaries.remove(&NAMESPACE_SEPARATOR);
        Self { boundaries }
    }

    /// The text between the last boundary (or line start) and `offset`.
    ///
    /// `offset` is a byte offset; it is clamped to `text` and moved back onto
    /// a character boundary.
    pub fn determine<'t>(&self, text: &'t str, offset: usize) -> &'t str {
        let mut end = offset.min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let before = &text[..end];
        let start = before
            .char_indices()
            .rev()
            .find(|&(_, c)| c == '\n' || self.boundaries.contains(&c))
            .map_or(0, |(i, c)| i + c.len_utf8());
        &before[start..]
    }
}

impl Default for PrefixDeterminer {
    fn default() -> Self {
        Self::new(&DefaultBoundaryTokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_zero_is_empty() {
        assert_eq!(PrefixDeterminer::default().determine("hello", 0), "");
    }

    #[test]
    fn test_whole_text_without_boundaries() {
        assert_eq!(PrefixDeterminer::default().determine("hello", 5), "hello");
    }

    #[test]
    fn test_stops_at_configured_boundary() {
        let determiner = PrefixDeterminer::new(&StaticBoundaryTokens::new(['+']));
        assert_eq!(determiner.determine("hel+lo", 6), "lo");
        assert_eq!(determiner.determine("hel+lo", 4), "");
        assert_eq!(determiner.determine("hel lo", 6), "hel lo");
    }

    #[test]
    fn test_namespace_separator_is_never_a_boundary() {
        let determiner = PrefixDeterminer::new(&StaticBoundaryTokens::new(['\\', ' ']));
        assert_eq!(determiner.determine("hel\\lo", 6), "hel\\lo");
        assert_eq!(
            PrefixDeterminer::default().determine("new App\\Mod", 11),
            "App\\Mod"
        );
    }

    #[test]
    fn test_stops_at_line_start() {
        let determiner = PrefixDeterminer::new(&StaticBoundaryTokens::new([]));
        assert_eq!(determiner.determine("first\nsecond", 9), "sec");
    }

    #[test]
    fn test_default_tokens_keep_variables_and_snake_case() {
        let determiner = PrefixDeterminer::default();
        assert_eq!(determiner.determine("echo $user_na", 13), "$user_na");
        assert_eq!(determiner.determine("$this->getNa", 12), "getNa");
        assert_eq!(determiner.determine("Foo::BA", 7), "BA");
    }

    #[test]
    fn test_offset_is_clamped() {
        let determiner = PrefixDeterminer::default();
        assert_eq!(determiner.determine("abc", 99), "abc");
        // Byte 2 lies inside 'é'.
        assert_eq!(determiner.determine("aé", 2), "a");
    }
}
