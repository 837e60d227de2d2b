//! Fuzzy ranking decorator.

use crate::matcher::{ApproximateStringMatcher, WeightedLevenshteinMatcher};
use crate::prefix::PrefixDeterminer;
use crate::provider::{CompletionError, CompletionProvider, CompletionRequest};
use crate::ranking::BestStringApproximationDeterminer;
use crate::suggestion::CompletionSuggestion;

/// Ranks the delegate's suggestions by how well their filter text matches
/// the prefix being typed, dropping those that do not match at all.
///
/// The prefix is the request's hint when it has one, otherwise whatever the
/// [`PrefixDeterminer`] finds before the cursor. With an empty prefix the
/// delegate's output is returned as is.
pub struct FuzzyMatchingProvider<P, M = WeightedLevenshteinMatcher> {
    delegate: P,
    prefixes: PrefixDeterminer,
    ranking: BestStringApproximationDeterminer<M>,
}

impl<P: CompletionProvider> FuzzyMatchingProvider<P> {
    pub fn new(delegate: P, prefixes: PrefixDeterminer) -> Self {
        Self::with_matcher(delegate, prefixes, WeightedLevenshteinMatcher)
    }
}

impl<P: CompletionProvider, M: ApproximateStringMatcher> FuzzyMatchingProvider<P, M> {
    pub fn with_matcher(delegate: P, prefixes: PrefixDeterminer, matcher: M) -> Self {
        Self {
            delegate,
            prefixes,
            ranking: BestStringApproximationDeterminer::new(matcher),
        }
    }
}

impl<P: CompletionProvider, M: ApproximateStringMatcher> CompletionProvider
    for FuzzyMatchingProvider<P, M>
{
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError> {
        let suggestions = self.delegate.provide(request)?;

        let prefix = match request.prefix() {
            Some(hint) => hint,
            None => self.prefixes.determine(request.source(), request.offset()),
        };
        if prefix.is_empty() {
            return Ok(suggestions);
        }

        Ok(self
            .ranking
            .determine(suggestions, prefix, |s| s.filter_text(), None))
    }
}
