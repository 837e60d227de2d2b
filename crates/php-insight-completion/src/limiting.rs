//! Result-count cap.

use crate::provider::{CompletionError, CompletionProvider, CompletionRequest};
use crate::suggestion::CompletionSuggestion;

/// Keeps at most `limit` of the delegate's suggestions, in their order.
pub struct LimitingProvider<P> {
    delegate: P,
    limit: usize,
}

impl<P: CompletionProvider> LimitingProvider<P> {
    pub fn new(delegate: P, limit: usize) -> Self {
        Self { delegate, limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl<P: CompletionProvider> CompletionProvider for LimitingProvider<P> {
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError> {
        let mut suggestions = self.delegate.provide(request)?;
        suggestions.truncate(self.limit);
        Ok(suggestions)
    }
}
