//! Completion engine for php-insight.
//!
//! Detects the completion context, collects candidates from the workspace
//! index and ranks them by approximate matching against the typed prefix:
//!
//! ```text
//! LimitingProvider(FuzzyMatchingProvider(IndexCompletionProvider))
//! ```

pub mod config;
pub mod context;
pub mod fuzzy;
pub mod limiting;
pub mod matcher;
pub mod prefix;
pub mod provider;
pub mod ranking;
pub mod suggestion;

pub use config::{CompletionConfig, ConfigError};
pub use context::{detect_context, CompletionContext};
pub use fuzzy::FuzzyMatchingProvider;
pub use limiting::LimitingProvider;
pub use matcher::{ApproximateStringMatcher, WeightedLevenshteinMatcher};
pub use prefix::{BoundaryTokenRetriever, PrefixDeterminer};
pub use provider::{CompletionError, CompletionProvider, CompletionRequest, IndexCompletionProvider};
pub use ranking::BestStringApproximationDeterminer;
pub use suggestion::{CompletionSuggestion, SuggestionKind};
