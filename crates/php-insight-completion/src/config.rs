//! Completion settings from the client's `initializationOptions`.
//!
//! ```json
//! { "completion": { "maxResults": 100, "boundaryTokens": [" ", "(", ";"] } }
//! ```
//!
//! Every field is optional. Invalid settings are rejected as a whole.

use serde::Deserialize;
use thiserror::Error;

use crate::prefix::{BoundaryTokenRetriever, DefaultBoundaryTokens, StaticBoundaryTokens};
use php_insight_types::NAMESPACE_SEPARATOR;

pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid completion settings: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("completion.maxResults must be at least 1")]
    ZeroLimit,
    #[error("completion.boundaryTokens entries must be single characters, got {0:?}")]
    MultiCharToken(String),
    #[error("the namespace separator `\\` cannot be a completion boundary token")]
    NamespaceSeparatorBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CompletionConfig {
    pub max_results: usize,
    pub boundary_tokens: Option<Vec<String>>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            boundary_tokens: None,
        }
    }
}

impl CompletionConfig {
    /// Read the `completion` section of `initializationOptions`. A missing
    /// or `null` section yields the defaults.
    pub fn from_initialization_options(
        options: Option<&serde_json::Value>,
    ) -> Result<Self, ConfigError> {
        let section = options
            .and_then(|o| o.get("completion"))
            .filter(|section| !section.is_null());
        let config = match section {
            Some(section) => CompletionConfig::deserialize(section)?,
            None => CompletionConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_results == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        for token in self.boundary_tokens.iter().flatten() {
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(NAMESPACE_SEPARATOR), None) => {
                    return Err(ConfigError::NamespaceSeparatorBoundary)
                }
                (Some(_), None) => {}
                _ => return Err(ConfigError::MultiCharToken(token.clone())),
            }
        }
        Ok(())
    }

    /// The configured boundary tokens, or the defaults.
    pub fn boundary_tokens(&self) -> Box<dyn BoundaryTokenRetriever + Send + Sync> {
        match &self.boundary_tokens {
            Some(tokens) => Box::new(StaticBoundaryTokens::new(
                tokens.iter().filter_map(|t| t.chars().next()),
            )),
            None => Box::new(DefaultBoundaryTokens),
        }
    }
}
