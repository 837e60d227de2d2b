//! PHP parsing and name resolution for php-insight.
//!
//! Wraps tree-sitter-php for incremental parsing, extracts symbols, imports
//! and namespace spans from the CST, and resolves names against them.

pub mod file_resolver;
pub mod parser;
pub mod phpdoc;
pub mod resolve;
pub mod symbols;
pub mod type_resolver;

pub use file_resolver::{FileTypeResolver, ImportTableProvider, NamespaceSpanLookup};
pub use type_resolver::{PresenceIndicator, ResolveError};
