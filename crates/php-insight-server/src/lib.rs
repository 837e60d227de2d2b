//! php-insight language server.
//!
//! Ranked PHP completion and hover over LSP, backed by the php-insight
//! parser, index and completion crates.

pub mod server;

pub use server::PhpInsightBackend;
