//! Symbol index for php-insight.
//!
//! Holds the workspace-wide symbol tables and exposes the import-table and
//! presence capabilities name resolution relies on.

pub mod workspace;

pub use workspace::WorkspaceIndex;
