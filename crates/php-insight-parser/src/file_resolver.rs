//! File-scoped name resolution.
//!
//! A [`FileTypeResolver`] is built from one snapshot of a file's namespace
//! spans and imports and answers resolve/localize queries by line. It is
//! never updated in place; callers build a new one when the file changes.

use php_insight_types::{FileSymbols, NamespaceSpan, TypeInfo, UseKind, UseStatement};

use crate::type_resolver::{self, is_builtin_type_name, PresenceIndicator, ResolveError};

/// Finds the namespace governing a line.
pub trait NamespaceSpanLookup {
    fn namespace_for_line(&self, line: u32) -> Option<&NamespaceSpan>;
}

impl NamespaceSpanLookup for FileSymbols {
    fn namespace_for_line(&self, line: u32) -> Option<&NamespaceSpan> {
        self.namespace_at(line)
    }
}

/// Source of per-file import tables and namespace spans.
pub trait ImportTableProvider {
    fn imports_for_file(&self, uri: &str) -> Vec<UseStatement>;

    fn namespaces_for_file(&self, uri: &str) -> Vec<NamespaceSpan>;
}

#[derive(Debug, Clone, Default)]
pub struct FileTypeResolver {
    spans: Vec<NamespaceSpan>,
    imports: Vec<UseStatement>,
}

impl FileTypeResolver {
    pub fn new(mut spans: Vec<NamespaceSpan>, mut imports: Vec<UseStatement>) -> Self {
        spans.sort_by_key(|s| s.start_line);
        imports.sort_by_key(|i| i.line());
        Self { spans, imports }
    }

    pub fn from_file_symbols(file: &FileSymbols) -> Self {
        Self::new(file.namespaces.clone(), file.use_statements.clone())
    }

    /// Build a resolver for a file known to `provider`.
    pub fn for_file<P: ImportTableProvider + ?Sized>(uri: &str, provider: &P) -> Self {
        Self::new(
            provider.namespaces_for_file(uri),
            provider.imports_for_file(uri),
        )
    }

    /// Namespace name at `line`; `None` for the global namespace.
    pub fn namespace_name(&self, line: u32) -> Option<&str> {
        self.namespace_for_line(line)
            .and_then(|span| span.name.as_deref())
    }

    /// Imports in effect at `line`: those declared at or before it inside the
    /// same namespace span.
    pub fn relevant_imports(&self, line: u32) -> impl Iterator<Item = &UseStatement> + '_ {
        let span = self.namespace_for_line(line);
        let start = span.map_or(0, |s| s.start_line);
        let spanless = self.spans.is_empty();
        self.imports.iter().filter(move |import| {
            let import_line = import.line();
            import_line <= line && (spanless || (span.is_some() && import_line >= start))
        })
    }

    pub fn resolve(
        &self,
        name: &str,
        line: u32,
        kind: UseKind,
    ) -> Result<Option<String>, ResolveError> {
        type_resolver::resolve(
            name,
            self.namespace_name(line),
            self.relevant_imports(line),
            kind,
        )
    }

    pub fn resolve_with_presence<P: PresenceIndicator + ?Sized>(
        &self,
        name: &str,
        line: u32,
        kind: UseKind,
        presence: &P,
    ) -> Result<Option<String>, ResolveError> {
        type_resolver::resolve_with_fallback(
            name,
            self.namespace_name(line),
            self.relevant_imports(line),
            kind,
            presence,
        )
    }

    /// Shortest spelling of `fqn` valid at `line`.
    pub fn localize<P: PresenceIndicator + ?Sized>(
        &self,
        fqn: &str,
        line: u32,
        kind: UseKind,
        presence: &P,
    ) -> Result<String, ResolveError> {
        type_resolver::localize(
            fqn,
            self.namespace_name(line),
            self.relevant_imports(line),
            kind,
            presence,
        )
    }

    /// Render a declared type with class names resolved to rooted FQNs.
    pub fn resolve_type_label(&self, type_info: &TypeInfo, line: u32) -> String {
        match type_info {
            TypeInfo::Simple(name) if !is_builtin_type_name(name) => {
                match self.resolve(name, line, UseKind::Class) {
                    Ok(Some(resolved)) => resolved,
                    _ => name.clone(),
                }
            }
            TypeInfo::Union(types) => self.join_type_labels(types, line, "|"),
            TypeInfo::Intersection(types) => self.join_type_labels(types, line, "&"),
            TypeInfo::Nullable(inner) => format!("?{}", self.resolve_type_label(inner, line)),
            other => other.to_string(),
        }
    }

    fn join_type_labels(&self, types: &[TypeInfo], line: u32, separator: &str) -> String {
        types
            .iter()
            .map(|t| self.resolve_type_label(t, line))
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl NamespaceSpanLookup for FileTypeResolver {
    fn namespace_for_line(&self, line: u32) -> Option<&NamespaceSpan> {
        self.spans.iter().find(|span| span.contains(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_namespaces() -> FileTypeResolver {
        FileTypeResolver::new(
            vec![
                NamespaceSpan::new(None, 0, 0),
                NamespaceSpan::new(Some("A"), 1, 20),
                NamespaceSpan::new(Some("B"), 21, 40),
            ],
            vec![UseStatement::new("X\\Y", Some("Alias".into()), UseKind::Class, 10)],
        )
    }

    #[test]
    fn test_import_applies_after_its_line() {
        let resolver = two_namespaces();
        assert_eq!(resolver.relevant_imports(15).count(), 1);
        assert_eq!(
            resolver.resolve("Alias", 15, UseKind::Class).unwrap().as_deref(),
            Some("\\X\\Y")
        );
    }

    #[test]
    fn test_import_not_in_effect_before_its_line() {
        let resolver = two_namespaces();
        assert_eq!(resolver.relevant_imports(5).count(), 0);
        assert_eq!(
            resolver.resolve("Alias", 5, UseKind::Class).unwrap().as_deref(),
            Some("\\A\\Alias")
        );
    }

    #[test]
    fn test_import_not_in_effect_in_another_namespace() {
        let resolver = two_namespaces();
        assert_eq!(resolver.relevant_imports(25).count(), 0);
        assert_eq!(
            resolver.resolve("Alias", 25, UseKind::Class).unwrap().as_deref(),
            Some("\\B\\Alias")
        );
    }

    #[test]
    fn test_without_spans_all_earlier_imports_apply() {
        let resolver = FileTypeResolver::new(
            Vec::new(),
            vec![UseStatement::new("X\\Y", None, UseKind::Class, 2)],
        );
        assert_eq!(resolver.relevant_imports(1).count(), 0);
        assert_eq!(
            resolver.resolve("Y", 3, UseKind::Class).unwrap().as_deref(),
            Some("\\X\\Y")
        );
    }

    #[test]
    fn test_namespace_for_line() {
        let resolver = two_namespaces();
        assert_eq!(resolver.namespace_name(0), None);
        assert_eq!(resolver.namespace_name(1), Some("A"));
        assert_eq!(resolver.namespace_name(40), Some("B"));
        assert!(resolver.namespace_for_line(41).is_none());
    }

    struct Globals;

    impl PresenceIndicator for Globals {
        fn is_function_present(&self, fqn: &str) -> bool {
            fqn == "\\strlen"
        }

        fn is_constant_present(&self, fqn: &str) -> bool {
            fqn == "\\B\\LIMIT"
        }
    }

    #[test]
    fn test_resolve_with_presence() {
        let resolver = two_namespaces();
        assert_eq!(
            resolver
                .resolve_with_presence("strlen", 5, UseKind::Function, &Globals)
                .unwrap()
                .as_deref(),
            Some("\\strlen")
        );
        assert_eq!(
            resolver
                .resolve_with_presence("LIMIT", 30, UseKind::Constant, &Globals)
                .unwrap()
                .as_deref(),
            Some("\\B\\LIMIT")
        );
        assert!(resolver
            .resolve_with_presence("LIMIT", 5, UseKind::Constant, &Globals)
            .is_err());
    }

    #[test]
    fn test_localize_by_line() {
        let resolver = two_namespaces();
        assert_eq!(
            resolver.localize("\\X\\Y", 15, UseKind::Class, &Globals).unwrap(),
            "Alias"
        );
        assert_eq!(
            resolver.localize("\\X\\Y", 5, UseKind::Class, &Globals).unwrap(),
            "\\X\\Y"
        );
        assert_eq!(
            resolver.localize("\\A\\Model", 5, UseKind::Class, &Globals).unwrap(),
            "Model"
        );
    }

    #[test]
    fn test_resolve_type_label() {
        let resolver = two_namespaces();
        let ty = TypeInfo::Nullable(Box::new(TypeInfo::Union(vec![
            TypeInfo::Simple("Alias".into()),
            TypeInfo::Simple("int".into()),
        ])));
        assert_eq!(resolver.resolve_type_label(&ty, 15), "?\\X\\Y|int");
    }

    #[test]
    fn test_imports_stay_with_their_namespace_on_a_shared_line() {
        let code = "<?php namespace A; use X\\Y; namespace B; new Y;\n";
        let mut parser = crate::parser::FileParser::new();
        parser.parse_full(code);
        let tree = parser.tree().unwrap();
        let file = crate::symbols::extract_file_symbols(tree, code, "file:///shared.php");

        let resolver = FileTypeResolver::from_file_symbols(&file);
        assert_eq!(
            resolver.resolve("Y", 0, UseKind::Class).unwrap().as_deref(),
            Some("\\B\\Y")
        );
    }
}
