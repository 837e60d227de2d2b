//! Name resolution against a namespace and an import table.
//!
//! `resolve` turns a name as written in source (relative, aliased or fully
//! qualified) into a rooted fully qualified name. `localize` goes the other
//! way and finds the shortest spelling of a fully qualified name that still
//! resolves back to it from a given namespace.
//!
//! PHP resolves unqualified function and constant names at runtime: the
//! current namespace first, then the global one. Without knowing which of
//! them exists such names cannot be resolved statically, so `resolve` reports
//! [`ResolveError::ResolutionImpossible`] and `resolve_with_fallback` asks a
//! [`PresenceIndicator`] to settle it.

use php_insight_types::{UseKind, UseStatement, NAMESPACE_SEPARATOR};
use thiserror::Error;

/// Names that are types on their own and never resolve against a namespace.
const BUILTIN_TYPE_NAMES: &[&str] = &[
    "self", "static", "parent", "int", "float", "string", "bool", "array", "object", "null",
    "void", "never", "mixed", "callable", "iterable", "true", "false", "resource", "integer",
    "boolean", "double",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unqualified {kind} `{name}` may refer to the current namespace or the global one")]
    ResolutionImpossible {
        name: String,
        kind: UseKind,
        namespace: Option<String>,
    },
}

/// Answers whether a function or constant exists, by rooted FQN.
pub trait PresenceIndicator {
    fn is_function_present(&self, fqn: &str) -> bool;
    fn is_constant_present(&self, fqn: &str) -> bool;
}

impl<P: PresenceIndicator + ?Sized> PresenceIndicator for &P {
    fn is_function_present(&self, fqn: &str) -> bool {
        (**self).is_function_present(fqn)
    }

    fn is_constant_present(&self, fqn: &str) -> bool {
        (**self).is_constant_present(fqn)
    }
}

fn is_present<P: PresenceIndicator + ?Sized>(presence: &P, fqn: &str, kind: UseKind) -> bool {
    match kind {
        UseKind::Function => presence.is_function_present(fqn),
        UseKind::Constant => presence.is_constant_present(fqn),
        UseKind::Class => false,
    }
}

/// Whether `name` is a builtin type or a special class name such as `self`.
pub fn is_builtin_type_name(name: &str) -> bool {
    BUILTIN_TYPE_NAMES
        .iter()
        .any(|builtin| builtin.eq_ignore_ascii_case(name))
}

/// Resolve `name` to a rooted FQN.
///
/// Returns `Ok(None)` for an empty name. Unqualified names are matched against
/// imports of the same `kind`; qualified names match class imports on their
/// first segment.
pub fn resolve<'a, I>(
    name: &str,
    namespace: Option<&str>,
    imports: I,
    kind: UseKind,
) -> Result<Option<String>, ResolveError>
where
    I: IntoIterator<Item = &'a UseStatement>,
{
    if name.is_empty() {
        return Ok(None);
    }
    if name.starts_with(NAMESPACE_SEPARATOR) {
        return Ok(Some(name.to_string()));
    }

    let (first, rest) = match name.split_once(NAMESPACE_SEPARATOR) {
        Some((first, rest)) => (first, Some(rest)),
        None => (name, None),
    };
    let import_kind = if rest.is_some() { UseKind::Class } else { kind };

    let matching = imports.into_iter().find(|import| {
        import.kind == import_kind && names_equal(import.effective_alias(), first, import_kind)
    });
    if let Some(import) = matching {
        let mut resolved = rooted(&import.fqn);
        if let Some(rest) = rest {
            resolved.push(NAMESPACE_SEPARATOR);
            resolved.push_str(rest);
        }
        return Ok(Some(resolved));
    }

    if rest.is_none() && kind != UseKind::Class {
        return Err(ResolveError::ResolutionImpossible {
            name: name.to_string(),
            kind,
            namespace: non_empty(namespace).map(str::to_string),
        });
    }

    Ok(Some(qualify(namespace, name)))
}

/// Like [`resolve`], but settles unqualified function/constant names by
/// checking `\namespace\name` and then `\name` for presence.
pub fn resolve_with_fallback<'a, I, P>(
    name: &str,
    namespace: Option<&str>,
    imports: I,
    kind: UseKind,
    presence: &P,
) -> Result<Option<String>, ResolveError>
where
    I: IntoIterator<Item = &'a UseStatement>,
    P: PresenceIndicator + ?Sized,
{
    match resolve(name, namespace, imports, kind) {
        Err(err @ ResolveError::ResolutionImpossible { .. }) => {
            if let Some(ns) = non_empty(namespace) {
                let local = qualify(Some(ns), name);
                if is_present(presence, &local, kind) {
                    return Ok(Some(local));
                }
            }
            let global = qualify(None, name);
            if is_present(presence, &global, kind) {
                return Ok(Some(global));
            }
            Err(err)
        }
        other => other,
    }
}

/// Find the shortest spelling of `fqn` that resolves back to it from
/// `namespace` with the given imports. Falls back to the rooted FQN.
pub fn localize<'a, I, P>(
    fqn: &str,
    namespace: Option<&str>,
    imports: I,
    kind: UseKind,
    presence: &P,
) -> Result<String, ResolveError>
where
    I: IntoIterator<Item = &'a UseStatement>,
    P: PresenceIndicator + ?Sized,
{
    let imports: Vec<&UseStatement> = imports.into_iter().collect();
    let target = rooted(fqn);
    let bare = &target[1..];

    let mut candidates: Vec<String> = Vec::new();
    for import in &imports {
        let imported = import.fqn.trim_start_matches(NAMESPACE_SEPARATOR);
        if import.kind == kind && names_equal(imported, bare, kind) {
            candidates.push(import.effective_alias().to_string());
        } else if import.kind == UseKind::Class {
            if let Some(rest) = strip_namespace(bare, imported) {
                candidates.push(format!("{}\\{}", import.effective_alias(), rest));
            }
        }
    }
    match non_empty(namespace) {
        Some(ns) => {
            if let Some(relative) = strip_namespace(bare, ns) {
                candidates.push(relative.to_string());
            }
        }
        None => candidates.push(bare.to_string()),
    }
    if kind != UseKind::Class && !bare.contains(NAMESPACE_SEPARATOR) {
        candidates.push(bare.to_string());
    }

    candidates.sort_by_key(|c| c.len());
    candidates.dedup();

    // An unverifiable candidate is skipped; the error only surfaces when no
    // candidate could be checked at all.
    let mut unverified = None;
    let mut checked = false;
    for candidate in candidates {
        match resolve_with_fallback(&candidate, namespace, imports.iter().copied(), kind, presence)
        {
            Ok(resolved) => {
                if resolved.is_some_and(|r| names_equal(&r, &target, kind)) {
                    return Ok(candidate);
                }
                checked = true;
            }
            Err(err) => {
                unverified.get_or_insert(err);
            }
        }
    }

    match unverified {
        Some(err) if !checked => Err(err),
        _ => Ok(target),
    }
}

/// `name` with a single leading separator.
pub fn rooted(name: &str) -> String {
    format!("\\{}", name.trim_start_matches(NAMESPACE_SEPARATOR))
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match non_empty(namespace) {
        Some(ns) => format!("\\{}\\{}", ns.trim_matches(NAMESPACE_SEPARATOR), name),
        None => rooted(name),
    }
}

fn non_empty(namespace: Option<&str>) -> Option<&str> {
    namespace.filter(|ns| !ns.trim_matches(NAMESPACE_SEPARATOR).is_empty())
}

/// `name` relative to `prefix` when `name` lives strictly below it.
fn strip_namespace<'n>(name: &'n str, prefix: &str) -> Option<&'n str> {
    let prefix = prefix.trim_matches(NAMESPACE_SEPARATOR);
    if name.len() <= prefix.len() + 1 || !name.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, tail) = name.split_at(prefix.len());
    if head.eq_ignore_ascii_case(prefix) {
        tail.strip_prefix(NAMESPACE_SEPARATOR)
    } else {
        None
    }
}

/// Class and function names are case-insensitive in PHP, constants are not.
fn names_equal(a: &str, b: &str, kind: UseKind) -> bool {
    match kind {
        UseKind::Constant => a == b,
        UseKind::Class | UseKind::Function => a.eq_ignore_ascii_case(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Known {
        functions: HashSet<String>,
        constants: HashSet<String>,
    }

    impl Known {
        fn function(mut self, fqn: &str) -> Self {
            self.functions.insert(fqn.to_string());
            self
        }

        fn constant(mut self, fqn: &str) -> Self {
            self.constants.insert(fqn.to_string());
            self
        }
    }

    impl PresenceIndicator for Known {
        fn is_function_present(&self, fqn: &str) -> bool {
            self.functions.contains(fqn)
        }

        fn is_constant_present(&self, fqn: &str) -> bool {
            self.constants.contains(fqn)
        }
    }

    fn class_import(fqn: &str, alias: Option<&str>) -> UseStatement {
        UseStatement::new(fqn, alias.map(str::to_string), UseKind::Class, 1)
    }

    fn resolve_class(name: &str, namespace: Option<&str>, imports: &[UseStatement]) -> Option<String> {
        resolve(name, namespace, imports, UseKind::Class).unwrap()
    }

    #[test]
    fn test_empty_name_is_unresolvable() {
        assert_eq!(resolve_class("", Some("A"), &[]), None);
    }

    #[test]
    fn test_rooted_name_is_unchanged() {
        let imports = vec![class_import("X\\Y", Some("A"))];
        assert_eq!(
            resolve_class("\\A\\B", Some("N"), &imports).as_deref(),
            Some("\\A\\B")
        );
    }

    #[test]
    fn test_global_namespace() {
        assert_eq!(resolve_class("A", None, &[]).as_deref(), Some("\\A"));
    }

    #[test]
    fn test_relative_to_namespace() {
        assert_eq!(resolve_class("B", Some("A"), &[]).as_deref(), Some("\\A\\B"));
        assert_eq!(
            resolve_class("B\\C", Some("A"), &[]).as_deref(),
            Some("\\A\\B\\C")
        );
    }

    #[test]
    fn test_aliased_import() {
        let imports = vec![class_import("B\\C", Some("Alias"))];
        assert_eq!(
            resolve_class("Alias", Some("A"), &imports).as_deref(),
            Some("\\B\\C")
        );
        assert_eq!(
            resolve_class("Alias\\E", Some("A"), &imports).as_deref(),
            Some("\\B\\C\\E")
        );
    }

    #[test]
    fn test_unaliased_import_uses_last_segment() {
        let imports = vec![class_import("Vendor\\Http\\Client", None)];
        assert_eq!(
            resolve_class("Client", Some("App"), &imports).as_deref(),
            Some("\\Vendor\\Http\\Client")
        );
        assert_eq!(
            resolve_class("client", Some("App"), &imports).as_deref(),
            Some("\\Vendor\\Http\\Client")
        );
    }

    #[test]
    fn test_import_alias_must_match_whole_segment() {
        let imports = vec![class_import("B\\C", Some("Alias"))];
        assert_eq!(
            resolve_class("AliasExtra", Some("A"), &imports).as_deref(),
            Some("\\A\\AliasExtra")
        );
    }

    #[test]
    fn test_unqualified_constant_is_impossible() {
        let err = resolve("SOME_CONSTANT", None, &[], UseKind::Constant).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::ResolutionImpossible {
                kind: UseKind::Constant,
                ..
            }
        ));
    }

    #[test]
    fn test_unqualified_function_is_impossible() {
        assert!(resolve("some_function", None, &[], UseKind::Function).is_err());
        assert!(resolve("some_function", Some("App"), &[], UseKind::Function).is_err());
    }

    #[test]
    fn test_function_import() {
        let imports = vec![UseStatement::new(
            "App\\Support\\helper",
            None,
            UseKind::Function,
            1,
        )];
        assert_eq!(
            resolve("helper", Some("App"), &imports, UseKind::Function).unwrap(),
            Some("\\App\\Support\\helper".to_string())
        );
        // A class import with the same alias does not apply to functions.
        let class_only = vec![class_import("App\\Support\\helper", None)];
        assert!(resolve("helper", Some("App"), &class_only, UseKind::Function).is_err());
    }

    #[test]
    fn test_qualified_function_resolves_through_namespace_alias() {
        let imports = vec![class_import("Vendor\\Util", None)];
        assert_eq!(
            resolve("Util\\format", Some("App"), &imports, UseKind::Function).unwrap(),
            Some("\\Vendor\\Util\\format".to_string())
        );
        assert_eq!(
            resolve("Sub\\format", Some("App"), &imports, UseKind::Function).unwrap(),
            Some("\\App\\Sub\\format".to_string())
        );
    }

    #[test]
    fn test_constant_alias_is_case_sensitive() {
        let imports = vec![UseStatement::new("App\\LIMIT", None, UseKind::Constant, 1)];
        assert!(resolve("LIMIT", None, &imports, UseKind::Constant)
            .unwrap()
            .is_some());
        assert!(resolve("limit", None, &imports, UseKind::Constant).is_err());
    }

    #[test]
    fn test_fallback_prefers_namespaced_function() {
        let known = Known::default()
            .function("\\App\\strlen")
            .function("\\strlen");
        assert_eq!(
            resolve_with_fallback("strlen", Some("App"), &[], UseKind::Function, &known).unwrap(),
            Some("\\App\\strlen".to_string())
        );
    }

    #[test]
    fn test_fallback_to_global_function_and_constant() {
        let known = Known::default().function("\\strlen").constant("\\PHP_EOL");
        assert_eq!(
            resolve_with_fallback("strlen", Some("App"), &[], UseKind::Function, &known).unwrap(),
            Some("\\strlen".to_string())
        );
        assert_eq!(
            resolve_with_fallback("PHP_EOL", None, &[], UseKind::Constant, &known).unwrap(),
            Some("\\PHP_EOL".to_string())
        );
    }

    #[test]
    fn test_fallback_without_presence_stays_impossible() {
        let known = Known::default();
        assert!(
            resolve_with_fallback("missing", Some("App"), &[], UseKind::Function, &known).is_err()
        );
    }

    #[test]
    fn test_localize_class_in_same_namespace() {
        let known = Known::default();
        assert_eq!(
            localize("App\\Models\\User", Some("App"), &[], UseKind::Class, &known).unwrap(),
            "Models\\User"
        );
        assert_eq!(
            localize("\\Other\\User", Some("App"), &[], UseKind::Class, &known).unwrap(),
            "\\Other\\User"
        );
        assert_eq!(
            localize("Other\\User", None, &[], UseKind::Class, &known).unwrap(),
            "Other\\User"
        );
    }

    #[test]
    fn test_localize_prefers_import_alias() {
        let known = Known::default();
        let imports = vec![
            class_import("Vendor\\Http\\Client", Some("Http")),
            class_import("Vendor\\Orm", None),
        ];
        assert_eq!(
            localize("\\Vendor\\Http\\Client", Some("App"), &imports, UseKind::Class, &known)
                .unwrap(),
            "Http"
        );
        assert_eq!(
            localize("Vendor\\Orm\\Entity", Some("App"), &imports, UseKind::Class, &known).unwrap(),
            "Orm\\Entity"
        );
    }

    #[test]
    fn test_localize_rejects_shadowed_relative_name() {
        let known = Known::default();
        let imports = vec![class_import("Other\\Models", None)];
        assert_eq!(
            localize("App\\Models\\User", Some("App"), &imports, UseKind::Class, &known).unwrap(),
            "\\App\\Models\\User"
        );
    }

    #[test]
    fn test_localize_global_function() {
        let known = Known::default().function("\\strlen");
        assert_eq!(
            localize("strlen", Some("App"), &[], UseKind::Function, &known).unwrap(),
            "strlen"
        );

        let shadowed = Known::default()
            .function("\\strlen")
            .function("\\App\\strlen");
        assert_eq!(
            localize("strlen", Some("App"), &[], UseKind::Function, &shadowed).unwrap(),
            "\\strlen"
        );
    }

    #[test]
    fn test_localize_unknown_function_is_impossible() {
        let known = Known::default();
        assert!(localize("\\helper", Some("App"), &[], UseKind::Function, &known).is_err());
    }

    #[test]
    fn test_localize_aliased_function_import() {
        let known = Known::default();
        let imports = vec![UseStatement::new(
            "App\\go",
            Some("gogo".to_string()),
            UseKind::Function,
            1,
        )];
        assert_eq!(
            resolve("gogo", Some("App"), &imports, UseKind::Function).unwrap(),
            Some("\\App\\go".to_string())
        );
        // `go` cannot be verified without presence data; the alias still works.
        assert_eq!(
            localize("\\App\\go", Some("App"), &imports, UseKind::Function, &known).unwrap(),
            "gogo"
        );
    }

    #[test]
    fn test_localize_function_through_namespace_alias() {
        let known = Known::default();
        let imports = vec![class_import("App", Some("A"))];
        // `format` cannot be verified, `A\format` resolves through the alias.
        assert_eq!(
            localize("\\App\\format", Some("App"), &imports, UseKind::Function, &known).unwrap(),
            "A\\format"
        );
    }

    #[test]
    fn test_builtin_type_names() {
        assert!(is_builtin_type_name("int"));
        assert!(is_builtin_type_name("Self"));
        assert!(!is_builtin_type_name("Integer\\Thing"));
    }
}
