//! Symbol lookup from a CST position.
//!
//! Given a position in a parsed PHP file, determines which symbol is
//! referenced there and resolves it to a rooted FQN using the file's
//! [`FileTypeResolver`].

use php_insight_types::UseKind;
use tree_sitter::{Node, Point, Tree};

use crate::file_resolver::FileTypeResolver;
use crate::symbols::{node_range, node_text};
use crate::type_resolver::{is_builtin_type_name, PresenceIndicator, ResolveError};

/// The symbol under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolAtPosition {
    /// The name as written in source.
    pub name: String,
    pub ref_kind: RefKind,
    /// Rooted FQN, `Class::member` for members. `None` when the container of a
    /// member cannot be inferred, and for variables.
    pub fqn: Option<String>,
    pub range: (u32, u32, u32, u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    ClassName,
    FunctionCall,
    Constant,
    MethodCall,
    PropertyAccess,
    StaticPropertyAccess,
    ClassConstant,
    Variable,
}

/// Parents under which a bare name denotes a class-like type.
const CLASS_CONTEXTS: &[&str] = &[
    "named_type",
    "optional_type",
    "union_type",
    "intersection_type",
    "base_clause",
    "class_interface_clause",
    "type_list",
    "object_creation_expression",
    "scoped_call_expression",
    "scoped_property_access_expression",
    "class_constant_access_expression",
    "catch_clause",
    "attribute",
];

/// Find and resolve the symbol at (`line`, `character`).
///
/// Unqualified function and constant names are settled through `presence`;
/// when neither candidate exists the resolution error is returned.
pub fn symbol_at_position<P: PresenceIndicator + ?Sized>(
    tree: &Tree,
    source: &str,
    line: u32,
    character: u32,
    resolver: &FileTypeResolver,
    presence: &P,
) -> Result<Option<SymbolAtPosition>, ResolveError> {
    let point = Point::new(line as usize, character as usize);
    let Some(node) = tree.root_node().descendant_for_point_range(point, point) else {
        return Ok(None);
    };
    let Some(node) = name_node(node) else {
        return Ok(None);
    };

    Lookup {
        source,
        resolver,
        presence,
    }
    .lookup(node)
}

/// Climb from a leaf to the whole name it belongs to (`Foo\Bar`, `$var`).
fn name_node(mut node: Node) -> Option<Node> {
    while !node.is_named() {
        node = node.parent()?;
    }
    while let Some(parent) = node.parent() {
        match parent.kind() {
            "qualified_name" | "namespace_name_as_prefix" | "variable_name" => node = parent,
            "namespace_name" if parent.parent().is_some_and(|p| p.kind() != "namespace_definition") => {
                node = parent
            }
            _ => break,
        }
    }
    Some(node)
}

fn is_field(parent: Node, field: &str, node: Node) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|n| n.id() == node.id())
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32
}

struct Lookup<'a, P: ?Sized> {
    source: &'a str,
    resolver: &'a FileTypeResolver,
    presence: &'a P,
}

impl<'a, P: PresenceIndicator + ?Sized> Lookup<'a, P> {
    fn lookup(&self, node: Node) -> Result<Option<SymbolAtPosition>, ResolveError> {
        let Some(parent) = node.parent() else {
            return Ok(None);
        };
        let text = node_text(node, self.source);
        let found = |ref_kind: RefKind,
                     fqn: Option<String>|
         -> Result<Option<SymbolAtPosition>, ResolveError> {
            Ok(Some(SymbolAtPosition {
                name: text.to_string(),
                ref_kind,
                fqn,
                range: node_range(node),
            }))
        };

        match parent.kind() {
            "member_access_expression"
            | "nullsafe_member_access_expression"
            | "member_call_expression"
            | "nullsafe_member_call_expression"
                if is_field(parent, "name", node) =>
            {
                let container = parent
                    .child_by_field_name("object")
                    .and_then(|object| self.object_class(object));
                if parent.kind().ends_with("call_expression") {
                    found(RefKind::MethodCall, member(container, text))
                } else {
                    found(
                        RefKind::PropertyAccess,
                        member(container, &format!("${}", text)),
                    )
                }
            }
            "scoped_call_expression" | "scoped_property_access_expression"
                if is_field(parent, "name", node) =>
            {
                let container = parent
                    .child_by_field_name("scope")
                    .and_then(|scope| self.class_name(node_text(scope, self.source), scope));
                let kind = if parent.kind() == "scoped_call_expression" {
                    RefKind::MethodCall
                } else {
                    RefKind::StaticPropertyAccess
                };
                found(kind, member(container, text))
            }
            "class_constant_access_expression"
                if parent.named_child(0).is_some_and(|scope| scope.id() != node.id()) =>
            {
                let container = parent
                    .named_child(0)
                    .and_then(|scope| self.class_name(node_text(scope, self.source), scope));
                found(RefKind::ClassConstant, member(container, text))
            }
            "function_call_expression" if is_field(parent, "function", node) => {
                let fqn = self.resolver.resolve_with_presence(
                    text,
                    line_of(node),
                    UseKind::Function,
                    self.presence,
                )?;
                found(RefKind::FunctionCall, fqn)
            }
            "function_definition" if is_field(parent, "name", node) => {
                found(RefKind::FunctionCall, Some(self.declared(text, node)))
            }
            "method_declaration" if is_field(parent, "name", node) => {
                found(RefKind::MethodCall, member(self.enclosing_class(node), text))
            }
            "class_declaration" | "interface_declaration" | "trait_declaration"
            | "enum_declaration"
                if is_field(parent, "name", node) =>
            {
                found(RefKind::ClassName, Some(self.declared(text, node)))
            }
            _ if node.kind() == "variable_name" => found(RefKind::Variable, None),
            kind if matches!(node.kind(), "name" | "qualified_name") => {
                if CLASS_CONTEXTS.contains(&kind) {
                    if is_builtin_type_name(text) && !is_special_class(text) {
                        return Ok(None);
                    }
                    return found(RefKind::ClassName, self.class_name(text, node));
                }
                let fqn = self.resolver.resolve_with_presence(
                    text,
                    line_of(node),
                    UseKind::Constant,
                    self.presence,
                )?;
                found(RefKind::Constant, fqn)
            }
            _ => Ok(None),
        }
    }

    /// Resolve a class reference, including `self`, `static` and `parent`.
    fn class_name(&self, name: &str, at: Node) -> Option<String> {
        match name.to_ascii_lowercase().as_str() {
            "self" | "static" => self.enclosing_class(at),
            "parent" => self.parent_class(at),
            _ if is_builtin_type_name(name) => None,
            _ => self
                .resolver
                .resolve(name, line_of(at), UseKind::Class)
                .ok()
                .flatten(),
        }
    }

    /// FQN of a name declared at `node` in the namespace governing it.
    fn declared(&self, name: &str, node: Node) -> String {
        match self.resolver.namespace_name(line_of(node)) {
            Some(ns) => format!("\\{}\\{}", ns, name),
            None => format!("\\{}", name),
        }
    }

    fn enclosing_class_node<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut current = node.parent();
        while let Some(candidate) = current {
            if matches!(
                candidate.kind(),
                "class_declaration" | "interface_declaration" | "trait_declaration" | "enum_declaration"
            ) {
                return Some(candidate);
            }
            current = candidate.parent();
        }
        None
    }

    fn enclosing_class(&self, node: Node) -> Option<String> {
        let class = self.enclosing_class_node(node)?;
        let name = class.child_by_field_name("name")?;
        Some(self.declared(node_text(name, self.source), class))
    }

    fn parent_class(&self, node: Node) -> Option<String> {
        let class = self.enclosing_class_node(node)?;
        let mut cursor = class.walk();
        let base = class.children(&mut cursor).find(|c| c.kind() == "base_clause")?;
        let mut base_cursor = base.walk();
        let parent = base
            .named_children(&mut base_cursor)
            .find(|c| matches!(c.kind(), "name" | "qualified_name"))?;
        self.resolver
            .resolve(node_text(parent, self.source), line_of(parent), UseKind::Class)
            .ok()
            .flatten()
    }

    /// Best-effort class of an object expression: `new Foo()`, `(new Foo())`
    /// and `$this`.
    fn object_class(&self, object: Node) -> Option<String> {
        match object.kind() {
            "object_creation_expression" => {
                let mut cursor = object.walk();
                let class = object
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "name" | "qualified_name"))?;
                self.class_name(node_text(class, self.source), class)
            }
            "parenthesized_expression" => {
                let mut cursor = object.walk();
                let inner = object
                    .named_children(&mut cursor)
                    .find_map(|c| self.object_class(c));
                inner
            }
            "variable_name" if node_text(object, self.source) == "$this" => {
                self.enclosing_class(object)
            }
            _ => None,
        }
    }
}

fn is_special_class(name: &str) -> bool {
    ["self", "static", "parent"]
        .iter()
        .any(|special| special.eq_ignore_ascii_case(name))
}

fn member(container: Option<String>, name: &str) -> Option<String> {
    container.map(|class| format!("{}::{}", class, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FileParser;
    use crate::symbols::extract_file_symbols;

    struct Builtins;

    impl PresenceIndicator for Builtins {
        fn is_function_present(&self, fqn: &str) -> bool {
            fqn == "\\strlen"
        }

        fn is_constant_present(&self, fqn: &str) -> bool {
            fqn == "\\PHP_EOL"
        }
    }

    fn lookup(code: &str, line: u32, col: u32) -> Result<Option<SymbolAtPosition>, ResolveError> {
        let mut parser = FileParser::new();
        parser.parse_full(code);
        let tree = parser.tree().unwrap();
        let file_symbols = extract_file_symbols(tree, code, "file:///test.php");
        let resolver = FileTypeResolver::from_file_symbols(&file_symbols);
        symbol_at_position(tree, code, line, col, &resolver, &Builtins)
    }

    fn symbol(code: &str, line: u32, col: u32) -> SymbolAtPosition {
        lookup(code, line, col).unwrap().expect("symbol at position")
    }

    #[test]
    fn test_class_name_through_import() {
        let code = "<?php\nuse App\\Service\\UserService;\n\nnew UserService();\n";
        let sym = symbol(code, 3, 5);
        assert_eq!(sym.ref_kind, RefKind::ClassName);
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Service\\UserService"));
    }

    #[test]
    fn test_alias_is_resolved() {
        let code = "<?php\nnamespace App;\nuse Vendor\\Http\\Client as Http;\n\nfunction f(Http $c) {}\n";
        let sym = symbol(code, 4, 12);
        assert_eq!(sym.name, "Http");
        assert_eq!(sym.fqn.as_deref(), Some("\\Vendor\\Http\\Client"));
    }

    #[test]
    fn test_function_call_falls_back_to_global() {
        let code = "<?php\nnamespace App;\n\nstrlen('hello');\n";
        let sym = symbol(code, 3, 0);
        assert_eq!(sym.ref_kind, RefKind::FunctionCall);
        assert_eq!(sym.fqn.as_deref(), Some("\\strlen"));
    }

    #[test]
    fn test_unknown_function_is_impossible() {
        let code = "<?php\nnamespace App;\n\nmissing_fn();\n";
        assert!(matches!(
            lookup(code, 3, 1),
            Err(ResolveError::ResolutionImpossible { .. })
        ));
    }

    #[test]
    fn test_class_definition() {
        let code = "<?php\nnamespace App;\n\nclass Foo {\n}\n";
        let sym = symbol(code, 3, 6);
        assert_eq!(sym.name, "Foo");
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Foo"));
    }

    #[test]
    fn test_method_call_on_new() {
        let code = "<?php\nnamespace App;\nuse App\\Foo;\n\n(new Foo())->increment(5);\n";
        let sym = symbol(code, 4, 13);
        assert_eq!(sym.name, "increment");
        assert_eq!(sym.ref_kind, RefKind::MethodCall);
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Foo::increment"));
    }

    #[test]
    fn test_method_call_on_this() {
        let code = "<?php\nnamespace App;\n\nclass Foo {\n    public function bar(): void {\n        $this->baz();\n    }\n}\n";
        let sym = symbol(code, 5, 16);
        assert_eq!(sym.ref_kind, RefKind::MethodCall);
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Foo::baz"));
    }

    #[test]
    fn test_property_access_on_this() {
        let code = "<?php\nnamespace App;\n\nclass Foo {\n    private string $name;\n    public function bar(): string {\n        return $this->name;\n    }\n}\n";
        let sym = symbol(code, 6, 22);
        assert_eq!(sym.ref_kind, RefKind::PropertyAccess);
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Foo::$name"));
    }

    #[test]
    fn test_member_of_unknown_object_has_no_fqn() {
        let code = "<?php\n$obj->run();\n";
        let sym = symbol(code, 1, 7);
        assert_eq!(sym.ref_kind, RefKind::MethodCall);
        assert_eq!(sym.fqn, None);
    }

    #[test]
    fn test_static_property_through_self() {
        let code = "<?php\nnamespace App;\nclass Foo {\n    public static int $count = 0;\n    public function bar() { return self::$count; }\n}\n";
        let sym = symbol(code, 4, 42);
        assert_eq!(sym.ref_kind, RefKind::StaticPropertyAccess);
        assert_eq!(sym.fqn.as_deref(), Some("\\App\\Foo::$count"));
    }

    #[test]
    fn test_class_constant_access() {
        let code = "<?php\nuse Lib\\Config;\necho Config::MAX;\n";
        let constant = symbol(code, 2, 13);
        assert_eq!(constant.ref_kind, RefKind::ClassConstant);
        assert_eq!(constant.fqn.as_deref(), Some("\\Lib\\Config::MAX"));

        let class = symbol(code, 2, 6);
        assert_eq!(class.ref_kind, RefKind::ClassName);
        assert_eq!(class.fqn.as_deref(), Some("\\Lib\\Config"));
    }

    #[test]
    fn test_fully_qualified_scope() {
        let code = "<?php\nnamespace App;\n\\DateTime::createFromFormat('Y-m-d', '2024-01-01');\n";
        let sym = symbol(code, 2, 3);
        assert_eq!(sym.ref_kind, RefKind::ClassName);
        assert_eq!(sym.fqn.as_deref(), Some("\\DateTime"));
    }

    #[test]
    fn test_variable() {
        let code = "<?php\n$count = 1;\n";
        let sym = symbol(code, 1, 2);
        assert_eq!(sym.ref_kind, RefKind::Variable);
        assert_eq!(sym.name, "$count");
    }
}
