//! Completion context detection.
//!
//! Determines what kind of completion is appropriate from the text before
//! the cursor, consulting the CST for `use` clauses, type positions and
//! base classes.

use php_insight_parser::type_resolver::rooted;
use php_insight_parser::FileTypeResolver;
use php_insight_types::{FileSymbols, PhpSymbolKind, SymbolInfo, TypeInfo, UseKind};
use tree_sitter::{Node, Point, Tree};

/// The context in which completion was triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionContext {
    /// After `->`: instance member access (methods, properties).
    MemberAccess {
        /// The object expression text (e.g. "$this", "$foo").
        object_expr: String,
        /// Rooted FQN of the object's class when it could be inferred.
        class_fqn: Option<String>,
    },

    /// After `::`: static members, class constants and enum cases.
    StaticAccess {
        /// The class name or keyword as written (e.g. "self", "Foo").
        class_expr: String,
        class_fqn: Option<String>,
    },

    /// After `$`: variable name completion.
    Variable {
        /// Partial variable name typed so far (without $).
        prefix: String,
    },

    /// A qualified name being typed (`App\Mo`, `\Date`).
    Namespace { prefix: String },

    /// Class names, function names, constants and keywords.
    Free { prefix: String },

    /// Inside a use statement.
    UseStatement { prefix: String },

    /// No completion available.
    None,
}

/// Determine the completion context at byte `offset` of `source`.
pub fn detect_context(
    tree: &Tree,
    source: &str,
    offset: usize,
    file_symbols: &FileSymbols,
    resolver: &FileTypeResolver,
) -> CompletionContext {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = source[..line_start].matches('\n').count() as u32;
    let text_before = &source[line_start..offset];

    let point = Point::new(line as usize, offset - line_start);
    let Some(node) = tree.root_node().descendant_for_point_range(point, point) else {
        return CompletionContext::None;
    };

    let detector = Detector {
        source,
        line,
        offset,
        file_symbols,
        resolver,
    };

    if let Some(ctx) = detector.member_access(text_before, node) {
        return ctx;
    }
    if let Some(ctx) = detector.static_access(text_before, node) {
        return ctx;
    }
    if let Some(ctx) = variable_access(text_before) {
        return ctx;
    }
    if let Some(ctx) = use_context(node, text_before) {
        return ctx;
    }
    if let Some(ctx) = namespace_access(text_before) {
        return ctx;
    }

    let prefix = extract_word_before_cursor(text_before);
    if prefix.is_empty() {
        // An empty word only completes where a type is expected.
        if is_type_hint_position(node) {
            return CompletionContext::Free {
                prefix: String::new(),
            };
        }
        return CompletionContext::None;
    }

    CompletionContext::Free { prefix }
}

struct Detector<'a> {
    source: &'a str,
    line: u32,
    offset: usize,
    file_symbols: &'a FileSymbols,
    resolver: &'a FileTypeResolver,
}

impl Detector<'_> {
    fn member_access(&self, text_before: &str, node: Node) -> Option<CompletionContext> {
        let trimmed = text_before.trim_end();
        let arrow_pos = trimmed.rfind("->")?;
        let after_arrow = &trimmed[arrow_pos + 2..];
        if !after_arrow.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }

        let before_arrow = trimmed[..arrow_pos].trim_end_matches('?').trim_end();
        let object_expr = if before_arrow.is_empty() {
            find_object_in_cst(node, self.source).unwrap_or_else(|| "$this".to_string())
        } else {
            extract_object_expr(before_arrow)
        };
        let class_fqn = self.infer_variable_class(&object_expr);

        Some(CompletionContext::MemberAccess {
            object_expr,
            class_fqn,
        })
    }

    fn static_access(&self, text_before: &str, node: Node) -> Option<CompletionContext> {
        let trimmed = text_before.trim_end();
        let colon_pos = trimmed.rfind("::")?;
        let after_colons = &trimmed[colon_pos + 2..];
        if !after_colons
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            return None;
        }

        let class_expr = extract_class_expr(trimmed[..colon_pos].trim_end());
        let class_fqn = match class_expr.to_ascii_lowercase().as_str() {
            "self" | "static" => self.enclosing_class().map(|class| rooted(&class.fqn)),
            "parent" => self.parent_class(node),
            "" => None,
            _ => self
                .resolver
                .resolve(&class_expr, self.line, UseKind::Class)
                .ok()
                .flatten(),
        };

        Some(CompletionContext::StaticAccess {
            class_expr,
            class_fqn,
        })
    }

    /// Innermost class-like declaration whose range covers the cursor line.
    fn enclosing_class(&self) -> Option<&SymbolInfo> {
        self.innermost(|sym| sym.kind.is_class_like())
    }

    fn enclosing_callable(&self) -> Option<&SymbolInfo> {
        self.innermost(|sym| matches!(sym.kind, PhpSymbolKind::Function | PhpSymbolKind::Method))
    }

    fn innermost(&self, filter: impl Fn(&SymbolInfo) -> bool) -> Option<&SymbolInfo> {
        self.file_symbols
            .symbols
            .iter()
            .filter(|sym| filter(sym) && sym.range.0 <= self.line && self.line <= sym.range.2)
            .max_by_key(|sym| (sym.range.0, sym.range.1))
    }

    /// Class of `$this`, or of a variable typed by a parameter or assigned
    /// from `new` earlier in the file.
    fn infer_variable_class(&self, object_expr: &str) -> Option<String> {
        if object_expr == "$this" {
            return self.enclosing_class().map(|class| rooted(&class.fqn));
        }
        let var_name = object_expr.strip_prefix('$')?;

        let from_param = self.enclosing_callable().and_then(|callable| {
            let sig = callable.signature.as_ref()?;
            let param = sig.params.iter().find(|p| p.name == var_name)?;
            match param.type_info.as_ref()? {
                TypeInfo::Simple(name) => Some(name.as_str()),
                TypeInfo::Nullable(inner) => match inner.as_ref() {
                    TypeInfo::Simple(name) => Some(name.as_str()),
                    _ => None,
                },
                _ => None,
            }
        });

        let class_name = from_param.or_else(|| {
            assigned_class(&self.source[..self.offset], object_expr)
        })?;
        self.resolver
            .resolve(class_name, self.line, UseKind::Class)
            .ok()
            .flatten()
    }

    fn parent_class(&self, node: Node) -> Option<String> {
        let mut current = Some(node);
        let class = loop {
            let candidate = current?;
            if candidate.kind() == "class_declaration" {
                break candidate;
            }
            current = candidate.parent();
        };
        let mut cursor = class.walk();
        let base = class
            .children(&mut cursor)
            .find(|c| c.kind() == "base_clause")?;
        let mut base_cursor = base.walk();
        let parent = base
            .named_children(&mut base_cursor)
            .find(|c| matches!(c.kind(), "name" | "qualified_name"))?;
        let name = self.source.get(parent.byte_range())?;
        self.resolver
            .resolve(name, parent.start_position().row as u32, UseKind::Class)
            .ok()
            .flatten()
    }
}

/// The class name in the last `$var = new Name` before the cursor.
fn assigned_class<'s>(source: &'s str, variable: &str) -> Option<&'s str> {
    source.rmatch_indices(variable).find_map(|(pos, _)| {
        let rest = &source[pos + variable.len()..];
        // `$user` must not match inside `$username`.
        if rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            return None;
        }
        let rest = rest.trim_start().strip_prefix('=')?;
        let rest = rest.trim_start().strip_prefix("new")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim_start();
        let end = rest
            .find(|c: char| !c.is_alphanumeric() && c != '_' && c != '\\')
            .unwrap_or(rest.len());
        (end > 0).then(|| &rest[..end])
    })
}

fn variable_access(text_before: &str) -> Option<CompletionContext> {
    let trimmed = text_before.trim_end();
    let dollar_pos = trimmed.rfind('$')?;
    let after_dollar = &trimmed[dollar_pos + 1..];
    if !after_dollar
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    // `$` must start a token, not sit inside a word.
    let preceded_by_word = trimmed[..dollar_pos]
        .chars()
        .last()
        .is_some_and(|c| c.is_alphanumeric() || c == '_');
    if preceded_by_word {
        return None;
    }
    Some(CompletionContext::Variable {
        prefix: after_dollar.to_string(),
    })
}

fn namespace_access(text_before: &str) -> Option<CompletionContext> {
    let trimmed = text_before.trim_end();
    let backslash_pos = trimmed.rfind('\\')?;
    let after_bs = &trimmed[backslash_pos + 1..];
    if !after_bs.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    let word_start = trimmed[..backslash_pos]
        .rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '\\')
        .map(|p| p + 1)
        .unwrap_or(0);
    Some(CompletionContext::Namespace {
        prefix: trimmed[word_start..].to_string(),
    })
}

fn use_context(node: Node, text_before: &str) -> Option<CompletionContext> {
    let mut current = Some(node);
    while let Some(n) = current {
        if matches!(n.kind(), "namespace_use_declaration" | "namespace_use_clause") {
            let prefix = text_before
                .rsplit(|c: char| c.is_whitespace() || c == ',' || c == '{')
                .next()
                .unwrap_or("");
            return Some(CompletionContext::UseStatement {
                prefix: prefix.to_string(),
            });
        }
        current = n.parent();
    }
    // A bare `use Foo` without `;` often parses as an error node.
    let trimmed = text_before.trim_start();
    let rest = trimmed.strip_prefix("use")?;
    if rest.starts_with(char::is_whitespace) && !rest.contains(';') {
        return Some(CompletionContext::UseStatement {
            prefix: rest.trim().to_string(),
        });
    }
    None
}

/// Last variable or identifier before `->`.
fn extract_object_expr(text: &str) -> String {
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '$')
        .last()
        .map_or(text.len(), |(i, _)| i);
    text[start..].to_string()
}

/// Class name (possibly qualified) before `::`.
fn extract_class_expr(text: &str) -> String {
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '\\' || c == '$')
        .last()
        .map_or(text.len(), |(i, _)| i);
    text[start..].to_string()
}

fn find_object_in_cst(node: Node, source: &str) -> Option<String> {
    let mut current = Some(node);
    while let Some(n) = current {
        if matches!(
            n.kind(),
            "member_access_expression" | "member_call_expression"
        ) {
            if let Some(obj) = n.child_by_field_name("object") {
                return source.get(obj.byte_range()).map(str::to_string);
            }
        }
        current = n.parent();
    }
    None
}

fn extract_word_before_cursor(text_before: &str) -> String {
    let start = text_before
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_alphanumeric() || c == '_')
        .last()
        .map_or(text_before.len(), |(i, _)| i);
    text_before[start..].to_string()
}

fn is_type_hint_position(node: Node) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if matches!(
            n.kind(),
            "named_type"
                | "optional_type"
                | "union_type"
                | "intersection_type"
                | "simple_parameter"
                | "property_declaration"
        ) {
            return true;
        }
        current = n.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use php_insight_parser::parser::FileParser;
    use php_insight_parser::symbols::extract_file_symbols;

    fn detect_at(code: &str, marker: &str) -> CompletionContext {
        let offset = code.find(marker).expect("marker in code") + marker.len();
        let mut parser = FileParser::new();
        parser.parse_full(code);
        let tree = parser.tree().unwrap();
        let file_symbols = extract_file_symbols(tree, code, "file:///test.php");
        let resolver = FileTypeResolver::from_file_symbols(&file_symbols);
        detect_context(tree, code, offset, &file_symbols, &resolver)
    }

    fn detect_end(code: &str) -> CompletionContext {
        detect_at(code, code)
    }

    #[test]
    fn test_member_access_context() {
        match detect_end("<?php\n$obj->meth") {
            CompletionContext::MemberAccess {
                object_expr,
                class_fqn,
            } => {
                assert_eq!(object_expr, "$obj");
                assert_eq!(class_fqn, None);
            }
            other => panic!("Expected MemberAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_this_resolves_to_enclosing_class() {
        let code = "<?php\nnamespace App;\nclass User {\n    public function a() {\n        $this->na\n    }\n}\n";
        match detect_at(code, "$this->na") {
            CompletionContext::MemberAccess { class_fqn, .. } => {
                assert_eq!(class_fqn.as_deref(), Some("\\App\\User"));
            }
            other => panic!("Expected MemberAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_parameter_type_inference() {
        let code = "<?php\nnamespace App;\nuse Lib\\Mailer;\nfunction send(Mailer $m) {\n    $m->se\n}\n";
        match detect_at(code, "$m->se") {
            CompletionContext::MemberAccess { class_fqn, .. } => {
                assert_eq!(class_fqn.as_deref(), Some("\\Lib\\Mailer"));
            }
            other => panic!("Expected MemberAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_inference() {
        let code = "<?php\nnamespace App;\n$user = new Model\\User();\n$user->";
        match detect_end(code) {
            CompletionContext::MemberAccess { class_fqn, .. } => {
                assert_eq!(class_fqn.as_deref(), Some("\\App\\Model\\User"));
            }
            other => panic!("Expected MemberAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_static_access_context() {
        let code = "<?php\nnamespace App;\nuse Lib\\Foo;\nFoo::bar";
        match detect_end(code) {
            CompletionContext::StaticAccess {
                class_expr,
                class_fqn,
            } => {
                assert_eq!(class_expr, "Foo");
                assert_eq!(class_fqn.as_deref(), Some("\\Lib\\Foo"));
            }
            other => panic!("Expected StaticAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_self_static_access() {
        let code = "<?php\nclass Config {\n    const A = 1;\n    function f() {\n        return self::A\n    }\n}\n";
        match detect_at(code, "self::A") {
            CompletionContext::StaticAccess { class_fqn, .. } => {
                assert_eq!(class_fqn.as_deref(), Some("\\Config"));
            }
            other => panic!("Expected StaticAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_context() {
        match detect_end("<?php\n$use") {
            CompletionContext::Variable { prefix } => assert_eq!(prefix, "use"),
            other => panic!("Expected Variable, got {:?}", other),
        }
    }

    #[test]
    fn test_namespace_context() {
        match detect_end("<?php\n$x = new App\\Mo") {
            CompletionContext::Namespace { prefix } => assert_eq!(prefix, "App\\Mo"),
            other => panic!("Expected Namespace, got {:?}", other),
        }
    }

    #[test]
    fn test_use_statement_context() {
        match detect_end("<?php\nuse App\\Mo") {
            CompletionContext::UseStatement { prefix } => assert_eq!(prefix, "App\\Mo"),
            other => panic!("Expected UseStatement, got {:?}", other),
        }
    }

    #[test]
    fn test_free_context() {
        match detect_end("<?php\narray_m") {
            CompletionContext::Free { prefix } => assert_eq!(prefix, "array_m"),
            other => panic!("Expected Free, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_word_outside_type_position() {
        assert_eq!(detect_end("<?php\n$a = 1;\n"), CompletionContext::None);
    }

    #[test]
    fn test_assigned_class_ignores_longer_names() {
        let source = "$user = new A;\n$username = new B;\n";
        assert_eq!(assigned_class(source, "$user"), Some("A"));
        assert_eq!(assigned_class(source, "$username"), Some("B"));
        assert_eq!(assigned_class(source, "$other"), None);
    }
}
