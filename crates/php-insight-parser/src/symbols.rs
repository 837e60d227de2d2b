//! Symbol extraction from the tree-sitter CST.
//!
//! A single pass over the tree collects declarations (classes and their
//! members, functions, constants), `use` imports with the line they start on,
//! and the namespace spans of the file.

use php_insight_types::*;
use tracing::debug;
use tree_sitter::{Node, Tree};

/// Extract all symbols, imports and namespace spans from a parsed file.
pub fn extract_file_symbols(tree: &Tree, source: &str, uri: &str) -> FileSymbols {
    let root = tree.root_node();
    let mut collector = SymbolCollector {
        source,
        uri,
        namespace: None,
        out: FileSymbols::default(),
    };
    let mut spans = SpanBuilder::default();
    // Index of the first import collected in the current span.
    let mut span_imports = 0;

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() != "namespace_definition" {
            collector.visit(child);
            continue;
        }

        let name = namespace_name(child, source);
        let row = child.start_position().row as u32;
        if spans.discards(row) {
            // The span ending here has no lines of its own, so its imports
            // would otherwise apply to the namespace that follows.
            let dropped: Vec<String> = collector
                .out
                .use_statements
                .drain(span_imports..)
                .map(|import| import.fqn)
                .collect();
            if !dropped.is_empty() {
                debug!(
                    "{}: dropping imports {:?} of a namespace sharing line {}",
                    uri, dropped, row
                );
            }
        }
        match child.child_by_field_name("body") {
            Some(body) => {
                spans.braced(name.as_deref(), row, child.end_position().row as u32);
                let outer = std::mem::replace(&mut collector.namespace, name);
                collector.visit_children(body);
                collector.namespace = outer;
            }
            None => {
                spans.open(name.as_deref(), row);
                collector.namespace = name;
            }
        }
        span_imports = collector.out.use_statements.len();
    }

    let mut out = collector.out;
    out.namespaces = spans.finish(source.matches('\n').count() as u32);
    out
}

/// Builds disjoint, ordered namespace spans covering the whole file.
#[derive(Default)]
struct SpanBuilder {
    spans: Vec<NamespaceSpan>,
    /// Namespace and start line of the span still being extended.
    current: Option<(Option<String>, u32)>,
}

impl SpanBuilder {
    /// Start an unbraced namespace at `line`; it runs until the next one.
    fn open(&mut self, name: Option<&str>, line: u32) {
        self.close(line);
        self.current = Some((name.map(str::to_string), line));
    }

    /// A braced namespace occupies exactly its block; the global namespace
    /// resumes after it.
    fn braced(&mut self, name: Option<&str>, start: u32, end: u32) {
        self.close(start);
        self.push(name, start, end);
        self.current = Some((None, end + 1));
    }

    /// Whether closing at `line` leaves the current span without any line.
    fn discards(&self, line: u32) -> bool {
        self.current.as_ref().is_some_and(|(_, start)| *start >= line)
    }

    /// End the current span on the line before `line`.
    fn close(&mut self, line: u32) {
        let (name, start) = self.current.take().unwrap_or((None, 0));
        if line > start {
            self.push(name.as_deref(), start, line - 1);
        }
    }

    fn push(&mut self, name: Option<&str>, start: u32, end: u32) {
        if start <= end {
            self.spans.push(NamespaceSpan::new(name, start, end));
        }
    }

    fn finish(mut self, last_line: u32) -> Vec<NamespaceSpan> {
        let (name, start) = self.current.take().unwrap_or((None, 0));
        self.push(name.as_deref(), start, last_line);
        self.spans
    }
}

struct SymbolCollector<'a> {
    source: &'a str,
    uri: &'a str,
    namespace: Option<String>,
    out: FileSymbols,
}

impl<'a> SymbolCollector<'a> {
    fn visit(&mut self, node: Node) {
        match node.kind() {
            "namespace_use_declaration" => self.use_declaration(node),
            "class_declaration" => self.class_like(node, PhpSymbolKind::Class),
            "interface_declaration" => self.class_like(node, PhpSymbolKind::Interface),
            "trait_declaration" => self.class_like(node, PhpSymbolKind::Trait),
            "enum_declaration" => self.class_like(node, PhpSymbolKind::Enum),
            "function_definition" => self.function(node),
            "const_declaration" => self.global_constants(node),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child);
        }
    }

    fn text(&self, node: Node) -> &'a str {
        node_text(node, self.source)
    }

    fn qualify(&self, name: &str) -> String {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => format!("{}\\{}", ns, name),
            _ => name.to_string(),
        }
    }

    /// A symbol with defaults filled in; callers adjust the rest.
    fn symbol(
        &self,
        node: Node,
        name_node: Node,
        name: String,
        fqn: String,
        kind: PhpSymbolKind,
    ) -> SymbolInfo {
        let doc_comment = find_doc_comment(node, self.source);
        let mut modifiers = modifiers(node, self.source);
        modifiers.is_deprecated = doc_comment
            .as_deref()
            .is_some_and(|doc| doc.contains("@deprecated"));
        SymbolInfo {
            name,
            fqn,
            kind,
            uri: self.uri.to_string(),
            range: node_range(node),
            selection_range: node_range(name_node),
            visibility: visibility(node, self.source),
            modifiers,
            doc_comment,
            signature: None,
            parent_fqn: None,
        }
    }

    fn use_declaration(&mut self, node: Node) {
        let kind = use_kind(node).unwrap_or(UseKind::Class);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "namespace_use_clause" => self.use_clause(child, None, kind),
                "namespace_use_group" => {
                    let prefix = node
                        .child_by_field_name("prefix")
                        .or_else(|| first_child_of_kind(node, "namespace_name"))
                        .map(|n| self.text(n).trim_matches('\\'));
                    let mut group_cursor = child.walk();
                    for clause in child.children(&mut group_cursor) {
                        if matches!(
                            clause.kind(),
                            "namespace_use_clause" | "namespace_use_group_clause"
                        ) {
                            self.use_clause(clause, prefix, kind);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// `use` clause: `Name\Space [as Alias]`, optionally under a group prefix.
    fn use_clause(&mut self, clause: Node, prefix: Option<&str>, declared: UseKind) {
        let mut name: Option<&str> = None;
        let mut alias: Option<String> = None;
        let mut after_as = false;

        let mut cursor = clause.walk();
        for child in clause.children(&mut cursor) {
            match child.kind() {
                "as" => after_as = true,
                "name" if after_as => alias = Some(self.text(child).to_string()),
                "qualified_name" | "namespace_name" | "name" => name = Some(self.text(child)),
                _ => {}
            }
        }

        let Some(name) = name else {
            return;
        };
        let fqn = match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}\\{}", prefix, name),
            _ => name.to_string(),
        };
        let mut import = UseStatement::new(fqn, alias, use_kind(clause).unwrap_or(declared), 0);
        import.range = node_range(clause);
        self.out.use_statements.push(import);
    }

    fn class_like(&mut self, node: Node, kind: PhpSymbolKind) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let fqn = self.qualify(&name);
        let symbol = self.symbol(node, name_node, name, fqn.clone(), kind);
        self.out.symbols.push(symbol);

        let body = node.child_by_field_name("body").or_else(|| {
            first_child_of_kind(node, "declaration_list")
                .or_else(|| first_child_of_kind(node, "enum_declaration_list"))
        });
        if let Some(body) = body {
            self.class_body(body, &fqn);
        }
    }

    fn class_body(&mut self, body: Node, class_fqn: &str) {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            match member.kind() {
                "method_declaration" => self.method(member, class_fqn),
                "property_declaration" => self.properties(member, class_fqn),
                "class_const_declaration" | "const_declaration" => {
                    self.class_constants(member, class_fqn)
                }
                "enum_case" => self.enum_case(member, class_fqn),
                _ => {}
            }
        }
    }

    fn method(&mut self, node: Node, class_fqn: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let fqn = format!("{}::{}", class_fqn, name);
        let mut symbol = self.symbol(node, name_node, name, fqn, PhpSymbolKind::Method);
        symbol.signature = Some(signature(node, self.source));
        symbol.parent_fqn = Some(class_fqn.to_string());
        let is_constructor = symbol.name.eq_ignore_ascii_case("__construct");
        self.out.symbols.push(symbol);

        if is_constructor {
            self.promoted_properties(node, class_fqn);
        }
    }

    /// Constructor parameters with a visibility modifier declare properties.
    fn promoted_properties(&mut self, constructor: Node, class_fqn: &str) {
        let Some(params) = constructor.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.children(&mut cursor) {
            if param.kind() != "property_promotion_parameter" {
                continue;
            }
            let Some(name_node) = param.child_by_field_name("name") else {
                continue;
            };
            let name = strip_dollar(self.text(name_node)).to_string();
            let fqn = format!("{}::${}", class_fqn, name);
            let mut symbol = self.symbol(param, name_node, name, fqn, PhpSymbolKind::Property);
            symbol.signature = param.child_by_field_name("type").map(|t| Signature {
                params: Vec::new(),
                return_type: Some(parse_type(t, self.source)),
            });
            symbol.parent_fqn = Some(class_fqn.to_string());
            self.out.symbols.push(symbol);
        }
    }

    fn function(&mut self, node: Node) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let fqn = self.qualify(&name);
        let mut symbol = self.symbol(node, name_node, name, fqn, PhpSymbolKind::Function);
        symbol.signature = Some(signature(node, self.source));
        self.out.symbols.push(symbol);
    }

    fn properties(&mut self, node: Node, class_fqn: &str) {
        let declared_type = node
            .child_by_field_name("type")
            .map(|t| parse_type(t, self.source));

        let mut cursor = node.walk();
        for element in node.children(&mut cursor) {
            if element.kind() != "property_element" {
                continue;
            }
            let Some(name_node) = element.child_by_field_name("name") else {
                continue;
            };
            let name = strip_dollar(self.text(name_node)).to_string();
            let fqn = format!("{}::${}", class_fqn, name);
            let mut symbol = self.symbol(node, name_node, name, fqn, PhpSymbolKind::Property);
            symbol.signature = declared_type.as_ref().map(|t| Signature {
                params: Vec::new(),
                return_type: Some(t.clone()),
            });
            symbol.parent_fqn = Some(class_fqn.to_string());
            self.out.symbols.push(symbol);
        }
    }

    fn class_constants(&mut self, node: Node, class_fqn: &str) {
        for name_node in const_names(node) {
            let name = self.text(name_node).to_string();
            let fqn = format!("{}::{}", class_fqn, name);
            let mut symbol =
                self.symbol(node, name_node, name, fqn, PhpSymbolKind::ClassConstant);
            symbol.parent_fqn = Some(class_fqn.to_string());
            self.out.symbols.push(symbol);
        }
    }

    fn global_constants(&mut self, node: Node) {
        for name_node in const_names(node) {
            let name = self.text(name_node).to_string();
            let fqn = self.qualify(&name);
            let symbol = self.symbol(node, name_node, name, fqn, PhpSymbolKind::GlobalConstant);
            self.out.symbols.push(symbol);
        }
    }

    fn enum_case(&mut self, node: Node, enum_fqn: &str) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let fqn = format!("{}::{}", enum_fqn, name);
        let mut symbol = self.symbol(node, name_node, name, fqn, PhpSymbolKind::EnumCase);
        symbol.parent_fqn = Some(enum_fqn.to_string());
        self.out.symbols.push(symbol);
    }
}

/// `use function` / `use const` keyword on a declaration or a single clause.
fn use_kind(node: Node) -> Option<UseKind> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "function" => return Some(UseKind::Function),
            "const" => return Some(UseKind::Constant),
            "namespace_use_clause" | "namespace_use_group" | "namespace_name" | "name"
            | "qualified_name" => break,
            _ => {}
        }
    }
    None
}

fn namespace_name(node: Node, source: &str) -> Option<String> {
    node.child_by_field_name("name")
        .or_else(|| first_child_of_kind(node, "namespace_name"))
        .map(|n| node_text(n, source).trim_matches('\\').to_string())
        .filter(|name| !name.is_empty())
}

/// Name nodes of every `const_element` under a const declaration.
fn const_names(node: Node) -> Vec<Node> {
    let mut names = Vec::new();
    let mut cursor = node.walk();
    for element in node.children(&mut cursor) {
        if element.kind() != "const_element" {
            continue;
        }
        let name = element
            .child_by_field_name("name")
            .or_else(|| first_child_of_kind(element, "name"));
        names.extend(name);
    }
    names
}

fn signature(node: Node, source: &str) -> Signature {
    let mut params = Vec::new();
    if let Some(list) = node.child_by_field_name("parameters") {
        let mut cursor = list.walk();
        for param in list.children(&mut cursor) {
            if matches!(
                param.kind(),
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
            ) {
                params.push(parameter(param, source));
            }
        }
    }

    Signature {
        params,
        return_type: node
            .child_by_field_name("return_type")
            .map(|t| parse_type(t, source)),
    }
}

fn parameter(node: Node, source: &str) -> ParamInfo {
    let name = node
        .child_by_field_name("name")
        .map(|n| strip_dollar(node_text(n, source)))
        .unwrap_or("unknown");

    ParamInfo {
        name: name.to_string(),
        type_info: node
            .child_by_field_name("type")
            .map(|t| parse_type(t, source)),
        default_value: node
            .child_by_field_name("default_value")
            .map(|n| node_text(n, source).to_string()),
        is_variadic: node.kind() == "variadic_parameter",
        is_by_ref: first_child_of_kind(node, "reference_modifier").is_some(),
    }
}

fn parse_type(node: Node, source: &str) -> TypeInfo {
    match node.kind() {
        "union_type" => TypeInfo::Union(type_members(node, source)),
        "intersection_type" => TypeInfo::Intersection(type_members(node, source)),
        "optional_type" => match node.named_child(0) {
            Some(inner) => TypeInfo::Nullable(Box::new(parse_type(inner, source))),
            None => TypeInfo::Mixed,
        },
        _ => {
            let text = node_text(node, source);
            match text.to_ascii_lowercase().as_str() {
                "void" => TypeInfo::Void,
                "never" => TypeInfo::Never,
                "mixed" => TypeInfo::Mixed,
                "self" => TypeInfo::Self_,
                "static" => TypeInfo::Static_,
                "parent" => TypeInfo::Parent_,
                _ => TypeInfo::Simple(text.to_string()),
            }
        }
    }
}

fn type_members(node: Node, source: &str) -> Vec<TypeInfo> {
    let mut cursor = node.walk();
    let members = node
        .named_children(&mut cursor)
        .map(|member| parse_type(member, source))
        .collect();
    members
}

fn visibility(node: Node, source: &str) -> Visibility {
    match first_child_of_kind(node, "visibility_modifier").map(|n| node_text(n, source)) {
        Some("protected") => Visibility::Protected,
        Some("private") => Visibility::Private,
        _ => Visibility::Public,
    }
}

fn modifiers(node: Node, source: &str) -> SymbolModifiers {
    let mut mods = SymbolModifiers::default();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static_modifier" => mods.is_static = true,
            "abstract_modifier" => mods.is_abstract = true,
            "final_modifier" => mods.is_final = true,
            _ if node_text(child, source) == "static" => mods.is_static = true,
            _ => {}
        }
    }
    mods
}

/// The `/** ... */` comment directly preceding a declaration.
fn find_doc_comment(node: Node, source: &str) -> Option<String> {
    let prev = node.prev_sibling()?;
    if prev.kind() != "comment" {
        return None;
    }
    let text = node_text(prev, source);
    text.starts_with("/**").then(|| text.to_string())
}

fn first_child_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn strip_dollar(name: &str) -> &str {
    name.strip_prefix('$').unwrap_or(name)
}

pub(crate) fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

pub(crate) fn node_range(node: Node) -> (u32, u32, u32, u32) {
    let start = node.start_position();
    let end = node.end_position();
    (
        start.row as u32,
        start.column as u32,
        end.row as u32,
        end.column as u32,
    )
}
