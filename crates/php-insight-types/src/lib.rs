//! Shared types for php-insight.
//!
//! Contains symbol definitions, type information, imports and namespace spans
//! used across the parser, index and completion crates.

use serde::{Deserialize, Serialize};

/// The PHP namespace separator.
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Kind of a PHP symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhpSymbolKind {
    Class,
    Interface,
    Trait,
    Enum,
    Function,
    Method,
    Property,
    ClassConstant,
    GlobalConstant,
    EnumCase,
}

impl PhpSymbolKind {
    /// Classes, interfaces, traits and enums.
    pub fn is_class_like(self) -> bool {
        matches!(
            self,
            PhpSymbolKind::Class
                | PhpSymbolKind::Interface
                | PhpSymbolKind::Trait
                | PhpSymbolKind::Enum
        )
    }

    /// Keyword used for this kind in PHP source (for hover labels).
    pub fn keyword(self) -> &'static str {
        match self {
            PhpSymbolKind::Class => "class",
            PhpSymbolKind::Interface => "interface",
            PhpSymbolKind::Trait => "trait",
            PhpSymbolKind::Enum => "enum",
            PhpSymbolKind::Function | PhpSymbolKind::Method => "function",
            PhpSymbolKind::Property => "property",
            PhpSymbolKind::ClassConstant | PhpSymbolKind::GlobalConstant => "const",
            PhpSymbolKind::EnumCase => "case",
        }
    }
}

/// Visibility modifier for class members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

/// Modifiers on a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SymbolModifiers {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_deprecated: bool,
}

/// Represents a PHP type as written in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeInfo {
    Simple(String),
    Union(Vec<TypeInfo>),
    Intersection(Vec<TypeInfo>),
    Nullable(Box<TypeInfo>),
    Void,
    Never,
    Mixed,
    Self_,
    Static_,
    Parent_,
}

impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeInfo::Simple(name) => write!(f, "{}", name),
            TypeInfo::Union(types) => write_joined(f, types, "|"),
            TypeInfo::Intersection(types) => write_joined(f, types, "&"),
            TypeInfo::Nullable(inner) => write!(f, "?{}", inner),
            TypeInfo::Void => write!(f, "void"),
            TypeInfo::Never => write!(f, "never"),
            TypeInfo::Mixed => write!(f, "mixed"),
            TypeInfo::Self_ => write!(f, "self"),
            TypeInfo::Static_ => write!(f, "static"),
            TypeInfo::Parent_ => write!(f, "parent"),
        }
    }
}

fn write_joined(
    f: &mut std::fmt::Formatter<'_>,
    types: &[TypeInfo],
    separator: &str,
) -> std::fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

/// Parameter information for a function/method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    pub type_info: Option<TypeInfo>,
    pub default_value: Option<String>,
    pub is_variadic: bool,
    pub is_by_ref: bool,
}

/// Function/method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<ParamInfo>,
    pub return_type: Option<TypeInfo>,
}

impl Signature {
    /// Render the parameter list and return type, e.g. `(int $a, ...$rest): bool`.
    pub fn render(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                let mut s = String::new();
                if let Some(ref t) = p.type_info {
                    s.push_str(&t.to_string());
                    s.push(' ');
                }
                if p.is_by_ref {
                    s.push('&');
                }
                if p.is_variadic {
                    s.push_str("...");
                }
                s.push('$');
                s.push_str(&p.name);
                if let Some(ref default) = p.default_value {
                    s.push_str(" = ");
                    s.push_str(default);
                }
                s
            })
            .collect();
        let mut rendered = format!("({})", params.join(", "));
        if let Some(ref ret) = self.return_type {
            rendered.push_str(": ");
            rendered.push_str(&ret.to_string());
        }
        rendered
    }
}

/// Full information about a symbol in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Short name (e.g. "Foo", "bar", "BAZ")
    pub name: String,
    /// Fully qualified name without the leading separator (e.g. "App\\Service\\Foo")
    pub fqn: String,
    pub kind: PhpSymbolKind,
    /// File URI
    pub uri: String,
    /// Range in the file (start line, start col, end line, end col)
    pub range: (u32, u32, u32, u32),
    /// Selection range (the name part)
    pub selection_range: (u32, u32, u32, u32),
    pub visibility: Visibility,
    pub modifiers: SymbolModifiers,
    /// Raw doc comment
    pub doc_comment: Option<String>,
    /// Parsed signature (functions/methods); properties carry their type as `return_type`
    pub signature: Option<Signature>,
    /// Parent FQN (for methods/properties → class FQN)
    pub parent_fqn: Option<String>,
}

/// Kind of a `use` statement, which is also the kind of name being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UseKind {
    Class,
    Function,
    Constant,
}

impl std::fmt::Display for UseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            UseKind::Class => "class",
            UseKind::Function => "function",
            UseKind::Constant => "constant",
        })
    }
}

/// A use statement (import) in a PHP file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseStatement {
    /// Imported name as written, without the leading separator.
    pub fqn: String,
    pub alias: Option<String>,
    pub kind: UseKind,
    /// Range of the use clause (start line, start col, end line, end col).
    pub range: (u32, u32, u32, u32),
}

impl UseStatement {
    pub fn new(fqn: impl Into<String>, alias: Option<String>, kind: UseKind, line: u32) -> Self {
        let fqn: String = fqn.into();
        let fqn = fqn.trim_start_matches(NAMESPACE_SEPARATOR).to_string();
        UseStatement {
            fqn,
            alias,
            kind,
            range: (line, 0, line, 0),
        }
    }

    /// Name this import is visible as: the explicit alias or the last segment.
    pub fn effective_alias(&self) -> &str {
        match self.alias.as_deref() {
            Some(alias) => alias,
            None => last_segment(&self.fqn),
        }
    }

    /// Line the use clause starts on.
    pub fn line(&self) -> u32 {
        self.range.0
    }
}

/// A contiguous, inclusive line range governed by one namespace declaration.
///
/// `name == None` is the global namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSpan {
    pub name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
}

impl NamespaceSpan {
    pub fn new(name: Option<&str>, start_line: u32, end_line: u32) -> Self {
        NamespaceSpan {
            name: name.map(|n| n.trim_matches(NAMESPACE_SEPARATOR).to_string()),
            start_line,
            end_line,
        }
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Symbols extracted from a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileSymbols {
    /// Namespace spans ordered by line, covering the whole file.
    pub namespaces: Vec<NamespaceSpan>,
    pub use_statements: Vec<UseStatement>,
    pub symbols: Vec<SymbolInfo>,
}

impl FileSymbols {
    /// The namespace span containing `line`, if any.
    pub fn namespace_at(&self, line: u32) -> Option<&NamespaceSpan> {
        self.namespaces.iter().find(|span| span.contains(line))
    }
}

/// Last `\`-separated segment of a name.
pub fn last_segment(name: &str) -> &str {
    name.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(name)
}
