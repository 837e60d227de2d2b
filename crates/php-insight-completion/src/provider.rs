//! Completion providers.
//!
//! A provider turns a [`CompletionRequest`] into suggestions. The index
//! provider produces raw candidates; decorators such as
//! [`FuzzyMatchingProvider`](crate::fuzzy::FuzzyMatchingProvider) and
//! [`LimitingProvider`](crate::limiting::LimitingProvider) wrap another
//! provider to rank or cap its output.

use std::collections::{BTreeSet, HashSet};

use php_insight_index::WorkspaceIndex;
use php_insight_parser::type_resolver::rooted;
use php_insight_parser::{FileTypeResolver, PresenceIndicator};
use php_insight_types::{
    FileSymbols, PhpSymbolKind, SymbolInfo, UseKind, Visibility, NAMESPACE_SEPARATOR,
};
use thiserror::Error;
use tracing::debug;

use crate::context::CompletionContext;
use crate::suggestion::{CompletionSuggestion, SuggestionKind};

/// PHP keywords for free context.
const PHP_KEYWORDS: &[&str] = &[
    "abstract",
    "array",
    "as",
    "break",
    "callable",
    "case",
    "catch",
    "class",
    "clone",
    "const",
    "continue",
    "declare",
    "default",
    "do",
    "echo",
    "else",
    "elseif",
    "enum",
    "extends",
    "final",
    "finally",
    "fn",
    "for",
    "foreach",
    "function",
    "global",
    "if",
    "implements",
    "include",
    "include_once",
    "instanceof",
    "interface",
    "list",
    "match",
    "namespace",
    "new",
    "print",
    "private",
    "protected",
    "public",
    "readonly",
    "require",
    "require_once",
    "return",
    "static",
    "switch",
    "throw",
    "trait",
    "try",
    "use",
    "var",
    "while",
    "yield",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompletionError {
    #[error("offset {offset} is outside the {len}-byte document or inside a character")]
    InvalidOffset { offset: usize, len: usize },
    #[error("completion provider {provider} failed: {message}")]
    Source {
        provider: &'static str,
        message: String,
    },
}

/// Source of completion suggestions.
pub trait CompletionProvider {
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError>;
}

impl<P: CompletionProvider + ?Sized> CompletionProvider for &P {
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError> {
        (**self).provide(request)
    }
}

impl<P: CompletionProvider + ?Sized> CompletionProvider for Box<P> {
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError> {
        (**self).provide(request)
    }
}

/// Everything a provider may look at for one completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    uri: &'a str,
    source: &'a str,
    line: u32,
    character: u32,
    offset: usize,
    prefix: Option<String>,
    context: CompletionContext,
    file_symbols: &'a FileSymbols,
    resolver: &'a FileTypeResolver,
}

impl<'a> CompletionRequest<'a> {
    /// `offset` is a byte offset into `source`; the line and character are
    /// derived from it.
    pub fn new(
        uri: &'a str,
        source: &'a str,
        offset: usize,
        context: CompletionContext,
        file_symbols: &'a FileSymbols,
        resolver: &'a FileTypeResolver,
    ) -> Result<Self, CompletionError> {
        if offset > source.len() || !source.is_char_boundary(offset) {
            return Err(CompletionError::InvalidOffset {
                offset,
                len: source.len(),
            });
        }
        let before = &source[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Ok(Self {
            uri,
            source,
            line: before.matches('\n').count() as u32,
            character: (offset - line_start) as u32,
            offset,
            prefix: None,
            context,
            file_symbols,
            resolver,
        })
    }

    /// Use `prefix` instead of determining it from the source.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn uri(&self) -> &str {
        self.uri
    }

    pub fn source(&self) -> &str {
        self.source
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Byte column within the line.
    pub fn character(&self) -> u32 {
        self.character
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn context(&self) -> &CompletionContext {
        &self.context
    }

    pub fn file_symbols(&self) -> &FileSymbols {
        self.file_symbols
    }

    pub fn resolver(&self) -> &FileTypeResolver {
        self.resolver
    }
}

/// Raw candidates from the workspace index for the detected context.
///
/// Global symbols are spelled the way they can be written at the cursor.
/// A symbol that cannot be spelled unambiguously is left out; the rest of
/// the list is still returned.
pub struct IndexCompletionProvider<'a, P: ?Sized = WorkspaceIndex> {
    index: &'a WorkspaceIndex,
    presence: &'a P,
}

impl<'a> IndexCompletionProvider<'a> {
    pub fn new(index: &'a WorkspaceIndex) -> Self {
        Self {
            index,
            presence: index,
        }
    }
}

impl<'a, P: PresenceIndicator + ?Sized> IndexCompletionProvider<'a, P> {
    /// Check function and constant spellings against `presence` instead of
    /// the index itself.
    pub fn with_presence(index: &'a WorkspaceIndex, presence: &'a P) -> Self {
        Self { index, presence }
    }

    fn member_completions(
        &self,
        object_expr: &str,
        class_fqn: Option<&str>,
    ) -> Vec<CompletionSuggestion> {
        let Some(fqn) = class_fqn else {
            return Vec::new();
        };
        let inside_class = object_expr == "$this";
        self.index
            .get_members(fqn)
            .into_iter()
            .filter(|member| {
                matches!(member.kind, PhpSymbolKind::Method | PhpSymbolKind::Property)
                    && !member.modifiers.is_static
                    && (inside_class || member.visibility != Visibility::Private)
            })
            .map(|member| self.member_suggestion(&member, member.name.clone()))
            .collect()
    }

    fn static_completions(&self, class_fqn: Option<&str>) -> Vec<CompletionSuggestion> {
        let Some(fqn) = class_fqn else {
            return Vec::new();
        };
        let mut items: Vec<CompletionSuggestion> = self
            .index
            .get_members(fqn)
            .into_iter()
            .filter(|member| {
                member.modifiers.is_static
                    || matches!(
                        member.kind,
                        PhpSymbolKind::ClassConstant | PhpSymbolKind::EnumCase
                    )
            })
            .map(|member| {
                let label = if member.kind == PhpSymbolKind::Property {
                    format!("${}", member.name)
                } else {
                    member.name.clone()
                };
                self.member_suggestion(&member, label)
            })
            .collect();
        items.push(CompletionSuggestion::new("class", SuggestionKind::Keyword));
        items
    }

    fn member_suggestion(&self, member: &SymbolInfo, label: String) -> CompletionSuggestion {
        let mut suggestion = CompletionSuggestion::new(label, member.kind.into())
            .with_fqn(rooted(&member.fqn))
            .with_deprecated(member.modifiers.is_deprecated);

        if let Some(sig) = &member.signature {
            // Member types are written relative to the declaring file.
            let declaring = FileTypeResolver::for_file(&member.uri, self.index);
            if let Some(ret) = &sig.return_type {
                suggestion =
                    suggestion.with_type_label(declaring.resolve_type_label(ret, member.range.0));
            }
            if member.kind == PhpSymbolKind::Method {
                suggestion = suggestion.with_detail(sig.render());
            }
        }
        suggestion
    }

    fn variable_completions(&self, request: &CompletionRequest<'_>) -> Vec<CompletionSuggestion> {
        let mut items = vec![CompletionSuggestion::new("$this", SuggestionKind::Variable)];
        let mut seen: HashSet<String> = HashSet::from(["$this".to_string()]);

        for sym in &request.file_symbols().symbols {
            let Some(sig) = &sym.signature else {
                continue;
            };
            if sym.kind == PhpSymbolKind::Property {
                continue;
            }
            for param in &sig.params {
                let var_name = format!("${}", param.name);
                if seen.insert(var_name.clone()) {
                    let mut item = CompletionSuggestion::new(var_name, SuggestionKind::Variable);
                    if let Some(ty) = &param.type_info {
                        item = item.with_type_label(
                            request.resolver().resolve_type_label(ty, sym.range.0),
                        );
                    }
                    items.push(item);
                }
            }
        }

        // Variables assigned or used anywhere in the document.
        for var_name in document_variables(request.source(), request.offset()) {
            if seen.insert(var_name.to_string()) {
                items.push(CompletionSuggestion::new(var_name, SuggestionKind::Variable));
            }
        }
        items
    }

    fn qualified_name_completions(
        &self,
        request: &CompletionRequest<'_>,
        prefix: &str,
    ) -> Vec<CompletionSuggestion> {
        let rooted_prefix = prefix.starts_with(NAMESPACE_SEPARATOR);
        let mut items = Vec::new();

        for sym in self.index.all_symbols().iter() {
            let Some(kind) = use_kind(sym.kind) else {
                continue;
            };
            if kind != UseKind::Class {
                continue;
            }
            let spelling = if rooted_prefix {
                rooted(&sym.fqn)
            } else {
                match self.local_spelling(request, &sym.fqn, kind) {
                    Some(spelling) => spelling,
                    None => continue,
                }
            };
            items.push(
                CompletionSuggestion::from_symbol(sym)
                    .with_filter_text(spelling.clone())
                    .with_insert_text(spelling),
            );
        }

        // Namespaces are spelled like class names: relative or through an alias.
        for namespace in known_namespaces(self.index) {
            let spelling = if rooted_prefix {
                rooted(&namespace)
            } else {
                match self.local_spelling(request, &namespace, UseKind::Class) {
                    Some(spelling) => spelling,
                    None => continue,
                }
            };
            let name = php_insight_types::last_segment(&namespace).to_string();
            items.push(
                CompletionSuggestion::new(name, SuggestionKind::Namespace)
                    .with_filter_text(spelling.clone())
                    .with_insert_text(spelling),
            );
        }
        items
    }

    fn use_statement_completions(&self) -> Vec<CompletionSuggestion> {
        self.index
            .all_symbols()
            .iter()
            .filter(|sym| sym.kind.is_class_like())
            .map(|sym| {
                // Imported names are always fully qualified.
                CompletionSuggestion::from_symbol(sym)
                    .with_filter_text(sym.fqn.clone())
                    .with_insert_text(sym.fqn.clone())
            })
            .collect()
    }

    fn free_completions(&self, request: &CompletionRequest<'_>) -> Vec<CompletionSuggestion> {
        let mut items: Vec<CompletionSuggestion> = PHP_KEYWORDS
            .iter()
            .map(|keyword| CompletionSuggestion::new(*keyword, SuggestionKind::Keyword))
            .collect();

        for sym in self.index.all_symbols().iter() {
            let Some(kind) = use_kind(sym.kind) else {
                continue;
            };
            let Some(spelling) = self.local_spelling(request, &sym.fqn, kind) else {
                continue;
            };
            let mut item = CompletionSuggestion::from_symbol(sym);
            if let Some(sig) = &sym.signature {
                item = item.with_detail(sig.render());
            }
            if !spelling.contains(NAMESPACE_SEPARATOR) {
                item = item.with_filter_text(spelling.clone());
            }
            if spelling != sym.name {
                item = item.with_insert_text(spelling);
            }
            items.push(item);
        }
        items
    }

    fn local_spelling(
        &self,
        request: &CompletionRequest<'_>,
        fqn: &str,
        kind: UseKind,
    ) -> Option<String> {
        match request
            .resolver()
            .localize(fqn, request.line(), kind, self.presence)
        {
            Ok(spelling) => Some(spelling),
            Err(err) => {
                debug!("Skipping completion candidate {}: {}", fqn, err);
                None
            }
        }
    }
}

impl<P: PresenceIndicator + ?Sized> CompletionProvider for IndexCompletionProvider<'_, P> {
    fn provide(
        &self,
        request: &CompletionRequest<'_>,
    ) -> Result<Vec<CompletionSuggestion>, CompletionError> {
        let items = match request.context() {
            CompletionContext::MemberAccess {
                object_expr,
                class_fqn,
            } => self.member_completions(object_expr, class_fqn.as_deref()),
            CompletionContext::StaticAccess { class_fqn, .. } => {
                self.static_completions(class_fqn.as_deref())
            }
            CompletionContext::Variable { .. } => self.variable_completions(request),
            CompletionContext::Namespace { prefix } => {
                self.qualified_name_completions(request, prefix)
            }
            CompletionContext::UseStatement { .. } => self.use_statement_completions(),
            CompletionContext::Free { .. } => self.free_completions(request),
            CompletionContext::None => Vec::new(),
        };
        debug!(
            "{} raw completion candidates for {} at {}:{}",
            items.len(),
            request.uri(),
            request.line(),
            request.character()
        );
        Ok(items)
    }
}

fn use_kind(kind: PhpSymbolKind) -> Option<UseKind> {
    match kind {
        k if k.is_class_like() => Some(UseKind::Class),
        PhpSymbolKind::Function => Some(UseKind::Function),
        PhpSymbolKind::GlobalConstant => Some(UseKind::Constant),
        _ => None,
    }
}

/// Every namespace that contains an indexed class-like, function or constant,
/// including the enclosing ones.
fn known_namespaces(index: &WorkspaceIndex) -> BTreeSet<String> {
    let mut namespaces = BTreeSet::new();
    for sym in index.all_symbols().iter() {
        let mut fqn = sym.fqn.as_str();
        while let Some((namespace, _)) = fqn.rsplit_once(NAMESPACE_SEPARATOR) {
            if !namespaces.insert(namespace.to_string()) {
                break;
            }
            fqn = namespace;
        }
    }
    namespaces
}

/// `$name` tokens in `source`, skipping the one being typed at `offset`.
fn document_variables(source: &str, offset: usize) -> BTreeSet<&str> {
    let mut variables = BTreeSet::new();
    for (start, _) in source.match_indices('$') {
        let rest = &source[start + 1..];
        let len = rest
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let end = start + 1 + len;
        let starts_with_letter = rest
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if len > 0 && starts_with_letter && end != offset {
            variables.insert(&source[start..end]);
        }
    }
    variables
}
