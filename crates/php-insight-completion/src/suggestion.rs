//! Completion suggestion model.

use lsp_types::{CompletionItem, CompletionItemKind, CompletionItemLabelDetails, CompletionItemTag};
use php_insight_types::{PhpSymbolKind, SymbolInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionKind {
    Function,
    Method,
    Class,
    Interface,
    Trait,
    Enum,
    Property,
    Constant,
    EnumCase,
    Variable,
    Keyword,
    Namespace,
}

impl From<PhpSymbolKind> for SuggestionKind {
    fn from(kind: PhpSymbolKind) -> Self {
        match kind {
            PhpSymbolKind::Class => SuggestionKind::Class,
            PhpSymbolKind::Interface => SuggestionKind::Interface,
            PhpSymbolKind::Trait => SuggestionKind::Trait,
            PhpSymbolKind::Enum => SuggestionKind::Enum,
            PhpSymbolKind::Function => SuggestionKind::Function,
            PhpSymbolKind::Method => SuggestionKind::Method,
            PhpSymbolKind::Property => SuggestionKind::Property,
            PhpSymbolKind::ClassConstant | PhpSymbolKind::GlobalConstant => {
                SuggestionKind::Constant
            }
            PhpSymbolKind::EnumCase => SuggestionKind::EnumCase,
        }
    }
}

impl From<SuggestionKind> for CompletionItemKind {
    fn from(kind: SuggestionKind) -> Self {
        match kind {
            SuggestionKind::Function => CompletionItemKind::FUNCTION,
            SuggestionKind::Method => CompletionItemKind::METHOD,
            SuggestionKind::Class => CompletionItemKind::CLASS,
            SuggestionKind::Interface | SuggestionKind::Trait => CompletionItemKind::INTERFACE,
            SuggestionKind::Enum => CompletionItemKind::ENUM,
            SuggestionKind::Property => CompletionItemKind::PROPERTY,
            SuggestionKind::Constant => CompletionItemKind::CONSTANT,
            SuggestionKind::EnumCase => CompletionItemKind::ENUM_MEMBER,
            SuggestionKind::Variable => CompletionItemKind::VARIABLE,
            SuggestionKind::Keyword => CompletionItemKind::KEYWORD,
            SuggestionKind::Namespace => CompletionItemKind::MODULE,
        }
    }
}

/// One completion candidate. Built with the `with_*` methods, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSuggestion {
    name: String,
    kind: SuggestionKind,
    type_label: Option<String>,
    detail: Option<String>,
    filter_text: Option<String>,
    insert_text: Option<String>,
    fqn: Option<String>,
    deprecated: bool,
}

impl CompletionSuggestion {
    pub fn new(name: impl Into<String>, kind: SuggestionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_label: None,
            detail: None,
            filter_text: None,
            insert_text: None,
            fqn: None,
            deprecated: false,
        }
    }

    /// A suggestion for an indexed symbol, carrying its rooted FQN and
    /// deprecation.
    pub fn from_symbol(symbol: &SymbolInfo) -> Self {
        Self::new(symbol.name.clone(), symbol.kind.into())
            .with_fqn(format!("\\{}", symbol.fqn.trim_start_matches('\\')))
            .with_deprecated(symbol.modifiers.is_deprecated)
    }

    pub fn with_type_label(mut self, type_label: impl Into<String>) -> Self {
        self.type_label = Some(type_label.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_filter_text(mut self, filter_text: impl Into<String>) -> Self {
        self.filter_text = Some(filter_text.into());
        self
    }

    pub fn with_insert_text(mut self, insert_text: impl Into<String>) -> Self {
        self.insert_text = Some(insert_text.into());
        self
    }

    pub fn with_fqn(mut self, fqn: impl Into<String>) -> Self {
        self.fqn = Some(fqn.into());
        self
    }

    pub fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SuggestionKind {
        self.kind
    }

    pub fn type_label(&self) -> Option<&str> {
        self.type_label.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Text matched against the typed prefix; the name unless overridden.
    pub fn filter_text(&self) -> &str {
        self.filter_text.as_deref().unwrap_or(&self.name)
    }

    pub fn insert_text(&self) -> Option<&str> {
        self.insert_text.as_deref()
    }

    pub fn fqn(&self) -> Option<&str> {
        self.fqn.as_deref()
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    /// Convert to an LSP item. `rank` is the position in the final list and
    /// becomes a zero-padded sort text so clients keep the order.
    pub fn to_completion_item(&self, rank: usize) -> CompletionItem {
        let label_details = (self.type_label.is_some() || self.fqn.is_some()).then(|| {
            CompletionItemLabelDetails {
                detail: self.type_label.as_ref().map(|t| format!(": {}", t)),
                description: self.fqn.clone(),
            }
        });

        CompletionItem {
            label: self.name.clone(),
            label_details,
            kind: Some(self.kind.into()),
            detail: self.detail.clone(),
            tags: self.deprecated.then(|| vec![CompletionItemTag::DEPRECATED]),
            sort_text: Some(format!("{:05}", rank)),
            filter_text: Some(self.filter_text().to_string()),
            insert_text: self.insert_text.clone(),
            // The FQN lets completionItem/resolve look the symbol up again.
            data: self.fqn.clone().map(serde_json::Value::String),
            ..Default::default()
        }
    }
}
