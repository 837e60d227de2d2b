//! LSP server implementation: the LanguageServer trait.

use dashmap::DashMap;
use php_insight_completion::{
    detect_context, CompletionConfig, CompletionContext, CompletionError, CompletionProvider,
    CompletionRequest, FuzzyMatchingProvider, IndexCompletionProvider, LimitingProvider,
    PrefixDeterminer,
};
use php_insight_index::WorkspaceIndex;
use php_insight_parser::parser::FileParser;
use php_insight_parser::phpdoc::parse_phpdoc;
use php_insight_parser::resolve::symbol_at_position;
use php_insight_parser::symbols::extract_file_symbols;
use php_insight_parser::FileTypeResolver;
use php_insight_types::{PhpSymbolKind, SymbolInfo};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tower_lsp::jsonrpc::{self, Result};
use tower_lsp::ls_types::*;
use tower_lsp::{Client, LanguageServer};

/// Main LSP backend holding all state.
pub struct PhpInsightBackend {
    /// Client handle for notifications and progress.
    client: Client,
    /// Open document parsers (URI string → FileParser).
    open_files: Arc<DashMap<String, FileParser>>,
    /// Global workspace symbol index.
    index: Arc<WorkspaceIndex>,
    /// Workspace root path (set during initialize).
    workspace_root: Mutex<Option<PathBuf>>,
    /// Trace level from InitializeParams (off/messages/verbose).
    trace_level: Mutex<TraceValue>,
    /// Completion settings from initializationOptions.
    config: Mutex<CompletionConfig>,
}

impl PhpInsightBackend {
    pub fn new(client: Client) -> Self {
        PhpInsightBackend {
            client,
            open_files: Arc::new(DashMap::new()),
            index: Arc::new(WorkspaceIndex::new()),
            workspace_root: Mutex::new(None),
            trace_level: Mutex::new(TraceValue::Off),
            config: Mutex::new(CompletionConfig::default()),
        }
    }

    /// Log a message to the client if trace level is verbose.
    async fn log_trace(&self, message: &str) {
        let level = *self.trace_level.lock().await;
        if level == TraceValue::Verbose {
            tracing::trace!("{}", message);
            self.client.log_message(MessageType::LOG, message).await;
        }
    }

    /// Reparse `uri` from its open parser and replace its index entry.
    fn reindex_open_file(&self, uri: &str) -> Option<usize> {
        let parser = self.open_files.get(uri)?;
        let tree = parser.tree()?;
        let source = parser.source();
        let file_symbols = extract_file_symbols(tree, &source, uri);
        let sym_count = file_symbols.symbols.len();
        self.index.update_file(uri, file_symbols);
        Some(sym_count)
    }

    /// Run the completion pipeline for an open document.
    fn complete(
        &self,
        uri: &str,
        position: Position,
        config: &CompletionConfig,
    ) -> Result<Option<Vec<CompletionItem>>> {
        let Some(parser) = self.open_files.get(uri) else {
            return Ok(None);
        };
        let Some(tree) = parser.tree() else {
            return Ok(None);
        };
        let source = parser.source();
        let offset = parser.offset_at(position.line, position.character);
        let file_symbols = extract_file_symbols(tree, &source, uri);
        let resolver = FileTypeResolver::from_file_symbols(&file_symbols);

        let context = detect_context(tree, &source, offset, &file_symbols, &resolver);
        tracing::debug!("completion context: {:?}", context);
        if context == CompletionContext::None {
            return Ok(None);
        }

        let request =
            CompletionRequest::new(uri, &source, offset, context, &file_symbols, &resolver)
                .map_err(completion_error)?;
        let pipeline = LimitingProvider::new(
            FuzzyMatchingProvider::new(
                IndexCompletionProvider::new(&self.index),
                PrefixDeterminer::new(&*config.boundary_tokens()),
            ),
            config.max_results,
        );
        let suggestions = pipeline.provide(&request).map_err(completion_error)?;

        Ok(Some(
            suggestions
                .iter()
                .enumerate()
                .map(|(rank, suggestion)| to_ls_completion_item(suggestion.to_completion_item(rank)))
                .collect(),
        ))
    }

    /// Resolve the symbol under the cursor and describe it.
    fn hover_at(&self, uri: &str, position: Position) -> Option<Hover> {
        let parser = self.open_files.get(uri)?;
        let tree = parser.tree()?;
        let source = parser.source();
        let resolver = FileTypeResolver::for_file(uri, &*self.index);

        let found = match symbol_at_position(
            tree,
            &source,
            position.line,
            position.character,
            &resolver,
            &*self.index,
        ) {
            Ok(found) => found?,
            Err(e) => {
                tracing::debug!("hover: {}", e);
                return None;
            }
        };
        let sym = self.index.find_symbol(found.fqn.as_deref()?)?;

        let mut value = format!("```php\n{}\n```", symbol_header(&sym));
        if let Some(ref doc) = sym.doc_comment {
            let markdown = parse_phpdoc(doc).to_markdown();
            if !markdown.is_empty() {
                value.push_str("\n\n");
                value.push_str(&markdown);
            }
        }

        let (start_line, start_col, end_line, end_col) = found.range;
        Some(Hover {
            contents: HoverContents::Markup(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            }),
            range: Some(Range {
                start: Position::new(start_line, start_col),
                end: Position::new(end_line, end_col),
            }),
        })
    }
}

/// First hover line: the declaration keyword, the FQN and the signature.
fn symbol_header(sym: &SymbolInfo) -> String {
    let mut header = format!("{} {}", sym.kind.keyword(), sym.fqn);
    match (sym.kind, &sym.signature) {
        (PhpSymbolKind::Function | PhpSymbolKind::Method, Some(sig)) => {
            header.push_str(&sig.render());
        }
        (_, Some(sig)) => {
            if let Some(ref ty) = sig.return_type {
                header.push_str(&format!(": {}", ty));
            }
        }
        (_, None) => {}
    }
    header
}

/// Signature detail for completionItem/resolve.
fn symbol_detail(sym: &SymbolInfo) -> Option<String> {
    let sig = sym.signature.as_ref()?;
    match sym.kind {
        PhpSymbolKind::Function | PhpSymbolKind::Method => Some(sig.render()),
        _ => sig.return_type.as_ref().map(|ty| ty.to_string()),
    }
}

fn completion_error(err: CompletionError) -> jsonrpc::Error {
    match err {
        CompletionError::InvalidOffset { .. } => jsonrpc::Error::invalid_params(err.to_string()),
        CompletionError::Source { .. } => {
            tracing::warn!("completion failed: {}", err);
            let mut rpc = jsonrpc::Error::internal_error();
            rpc.message = err.to_string().into();
            rpc
        }
    }
}

/// Recursively collect .php files from a directory.
fn collect_php_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            // Skip hidden directories and vendor
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str.starts_with('.') || name_str == "vendor" || name_str == "node_modules" {
                continue;
            }
            collect_php_files_recursive(&path, files);
        } else if path.extension().and_then(|e| e.to_str()) == Some("php") {
            files.push(path);
        }
    }
}

/// Convert a file:// URI to a filesystem path.
fn uri_to_path(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix("file://").map(PathBuf::from)
}

/// Convert a file path to a file:// URI.
fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn lsp_completion_kind_to_ls(kind: lsp_types::CompletionItemKind) -> CompletionItemKind {
    // Both crates use the protocol's numeric values
    match kind {
        lsp_types::CompletionItemKind::METHOD => CompletionItemKind::METHOD,
        lsp_types::CompletionItemKind::FUNCTION => CompletionItemKind::FUNCTION,
        lsp_types::CompletionItemKind::VARIABLE => CompletionItemKind::VARIABLE,
        lsp_types::CompletionItemKind::CLASS => CompletionItemKind::CLASS,
        lsp_types::CompletionItemKind::INTERFACE => CompletionItemKind::INTERFACE,
        lsp_types::CompletionItemKind::MODULE => CompletionItemKind::MODULE,
        lsp_types::CompletionItemKind::PROPERTY => CompletionItemKind::PROPERTY,
        lsp_types::CompletionItemKind::ENUM => CompletionItemKind::ENUM,
        lsp_types::CompletionItemKind::KEYWORD => CompletionItemKind::KEYWORD,
        lsp_types::CompletionItemKind::ENUM_MEMBER => CompletionItemKind::ENUM_MEMBER,
        lsp_types::CompletionItemKind::CONSTANT => CompletionItemKind::CONSTANT,
        lsp_types::CompletionItemKind::STRUCT => CompletionItemKind::STRUCT,
        _ => CompletionItemKind::TEXT,
    }
}

/// Map an lsp_types item from the completion crate to the server's types.
fn to_ls_completion_item(item: lsp_types::CompletionItem) -> CompletionItem {
    let tags = item.tags.map(|tags| {
        tags.into_iter()
            .filter(|t| *t == lsp_types::CompletionItemTag::DEPRECATED)
            .map(|_| CompletionItemTag::DEPRECATED)
            .collect()
    });

    CompletionItem {
        label: item.label,
        label_details: item.label_details.map(|d| CompletionItemLabelDetails {
            detail: d.detail,
            description: d.description,
        }),
        kind: item.kind.map(lsp_completion_kind_to_ls),
        detail: item.detail,
        tags,
        sort_text: item.sort_text,
        filter_text: item.filter_text,
        insert_text: item.insert_text,
        data: item.data,
        ..Default::default()
    }
}

/// Background workspace indexing.
///
/// Scans PHP files under the workspace root and adds their symbols to the
/// index.
async fn index_workspace(
    client: &Client,
    index: &WorkspaceIndex,
    root: &Path,
) -> std::result::Result<usize, String> {
    let progress_token = ProgressToken::String("php-insight-indexing".to_string());

    let progress_supported = client
        .create_work_done_progress(progress_token.clone())
        .await
        .is_ok();

    let ongoing = if progress_supported {
        let progress = client
            .progress(progress_token, "Indexing PHP workspace")
            .with_percentage(0)
            .with_message("Discovering files...");
        Some(progress.begin().await)
    } else {
        None
    };

    let mut files = Vec::new();
    collect_php_files_recursive(root, &mut files);

    let total = files.len();
    tracing::info!("Indexing {} PHP files", total);

    if let Some(ref p) = ongoing {
        p.report_with_message(format!("Indexing {} files...", total), 0)
            .await;
    }

    let semaphore = Arc::new(Semaphore::new(4));

    for (i, file_path) in files.iter().enumerate() {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| format!("Semaphore error: {}", e))?;

        match std::fs::read_to_string(file_path) {
            Ok(source) => {
                let mut parser = FileParser::new();
                parser.parse_full(&source);

                if let Some(tree) = parser.tree() {
                    let uri = path_to_uri(file_path);
                    let file_symbols = extract_file_symbols(tree, &source, &uri);

                    let sym_count = file_symbols.symbols.len();
                    index.update_file(&uri, file_symbols);

                    if sym_count > 0 {
                        tracing::debug!("Indexed {}: {} symbols", file_path.display(), sym_count);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", file_path.display(), e);
            }
        }

        let done = i + 1;
        if let Some(ref p) = ongoing {
            if done % 10 == 0 || done == total {
                let percentage = ((done as f64 / total as f64) * 100.0) as u32;
                p.report_with_message(format!("Indexed {}/{} files", done, total), percentage)
                    .await;
            }
        }

        // Yield to allow other tasks to run
        if i % 50 == 0 {
            tokio::task::yield_now().await;
        }
    }

    if let Some(p) = ongoing {
        p.finish_with_message(format!("Indexed {} files", total))
            .await;
    }

    Ok(total)
}

impl LanguageServer for PhpInsightBackend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("php-insight: initialize");

        // Nothing is applied when the options are malformed.
        let config =
            CompletionConfig::from_initialization_options(params.initialization_options.as_ref())
                .map_err(|e| {
                    tracing::warn!("Rejecting initializationOptions: {}", e);
                    jsonrpc::Error::invalid_params(e.to_string())
                })?;
        tracing::info!(
            "Completion: max {} results, boundary tokens {:?}",
            config.max_results,
            config.boundary_tokens
        );
        *self.config.lock().await = config;

        if let Some(trace) = params.trace {
            *self.trace_level.lock().await = trace;
            tracing::info!("Trace level: {:?}", trace);
        }

        #[allow(deprecated)]
        let root_path = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri_to_path(uri.as_str()))
            .or_else(|| params.root_path.as_ref().map(PathBuf::from));

        if let Some(ref root) = root_path {
            tracing::info!("Workspace root: {}", root.display());
            *self.workspace_root.lock().await = Some(root.clone());
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        "$".to_string(),
                        ">".to_string(),
                        ":".to_string(),
                        "\\".to_string(),
                    ]),
                    resolve_provider: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "php-insight".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        tracing::info!("php-insight: initialized");
        self.client
            .log_message(MessageType::INFO, "php-insight server initialized")
            .await;

        let workspace_root = self.workspace_root.lock().await.clone();
        let Some(root) = workspace_root else {
            tracing::warn!("No workspace root, skipping indexing");
            return;
        };

        let client = self.client.clone();
        let index = self.index.clone();
        tokio::spawn(async move {
            match index_workspace(&client, &index, &root).await {
                Ok(total) => {
                    tracing::info!("Workspace indexing complete: {} files", total);
                    client
                        .log_message(
                            MessageType::INFO,
                            format!("php-insight: indexed {} PHP files", total),
                        )
                        .await;
                }
                Err(e) => {
                    tracing::error!("Background indexing failed: {}", e);
                    client
                        .log_message(MessageType::ERROR, format!("Indexing failed: {}", e))
                        .await;
                }
            }
        });
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("php-insight: shutdown");
        Ok(())
    }

    // --- Document Synchronization ---

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri_str = params.text_document.uri.as_str().to_string();
        tracing::debug!("didOpen: {}", uri_str);

        let mut parser = FileParser::new();
        parser.parse_full(&params.text_document.text);
        self.open_files.insert(uri_str.clone(), parser);

        if let Some(sym_count) = self.reindex_open_file(&uri_str) {
            self.log_trace(&format!("Indexed {} symbols from {}", sym_count, uri_str))
                .await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri_str = params.text_document.uri.as_str().to_string();
        tracing::debug!("didChange: {}", uri_str);

        if let Some(mut parser) = self.open_files.get_mut(&uri_str) {
            for change in &params.content_changes {
                if let Some(range) = change.range {
                    parser.apply_edit(
                        range.start.line,
                        range.start.character,
                        range.end.line,
                        range.end.character,
                        &change.text,
                    );
                } else {
                    // Full content replacement
                    parser.parse_full(&change.text);
                }
            }
        }

        self.reindex_open_file(&uri_str);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri_str = params.text_document.uri.as_str().to_string();
        tracing::debug!("didClose: {}", uri_str);
        self.open_files.remove(&uri_str);

        // Files that exist on disk stay indexed; unsaved buffers go away.
        let on_disk = uri_to_path(&uri_str).is_some_and(|p| p.is_file());
        if !on_disk {
            self.index.remove_file(&uri_str);
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri_str = params
            .text_document_position_params
            .text_document
            .uri
            .as_str()
            .to_string();
        let pos = params.text_document_position_params.position;
        tracing::debug!("hover: {}:{}:{}", uri_str, pos.line, pos.character);

        Ok(self.hover_at(&uri_str, pos))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri_str = params
            .text_document_position
            .text_document
            .uri
            .as_str()
            .to_string();
        let pos = params.text_document_position.position;
        tracing::debug!("completion: {}:{}:{}", uri_str, pos.line, pos.character);

        let config = self.config.lock().await.clone();
        let Some(items) = self.complete(&uri_str, pos, &config)? else {
            return Ok(None);
        };
        self.log_trace(&format!("completion: {} items for {}", items.len(), uri_str))
            .await;

        // Ranking depends on the prefix, so clients must ask again as it grows.
        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete: true,
            items,
        })))
    }

    async fn completion_resolve(&self, mut item: CompletionItem) -> Result<CompletionItem> {
        // The FQN is stored in item.data
        let Some(fqn) = item.data.as_ref().and_then(|d| d.as_str()) else {
            return Ok(item);
        };
        let Some(sym) = self.index.find_symbol(fqn) else {
            tracing::debug!("completionItem/resolve: {} not indexed", fqn);
            return Ok(item);
        };

        if let Some(detail) = symbol_detail(&sym) {
            item.detail = Some(detail);
        }

        if let Some(ref doc) = sym.doc_comment {
            let phpdoc = parse_phpdoc(doc);
            let markdown = phpdoc.to_markdown();
            if !markdown.is_empty() {
                item.documentation = Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: markdown,
                }));
            }
            if phpdoc.deprecated.is_some() {
                let tags = item.tags.get_or_insert_with(Vec::new);
                if !tags.contains(&CompletionItemTag::DEPRECATED) {
                    tags.push(CompletionItemTag::DEPRECATED);
                }
            }
        }

        Ok(item)
    }
}
