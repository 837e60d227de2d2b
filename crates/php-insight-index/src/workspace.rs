//! Global workspace symbol index.

use dashmap::DashMap;
use parking_lot::RwLock;
use php_insight_parser::{ImportTableProvider, PresenceIndicator};
use php_insight_types::{FileSymbols, NamespaceSpan, PhpSymbolKind, SymbolInfo, UseStatement};
use std::sync::Arc;
use tracing::debug;

/// Global index of all symbols in the workspace.
///
/// Keys are FQNs without the leading separator. Class-like and function keys
/// are lowercased since PHP compares those names case-insensitively; constant
/// keys are kept as written.
pub struct WorkspaceIndex {
    pub types: DashMap<String, Arc<SymbolInfo>>,
    pub functions: DashMap<String, Arc<SymbolInfo>>,
    pub constants: DashMap<String, Arc<SymbolInfo>>,

    /// File URI → extracted symbols for that file
    pub file_symbols: DashMap<String, FileSymbols>,

    cache: SymbolCache,
}

/// Flattened list of all global symbols, rebuilt lazily after invalidation.
#[derive(Default)]
struct SymbolCache {
    symbols: RwLock<Option<Arc<Vec<Arc<SymbolInfo>>>>>,
}

impl SymbolCache {
    fn get_or_build(&self, build: impl FnOnce() -> Vec<Arc<SymbolInfo>>) -> Arc<Vec<Arc<SymbolInfo>>> {
        if let Some(cached) = self.symbols.read().as_ref() {
            return Arc::clone(cached);
        }
        let mut slot = self.symbols.write();
        // Another writer may have filled it while we waited.
        if let Some(cached) = slot.as_ref() {
            return Arc::clone(cached);
        }
        let built = Arc::new(build());
        debug!("Rebuilt symbol cache with {} entries", built.len());
        *slot = Some(Arc::clone(&built));
        built
    }

    fn invalidate(&self) {
        *self.symbols.write() = None;
    }
}

fn key(fqn: &str, kind: PhpSymbolKind) -> String {
    let bare = fqn.trim_start_matches('\\');
    match kind {
        PhpSymbolKind::GlobalConstant => bare.to_string(),
        _ => bare.to_ascii_lowercase(),
    }
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        WorkspaceIndex {
            types: DashMap::new(),
            functions: DashMap::new(),
            constants: DashMap::new(),
            file_symbols: DashMap::new(),
            cache: SymbolCache::default(),
        }
    }

    fn table(&self, kind: PhpSymbolKind) -> Option<&DashMap<String, Arc<SymbolInfo>>> {
        match kind {
            k if k.is_class_like() => Some(&self.types),
            PhpSymbolKind::Function => Some(&self.functions),
            PhpSymbolKind::GlobalConstant => Some(&self.constants),
            // Members are looked up through `file_symbols` by parent FQN.
            _ => None,
        }
    }

    /// Replace everything indexed for `uri` with `file_symbols`.
    pub fn update_file(&self, uri: &str, file_symbols: FileSymbols) {
        self.remove_entries(uri);

        for sym in &file_symbols.symbols {
            if let Some(table) = self.table(sym.kind) {
                table.insert(key(&sym.fqn, sym.kind), Arc::new(sym.clone()));
            }
        }
        debug!(
            "Indexed {} symbols from {}",
            file_symbols.symbols.len(),
            uri
        );

        self.file_symbols.insert(uri.to_string(), file_symbols);
        self.cache.invalidate();
    }

    pub fn remove_file(&self, uri: &str) {
        self.remove_entries(uri);
        self.cache.invalidate();
    }

    fn remove_entries(&self, uri: &str) {
        let Some((_, old)) = self.file_symbols.remove(uri) else {
            return;
        };
        for sym in &old.symbols {
            if let Some(table) = self.table(sym.kind) {
                let k = key(&sym.fqn, sym.kind);
                // Another file may have redeclared the name since.
                table.remove_if(&k, |_, existing| existing.uri == uri);
            }
        }
    }

    /// Look up a class-like, function or constant by FQN (leading `\` optional).
    pub fn resolve_fqn(&self, fqn: &str) -> Option<Arc<SymbolInfo>> {
        self.get_type(fqn)
            .or_else(|| self.get_function(fqn))
            .or_else(|| self.get_constant(fqn))
    }

    pub fn get_type(&self, fqn: &str) -> Option<Arc<SymbolInfo>> {
        self.types
            .get(&key(fqn, PhpSymbolKind::Class))
            .map(|r| Arc::clone(r.value()))
    }

    pub fn get_function(&self, fqn: &str) -> Option<Arc<SymbolInfo>> {
        self.functions
            .get(&key(fqn, PhpSymbolKind::Function))
            .map(|r| Arc::clone(r.value()))
    }

    pub fn get_constant(&self, fqn: &str) -> Option<Arc<SymbolInfo>> {
        self.constants
            .get(&key(fqn, PhpSymbolKind::GlobalConstant))
            .map(|r| Arc::clone(r.value()))
    }

    /// Look up any symbol by FQN, including `Class::member` names.
    pub fn find_symbol(&self, fqn: &str) -> Option<Arc<SymbolInfo>> {
        let Some((class, member)) = fqn.split_once("::") else {
            return self.resolve_fqn(fqn);
        };
        let class = self.get_type(class)?;
        self.get_members(&class.fqn)
            .into_iter()
            .find(|m| member_name_matches(m, member))
    }

    /// All class-likes, functions and global constants.
    ///
    /// Served from a cache that every file update or removal invalidates.
    pub fn all_symbols(&self) -> Arc<Vec<Arc<SymbolInfo>>> {
        self.cache.get_or_build(|| {
            let mut all: Vec<Arc<SymbolInfo>> = Vec::new();
            for table in [&self.types, &self.functions, &self.constants] {
                all.extend(table.iter().map(|entry| Arc::clone(entry.value())));
            }
            all.sort_by(|a, b| a.fqn.cmp(&b.fqn));
            all
        })
    }

    /// Members (methods, properties, constants, cases) declared by a type.
    pub fn get_members(&self, type_fqn: &str) -> Vec<Arc<SymbolInfo>> {
        let type_fqn = type_fqn.trim_start_matches('\\');
        let mut members = Vec::new();
        for entry in self.file_symbols.iter() {
            for sym in &entry.value().symbols {
                if sym
                    .parent_fqn
                    .as_deref()
                    .is_some_and(|parent| parent.eq_ignore_ascii_case(type_fqn))
                {
                    members.push(Arc::new(sym.clone()));
                }
            }
        }
        members
    }
}

fn member_name_matches(member: &SymbolInfo, written: &str) -> bool {
    match member.kind {
        PhpSymbolKind::Property => written.trim_start_matches('$') == member.name,
        PhpSymbolKind::Method => written.eq_ignore_ascii_case(&member.name),
        _ => written == member.name,
    }
}

impl Default for WorkspaceIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceIndicator for WorkspaceIndex {
    fn is_function_present(&self, fqn: &str) -> bool {
        self.functions.contains_key(&key(fqn, PhpSymbolKind::Function))
    }

    fn is_constant_present(&self, fqn: &str) -> bool {
        self.constants
            .contains_key(&key(fqn, PhpSymbolKind::GlobalConstant))
    }
}

impl ImportTableProvider for WorkspaceIndex {
    fn imports_for_file(&self, uri: &str) -> Vec<UseStatement> {
        self.file_symbols
            .get(uri)
            .map(|f| f.use_statements.clone())
            .unwrap_or_default()
    }

    fn namespaces_for_file(&self, uri: &str) -> Vec<NamespaceSpan> {
        self.file_symbols
            .get(uri)
            .map(|f| f.namespaces.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use php_insight_parser::FileTypeResolver;
    use php_insight_types::*;

    fn make_symbol(name: &str, fqn: &str, kind: PhpSymbolKind, uri: &str) -> SymbolInfo {
        SymbolInfo {
            name: name.to_string(),
            fqn: fqn.to_string(),
            kind,
            uri: uri.to_string(),
            range: (0, 0, 10, 0),
            selection_range: (0, 6, 0, 6 + name.len() as u32),
            visibility: Visibility::Public,
            modifiers: SymbolModifiers::default(),
            doc_comment: None,
            signature: None,
            parent_fqn: None,
        }
    }

    fn file(symbols: Vec<SymbolInfo>) -> FileSymbols {
        FileSymbols {
            namespaces: vec![NamespaceSpan::new(Some("App"), 0, 10)],
            use_statements: vec![],
            symbols,
        }
    }

    #[test]
    fn test_update_and_resolve() {
        let index = WorkspaceIndex::new();
        let foo = make_symbol("Foo", "App\\Foo", PhpSymbolKind::Class, "file:///a.php");
        index.update_file("file:///a.php", file(vec![foo]));

        assert_eq!(index.resolve_fqn("App\\Foo").unwrap().name, "Foo");
        assert!(index.resolve_fqn("\\App\\Foo").is_some());
        assert!(index.resolve_fqn("\\app\\foo").is_some());
    }

    #[test]
    fn test_update_replaces_old() {
        let index = WorkspaceIndex::new();
        let uri = "file:///a.php";
        index.update_file(
            uri,
            file(vec![make_symbol("Foo", "Foo", PhpSymbolKind::Class, uri)]),
        );
        index.update_file(
            uri,
            file(vec![make_symbol("Bar", "Bar", PhpSymbolKind::Class, uri)]),
        );
        assert!(index.resolve_fqn("Foo").is_none());
        assert!(index.resolve_fqn("Bar").is_some());
    }

    #[test]
    fn test_remove_keeps_redeclaration_from_other_file() {
        let index = WorkspaceIndex::new();
        index.update_file(
            "file:///a.php",
            file(vec![make_symbol("Foo", "Foo", PhpSymbolKind::Class, "file:///a.php")]),
        );
        index.update_file(
            "file:///b.php",
            file(vec![make_symbol("Foo", "Foo", PhpSymbolKind::Class, "file:///b.php")]),
        );
        index.remove_file("file:///a.php");
        assert_eq!(index.resolve_fqn("Foo").unwrap().uri, "file:///b.php");
    }

    #[test]
    fn test_cache_invalidated_on_update_and_remove() {
        let index = WorkspaceIndex::new();
        index.update_file(
            "file:///a.php",
            file(vec![make_symbol("Foo", "App\\Foo", PhpSymbolKind::Class, "file:///a.php")]),
        );
        let first = index.all_symbols();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first, &index.all_symbols()));

        index.update_file(
            "file:///b.php",
            file(vec![make_symbol(
                "helper",
                "App\\helper",
                PhpSymbolKind::Function,
                "file:///b.php",
            )]),
        );
        assert_eq!(index.all_symbols().len(), 2);

        index.remove_file("file:///a.php");
        let names: Vec<String> = index.all_symbols().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["helper".to_string()]);
    }

    #[test]
    fn test_members_and_find_symbol() {
        let index = WorkspaceIndex::new();
        let uri = "file:///a.php";
        let mut method = make_symbol("run", "App\\Foo::run", PhpSymbolKind::Method, uri);
        method.parent_fqn = Some("App\\Foo".into());
        let mut prop = make_symbol("name", "App\\Foo::$name", PhpSymbolKind::Property, uri);
        prop.parent_fqn = Some("App\\Foo".into());
        index.update_file(
            uri,
            file(vec![
                make_symbol("Foo", "App\\Foo", PhpSymbolKind::Class, uri),
                method,
                prop,
            ]),
        );

        assert_eq!(index.get_members("\\App\\Foo").len(), 2);
        assert_eq!(index.find_symbol("\\App\\Foo::RUN").unwrap().name, "run");
        assert_eq!(index.find_symbol("\\App\\Foo::$name").unwrap().name, "name");
        assert!(index.find_symbol("\\App\\Foo::missing").is_none());
    }

    #[test]
    fn test_presence_indicator() {
        let index = WorkspaceIndex::new();
        let uri = "file:///a.php";
        index.update_file(
            uri,
            file(vec![
                make_symbol("helper", "App\\helper", PhpSymbolKind::Function, uri),
                make_symbol("LIMIT", "App\\LIMIT", PhpSymbolKind::GlobalConstant, uri),
            ]),
        );
        assert!(index.is_function_present("\\App\\helper"));
        assert!(index.is_function_present("\\App\\HELPER"));
        assert!(index.is_constant_present("\\App\\LIMIT"));
        assert!(!index.is_constant_present("\\App\\limit"));
        assert!(!index.is_function_present("\\helper"));
    }

    #[test]
    fn test_import_table_provider_feeds_file_resolver() {
        let index = WorkspaceIndex::new();
        let uri = "file:///a.php";
        let mut symbols = file(vec![]);
        symbols.use_statements = vec![UseStatement::new("Lib\\Mailer", None, UseKind::Class, 2)];
        index.update_file(uri, symbols);

        assert_eq!(index.imports_for_file(uri).len(), 1);
        assert!(index.imports_for_file("file:///missing.php").is_empty());

        let resolver = FileTypeResolver::for_file(uri, &index);
        assert_eq!(
            resolver.resolve("Mailer", 5, UseKind::Class).unwrap().as_deref(),
            Some("\\Lib\\Mailer")
        );
        assert_eq!(
            resolver.resolve("Other", 5, UseKind::Class).unwrap().as_deref(),
            Some("\\App\\Other")
        );
    }
}
